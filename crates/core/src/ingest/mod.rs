pub mod gateway;
pub mod news;
pub mod provider;
pub mod stooq;
pub mod types;
pub mod yahoo;
