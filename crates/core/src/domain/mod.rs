pub mod catalog;
pub mod market;
pub mod recommendation;
