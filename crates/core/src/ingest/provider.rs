use crate::domain::market::{is_valid_symbol, Period, PriceSeries, TickerInfo};
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::time::Duration;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[async_trait::async_trait]
pub trait HistorySource: Send + Sync {
    fn source_name(&self) -> &'static str;

    async fn fetch_history(&self, symbol: &str, period: Period) -> Result<PriceSeries>;
}

#[async_trait::async_trait]
pub trait InfoSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    async fn fetch_info(&self, symbol: &str) -> Result<TickerInfo>;
}

/// One stage of the headline chain. An empty list means "try the next stage".
#[async_trait::async_trait]
pub trait HeadlineSource: Send + Sync {
    fn source_name(&self) -> &'static str;

    async fn fetch_headlines(&self, symbol: &str) -> Result<Vec<String>>;
}

pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .context("failed to build provider http client")
}

pub fn join_url(base_url: &str, path: &str) -> String {
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

pub fn symbol_url(base_url: &str, prefix: &str, symbol: &str) -> Result<String> {
    anyhow::ensure!(is_valid_symbol(symbol), "malformed symbol {symbol:?}");
    Ok(join_url(base_url, &format!("{}/{symbol}", prefix.trim_end_matches('/'))))
}

pub async fn get_text(
    http: &reqwest::Client,
    url: &str,
    query: &[(&str, String)],
) -> Result<String> {
    let res = http
        .get(url)
        .query(query)
        .send()
        .await
        .with_context(|| format!("request to {url} failed"))?;

    let status = res.status();
    let text = res
        .text()
        .await
        .with_context(|| format!("failed to read response from {url}"))?;

    if !status.is_success() {
        let snippet: String = text.chars().take(200).collect();
        anyhow::bail!("provider HTTP {status} from {url}: {snippet}");
    }
    Ok(text)
}

pub async fn get_json<T: DeserializeOwned>(
    http: &reqwest::Client,
    url: &str,
    query: &[(&str, String)],
) -> Result<T> {
    let text = get_text(http, url, query).await?;
    serde_json::from_str::<T>(&text)
        .with_context(|| format!("provider response from {url} is not the expected JSON"))
}
