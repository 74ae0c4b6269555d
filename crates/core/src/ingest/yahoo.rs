use crate::config::Endpoints;
use crate::domain::market::{Period, PriceBar, PriceSeries, TickerInfo};
use crate::ingest::provider::{get_json, join_url, symbol_url, HeadlineSource, HistorySource, InfoSource};
use crate::ingest::types::{ChartResponse, ChartResult, QuoteSummaryResponse, SearchResponse};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

const SUMMARY_MODULES: &str = "summaryDetail,defaultKeyStatistics,assetProfile,price";
const SEARCH_NEWS_COUNT: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartShape {
    /// `range=60d`
    Range,
    /// `period1=<epoch>&period2=<epoch>`
    Window,
}

#[derive(Debug, Clone)]
pub struct YahooChart {
    http: reqwest::Client,
    base_url: String,
    shape: ChartShape,
}

impl YahooChart {
    pub fn new(http: reqwest::Client, endpoints: &Endpoints, shape: ChartShape) -> Self {
        Self {
            http,
            base_url: endpoints.yahoo_chart.clone(),
            shape,
        }
    }

    fn query(&self, period: Period, now: DateTime<Utc>) -> Vec<(&'static str, String)> {
        let mut q = vec![("interval", "1d".to_string())];
        match self.shape {
            ChartShape::Range => q.push(("range", period.to_string())),
            ChartShape::Window => {
                let start = now - chrono::Duration::days(period.calendar_days());
                q.push(("period1", start.timestamp().to_string()));
                q.push(("period2", now.timestamp().to_string()));
                q.push(("events", "history".to_string()));
            }
        }
        q
    }
}

#[async_trait::async_trait]
impl HistorySource for YahooChart {
    fn source_name(&self) -> &'static str {
        match self.shape {
            ChartShape::Range => "yahoo_chart_range",
            ChartShape::Window => "yahoo_chart_window",
        }
    }

    async fn fetch_history(&self, symbol: &str, period: Period) -> Result<PriceSeries> {
        let url = symbol_url(&self.base_url, "/v8/finance/chart", symbol)?;
        let parsed: ChartResponse = get_json(&self.http, &url, &self.query(period, Utc::now())).await?;

        if let Some(err) = parsed.chart.error.filter(|e| !e.is_null()) {
            anyhow::bail!("chart API error for {symbol}: {err}");
        }
        let result = parsed
            .chart
            .result
            .and_then(|r| r.into_iter().next())
            .with_context(|| format!("chart API returned no result for {symbol}"))?;

        let series = chart_to_series(symbol, result);
        anyhow::ensure!(!series.is_empty(), "chart API returned no rows for {symbol}");
        Ok(series)
    }
}

/// Converts the columnar chart payload to rows. Prices are scaled by
/// `adjclose / close` when adjusted closes are present; rows without a
/// close are dropped.
pub fn chart_to_series(symbol: &str, result: ChartResult) -> PriceSeries {
    let offset = result.meta.and_then(|m| m.gmtoffset).unwrap_or(0);
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let adjclose = result
        .indicators
        .adjclose
        .and_then(|a| a.into_iter().next())
        .map(|a| a.adjclose)
        .unwrap_or_default();

    let col = |v: &Vec<Option<f64>>, i: usize| v.get(i).copied().flatten();

    let mut bars = Vec::with_capacity(result.timestamp.len());
    for (i, ts) in result.timestamp.iter().enumerate() {
        let Some(close) = col(&quote.close, i).filter(|c| c.is_finite()) else {
            continue;
        };
        let Some(date) = DateTime::from_timestamp(ts + offset, 0).map(|d| d.date_naive()) else {
            continue;
        };

        let ratio = match col(&adjclose, i) {
            Some(adj) if close != 0.0 && adj.is_finite() => adj / close,
            _ => 1.0,
        };

        bars.push(PriceBar {
            date,
            open: col(&quote.open, i).unwrap_or(close) * ratio,
            high: col(&quote.high, i).unwrap_or(close) * ratio,
            low: col(&quote.low, i).unwrap_or(close) * ratio,
            close: close * ratio,
            volume: col(&quote.volume, i).unwrap_or(0.0),
        });
    }

    PriceSeries::new(symbol, bars)
}

#[derive(Debug, Clone)]
pub struct YahooSummary {
    http: reqwest::Client,
    base_url: String,
}

impl YahooSummary {
    pub fn new(http: reqwest::Client, endpoints: &Endpoints) -> Self {
        Self {
            http,
            base_url: endpoints.yahoo_summary.clone(),
        }
    }
}

#[async_trait::async_trait]
impl InfoSource for YahooSummary {
    fn source_name(&self) -> &'static str {
        "yahoo_quote_summary"
    }

    async fn fetch_info(&self, symbol: &str) -> Result<TickerInfo> {
        let url = symbol_url(&self.base_url, "/v10/finance/quoteSummary", symbol)?;
        let parsed: QuoteSummaryResponse =
            get_json(&self.http, &url, &[("modules", SUMMARY_MODULES.to_string())]).await?;

        let r = parsed
            .quote_summary
            .result
            .and_then(|r| r.into_iter().next())
            .with_context(|| format!("quoteSummary returned no result for {symbol}"))?;

        let detail = r.summary_detail.unwrap_or_default();
        let stats = r.default_key_statistics.unwrap_or_default();
        let price = r.price.unwrap_or_default();

        Ok(TickerInfo {
            symbol: symbol.to_string(),
            trailing_pe: detail.trailing_pe.and_then(|n| n.raw),
            beta: detail.beta.and_then(|n| n.raw).or(stats.beta.and_then(|n| n.raw)),
            market_cap: detail
                .market_cap
                .and_then(|n| n.raw)
                .or(price.market_cap.and_then(|n| n.raw)),
            sector: r.asset_profile.and_then(|p| p.sector),
            short_name: price.short_name,
            long_name: price.long_name,
        })
    }
}

#[derive(Debug, Clone)]
pub struct YahooSearchNews {
    http: reqwest::Client,
    base_url: String,
}

impl YahooSearchNews {
    pub fn new(http: reqwest::Client, endpoints: &Endpoints) -> Self {
        Self {
            http,
            base_url: endpoints.yahoo_search.clone(),
        }
    }
}

#[async_trait::async_trait]
impl HeadlineSource for YahooSearchNews {
    fn source_name(&self) -> &'static str {
        "yahoo_search_news"
    }

    async fn fetch_headlines(&self, symbol: &str) -> Result<Vec<String>> {
        let url = join_url(&self.base_url, "/v1/finance/search");
        let parsed: SearchResponse = get_json(
            &self.http,
            &url,
            &[
                ("q", symbol.to_string()),
                ("newsCount", SEARCH_NEWS_COUNT.to_string()),
                ("quotesCount", "0".to_string()),
            ],
        )
        .await?;

        Ok(parsed.news.into_iter().filter_map(|n| n.into_title()).collect())
    }
}
