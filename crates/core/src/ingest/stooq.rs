use crate::config::Endpoints;
use crate::domain::market::{Period, PriceBar, PriceSeries};
use crate::ingest::provider::{get_text, join_url, HistorySource};
use crate::ingest::types::StooqRow;
use anyhow::Result;
use chrono::NaiveDate;

#[derive(Debug, Clone)]
pub struct StooqCsv {
    http: reqwest::Client,
    base_url: String,
}

impl StooqCsv {
    pub fn new(http: reqwest::Client, endpoints: &Endpoints) -> Self {
        Self {
            http,
            base_url: endpoints.stooq.clone(),
        }
    }
}

#[async_trait::async_trait]
impl HistorySource for StooqCsv {
    fn source_name(&self) -> &'static str {
        "stooq_csv"
    }

    async fn fetch_history(&self, symbol: &str, period: Period) -> Result<PriceSeries> {
        let url = join_url(&self.base_url, "/q/d/l/");
        let text = get_text(
            &self.http,
            &url,
            &[("s", symbol.to_lowercase()), ("i", "d".to_string())],
        )
        .await?;

        let series = parse_csv(symbol, &text)?.within_days(period.calendar_days());
        anyhow::ensure!(!series.is_empty(), "stooq returned no rows for {symbol}");
        Ok(series)
    }
}

/// Rows with an unparsable date or price are skipped; a body without the
/// expected header is an error.
pub fn parse_csv(symbol: &str, text: &str) -> Result<PriceSeries> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    anyhow::ensure!(
        headers.iter().any(|h| h == "Date") && headers.iter().any(|h| h == "Close"),
        "stooq response for {symbol} is not a price CSV"
    );

    let mut bars = Vec::new();
    for row in reader.deserialize::<StooqRow>() {
        let Ok(row) = row else {
            continue;
        };
        let Ok(date) = NaiveDate::parse_from_str(&row.date, "%Y-%m-%d") else {
            continue;
        };
        bars.push(PriceBar {
            date,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume.unwrap_or(0.0),
        });
    }

    Ok(PriceSeries::new(symbol, bars))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::provider::http_client;
    use std::time::Duration;

    const CSV: &str = "Date,Open,High,Low,Close,Volume\n\
                       2026-01-02,10,11,9,10.5,1000\n\
                       not-a-date,1,1,1,1,1\n\
                       2026-01-05,10.5,12,10,11.5,2000\n\
                       2026-02-20,11.5,13,11,12.5,3000\n";

    #[test]
    fn parses_rows_and_skips_bad_dates() {
        let s = parse_csv("AAPL", CSV).unwrap();
        assert_eq!(s.closes(), vec![10.5, 11.5, 12.5]);
        assert_eq!(s.volumes(), vec![1000.0, 2000.0, 3000.0]);
    }

    #[test]
    fn rejects_no_data_body() {
        assert!(parse_csv("ZZZZ", "No data").is_err());
    }

    #[tokio::test]
    async fn truncates_to_requested_window() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/q/d/l/")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::UrlEncoded("s".into(), "aapl.us".into()),
                mockito::Matcher::UrlEncoded("i".into(), "d".into()),
            ]))
            .with_status(200)
            .with_body(CSV)
            .create_async()
            .await;

        let endpoints = Endpoints {
            stooq: server.url(),
            ..Endpoints::default()
        };
        let http = http_client(Duration::from_secs(5)).unwrap();
        let series = StooqCsv::new(http, &endpoints)
            .fetch_history("AAPL.US", Period::days(30))
            .await
            .unwrap();

        assert_eq!(series.closes(), vec![12.5]);
        mock.assert_async().await;
    }
}
