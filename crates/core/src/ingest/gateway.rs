use crate::cache::{cache_key, Clock, TtlCache};
use crate::config::Settings;
use crate::domain::market::{Period, PriceSeries, TickerInfo};
use crate::error::AnalyticsError;
use crate::ingest::news::{GoogleNewsRss, QuotePageScraper};
use crate::ingest::provider::{http_client, HeadlineSource, HistorySource, InfoSource};
use crate::ingest::stooq::StooqCsv;
use crate::ingest::yahoo::{ChartShape, YahooChart, YahooSearchNews, YahooSummary};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub rounds: u32,
    pub backoff_min: Duration,
    pub backoff_max: Duration,
}

impl RetryPolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            rounds: settings.history_retry_rounds.max(1),
            backoff_min: settings.history_backoff_min,
            backoff_max: settings.history_backoff_max,
        }
    }

    /// Uniform in `[backoff_min, backoff_max)`.
    pub fn backoff(&self) -> Duration {
        let min = self.backoff_min.as_millis() as u64;
        let max = self.backoff_max.as_millis() as u64;
        if max <= min {
            return self.backoff_min;
        }
        Duration::from_millis(rand::thread_rng().gen_range(min..max))
    }
}

/// Primary sources are tried in order for `rounds` passes with a randomized
/// sleep between passes; fallback sources are tried once afterwards.
pub struct HistoryChain {
    primary: Vec<Arc<dyn HistorySource>>,
    fallback: Vec<Arc<dyn HistorySource>>,
    retry: RetryPolicy,
}

impl HistoryChain {
    pub fn new(
        primary: Vec<Arc<dyn HistorySource>>,
        fallback: Vec<Arc<dyn HistorySource>>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            primary,
            fallback,
            retry,
        }
    }

    async fn try_source(
        source: &dyn HistorySource,
        symbol: &str,
        period: Period,
        attempt: u32,
    ) -> Result<PriceSeries, String> {
        match source.fetch_history(symbol, period).await {
            Ok(series) if !series.is_empty() => Ok(series),
            Ok(_) => {
                let detail = format!("{} returned an empty series", source.source_name());
                tracing::warn!(%symbol, attempt, stage = source.source_name(), "empty history");
                Err(detail)
            }
            Err(err) => {
                tracing::warn!(
                    %symbol,
                    attempt,
                    stage = source.source_name(),
                    error = %err,
                    "history fetch failed"
                );
                Err(format!("{}: {err:#}", source.source_name()))
            }
        }
    }

    pub async fn fetch(&self, symbol: &str, period: Period) -> Result<PriceSeries, AnalyticsError> {
        let mut last_error = String::from("no history sources configured");

        for round in 1..=self.retry.rounds {
            for source in &self.primary {
                match Self::try_source(source.as_ref(), symbol, period, round).await {
                    Ok(series) => return Ok(series),
                    Err(e) => last_error = e,
                }
            }
            if round < self.retry.rounds && !self.primary.is_empty() {
                let backoff = self.retry.backoff();
                tracing::debug!(%symbol, round, ?backoff, "backing off before next history round");
                tokio::time::sleep(backoff).await;
            }
        }

        for source in &self.fallback {
            match Self::try_source(source.as_ref(), symbol, period, 0).await {
                Ok(series) => {
                    tracing::info!(%symbol, stage = source.source_name(), "history served by fallback");
                    return Ok(series);
                }
                Err(e) => last_error = e,
            }
        }

        tracing::error!(%symbol, %period, error = %last_error, "history chain exhausted");
        Err(AnalyticsError::unavailable(symbol, last_error))
    }
}

pub struct HeadlineChain {
    stages: Vec<Arc<dyn HeadlineSource>>,
}

impl HeadlineChain {
    pub fn new(stages: Vec<Arc<dyn HeadlineSource>>) -> Self {
        Self { stages }
    }

    pub async fn fetch(&self, symbol: &str) -> Vec<String> {
        for stage in &self.stages {
            match stage.fetch_headlines(symbol).await {
                Ok(titles) if !titles.is_empty() => return titles,
                Ok(_) => {
                    tracing::debug!(%symbol, stage = stage.source_name(), "no headlines; trying next stage")
                }
                Err(err) => tracing::warn!(
                    %symbol,
                    stage = stage.source_name(),
                    error = %err,
                    "headline stage failed"
                ),
            }
        }
        Vec::new()
    }
}

pub struct MarketGateway {
    history: HistoryChain,
    info: Arc<dyn InfoSource>,
    headlines: HeadlineChain,
    history_cache: TtlCache<PriceSeries>,
    info_cache: TtlCache<TickerInfo>,
    headline_cache: TtlCache<Vec<String>>,
}

impl MarketGateway {
    pub fn new(
        history: HistoryChain,
        info: Arc<dyn InfoSource>,
        headlines: HeadlineChain,
        cache_ttl: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            history,
            info,
            headlines,
            history_cache: TtlCache::new(cache_ttl, clock.clone()),
            info_cache: TtlCache::unbounded(clock.clone()),
            headline_cache: TtlCache::new(cache_ttl, clock),
        }
    }

    pub fn from_settings(settings: &Settings, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        let http = http_client(settings.provider_timeout)?;
        let ep = &settings.endpoints;

        let history = HistoryChain::new(
            vec![
                Arc::new(YahooChart::new(http.clone(), ep, ChartShape::Range)),
                Arc::new(YahooChart::new(http.clone(), ep, ChartShape::Window)),
            ],
            vec![Arc::new(StooqCsv::new(http.clone(), ep))],
            RetryPolicy::from_settings(settings),
        );

        let headlines = HeadlineChain::new(vec![
            Arc::new(YahooSearchNews::new(http.clone(), ep)),
            Arc::new(GoogleNewsRss::new(http.clone(), ep)?),
            Arc::new(QuotePageScraper::new(http.clone(), ep)?),
        ]);

        Ok(Self::new(
            history,
            Arc::new(YahooSummary::new(http, ep)),
            headlines,
            settings.cache_ttl,
            clock,
        ))
    }

    pub async fn fetch_history(
        &self,
        symbol: &str,
        period: Period,
    ) -> Result<PriceSeries, AnalyticsError> {
        let key = cache_key(symbol, &period.to_string());
        self.history_cache
            .get_or_try_compute(&key, || self.history.fetch(symbol, period))
            .await
    }

    /// A failed lookup is cached as an all-missing record for the process
    /// lifetime, same as a successful one.
    pub async fn fetch_info(&self, symbol: &str) -> TickerInfo {
        let key = cache_key(symbol, "info");
        self.info_cache
            .get_or_compute(&key, || async {
                match self.info.fetch_info(symbol).await {
                    Ok(info) => info,
                    Err(err) => {
                        tracing::warn!(
                            %symbol,
                            stage = self.info.source_name(),
                            error = %err,
                            "ticker info unavailable; caching empty record"
                        );
                        TickerInfo::empty(symbol)
                    }
                }
            })
            .await
    }

    pub async fn fetch_headlines(&self, symbol: &str) -> Vec<String> {
        let key = cache_key(symbol, "headlines");
        if let Some(hit) = self.headline_cache.get(&key) {
            return hit;
        }
        let titles = self.headlines.fetch(symbol).await;
        if !titles.is_empty() {
            self.headline_cache.insert(key, titles.clone());
        }
        titles
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;
    use crate::domain::market::PriceBar;
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub fn linear_series(symbol: &str, n: usize, start: f64, step: f64) -> PriceSeries {
        let base = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let bars = (0..n)
            .map(|i| {
                let close = start + step * i as f64;
                PriceBar {
                    date: base + chrono::Duration::days(i as i64),
                    open: close,
                    high: close,
                    low: close,
                    close,
                    volume: 1_000.0 + i as f64,
                }
            })
            .collect();
        PriceSeries::new(symbol, bars)
    }

    #[derive(Default)]
    pub struct FakeHistory {
        pub name: &'static str,
        pub series: HashMap<String, PriceSeries>,
        pub calls: AtomicUsize,
        pub empty: bool,
    }

    #[async_trait::async_trait]
    impl HistorySource for FakeHistory {
        fn source_name(&self) -> &'static str {
            self.name
        }

        async fn fetch_history(&self, symbol: &str, _period: Period) -> anyhow::Result<PriceSeries> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.empty {
                return Ok(PriceSeries::new(symbol, Vec::new()));
            }
            self.series
                .get(symbol)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("{} has no data for {symbol}", self.name))
        }
    }

    #[derive(Default)]
    pub struct FakeInfo {
        pub infos: HashMap<String, TickerInfo>,
        pub calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl InfoSource for FakeInfo {
        fn source_name(&self) -> &'static str {
            "fake_info"
        }

        async fn fetch_info(&self, symbol: &str) -> anyhow::Result<TickerInfo> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.infos
                .get(symbol)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no info for {symbol}"))
        }
    }

    pub enum FakeHeadlines {
        Titles(Vec<String>),
        Fail,
    }

    #[async_trait::async_trait]
    impl HeadlineSource for FakeHeadlines {
        fn source_name(&self) -> &'static str {
            "fake_headlines"
        }

        async fn fetch_headlines(&self, _symbol: &str) -> anyhow::Result<Vec<String>> {
            match self {
                FakeHeadlines::Titles(t) => Ok(t.clone()),
                FakeHeadlines::Fail => anyhow::bail!("news provider down"),
            }
        }
    }

    pub fn no_backoff(rounds: u32) -> RetryPolicy {
        RetryPolicy {
            rounds,
            backoff_min: Duration::ZERO,
            backoff_max: Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fakes::*;
    use super::*;
    use crate::cache::ManualClock;
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;
    use std::sync::atomic::Ordering;

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 1, 27, 10, 0, 0).unwrap(),
        ))
    }

    fn failing(name: &'static str) -> Arc<FakeHistory> {
        Arc::new(FakeHistory {
            name,
            ..Default::default()
        })
    }

    fn serving(name: &'static str, symbol: &str) -> Arc<FakeHistory> {
        let mut series = HashMap::new();
        series.insert(symbol.to_string(), linear_series(symbol, 30, 100.0, 1.0));
        Arc::new(FakeHistory {
            name,
            series,
            ..Default::default()
        })
    }

    #[test]
    fn backoff_stays_in_window() {
        let policy = RetryPolicy {
            rounds: 2,
            backoff_min: Duration::from_millis(500),
            backoff_max: Duration::from_millis(1000),
        };
        for _ in 0..100 {
            let b = policy.backoff();
            assert!(b >= Duration::from_millis(500) && b < Duration::from_millis(1000));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_sleeps_between_rounds_only() {
        let window = |rounds| RetryPolicy {
            rounds,
            backoff_min: Duration::from_millis(500),
            backoff_max: Duration::from_millis(1000),
        };

        for (rounds, sleeps) in [(1u32, 0u32), (2, 1), (3, 2)] {
            let chain = HistoryChain::new(vec![failing("range")], vec![failing("stooq")], window(rounds));
            let started = tokio::time::Instant::now();
            let err = chain.fetch("AAPL", Period::days(60)).await.unwrap_err();
            let elapsed = started.elapsed();

            assert!(matches!(err, AnalyticsError::ProviderUnavailable { .. }));
            assert!(elapsed >= Duration::from_millis(500) * sleeps, "{rounds} rounds took {elapsed:?}");
            assert!(elapsed < Duration::from_millis(1000) * sleeps.max(1), "{rounds} rounds took {elapsed:?}");
            if sleeps == 0 {
                assert_eq!(elapsed, Duration::ZERO);
            }
        }
    }

    #[tokio::test]
    async fn primary_shapes_retry_then_fall_back() {
        let range = failing("range");
        let window = Arc::new(FakeHistory {
            name: "window",
            empty: true,
            ..Default::default()
        });
        let stooq = serving("stooq", "AAPL");

        let chain = HistoryChain::new(
            vec![range.clone(), window.clone()],
            vec![stooq.clone()],
            no_backoff(2),
        );
        let series = chain.fetch("AAPL", Period::days(60)).await.unwrap();

        assert_eq!(series.len(), 30);
        assert_eq!(range.calls.load(Ordering::SeqCst), 2);
        assert_eq!(window.calls.load(Ordering::SeqCst), 2);
        assert_eq!(stooq.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn primary_success_skips_everything_else() {
        let range = serving("range", "AAPL");
        let stooq = serving("stooq", "AAPL");
        let chain = HistoryChain::new(vec![range.clone()], vec![stooq.clone()], no_backoff(2));

        chain.fetch("AAPL", Period::days(60)).await.unwrap();
        assert_eq!(range.calls.load(Ordering::SeqCst), 1);
        assert_eq!(stooq.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn exhausted_chain_is_provider_unavailable() {
        let chain = HistoryChain::new(vec![failing("range")], vec![failing("stooq")], no_backoff(2));
        let err = chain.fetch("ZZZZ", Period::days(60)).await.unwrap_err();
        assert!(matches!(err, AnalyticsError::ProviderUnavailable { ref symbol, .. } if symbol == "ZZZZ"));
    }

    #[tokio::test]
    async fn headline_chain_degrades_stage_by_stage() {
        let chain = HeadlineChain::new(vec![
            Arc::new(FakeHeadlines::Fail),
            Arc::new(FakeHeadlines::Titles(vec![])),
            Arc::new(FakeHeadlines::Titles(vec!["Apple beats estimates".to_string()])),
        ]);
        assert_eq!(chain.fetch("AAPL").await, vec!["Apple beats estimates"]);

        let dead = HeadlineChain::new(vec![Arc::new(FakeHeadlines::Fail)]);
        assert!(dead.fetch("AAPL").await.is_empty());
    }

    fn gateway(history: Arc<FakeHistory>, info: Arc<FakeInfo>, clock: Arc<ManualClock>) -> MarketGateway {
        MarketGateway::new(
            HistoryChain::new(vec![history], vec![], no_backoff(1)),
            info,
            HeadlineChain::new(vec![Arc::new(FakeHeadlines::Titles(vec!["x".into()]))]),
            Duration::from_secs(900),
            clock,
        )
    }

    #[tokio::test]
    async fn history_is_cached_until_ttl() {
        let clock = clock();
        let history = serving("range", "AAPL");
        let gw = gateway(history.clone(), Arc::new(FakeInfo::default()), clock.clone());

        gw.fetch_history("AAPL", Period::days(60)).await.unwrap();
        gw.fetch_history("aapl", Period::days(60)).await.unwrap();
        assert_eq!(history.calls.load(Ordering::SeqCst), 1);

        gw.fetch_history("AAPL", Period::days(70)).await.unwrap();
        assert_eq!(history.calls.load(Ordering::SeqCst), 2);

        clock.advance(Duration::from_secs(901));
        gw.fetch_history("AAPL", Period::days(60)).await.unwrap();
        assert_eq!(history.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn failed_info_is_cached_as_empty_forever() {
        let clock = clock();
        let info = Arc::new(FakeInfo::default());
        let gw = gateway(failing("range"), info.clone(), clock.clone());

        assert_eq!(gw.fetch_info("ZZZZ").await, TickerInfo::empty("ZZZZ"));
        clock.advance(Duration::from_secs(86_400));
        assert_eq!(gw.fetch_info("ZZZZ").await, TickerInfo::empty("ZZZZ"));
        assert_eq!(info.calls.load(Ordering::SeqCst), 1);
    }
}
