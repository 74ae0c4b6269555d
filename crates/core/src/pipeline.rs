use crate::analytics::clustering::cluster;
use crate::analytics::forecast::forecast_next;
use crate::analytics::metrics::{metrics_from_series, METRICS_PERIOD};
use crate::analytics::recommend::{synthesize, Signals};
use crate::analytics::sentiment::{classify_reason, sentiment_score};
use crate::analytics::similarity::find_similar;
use crate::analytics::Engines;
use crate::cache::{cache_key, Clock, SystemClock, TtlCache};
use crate::config::Settings;
use crate::domain::market::{Metrics, Period, TickerInfo};
use crate::domain::recommendation::{ClusterAssignment, Recommendation, SimilarityResult};
use crate::ingest::gateway::MarketGateway;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

pub const QUOTE_PERIOD: Period = Period::days(70);
pub const FORECAST_WINDOW: usize = 60;

#[derive(Debug, Clone, Serialize)]
pub struct QuotePayload {
    pub symbol: String,
    #[serde(rename = "lastClose")]
    pub last_close: Option<f64>,
    pub metrics: Metrics,
    pub info: TickerInfo,
    pub headlines: Vec<String>,
    pub sentiment: Option<f64>,
    pub forecast: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewsSignal {
    pub headlines: Vec<String>,
    pub sentiment: Option<f64>,
    pub reason: String,
}

pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

#[derive(Clone)]
pub struct Pipeline {
    gateway: Arc<MarketGateway>,
    engines: Engines,
    news_cache: Arc<TtlCache<NewsSignal>>,
    bulk_max_workers: usize,
    bulk_pacing: Duration,
}

impl Pipeline {
    pub fn new(
        gateway: MarketGateway,
        engines: Engines,
        settings: &Settings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            gateway: Arc::new(gateway),
            engines,
            news_cache: Arc::new(TtlCache::new(settings.cache_ttl, clock)),
            bulk_max_workers: settings.bulk_max_workers.max(1),
            bulk_pacing: settings.bulk_pacing,
        }
    }

    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let gateway = MarketGateway::from_settings(settings, clock.clone())?;
        let engines = Engines::for_kind(settings.engine);
        tracing::info!(?engines, "pipeline ready");
        Ok(Self::new(gateway, engines, settings, clock))
    }

    pub async fn news(&self, symbol: &str) -> NewsSignal {
        let symbol = normalize_symbol(symbol);
        let key = cache_key(&symbol, "news");
        if let Some(hit) = self.news_cache.get(&key) {
            return hit;
        }

        let headlines = self.gateway.fetch_headlines(&symbol).await;
        let signal = NewsSignal {
            sentiment: sentiment_score(&headlines, self.engines.sentiment.as_ref()),
            reason: classify_reason(&headlines).to_string(),
            headlines,
        };
        if !signal.headlines.is_empty() {
            self.news_cache.insert(key, signal.clone());
        }
        signal
    }

    pub async fn sentiment(&self, symbol: &str) -> Option<f64> {
        self.news(symbol).await.sentiment
    }

    pub async fn compute_metrics(&self, symbol: &str) -> Metrics {
        let symbol = normalize_symbol(symbol);
        match self.gateway.fetch_history(&symbol, METRICS_PERIOD).await {
            Ok(series) => metrics_from_series(&symbol, &series),
            Err(err) => {
                tracing::warn!(%symbol, error = %err, "metrics unavailable");
                Metrics::missing(&symbol)
            }
        }
    }

    /// One `Metrics` per input symbol, in input order, with at most
    /// `bulk_max_workers` fetches in flight.
    pub async fn compute_metrics_bulk(&self, symbols: &[String]) -> Vec<Metrics> {
        let total = symbols.len();
        let semaphore = Arc::new(Semaphore::new(self.bulk_max_workers));
        let mut tasks = JoinSet::new();

        for (idx, symbol) in symbols.iter().cloned().enumerate() {
            let pipeline = self.clone();
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let metrics = match semaphore.acquire_owned().await {
                    Ok(_permit) => pipeline.compute_metrics(&symbol).await,
                    Err(_) => Metrics::missing(&normalize_symbol(&symbol)),
                };
                (idx, metrics)
            });
        }

        let mut slots: Vec<Option<Metrics>> = vec![None; total];
        let mut done = 0usize;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, metrics)) => slots[idx] = Some(metrics),
                Err(err) => tracing::error!(error = %err, "bulk metrics task failed"),
            }
            done += 1;
            tracing::info!(done, total, "bulk metrics progress");
            // pacing
            if !self.bulk_pacing.is_zero() {
                tokio::time::sleep(self.bulk_pacing).await;
            }
        }

        slots
            .into_iter()
            .zip(symbols)
            .map(|(slot, symbol)| slot.unwrap_or_else(|| Metrics::missing(&normalize_symbol(symbol))))
            .collect()
    }

    pub async fn analyze_market(&self, symbols: &[String], k: usize) -> Vec<ClusterAssignment> {
        let metrics = self.compute_metrics_bulk(symbols).await;
        let assignments = cluster(&metrics, k, self.engines.clusterer.as_ref());
        tracing::info!(
            requested = symbols.len(),
            clustered = assignments.len(),
            clusterer = self.engines.clusterer.name(),
            "market analysis complete"
        );
        assignments
    }

    async fn price_outlook(&self, symbol: &str) -> (Option<f64>, Option<f64>) {
        match self.gateway.fetch_history(symbol, QUOTE_PERIOD).await {
            Ok(series) => {
                let closes = series.tail_closes(FORECAST_WINDOW);
                (
                    series.last_close(),
                    forecast_next(&closes, self.engines.regressor.as_ref()),
                )
            }
            Err(err) => {
                tracing::warn!(%symbol, error = %err, "no price history for outlook");
                (None, None)
            }
        }
    }

    /// Sequential fetches; only the bulk metrics path runs concurrently.
    async fn gather(
        &self,
        symbol: &str,
    ) -> (TickerInfo, Option<f64>, Option<f64>, Metrics, NewsSignal) {
        let info = self.gateway.fetch_info(symbol).await;
        let (last_close, forecast) = self.price_outlook(symbol).await;
        let metrics = self.compute_metrics(symbol).await;
        let news = self.news(symbol).await;
        (info, last_close, forecast, metrics, news)
    }

    pub async fn quote(&self, symbol: &str) -> QuotePayload {
        let symbol = normalize_symbol(symbol);
        let (info, last_close, forecast, metrics, news) = self.gather(&symbol).await;
        QuotePayload {
            symbol,
            last_close,
            metrics,
            info,
            headlines: news.headlines,
            sentiment: news.sentiment,
            forecast,
        }
    }

    pub async fn recommend(&self, symbol: &str) -> Recommendation {
        let symbol = normalize_symbol(symbol);
        let (info, last_close, forecast, metrics, news) = self.gather(&symbol).await;
        synthesize(Signals {
            symbol,
            info,
            last_close,
            forecast,
            metrics,
            sentiment: news.sentiment,
            external_reason: news.reason,
        })
    }

    pub async fn recommend_many(&self, symbols: &[String]) -> Vec<Recommendation> {
        let mut out = Vec::with_capacity(symbols.len());
        for symbol in symbols {
            out.push(self.recommend(symbol).await);
        }
        out
    }

    pub async fn similar(&self, target: &str, pool: &[String], k: usize) -> Vec<SimilarityResult> {
        let target = normalize_symbol(target);
        let mut symbols: Vec<String> = Vec::with_capacity(pool.len() + 1);
        for symbol in pool.iter().map(|s| normalize_symbol(s)) {
            if !symbol.is_empty() && !symbols.contains(&symbol) {
                symbols.push(symbol);
            }
        }
        if !symbols.contains(&target) {
            symbols.push(target.clone());
        }

        let recos = self.recommend_many(&symbols).await;
        find_similar(&target, &recos, k)
    }
}
