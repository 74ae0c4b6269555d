pub mod analytics;
pub mod cache;
pub mod domain;
pub mod error;
pub mod ingest;
pub mod pipeline;

pub mod config {
    use anyhow::Context;
    use std::str::FromStr;
    use std::time::Duration;

    pub const DEFAULT_CACHE_TTL_SECS: u64 = 15 * 60;
    pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 10;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub enum EngineKind {
        #[default]
        Library,
        Fallback,
    }

    impl FromStr for EngineKind {
        type Err = anyhow::Error;

        fn from_str(s: &str) -> anyhow::Result<Self> {
            match s.trim().to_ascii_lowercase().as_str() {
                "library" | "lib" => Ok(Self::Library),
                "fallback" | "builtin" => Ok(Self::Fallback),
                other => anyhow::bail!("unknown ANALYTICS_ENGINE {other:?} (expected library|fallback)"),
            }
        }
    }

    #[derive(Debug, Clone)]
    pub struct Endpoints {
        pub yahoo_chart: String,
        pub yahoo_summary: String,
        pub yahoo_search: String,
        pub yahoo_quote_page: String,
        pub google_news: String,
        pub stooq: String,
    }

    impl Default for Endpoints {
        fn default() -> Self {
            Self {
                yahoo_chart: "https://query1.finance.yahoo.com".to_string(),
                yahoo_summary: "https://query2.finance.yahoo.com".to_string(),
                yahoo_search: "https://query2.finance.yahoo.com".to_string(),
                yahoo_quote_page: "https://finance.yahoo.com".to_string(),
                google_news: "https://news.google.com".to_string(),
                stooq: "https://stooq.com".to_string(),
            }
        }
    }

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub engine: EngineKind,
        pub cache_ttl: Duration,
        pub provider_timeout: Duration,
        pub history_retry_rounds: u32,
        pub history_backoff_min: Duration,
        pub history_backoff_max: Duration,
        pub bulk_max_workers: usize,
        pub bulk_pacing: Duration,
        pub endpoints: Endpoints,
        pub sentry_dsn: Option<String>,
    }

    impl Default for Settings {
        fn default() -> Self {
            Self {
                engine: EngineKind::default(),
                cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
                provider_timeout: Duration::from_secs(DEFAULT_PROVIDER_TIMEOUT_SECS),
                history_retry_rounds: 2,
                history_backoff_min: Duration::from_millis(500),
                history_backoff_max: Duration::from_millis(1000),
                bulk_max_workers: 3,
                bulk_pacing: Duration::from_millis(300),
                endpoints: Endpoints::default(),
                sentry_dsn: None,
            }
        }
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let defaults = Self::default();

            let engine = match std::env::var("ANALYTICS_ENGINE") {
                Ok(s) if !s.trim().is_empty() => s.parse().context("invalid ANALYTICS_ENGINE")?,
                _ => defaults.engine,
            };

            let endpoints = Endpoints {
                yahoo_chart: env_string("YAHOO_CHART_BASE_URL", defaults.endpoints.yahoo_chart),
                yahoo_summary: env_string("YAHOO_SUMMARY_BASE_URL", defaults.endpoints.yahoo_summary),
                yahoo_search: env_string("YAHOO_SEARCH_BASE_URL", defaults.endpoints.yahoo_search),
                yahoo_quote_page: env_string(
                    "YAHOO_QUOTE_PAGE_BASE_URL",
                    defaults.endpoints.yahoo_quote_page,
                ),
                google_news: env_string("GOOGLE_NEWS_BASE_URL", defaults.endpoints.google_news),
                stooq: env_string("STOOQ_BASE_URL", defaults.endpoints.stooq),
            };

            Ok(Self {
                engine,
                cache_ttl: Duration::from_secs(env_parse("CACHE_TTL_SECS", DEFAULT_CACHE_TTL_SECS)),
                provider_timeout: Duration::from_secs(env_parse(
                    "PROVIDER_TIMEOUT_SECS",
                    DEFAULT_PROVIDER_TIMEOUT_SECS,
                )),
                history_retry_rounds: env_parse("HISTORY_RETRY_ROUNDS", defaults.history_retry_rounds),
                history_backoff_min: Duration::from_millis(env_parse("HISTORY_BACKOFF_MIN_MS", 500)),
                history_backoff_max: Duration::from_millis(env_parse("HISTORY_BACKOFF_MAX_MS", 1000)),
                bulk_max_workers: env_parse("BULK_MAX_WORKERS", defaults.bulk_max_workers).max(1),
                bulk_pacing: Duration::from_millis(env_parse("BULK_PACING_MS", 300)),
                endpoints,
                sentry_dsn: std::env::var("SENTRY_DSN").ok().filter(|s| !s.trim().is_empty()),
            })
        }
    }

    fn env_string(key: &str, default: String) -> String {
        std::env::var(key)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(default)
    }

    fn env_parse<T: FromStr>(key: &str, default: T) -> T {
        std::env::var(key)
            .ok()
            .and_then(|s| s.trim().parse::<T>().ok())
            .unwrap_or(default)
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn parses_engine_kind() {
            assert_eq!("library".parse::<EngineKind>().unwrap(), EngineKind::Library);
            assert_eq!(" Fallback ".parse::<EngineKind>().unwrap(), EngineKind::Fallback);
            assert!("sklearn".parse::<EngineKind>().is_err());
        }

        #[test]
        fn defaults_match_reference_policy() {
            let s = Settings::default();
            assert_eq!(s.cache_ttl, Duration::from_secs(900));
            assert_eq!(s.bulk_max_workers, 3);
            assert_eq!(s.history_retry_rounds, 2);
            assert_eq!(s.bulk_pacing, Duration::from_millis(300));
        }
    }
}
