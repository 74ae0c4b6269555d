use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalyticsError {
    #[error("provider unavailable for {symbol}: {detail}")]
    ProviderUnavailable { symbol: String, detail: String },

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("degenerate input: {0}")]
    DegenerateInput(String),

    #[error("not found: {0}")]
    NotFound(String),
}

impl AnalyticsError {
    pub fn unavailable(symbol: &str, detail: impl Into<String>) -> Self {
        Self::ProviderUnavailable {
            symbol: symbol.to_string(),
            detail: detail.into(),
        }
    }
}
