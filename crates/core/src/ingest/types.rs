use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ChartResponse {
    pub chart: ChartEnvelope,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartEnvelope {
    #[serde(default)]
    pub result: Option<Vec<ChartResult>>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartResult {
    #[serde(default)]
    pub meta: Option<ChartMeta>,
    #[serde(default)]
    pub timestamp: Vec<i64>,
    pub indicators: ChartIndicators,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartMeta {
    #[serde(default)]
    pub gmtoffset: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartIndicators {
    #[serde(default)]
    pub quote: Vec<ChartQuote>,
    #[serde(default)]
    pub adjclose: Option<Vec<ChartAdjClose>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChartQuote {
    #[serde(default)]
    pub open: Vec<Option<f64>>,
    #[serde(default)]
    pub high: Vec<Option<f64>>,
    #[serde(default)]
    pub low: Vec<Option<f64>>,
    #[serde(default)]
    pub close: Vec<Option<f64>>,
    #[serde(default)]
    pub volume: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChartAdjClose {
    #[serde(default)]
    pub adjclose: Vec<Option<f64>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteSummaryResponse {
    pub quote_summary: QuoteSummaryEnvelope,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuoteSummaryEnvelope {
    #[serde(default)]
    pub result: Option<Vec<QuoteSummaryResult>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteSummaryResult {
    #[serde(default)]
    pub summary_detail: Option<SummaryDetail>,
    #[serde(default)]
    pub default_key_statistics: Option<KeyStatistics>,
    #[serde(default)]
    pub asset_profile: Option<AssetProfile>,
    #[serde(default)]
    pub price: Option<PriceModule>,
}

/// Yahoo wraps numbers as `{"raw": 1.0, "fmt": "1.00"}` and sends `{}` when absent.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct RawNumber {
    #[serde(default)]
    pub raw: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryDetail {
    #[serde(default, rename = "trailingPE")]
    pub trailing_pe: Option<RawNumber>,
    #[serde(default)]
    pub beta: Option<RawNumber>,
    #[serde(default)]
    pub market_cap: Option<RawNumber>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeyStatistics {
    #[serde(default)]
    pub beta: Option<RawNumber>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetProfile {
    #[serde(default)]
    pub sector: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceModule {
    #[serde(default)]
    pub short_name: Option<String>,
    #[serde(default)]
    pub long_name: Option<String>,
    #[serde(default)]
    pub market_cap: Option<RawNumber>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub news: Vec<SearchNewsItem>,
}

/// Older payloads carry `title` at the top level, newer ones under `content`.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchNewsItem {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<SearchNewsContent>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchNewsContent {
    #[serde(default)]
    pub title: Option<String>,
}

impl SearchNewsItem {
    pub fn into_title(self) -> Option<String> {
        self.title
            .or_else(|| self.content.and_then(|c| c.title))
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StooqRow {
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Open")]
    pub open: f64,
    #[serde(rename = "High")]
    pub high: f64,
    #[serde(rename = "Low")]
    pub low: f64,
    #[serde(rename = "Close")]
    pub close: f64,
    #[serde(rename = "Volume", default)]
    pub volume: Option<f64>,
}
