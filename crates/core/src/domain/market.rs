use anyhow::Context;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Daily history for one symbol, ordered by strictly increasing date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSeries {
    symbol: String,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    pub fn new(symbol: impl Into<String>, mut bars: Vec<PriceBar>) -> Self {
        bars.sort_by_key(|b| b.date);

        let mut out: Vec<PriceBar> = Vec::with_capacity(bars.len());
        for bar in bars {
            match out.last_mut() {
                Some(prev) if prev.date == bar.date => *prev = bar,
                _ => out.push(bar),
            }
        }

        Self {
            symbol: symbol.into(),
            bars: out,
        }
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.volume).collect()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().map(|b| b.close)
    }

    pub fn tail_closes(&self, n: usize) -> Vec<f64> {
        let start = self.bars.len().saturating_sub(n);
        self.bars[start..].iter().map(|b| b.close).collect()
    }

    pub fn within_days(self, days: i64) -> Self {
        let Some(last) = self.bars.last().map(|b| b.date) else {
            return self;
        };
        let cutoff = last - chrono::Duration::days(days);
        let bars = self.bars.into_iter().filter(|b| b.date > cutoff).collect();
        Self {
            symbol: self.symbol,
            bars,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Period {
    amount: u32,
    unit: PeriodUnit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum PeriodUnit {
    Day,
    Week,
    Month,
    Year,
}

impl Period {
    pub const fn days(amount: u32) -> Self {
        Self {
            amount,
            unit: PeriodUnit::Day,
        }
    }

    pub fn calendar_days(&self) -> i64 {
        let n = self.amount as i64;
        match self.unit {
            PeriodUnit::Day => n,
            PeriodUnit::Week => n * 7,
            PeriodUnit::Month => n * 31,
            PeriodUnit::Year => n * 366,
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = match self.unit {
            PeriodUnit::Day => "d",
            PeriodUnit::Week => "wk",
            PeriodUnit::Month => "mo",
            PeriodUnit::Year => "y",
        };
        write!(f, "{}{}", self.amount, suffix)
    }
}

impl FromStr for Period {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let s = s.trim().to_ascii_lowercase();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .with_context(|| format!("period {s:?} has no unit"))?;
        let (digits, unit) = s.split_at(split);
        let amount: u32 = digits
            .parse()
            .with_context(|| format!("period {s:?} has no amount"))?;
        anyhow::ensure!(amount > 0, "period must be positive (got {s:?})");

        let unit = match unit {
            "d" => PeriodUnit::Day,
            "wk" => PeriodUnit::Week,
            "mo" => PeriodUnit::Month,
            "y" => PeriodUnit::Year,
            other => anyhow::bail!("unsupported period unit {other:?}"),
        };
        Ok(Self { amount, unit })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TickerInfo {
    pub symbol: String,
    #[serde(rename = "trailingPE")]
    pub trailing_pe: Option<f64>,
    pub beta: Option<f64>,
    #[serde(rename = "marketCap")]
    pub market_cap: Option<f64>,
    pub sector: Option<String>,
    #[serde(rename = "shortName")]
    pub short_name: Option<String>,
    #[serde(rename = "longName")]
    pub long_name: Option<String>,
}

impl TickerInfo {
    pub fn empty(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub symbol: String,
    pub returns: Option<f64>,
    pub volatility: Option<f64>,
    pub volume_avg: Option<f64>,
}

impl Metrics {
    pub fn missing(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            returns: None,
            volatility: None,
            volume_avg: None,
        }
    }

    pub fn is_missing(&self) -> bool {
        self.returns.is_none() && self.volatility.is_none() && self.volume_avg.is_none()
    }
}

const MAX_SYMBOL_LEN: usize = 20;

/// Ticker charset accepted anywhere a symbol ends up in a provider URL:
/// ASCII alphanumerics plus `.`, `^`, `=` and `-`.
pub fn is_valid_symbol(symbol: &str) -> bool {
    !symbol.is_empty()
        && symbol.len() <= MAX_SYMBOL_LEN
        && symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '^' | '=' | '-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(d: u32, close: f64) -> PriceBar {
        PriceBar {
            date: NaiveDate::from_ymd_opt(2026, 3, d).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1_000.0,
        }
    }

    #[test]
    fn series_is_sorted_and_deduplicated() {
        let s = PriceSeries::new("AAPL", vec![bar(3, 3.0), bar(1, 1.0), bar(3, 4.0), bar(2, 2.0)]);
        assert_eq!(s.closes(), vec![1.0, 2.0, 4.0]);
        assert!(s.bars().windows(2).all(|w| w[0].date < w[1].date));
    }

    #[test]
    fn within_days_keeps_recent_rows() {
        let s = PriceSeries::new("AAPL", (1..=20).map(|d| bar(d, d as f64)).collect());
        let s = s.within_days(5);
        assert_eq!(s.closes(), vec![16.0, 17.0, 18.0, 19.0, 20.0]);
    }

    #[test]
    fn tail_closes_handles_short_series() {
        let s = PriceSeries::new("AAPL", vec![bar(1, 1.0), bar(2, 2.0)]);
        assert_eq!(s.tail_closes(60), vec![1.0, 2.0]);
        assert_eq!(s.tail_closes(1), vec![2.0]);
        assert_eq!(s.last_close(), Some(2.0));
    }

    #[test]
    fn parses_periods() {
        assert_eq!("60d".parse::<Period>().unwrap(), Period::days(60));
        assert_eq!("3mo".parse::<Period>().unwrap().calendar_days(), 93);
        assert_eq!("1y".parse::<Period>().unwrap().to_string(), "1y");
        assert!("d".parse::<Period>().is_err());
        assert!("0d".parse::<Period>().is_err());
        assert!("5h".parse::<Period>().is_err());
    }

    #[test]
    fn ticker_info_uses_provider_field_names() {
        let info = TickerInfo {
            trailing_pe: Some(12.5),
            ..TickerInfo::empty("MSFT")
        };
        let v = serde_json::to_value(&info).unwrap();
        assert_eq!(v["trailingPE"], 12.5);
        assert!(v["marketCap"].is_null());
    }

    #[test]
    fn symbol_charset() {
        for ok in ["AAPL", "BRK.B", "BRK-B", "^GSPC", "EURUSD=X", "7203.T"] {
            assert!(is_valid_symbol(ok), "{ok}");
        }
        for bad in ["", "AAPL?range=max", "A/B", "../x", "AA PL", "A#B", "TOOLONGSYMBOLNAME12345"] {
            assert!(!is_valid_symbol(bad), "{bad}");
        }
    }
}
