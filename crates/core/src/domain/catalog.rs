const CATEGORIES: &[(&str, &[&str])] = &[
    ("Technology", &["AAPL", "MSFT", "NVDA", "META", "GOOG"]),
    ("Communication Services", &["GOOGL", "NFLX", "DIS", "TTWO", "T"]),
    ("Consumer Discretionary", &["AMZN", "TSLA", "NKE", "HD", "SBUX"]),
    ("Financials", &["JPM", "BAC", "V", "MA", "GS"]),
    ("Health Care", &["UNH", "JNJ", "PFE", "MRK", "ABBV"]),
    ("Energy", &["XOM", "CVX", "COP", "SLB", "EOG"]),
];

pub fn categories() -> impl Iterator<Item = &'static str> {
    CATEGORIES.iter().map(|(name, _)| *name)
}

pub fn symbols_for(category: &str, n: usize) -> Vec<String> {
    CATEGORIES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(category.trim()))
        .map(|(_, symbols)| symbols.iter().take(n).map(|s| s.to_string()).collect())
        .unwrap_or_default()
}
