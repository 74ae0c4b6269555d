use vader_sentiment::SentimentIntensityAnalyzer;

const POSITIVE_WORDS: &[&str] = &[
    // es
    "sube", "ganancia", "positivo", "alcista", "crece", "mejora", "supera",
    // en
    "up", "gain", "positive", "bullish", "growth", "improve", "beat", "rise", "high",
];

const NEGATIVE_WORDS: &[&str] = &[
    // es
    "cae", "pérdida", "negativo", "bajista", "disminuye", "empeora", "falla",
    // en
    "down", "loss", "negative", "bearish", "drop", "worse", "miss", "fall", "low",
];

pub const NO_NEWS_REASON: &str = "No relevant recent news";
pub const MIXED_NARRATIVE_REASON: &str = "Mixed market narrative; monitor volatility";

/// Topic checks in priority order; the first topic with any hit wins.
const REASON_TOPICS: &[(&[&str], &str)] = &[
    (
        &[
            "ai", "inteligencia artificial", "machine learning", "gpt", "generative", "chip",
            "nvidia",
        ],
        "Momentum from AI and technology initiatives",
    ),
    (
        &[
            "producto", "nuevo", "presenta", "lanza", "product", "new", "launch", "release",
            "unveil", "iphone", "mac",
        ],
        "New products/services are building expectations",
    ),
    (
        &["acuerdo", "alianza", "partnership", "deal", "merge", "acquisition", "compra"],
        "Corporate moves and strategic partnerships",
    ),
    (
        &[
            "resultado", "ingreso", "beneficio", "ganancias", "earnings", "revenue", "profit",
            "report", "quarter",
        ],
        "Key financial results in focus",
    ),
    (
        &["regulación", "multas", "investigación", "lawsuit", "ban", "fine", "antitrust"],
        "Regulatory or legal risks present",
    ),
    (
        &["fed", "rate", "tasa", "inflación", "inflation", "market", "mercado"],
        "Macroeconomic factors are influencing the price",
    ),
];

/// Keyword length up to which a whole-token match is required; longer
/// keywords also match as token prefixes (`gain` matches `gains`).
const EXACT_MATCH_MAX_CHARS: usize = 3;

#[derive(Debug, Clone)]
pub struct Tokens {
    words: Vec<String>,
    joined: String,
}

impl Tokens {
    pub fn new(text: &str) -> Self {
        let lower = text.to_lowercase();
        let words: Vec<String> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_string)
            .collect();
        let joined = format!(" {} ", words.join(" "));
        Self { words, joined }
    }

    pub fn contains(&self, keyword: &str) -> bool {
        if keyword.contains(' ') {
            return self.joined.contains(&format!(" {keyword} "));
        }
        if keyword.chars().count() <= EXACT_MATCH_MAX_CHARS {
            self.words.iter().any(|w| w == keyword)
        } else {
            self.words.iter().any(|w| w.starts_with(keyword))
        }
    }

    fn count_hits(&self, keywords: &[&str]) -> usize {
        keywords.iter().filter(|k| self.contains(k)).count()
    }
}

pub trait SentimentScorer: Send + Sync {
    fn name(&self) -> &'static str;

    fn score_text(&self, text: &str) -> f64;
}

pub struct VaderScorer {
    analyzer: SentimentIntensityAnalyzer<'static>,
}

impl VaderScorer {
    pub fn new() -> Self {
        Self {
            analyzer: SentimentIntensityAnalyzer::new(),
        }
    }
}

impl Default for VaderScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl SentimentScorer for VaderScorer {
    fn name(&self) -> &'static str {
        "vader"
    }

    fn score_text(&self, text: &str) -> f64 {
        if text.trim().is_empty() {
            return 0.0;
        }
        let scores = self.analyzer.polarity_scores(text);
        scores.get("compound").copied().unwrap_or(0.0)
    }
}

/// Bilingual word counting: `(pos - neg) / max(pos + neg, 1)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LexiconScorer;

impl SentimentScorer for LexiconScorer {
    fn name(&self) -> &'static str {
        "lexicon"
    }

    fn score_text(&self, text: &str) -> f64 {
        let tokens = Tokens::new(text);
        let pos = tokens.count_hits(POSITIVE_WORDS) as f64;
        let neg = tokens.count_hits(NEGATIVE_WORDS) as f64;
        (pos - neg) / (pos + neg).max(1.0)
    }
}

pub fn sentiment_score(headlines: &[String], scorer: &dyn SentimentScorer) -> Option<f64> {
    if headlines.is_empty() {
        return None;
    }
    let total: f64 = headlines.iter().map(|h| scorer.score_text(h)).sum();
    Some(total / headlines.len() as f64).filter(|s| s.is_finite())
}

pub fn classify_reason(headlines: &[String]) -> &'static str {
    if headlines.is_empty() {
        return NO_NEWS_REASON;
    }
    let tokens = Tokens::new(&headlines.join(" "));
    REASON_TOPICS
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| tokens.contains(k)))
        .map(|(_, reason)| *reason)
        .unwrap_or(MIXED_NARRATIVE_REASON)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn scorers() -> Vec<Box<dyn SentimentScorer>> {
        vec![Box::new(VaderScorer::new()), Box::new(LexiconScorer)]
    }

    #[test]
    fn empty_headlines_have_no_score() {
        for s in scorers() {
            assert_eq!(sentiment_score(&[], s.as_ref()), None);
        }
    }

    #[test]
    fn bullish_and_bearish_text() {
        for s in scorers() {
            let bull = sentiment_score(&h(&["stocks up, strong gains"]), s.as_ref());
            let bear = sentiment_score(&h(&["shares fall, big loss"]), s.as_ref());
            assert!(bull.unwrap() > 0.0, "{} bull {bull:?}", s.name());
            assert!(bear.unwrap() < 0.0, "{} bear {bear:?}", s.name());
        }
    }

    #[test]
    fn lexicon_scores_are_bounded_ratios() {
        assert_eq!(LexiconScorer.score_text("stocks up, strong gains"), 1.0);
        assert_eq!(LexiconScorer.score_text("shares fall, big loss"), -1.0);
        assert_eq!(LexiconScorer.score_text("gains offset by a loss"), 0.0);
        assert_eq!(LexiconScorer.score_text("nothing to see"), 0.0);
        assert_eq!(LexiconScorer.score_text("La acción sube tras la mejora"), 1.0);
        assert_eq!(LexiconScorer.score_text("Pérdidas: el título cae"), -1.0);
    }

    #[test]
    fn lexicon_ignores_words_inside_other_words() {
        // "supply" must not count as "up", "allow" not as "low".
        assert_eq!(LexiconScorer.score_text("supply chains allow shipments"), 0.0);
    }

    #[test]
    fn score_is_the_mean_over_headlines() {
        let s = sentiment_score(&h(&["gain", "loss", "gain"]), &LexiconScorer).unwrap();
        assert!((s - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn reason_uses_priority_order() {
        assert_eq!(classify_reason(&[]), NO_NEWS_REASON);
        // AI outranks earnings even when earnings comes first in the text.
        assert_eq!(
            classify_reason(&h(&["Quarterly earnings top estimates", "Nvidia expands AI push"])),
            "Momentum from AI and technology initiatives"
        );
        assert_eq!(
            classify_reason(&h(&["Company unveils redesigned laptop"])),
            "New products/services are building expectations"
        );
        assert_eq!(
            classify_reason(&h(&["Boeing in acquisition talks"])),
            "Corporate moves and strategic partnerships"
        );
        assert_eq!(
            classify_reason(&h(&["Revenue climbs 8%"])),
            "Key financial results in focus"
        );
        assert_eq!(
            classify_reason(&h(&["EU opens antitrust probe"])),
            "Regulatory or legal risks present"
        );
        assert_eq!(
            classify_reason(&h(&["Fed signals patience on rates"])),
            "Macroeconomic factors are influencing the price"
        );
        assert_eq!(classify_reason(&h(&["CEO speaks at conference"])), MIXED_NARRATIVE_REASON);
    }

    #[test]
    fn short_keywords_need_whole_words() {
        // "said" and "again" contain "ai" but are not about AI.
        assert_eq!(
            classify_reason(&h(&["Analyst said shares could climb again"])),
            MIXED_NARRATIVE_REASON
        );
        assert_eq!(
            classify_reason(&h(&["La inteligencia artificial impulsa al sector"])),
            "Momentum from AI and technology initiatives"
        );
    }
}
