use crate::config::Endpoints;
use crate::ingest::provider::{get_text, join_url, symbol_url, HeadlineSource};
use anyhow::{Context, Result};
use regex::Regex;

const MIN_SCRAPED_TITLE_CHARS: usize = 11;

#[derive(Debug, Clone)]
pub struct TextCleaner {
    tags: Regex,
}

impl TextCleaner {
    pub fn new() -> Result<Self> {
        Ok(Self {
            tags: Regex::new(r"<[^<]+?>").context("invalid tag regex")?,
        })
    }

    pub fn clean(&self, raw: &str) -> String {
        let raw = raw
            .trim()
            .trim_start_matches("<![CDATA[")
            .trim_end_matches("]]>");
        let stripped = self.tags.replace_all(raw, "");
        decode_entities(&stripped).trim().to_string()
    }
}

fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

#[derive(Debug, Clone)]
pub struct GoogleNewsRss {
    http: reqwest::Client,
    base_url: String,
    item_title: Regex,
    cleaner: TextCleaner,
}

impl GoogleNewsRss {
    pub fn new(http: reqwest::Client, endpoints: &Endpoints) -> Result<Self> {
        Ok(Self {
            http,
            base_url: endpoints.google_news.clone(),
            item_title: Regex::new(r"(?is)<item\b.*?<title>(.*?)</title>")
                .context("invalid rss title regex")?,
            cleaner: TextCleaner::new()?,
        })
    }

    pub fn extract_titles(&self, xml: &str) -> Vec<String> {
        self.item_title
            .captures_iter(xml)
            .filter_map(|c| c.get(1))
            .map(|m| self.cleaner.clean(m.as_str()))
            .filter(|t| !t.is_empty())
            .collect()
    }
}

#[async_trait::async_trait]
impl HeadlineSource for GoogleNewsRss {
    fn source_name(&self) -> &'static str {
        "google_news_rss"
    }

    async fn fetch_headlines(&self, symbol: &str) -> Result<Vec<String>> {
        let url = join_url(&self.base_url, "/rss/search");
        let xml = get_text(
            &self.http,
            &url,
            &[
                ("q", format!("{symbol} stock")),
                ("hl", "en-US".to_string()),
                ("gl", "US".to_string()),
                ("ceid", "US:en".to_string()),
            ],
        )
        .await?;
        Ok(self.extract_titles(&xml))
    }
}

#[derive(Debug, Clone)]
pub struct QuotePageScraper {
    http: reqwest::Client,
    base_url: String,
    heading: Regex,
    cleaner: TextCleaner,
}

impl QuotePageScraper {
    pub fn new(http: reqwest::Client, endpoints: &Endpoints) -> Result<Self> {
        Ok(Self {
            http,
            base_url: endpoints.yahoo_quote_page.clone(),
            heading: Regex::new(r"(?is)<h3[^>]*>(.*?)</h3>").context("invalid heading regex")?,
            cleaner: TextCleaner::new()?,
        })
    }

    /// Headings of 10 characters or fewer are navigation noise, not news.
    pub fn extract_titles(&self, html: &str) -> Vec<String> {
        self.heading
            .captures_iter(html)
            .filter_map(|c| c.get(1))
            .map(|m| self.cleaner.clean(m.as_str()))
            .filter(|t| t.chars().count() >= MIN_SCRAPED_TITLE_CHARS)
            .collect()
    }
}

#[async_trait::async_trait]
impl HeadlineSource for QuotePageScraper {
    fn source_name(&self) -> &'static str {
        "yahoo_quote_page"
    }

    async fn fetch_headlines(&self, symbol: &str) -> Result<Vec<String>> {
        let url = symbol_url(&self.base_url, "/quote", symbol)?;
        let html = get_text(&self.http, &url, &[]).await?;
        Ok(self.extract_titles(&html))
    }
}
