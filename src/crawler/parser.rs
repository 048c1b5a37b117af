//! Parsed documents and the extraction hooks supplied by the caller
//!
//! An [`Extractor`] turns a parsed page into a [`Record`] or raises an
//! [`ErrorSignal`]. [`TitleExtractor`] is the built-in extractor used by the
//! command-line binary.

use crate::crawler::fetcher::Page;
use crate::crawler::signal::ErrorSignal;
use crate::output::Record;
use scraper::{Html, Selector};
use std::time::Duration;

/// A fetched page together with its parsed HTML tree
pub struct Document<'a> {
    page: &'a Page,
    html: Html,
}

impl<'a> Document<'a> {
    pub fn parse(page: &'a Page) -> Self {
        Self {
            page,
            html: Html::parse_document(&page.body),
        }
    }

    pub fn page(&self) -> &Page {
        self.page
    }

    /// Final URL of the page
    pub fn url(&self) -> &str {
        &self.page.url
    }

    pub fn html(&self) -> &Html {
        &self.html
    }

    /// Trimmed text of the first element matching `css` that has any text
    pub fn first_text(&self, css: &str) -> Result<Option<String>, ErrorSignal> {
        let selector = parse_selector(css)?;
        Ok(self
            .html
            .select(&selector)
            .map(|element| element.text().collect::<String>().trim().to_string())
            .find(|text| !text.is_empty()))
    }

    /// First non-empty value of `attr` on elements matching `css`
    pub fn first_attr(&self, css: &str, attr: &str) -> Result<Option<String>, ErrorSignal> {
        let selector = parse_selector(css)?;
        Ok(self
            .html
            .select(&selector)
            .filter_map(|element| element.value().attr(attr))
            .map(|value| value.trim().to_string())
            .find(|value| !value.is_empty()))
    }
}

fn parse_selector(css: &str) -> Result<Selector, ErrorSignal> {
    Selector::parse(css)
        .map_err(|e| anyhow::anyhow!("invalid selector '{}': {}", css, e).into())
}

/// Where the current attempt is
#[derive(Debug, Clone, Copy)]
pub struct AttemptContext<'a> {
    /// Numeric target, or the generator position for explicit URLs
    pub id: i64,
    /// Target as produced by the generator
    pub target: &'a str,
    /// URL that was fetched
    pub url: &'a str,
    pub calm: bool,
}

/// Site-specific record extraction
pub trait Extractor: Send + Sync {
    /// Short name used to derive the crawler name
    fn name(&self) -> &str;

    /// Builds a record from a parsed page
    fn extract(
        &self,
        document: &Document<'_>,
        context: &AttemptContext<'_>,
    ) -> Result<Record, ErrorSignal>;

    /// Augments or replaces an extracted record; must be side-effect free
    fn post_process(&self, record: Record) -> Record {
        record
    }
}

/// Extracts the page title and meta description
#[derive(Debug, Clone)]
pub struct TitleExtractor {
    sleep_for: Duration,
}

impl TitleExtractor {
    pub fn new(sleep_for: Duration) -> Self {
        Self { sleep_for }
    }
}

impl Default for TitleExtractor {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl Extractor for TitleExtractor {
    fn name(&self) -> &str {
        "title"
    }

    fn extract(
        &self,
        document: &Document<'_>,
        context: &AttemptContext<'_>,
    ) -> Result<Record, ErrorSignal> {
        let title = document.first_text("head > title")?;
        let description = document.first_attr("head > meta[name='description']", "content")?;

        if title.is_none() && description.is_none() {
            return Err(ErrorSignal::NoRecordProduced);
        }

        Ok(Record::new()
            .with("title", title)
            .with("description", description)
            .with("id", context.id)
            .with("url", context.url)
            .with("calm", context.calm)
            .sleep_for(self.sleep_for))
    }
}
