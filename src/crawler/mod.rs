//! Crawler module for fetching pages and turning them into records
//!
//! This module contains the core crawling logic, including:
//! - Target generation (ID stepping or explicit URLs)
//! - HTTP fetching and response classification
//! - HTML parsing and the extractor hook
//! - Error dispatch and the crawl engine itself

mod dispatch;
mod engine;
mod fetcher;
mod generator;
mod parser;
mod signal;

pub use dispatch::{
    handler_for, Handler, Remedy, Severity, CONNECTION_PAUSE, OFFLINE_PAUSE, SERVER_ERROR_PAUSE,
};
pub use engine::{CrawlEngine, RunReport, StopReason};
pub use fetcher::{build_http_client, HttpFetcher, Page, PageSource};
pub use generator::UrlGenerator;
pub use parser::{AttemptContext, Document, Extractor, TitleExtractor};
pub use signal::{ErrorSignal, SignalContext, ENCODING_MISMATCH};
