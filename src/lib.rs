//! Stepcrawl: a long-running, fault-tolerant crawl worker
//!
//! This crate walks a numeric ID range (or an explicit URL list), fetches each
//! page, hands it to a caller-supplied extractor and republishes the resulting
//! record to a message queue. Failed targets are parked in tiered skip queues
//! and retried later; runs of empty results trigger an adaptive idle pause.

pub mod config;
pub mod crawler;
pub mod output;
pub mod shutdown;
pub mod state;

use thiserror::Error;

/// Main error type for Stepcrawl operations
///
/// Only a fatal signal can stop a crawl; everything else is resolved inside
/// the engine.
#[derive(Debug, Error)]
pub enum StepcrawlError {
    #[error("Fatal signal {signal} ({context})")]
    Fatal {
        signal: crawler::ErrorSignal,
        context: crawler::SignalContext,
    },
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Stepcrawl operations
pub type Result<T> = std::result::Result<T, StepcrawlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{CrawlEngine, Document, ErrorSignal, Extractor, RunReport, StopReason};
pub use output::{Publisher, Record};
pub use shutdown::ShutdownSignal;
