//! Classified failure signals raised during a crawl attempt
//!
//! Signals are raised by the fetcher or by the caller's extractor and are
//! always resolved by the dispatcher; they never leave the crawl attempt.

use std::fmt;

/// Message prefix marking a benign encoding-declaration mismatch
///
/// A `ValueError` starting with this text is retried instead of being
/// treated as unexpected.
pub const ENCODING_MISMATCH: &str = "encoding declaration mismatch";

/// The closed set of failure outcomes a crawl attempt can produce
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorSignal {
    /// The host could not be reached at all
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The site answered in a way that means it is offline for a while
    #[error("site offline: {0}")]
    SiteOffline(String),

    /// Non-success response; negative statuses mean no response was received
    #[error("response not ok ({status}): {reason}")]
    ResponseNotOk { status: i32, reason: String },

    /// The response violates a protocol assumption that cannot self-heal
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The response is not something the extractor can work with
    #[error("invalid response shape: {0}")]
    InvalidResponseShape(String),

    /// The page holds no record (yet)
    #[error("no record produced")]
    NoRecordProduced,

    /// A record exists but cannot be published
    #[error("invalid record shape: {0}")]
    InvalidRecordShape(String),

    #[error("value error: {0}")]
    ValueError(String),

    #[error("unclassified error: {0}")]
    Unclassified(String),
}

impl ErrorSignal {
    pub fn not_ok(status: i32, reason: impl Into<String>) -> Self {
        Self::ResponseNotOk {
            status,
            reason: reason.into(),
        }
    }

    /// Short variant name for structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConnectionFailed(_) => "connection_failed",
            Self::SiteOffline(_) => "site_offline",
            Self::ResponseNotOk { .. } => "response_not_ok",
            Self::MalformedResponse(_) => "malformed_response",
            Self::InvalidResponseShape(_) => "invalid_response_shape",
            Self::NoRecordProduced => "no_record_produced",
            Self::InvalidRecordShape(_) => "invalid_record_shape",
            Self::ValueError(_) => "value_error",
            Self::Unclassified(_) => "unclassified",
        }
    }

    /// Whether the generic per-occurrence log line is written for this signal
    ///
    /// Empty results and not-ok responses occur at normal operating volume.
    pub fn is_logged(&self) -> bool {
        !matches!(self, Self::NoRecordProduced | Self::ResponseNotOk { .. })
    }
}

impl From<anyhow::Error> for ErrorSignal {
    fn from(error: anyhow::Error) -> Self {
        Self::Unclassified(format!("{:#}", error))
    }
}

/// Crawl position at the moment a signal left the attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalContext {
    pub crawler: String,
    pub id: i64,
    pub target: String,
    pub url: String,
    pub queue_depth: usize,
    pub tiers: Vec<usize>,
}

impl fmt::Display for SignalContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "crawler: {}, id: {}, url: {}, skips: {} {:?}",
            self.crawler, self.id, self.url, self.queue_depth, self.tiers
        )
    }
}
