//! Error dispatch table
//!
//! Maps every [`ErrorSignal`] variant to the remedy the engine applies. This
//! module only decides; the engine owns the state and performs the remedy.
//!
//! | Signal | Remedy |
//! |--------|--------|
//! | MalformedResponse | Shutdown |
//! | ConnectionFailed | Skip, pause 5 minutes |
//! | SiteOffline | Skip, pause 60 minutes |
//! | ResponseNotOk < 0 | Requeue |
//! | ResponseNotOk 4xx | Skip |
//! | ResponseNotOk 5xx | Requeue, pause 5 minutes (not logged) |
//! | ResponseNotOk other | Requeue |
//! | InvalidResponseShape | Skip |
//! | NoRecordProduced | Backoff |
//! | InvalidRecordShape | Accept |
//! | ValueError (encoding mismatch) | Requeue |
//! | anything else | Unexpected |

use crate::config::UnclassifiedPolicy;
use crate::crawler::signal::{ErrorSignal, ENCODING_MISMATCH};
use std::time::Duration;

/// Pause after a connection failure
pub const CONNECTION_PAUSE: Duration = Duration::from_secs(5 * 60);

/// Pause after the site reported itself offline
pub const OFFLINE_PAUSE: Duration = Duration::from_secs(60 * 60);

/// Pause after a server error
pub const SERVER_ERROR_PAUSE: Duration = Duration::from_secs(5 * 60);

/// What the engine does with a failed target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remedy {
    /// Stop the run loop
    Shutdown,
    /// Park the target in skip tier 0, then optionally pause
    Skip { pause: Option<Duration> },
    /// Put the target back into the generator, then optionally pause
    Requeue { pause: Option<Duration> },
    /// Hand the empty result to the backoff controller
    Backoff,
    /// Treat as done; never revisit
    Accept,
    /// Log as unexpected and move on
    Unexpected,
}

/// Log severity attached to a remedy
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

/// A dispatch table entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handler {
    pub remedy: Remedy,
    /// `None` means the occurrence is not logged
    pub severity: Option<Severity>,
}

impl Handler {
    const fn new(remedy: Remedy, severity: Severity) -> Self {
        Self {
            remedy,
            severity: Some(severity),
        }
    }

    const fn quiet(remedy: Remedy) -> Self {
        Self {
            remedy,
            severity: None,
        }
    }
}

/// Looks up the handler for a signal
pub fn handler_for(signal: &ErrorSignal, unclassified: UnclassifiedPolicy) -> Handler {
    match signal {
        ErrorSignal::MalformedResponse(_) => Handler::new(Remedy::Shutdown, Severity::Critical),
        ErrorSignal::ConnectionFailed(_) => Handler::new(
            Remedy::Skip {
                pause: Some(CONNECTION_PAUSE),
            },
            Severity::Info,
        ),
        ErrorSignal::SiteOffline(_) => Handler::new(
            Remedy::Skip {
                pause: Some(OFFLINE_PAUSE),
            },
            Severity::Info,
        ),
        ErrorSignal::ResponseNotOk { status, .. } => response_not_ok_handler(*status),
        ErrorSignal::InvalidResponseShape(_) => {
            Handler::new(Remedy::Skip { pause: None }, Severity::Info)
        }
        ErrorSignal::NoRecordProduced => Handler::quiet(Remedy::Backoff),
        ErrorSignal::InvalidRecordShape(_) => Handler::new(Remedy::Accept, Severity::Info),
        ErrorSignal::ValueError(message) if message.starts_with(ENCODING_MISMATCH) => {
            Handler::new(Remedy::Requeue { pause: None }, Severity::Info)
        }
        ErrorSignal::ValueError(_) | ErrorSignal::Unclassified(_) => unexpected_handler(unclassified),
    }
}

fn response_not_ok_handler(status: i32) -> Handler {
    match status {
        s if s < 0 => Handler::new(Remedy::Requeue { pause: None }, Severity::Warning),
        400..=499 => Handler::new(Remedy::Skip { pause: None }, Severity::Warning),
        500..=599 => Handler::quiet(Remedy::Requeue {
            pause: Some(SERVER_ERROR_PAUSE),
        }),
        _ => Handler::new(Remedy::Requeue { pause: None }, Severity::Error),
    }
}

fn unexpected_handler(policy: UnclassifiedPolicy) -> Handler {
    match policy {
        UnclassifiedPolicy::Continue => Handler::new(Remedy::Unexpected, Severity::Critical),
        UnclassifiedPolicy::Shutdown => Handler::new(Remedy::Shutdown, Severity::Critical),
    }
}
