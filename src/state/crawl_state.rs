use crate::config::CrawlerConfig;
use crate::crawler::UrlGenerator;
use crate::state::{BackoffController, SkipTiers};
use std::time::Duration;

/// Everything one engine mutates while it runs
///
/// Owned by exactly one engine; handlers receive it explicitly instead of
/// reading ambient fields.
#[derive(Debug, Clone)]
pub struct CrawlState {
    pub generator: UrlGenerator,
    /// Target of the attempt in progress (or last finished)
    pub current_target: String,
    /// URL fetched for `current_target`
    pub current_url: String,
    pub backoff: BackoffController,
    pub skips: SkipTiers,
    /// Set while the skip tiers are being re-checked
    pub draining: bool,
    /// Idle pause requested by the backoff controller, run by the main loop
    pub pending_idle: Option<Duration>,
    pub published: u64,
    pub lost: u64,
}

impl CrawlState {
    pub fn new(config: &CrawlerConfig) -> Self {
        Self {
            generator: UrlGenerator::new(config),
            current_target: String::new(),
            current_url: String::new(),
            backoff: BackoffController::from_config(config),
            skips: SkipTiers::new(config.skip_tiers),
            draining: false,
            pending_idle: None,
            published: 0,
            lost: 0,
        }
    }

    /// Numeric position of the current attempt
    ///
    /// Numeric targets are their own ID; anything else reports the
    /// generator cursor.
    pub fn current_id(&self) -> i64 {
        self.current_target
            .parse()
            .unwrap_or_else(|_| self.generator.current_id())
    }

    /// Targets waiting in the skip tiers
    pub fn queue_depth(&self) -> usize {
        self.skips.total()
    }
}
