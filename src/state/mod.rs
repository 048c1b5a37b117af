//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlState`: Everything a single engine mutates while it runs
//! - `SkipTiers`: Tiered retry queues for failed targets
//! - `BackoffController`: Empty-result streaks and the idle pause

mod backoff;
mod crawl_state;
mod skip_tiers;

// Re-export main types
pub use backoff::{BackoffController, Escalation};
pub use crawl_state::CrawlState;
pub use skip_tiers::{Promotion, SkipTiers};
