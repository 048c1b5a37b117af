//! Crawl engine - main crawl orchestration logic
//!
//! One engine is one sequential worker:
//! - Pulls targets from the generator and runs a crawl attempt for each
//! - Resolves failed attempts through the dispatch table
//! - Re-checks the skip tiers every `check-interval`
//! - Idles when the backoff controller says the crawl caught up
//! - Runs a graceful drain of the skip tiers once the stream ends

use crate::config::CrawlerConfig;
use crate::crawler::dispatch::{handler_for, Remedy, Severity};
use crate::crawler::fetcher::PageSource;
use crate::crawler::parser::{AttemptContext, Document, Extractor};
use crate::crawler::signal::{ErrorSignal, SignalContext};
use crate::output::{Publisher, Record};
use crate::shutdown::ShutdownSignal;
use crate::state::{CrawlState, Promotion};
use crate::{Result, StepcrawlError};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::Instrument;

/// Emits a tracing event at a dispatch severity
///
/// Critical maps to an error event tagged `severity = "critical"`.
macro_rules! event_at {
    ($severity:expr, $($arg:tt)+) => {
        match $severity {
            Severity::Info => tracing::info!($($arg)+),
            Severity::Warning => tracing::warn!($($arg)+),
            Severity::Error => tracing::error!($($arg)+),
            Severity::Critical => tracing::error!(severity = "critical", $($arg)+),
        }
    };
}

/// Why a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// The generator ran out of targets
    Exhausted,
    /// The shutdown signal was observed
    Shutdown,
    /// A fatal signal stopped the run
    Fatal(String),
}

impl StopReason {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal(_))
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted => write!(f, "exhausted"),
            Self::Shutdown => write!(f, "shutdown"),
            Self::Fatal(message) => write!(f, "fatal: {}", message),
        }
    }
}

/// Summary of a finished run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub crawler: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Generator cursor when the run ended
    pub final_id: i64,
    pub stop_reason: StopReason,
    /// Targets still parked in the skip tiers
    pub skipped_left: usize,
    /// Targets still waiting in the generator
    pub requeued_left: usize,
    pub published: u64,
    pub lost: u64,
}

/// Main crawler engine structure
pub struct CrawlEngine {
    config: CrawlerConfig,
    name: String,
    state: CrawlState,
    shutdown: ShutdownSignal,
    fetcher: Box<dyn PageSource>,
    extractor: Box<dyn Extractor>,
    publisher: Publisher,
}

impl CrawlEngine {
    /// Creates a new engine
    ///
    /// # Arguments
    ///
    /// * `config` - Validated crawler configuration
    /// * `fetcher` - Where pages come from
    /// * `extractor` - Site-specific record extraction
    /// * `publisher` - Where records go
    pub fn new(
        config: CrawlerConfig,
        fetcher: Box<dyn PageSource>,
        extractor: Box<dyn Extractor>,
        publisher: Publisher,
    ) -> Self {
        let name = config.name.clone().unwrap_or_else(|| {
            format!(
                "{}_{}{:+}",
                extractor.name(),
                config.starting_id,
                config.direction
            )
        });

        Self {
            state: CrawlState::new(&config),
            config,
            name,
            shutdown: ShutdownSignal::new(),
            fetcher,
            extractor,
            publisher,
        }
    }

    /// Uses an externally controlled shutdown signal
    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> &CrawlState {
        &self.state
    }

    /// Handle that stops the engine when set
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Runs the engine until the stream ends, shutdown is requested, or a
    /// fatal signal occurs
    pub async fn run(&mut self) -> RunReport {
        let span = tracing::info_span!("crawler", name = %self.name);
        self.run_in_span().instrument(span).await
    }

    async fn run_in_span(&mut self) -> RunReport {
        let started_at = Utc::now();
        tracing::info!(
            id = self.state.generator.current_id(),
            direction = self.config.direction,
            explicit = self.state.generator.is_explicit(),
            broker = self.publisher.is_broker(),
            "Starting crawl"
        );

        let mut stop_reason = self.main_loop().await.unwrap_or_else(fatal_reason);

        if !stop_reason.is_fatal() {
            if let Err(e) = self.graceful_drain().await {
                stop_reason = fatal_reason(e);
            }
        }

        let skipped_left = self.state.skips.total();
        if skipped_left > 0 {
            tracing::error!(
                id = self.state.generator.current_id(),
                skipped = skipped_left,
                tiers = ?self.state.skips.counts(),
                reason = %stop_reason,
                "Crawl finished with skips remaining"
            );
        } else {
            tracing::info!(
                id = self.state.generator.current_id(),
                reason = %stop_reason,
                published = self.state.published,
                lost = self.state.lost,
                "Crawl finished"
            );
        }

        RunReport {
            crawler: self.name.clone(),
            started_at,
            finished_at: Utc::now(),
            final_id: self.state.generator.current_id(),
            stop_reason,
            skipped_left,
            requeued_left: self.state.generator.pending(),
            published: self.state.published,
            lost: self.state.lost,
        }
    }

    async fn main_loop(&mut self) -> Result<StopReason> {
        let check_interval = self.config.check_interval();
        let mut last_check = Instant::now();

        while let Some(target) = self.state.generator.next_target(&self.shutdown) {
            if self.crawl(&target).await? {
                self.state.backoff.reset_streak();
            }

            if let Some(idle_for) = self.state.pending_idle.take() {
                self.idle(idle_for).await?;
            }

            if last_check.elapsed() >= check_interval {
                let before = self.state.skips.total();
                self.check_skips().await?;
                tracing::info!(
                    id = self.state.generator.current_id(),
                    before,
                    after = self.state.skips.total(),
                    "Checked skips"
                );
                last_check = Instant::now();
            }
        }

        if self.shutdown.is_set() {
            tracing::info!("Shutdown requested, leaving the main loop");
            Ok(StopReason::Shutdown)
        } else {
            Ok(StopReason::Exhausted)
        }
    }

    /// Gives skipped targets a few more chances after the stream ended
    async fn graceful_drain(&mut self) -> Result<()> {
        let check_interval = self.config.check_interval();

        for round in 1..=self.state.skips.tier_count() {
            if self.state.skips.is_empty() {
                break;
            }
            tracing::info!(
                round,
                remaining = self.state.skips.total(),
                "Waiting {:?} before re-checking skips",
                check_interval
            );
            sleep(check_interval).await;
            self.check_skips().await?;
        }
        Ok(())
    }

    /// Runs one crawl attempt for `target`
    ///
    /// Returns whether the target is done. Only a fatal signal is an error.
    pub async fn crawl(&mut self, target: &str) -> Result<bool> {
        let url = self.config.format_target(target);
        self.state.current_target = target.to_string();
        self.state.current_url = url.clone();

        let context = AttemptContext {
            id: self.state.current_id(),
            target,
            url: &url,
            calm: self.config.is_calm(),
        };

        match attempt(self.fetcher.as_ref(), self.extractor.as_ref(), &context).await {
            Ok(record) => {
                self.publish(&record).await;
                let hint = record.sleep_hint();
                if context.calm && !hint.is_zero() {
                    tracing::debug!("Calm mode, sleeping {:?}", hint);
                    sleep(hint).await;
                }
                Ok(true)
            }
            Err(signal) => self.dispatch(signal).await,
        }
    }

    async fn publish(&mut self, record: &Record) {
        if self.publisher.publish(record).await {
            self.state.published += 1;
        } else {
            self.state.lost += 1;
            tracing::warn!(
                id = self.state.current_id(),
                url = %self.state.current_url,
                "Record lost after exhausting delivery attempts"
            );
        }
    }

    /// Applies the dispatch table entry for a failed attempt
    async fn dispatch(&mut self, signal: ErrorSignal) -> Result<bool> {
        let handler = handler_for(&signal, self.config.unclassified_errors);
        let context = self.signal_context();

        if let Some(severity) = handler.severity {
            log_signal(severity, &signal, &context);
        }

        match handler.remedy {
            Remedy::Shutdown => Err(StepcrawlError::Fatal { signal, context }),
            Remedy::Skip { pause } => {
                self.skip_current();
                pause_for(pause).await;
                Ok(false)
            }
            Remedy::Requeue { pause } => {
                // Draining promotes failed entries itself
                if !self.state.draining {
                    self.state.generator.requeue(&self.state.current_target);
                }
                pause_for(pause).await;
                Ok(false)
            }
            Remedy::Backoff => Ok(self.back_off()),
            Remedy::Accept => Ok(true),
            Remedy::Unexpected => Ok(false),
        }
    }

    fn skip_current(&mut self) {
        if !self.state.draining {
            self.state.skips.skip(&self.state.current_target);
        }
    }

    /// Handles an empty result; returns whether the target is done
    fn back_off(&mut self) -> bool {
        if self.config.direction <= 0 || self.state.draining {
            return true;
        }

        let target = self.state.current_target.clone();
        let stepped_id = self.state.generator.stepped_id();
        self.state.skips.skip(&target);

        let Some(escalation) = self.state.backoff.record_empty(&target, stepped_id) else {
            return false;
        };

        let withdrawn = if self.state.generator.is_explicit() {
            self.requeue_fresh(&escalation.targets)
        } else {
            self.rewind_streak(escalation.streak_start)
        };

        tracing::info!(
            id = self.state.generator.current_id(),
            empty = escalation.targets.len(),
            withdrawn,
            next_threshold = self.state.backoff.current_threshold(),
            "No new records, idling for {:?}",
            escalation.idle_for
        );
        self.state.pending_idle = Some(escalation.idle_for);
        false
    }

    /// Moves the stepping cursor back to the first ID of an empty run
    ///
    /// Every ID from there on is yielded again, so none of them may stay in
    /// the skip tiers. Returns how many skip entries were withdrawn.
    fn rewind_streak(&mut self, streak_start: Option<i64>) -> usize {
        let generator = &mut self.state.generator;
        let (Some(start), Some(last)) = (streak_start, generator.last_stepped_id()) else {
            return 0;
        };

        let (low, high) = (start.min(last), start.max(last));
        generator.resume_from(start);
        self.state.skips.withdraw_ids(low, high)
    }

    /// Hands an empty run of explicit targets back to the work queue
    fn requeue_fresh(&mut self, targets: &[String]) -> usize {
        let withdrawn = self.state.skips.withdraw_fresh(targets);
        let mut seen = HashSet::new();
        for target in targets {
            if seen.insert(target.as_str()) && !self.state.skips.contains(target) {
                self.state.generator.requeue(target);
            }
        }
        withdrawn
    }

    /// Drains the skip tiers once, then sleeps out the rest of `idle_for`
    async fn idle(&mut self, idle_for: Duration) -> Result<()> {
        let started = Instant::now();
        self.check_skips().await?;

        let remaining = idle_for.saturating_sub(started.elapsed());
        if !remaining.is_zero() {
            sleep(remaining).await;
        }
        self.state.backoff.finish_idle();
        Ok(())
    }

    /// Re-attempts every skipped target, most-retried tier first
    async fn check_skips(&mut self) -> Result<()> {
        if self.state.draining {
            return Ok(());
        }

        self.state.draining = true;
        let result = self.drain_tiers().await;
        self.state.draining = false;
        result
    }

    async fn drain_tiers(&mut self) -> Result<()> {
        for tier in (0..self.state.skips.tier_count()).rev() {
            // Failures move to tier + 1, which this sweep already passed
            while let Some(target) = self.state.skips.pop(tier) {
                if self.crawl(&target).await? {
                    continue;
                }

                if self.state.skips.promote(tier, target.clone()) == Promotion::Dropped {
                    tracing::error!(
                        target = %target,
                        url = %self.state.current_url,
                        tiers = self.state.skips.tier_count(),
                        "Dropping target after exhausting every skip tier"
                    );
                }
            }
        }
        Ok(())
    }

    fn signal_context(&self) -> SignalContext {
        SignalContext {
            crawler: self.name.clone(),
            id: self.state.current_id(),
            target: self.state.current_target.clone(),
            url: self.state.current_url.clone(),
            queue_depth: self.state.queue_depth(),
            tiers: self.state.skips.counts(),
        }
    }
}

/// Fetch, extract, post-process
///
/// The parsed document is dropped before the function returns so no HTML
/// tree is held across an await.
async fn attempt(
    fetcher: &dyn PageSource,
    extractor: &dyn Extractor,
    context: &AttemptContext<'_>,
) -> std::result::Result<Record, ErrorSignal> {
    let page = fetcher.fetch(context.url).await?;
    let document = Document::parse(&page);
    let record = extractor.extract(&document, context)?;
    Ok(extractor.post_process(record))
}

async fn pause_for(pause: Option<Duration>) {
    if let Some(pause) = pause {
        tracing::info!("Pausing for {:?}", pause);
        sleep(pause).await;
    }
}

fn log_signal(severity: Severity, signal: &ErrorSignal, context: &SignalContext) {
    let kind = signal.kind();
    if signal.is_logged() {
        event_at!(
            severity,
            kind,
            id = context.id,
            target = %context.target,
            url = %context.url,
            queue_depth = context.queue_depth,
            tiers = ?context.tiers,
            "{}",
            signal
        );
    } else {
        event_at!(severity, kind, id = context.id, url = %context.url, "{}", signal);
    }
}

fn fatal_reason(error: StepcrawlError) -> StopReason {
    tracing::error!(severity = "critical", "Stopping crawl: {}", error);
    let StepcrawlError::Fatal { signal, .. } = error;
    StopReason::Fatal(signal.to_string())
}
