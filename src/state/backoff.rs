use crate::config::CrawlerConfig;
use std::time::Duration;

/// Tracks runs of empty results and decides when the crawler should idle
///
/// Each idle event raises the tolerated run length by `step` and doubles the
/// idle pause, capped at `max_idle_time`.
#[derive(Debug, Clone)]
pub struct BackoffController {
    step: u32,
    base_idle_time: Duration,
    max_idle_time: Duration,
    threshold: u32,
    idle_time: Duration,
    recent_empty: Vec<String>,
    streak_start: Option<i64>,
}

/// A run of empty results long enough to idle on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Escalation {
    /// Targets of the run, oldest first
    pub targets: Vec<String>,
    /// How long the idle routine should take in total
    pub idle_for: Duration,
    /// First stepped ID of the run; `None` when every empty result came
    /// from a requeued or explicit target
    pub streak_start: Option<i64>,
}

impl BackoffController {
    pub fn new(threshold: u32, step: u32, idle_time: Duration, max_idle_time: Duration) -> Self {
        Self {
            step,
            base_idle_time: idle_time,
            max_idle_time,
            threshold: threshold.max(1),
            idle_time: idle_time.min(max_idle_time),
            recent_empty: Vec::new(),
            streak_start: None,
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(
            config.backoff_threshold,
            config.backoff_step,
            config.idle_time(),
            config.max_idle_time(),
        )
    }

    /// Counts an empty result for `target`
    ///
    /// `stepped_id` is the generator ID when the target came straight from
    /// ID stepping. Returns an escalation once the run reaches the current
    /// threshold. The threshold grows and the run counter restarts at that
    /// point.
    pub fn record_empty(&mut self, target: &str, stepped_id: Option<i64>) -> Option<Escalation> {
        self.recent_empty.push(target.to_string());
        if self.streak_start.is_none() {
            self.streak_start = stepped_id;
        }
        if (self.recent_empty.len() as u32) < self.threshold {
            return None;
        }

        self.threshold = self.threshold.saturating_add(self.step);
        Some(Escalation {
            targets: std::mem::take(&mut self.recent_empty),
            idle_for: self.idle_time,
            streak_start: self.streak_start.take(),
        })
    }

    /// Doubles the idle pause after an idle routine completes
    pub fn finish_idle(&mut self) {
        self.idle_time = self.idle_time.saturating_mul(2).min(self.max_idle_time);
    }

    /// A record was produced: the run of empty results is over
    pub fn reset_streak(&mut self) {
        self.recent_empty.clear();
        self.streak_start = None;
        self.idle_time = self.base_idle_time.min(self.max_idle_time);
    }

    pub fn consecutive_empty(&self) -> u32 {
        self.recent_empty.len() as u32
    }

    pub fn current_threshold(&self) -> u32 {
        self.threshold
    }

    pub fn current_idle_time(&self) -> Duration {
        self.idle_time
    }
}
