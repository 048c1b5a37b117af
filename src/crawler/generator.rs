//! Pull-based source of crawl targets
//!
//! Two modes:
//! - **Explicit**: a work queue of URLs, drained front to back. Requeued
//!   targets are appended and come out before the queue is exhausted.
//! - **Stepping**: yields `current_id`, advances by `direction`, then yields
//!   the requeues that were pending at that moment before the next ID.

use crate::config::CrawlerConfig;
use crate::shutdown::ShutdownSignal;
use std::collections::{HashSet, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Next call checks termination and yields `current_id`
    Stepping,
    /// `current_id` was just yielded; the next call advances it
    Advance,
    /// Yielding this many requeued targets before the next ID
    Requeues(usize),
}

/// Generates targets for one engine
#[derive(Debug, Clone)]
pub struct UrlGenerator {
    current_id: i64,
    direction: i64,
    ending_id: Option<i64>,
    explicit: bool,
    pending: VecDeque<String>,
    phase: Phase,
}

impl UrlGenerator {
    /// Builds a generator from the crawler configuration
    ///
    /// Explicit mode wins whenever URLs are configured or direction is 0.
    /// Duplicate URLs are dropped, keeping the first occurrence.
    pub fn new(config: &CrawlerConfig) -> Self {
        let mut seen = HashSet::new();
        let pending: VecDeque<String> = config
            .urls
            .iter()
            .filter(|url| seen.insert(url.as_str()))
            .cloned()
            .collect();

        Self {
            current_id: config.starting_id,
            direction: config.direction,
            ending_id: config.ending_id,
            explicit: !pending.is_empty() || config.direction == 0,
            pending,
            phase: Phase::Stepping,
        }
    }

    /// Pulls the next target, or `None` once the stream is exhausted
    pub fn next_target(&mut self, shutdown: &ShutdownSignal) -> Option<String> {
        if self.explicit {
            if shutdown.is_set() {
                return None;
            }
            return self.pending.pop_front();
        }

        loop {
            match self.phase {
                Phase::Stepping => {
                    if shutdown.is_set() || self.reached_end() {
                        return None;
                    }
                    self.phase = Phase::Advance;
                    return Some(self.current_id.to_string());
                }
                Phase::Advance => {
                    self.current_id += self.direction;
                    self.phase = Phase::Requeues(self.pending.len());
                }
                Phase::Requeues(0) => self.phase = Phase::Stepping,
                Phase::Requeues(remaining) => {
                    self.phase = Phase::Requeues(remaining - 1);
                    if let Some(target) = self.pending.pop_front() {
                        return Some(target);
                    }
                }
            }
        }
    }

    /// Queues a target for another attempt, with no retry limit
    pub fn requeue(&mut self, target: &str) {
        self.pending.push_back(target.to_string());
    }

    /// Makes `id` the next stepped ID so everything from it onward is
    /// attempted again
    ///
    /// Requeued IDs inside the rewound range are dropped, since stepping
    /// yields them anyway.
    pub fn resume_from(&mut self, id: i64) {
        if let Some(last) = self.last_stepped_id() {
            let (low, high) = if self.direction > 0 { (id, last) } else { (last, id) };
            self.pending.retain(|target| {
                !matches!(target.parse::<i64>(), Ok(n) if (low..=high).contains(&n))
            });
        }

        self.current_id = match self.phase {
            // The pending advance still has to happen
            Phase::Advance => id - self.direction,
            _ => id,
        };
    }

    /// ID of the target just yielded, when it came from stepping
    pub fn stepped_id(&self) -> Option<i64> {
        (!self.explicit && self.phase == Phase::Advance).then_some(self.current_id)
    }

    /// Most recent ID yielded by stepping
    pub fn last_stepped_id(&self) -> Option<i64> {
        match self.phase {
            _ if self.explicit => None,
            Phase::Advance => Some(self.current_id),
            Phase::Stepping | Phase::Requeues(_) => Some(self.current_id - self.direction),
        }
    }

    pub fn current_id(&self) -> i64 {
        self.current_id
    }

    pub fn is_explicit(&self) -> bool {
        self.explicit
    }

    /// Targets waiting in the work queue or requeue buffer
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn reached_end(&self) -> bool {
        match self.ending_id {
            Some(end) if self.direction > 0 => self.current_id >= end,
            Some(end) if self.direction < 0 => self.current_id <= end,
            _ => false,
        }
    }
}
