/// Tiered retry queues for targets that failed and may succeed later
///
/// Tier 0 holds the freshest failures, the last tier the most-retried ones.
/// A target is present in at most one tier at a time.
#[derive(Debug, Clone)]
pub struct SkipTiers {
    tiers: Vec<Vec<String>>,
}

/// Where a target went after failing a re-check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Promotion {
    /// Moved into the given tier
    Promoted { tier: usize },
    /// Left the last tier without succeeding and is gone for good
    Dropped,
}

impl SkipTiers {
    /// Creates `count` empty tiers (at least one)
    pub fn new(count: usize) -> Self {
        Self {
            tiers: vec![Vec::new(); count.max(1)],
        }
    }

    pub fn tier_count(&self) -> usize {
        self.tiers.len()
    }

    /// Parks a target in tier 0
    ///
    /// Returns false when the target is already queued in some tier.
    pub fn skip(&mut self, target: &str) -> bool {
        if self.contains(target) {
            return false;
        }
        self.tiers[0].push(target.to_string());
        true
    }

    pub fn contains(&self, target: &str) -> bool {
        self.tiers.iter().any(|tier| tier.iter().any(|t| t == target))
    }

    /// Takes the most recently added target out of a tier
    pub fn pop(&mut self, tier: usize) -> Option<String> {
        self.tiers.get_mut(tier)?.pop()
    }

    /// Moves a target that failed its re-check in `from` one tier up
    pub fn promote(&mut self, from: usize, target: String) -> Promotion {
        let to = from + 1;
        if to >= self.tiers.len() {
            return Promotion::Dropped;
        }
        self.tiers[to].push(target);
        Promotion::Promoted { tier: to }
    }

    /// Removes the latest tier-0 occurrences of `targets`
    ///
    /// Returns how many entries were removed.
    pub fn withdraw_fresh(&mut self, targets: &[String]) -> usize {
        let fresh = &mut self.tiers[0];
        let mut removed = 0;
        for target in targets.iter().rev() {
            if let Some(index) = fresh.iter().rposition(|t| t == target) {
                fresh.remove(index);
                removed += 1;
            }
        }
        removed
    }

    /// Removes numeric targets within `low..=high` from every tier
    ///
    /// Returns how many entries were removed.
    pub fn withdraw_ids(&mut self, low: i64, high: i64) -> usize {
        let mut removed = 0;
        for tier in &mut self.tiers {
            let before = tier.len();
            tier.retain(|target| {
                !matches!(target.parse::<i64>(), Ok(id) if (low..=high).contains(&id))
            });
            removed += before - tier.len();
        }
        removed
    }

    /// Total number of queued targets across all tiers
    pub fn total(&self) -> usize {
        self.tiers.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.iter().all(Vec::is_empty)
    }

    /// Per-tier sizes, tier 0 first
    pub fn counts(&self) -> Vec<usize> {
        self.tiers.iter().map(Vec::len).collect()
    }

    pub fn tier(&self, index: usize) -> &[String] {
        self.tiers.get(index).map(Vec::as_slice).unwrap_or(&[])
    }
}
