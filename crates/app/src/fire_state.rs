//! Fire-state tracker: when each rule last fired.
//!
//! Owned by the engine loop. The state lives in memory only and starts
//! empty, so every rule is eligible right after a restart.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use autorule_domain::id::RuleId;
use autorule_domain::time::Timestamp;

#[derive(Debug, Default)]
pub struct FireStateTracker {
    last_fired: HashMap<RuleId, Timestamp>,
}

impl FireStateTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn last_fired(&self, rule_id: RuleId) -> Option<Timestamp> {
        self.last_fired.get(&rule_id).copied()
    }

    /// Whether at least `min_interval` has elapsed since the rule last fired.
    /// A rule that never fired is always due.
    #[must_use]
    pub fn is_due(&self, rule_id: RuleId, min_interval: Duration, now: Timestamp) -> bool {
        let Some(last) = self.last_fired.get(&rule_id) else {
            return true;
        };
        let min_interval = chrono::Duration::from_std(min_interval).unwrap_or(chrono::Duration::MAX);
        now - *last >= min_interval
    }

    pub fn record_fire(&mut self, rule_id: RuleId, at: Timestamp) {
        self.last_fired.insert(rule_id, at);
    }

    /// Drop the entries of rules that are no longer active.
    /// Returns how many entries were evicted.
    pub fn retain_rules(&mut self, active: &HashSet<RuleId>) -> usize {
        let before = self.last_fired.len();
        self.last_fired.retain(|rule_id, _| active.contains(rule_id));
        before - self.last_fired.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.last_fired.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.last_fired.is_empty()
    }
}
