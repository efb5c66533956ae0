//! Usage/Cost Accumulator

use crate::backend::UsageStats;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Session cost tally plus the latest service snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageLedger {
    /// Cost of replies in this session
    pub session_cost_usd: f64,
    /// Replies received in this session
    pub turns: u64,
    /// Latest snapshot from the usage endpoint
    pub snapshot: Option<UsageStats>,
}

impl UsageLedger {
    /// Record one reply's metered cost
    pub fn record_turn(&mut self, cost_usd: Option<f64>) {
        self.turns += 1;
        match cost_usd {
            Some(cost) if cost.is_finite() && cost >= 0.0 => self.session_cost_usd += cost,
            Some(cost) => debug!(cost, "ignoring invalid cost"),
            None => {}
        }
    }

    /// Mirror a service snapshot
    pub fn mirror(&mut self, stats: UsageStats) {
        self.snapshot = Some(stats);
    }

    /// Global spend, if a snapshot was fetched
    #[inline]
    #[must_use]
    pub fn total_usd(&self) -> Option<f64> {
        self.snapshot.as_ref().map(|s| s.total_usd)
    }
}
