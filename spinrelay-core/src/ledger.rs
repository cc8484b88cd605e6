//! Session statistics.
//!
//! Profit is always `current_balance - start_balance`. Bonus category wins
//! are a breakdown of money already reflected in the reported balance and
//! are never added on top of it.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bonus::{BonusCategory, BonusOutcome};
use crate::wheel::WheelProgress;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub trigger_count: u32,
    pub sub_spins_played: u64,
    pub win_amount: i64,
}

/// Immutable copy of the ledger for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub iterations: u64,
    pub total_win_amount: i64,
    pub start_balance: i64,
    pub current_balance: i64,
    pub started_at: DateTime<Utc>,
    pub categories: BTreeMap<BonusCategory, CategoryStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wheel: Option<WheelProgress>,
}

impl LedgerSnapshot {
    #[must_use]
    pub fn empty(started_at: DateTime<Utc>) -> Self {
        Self {
            iterations: 0,
            total_win_amount: 0,
            start_balance: 0,
            current_balance: 0,
            started_at,
            categories: BonusCategory::ALL
                .into_iter()
                .map(|c| (c, CategoryStats::default()))
                .collect(),
            wheel: None,
        }
    }

    #[must_use]
    pub const fn profit(&self) -> i64 {
        self.current_balance.saturating_sub(self.start_balance)
    }

    /// How far the balance has fallen below the starting balance.
    #[must_use]
    pub const fn loss(&self) -> i64 {
        self.start_balance.saturating_sub(self.current_balance)
    }

    #[must_use]
    pub fn category(&self, category: BonusCategory) -> CategoryStats {
        self.categories.get(&category).copied().unwrap_or_default()
    }
}

/// Running counters for one session. Only the loop mutates it.
#[derive(Debug, Clone)]
pub struct StatsLedger {
    state: LedgerSnapshot,
    start_fixed: bool,
}

impl StatsLedger {
    #[must_use]
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            state: LedgerSnapshot::empty(started_at),
            start_fixed: false,
        }
    }

    /// Fix the pre-win starting balance. Later calls are ignored.
    pub fn record_first_spin(&mut self, balance: i64, win: i64) {
        if self.start_fixed {
            return;
        }
        self.state.start_balance = balance.saturating_sub(win);
        self.start_fixed = true;
    }

    pub fn record_spin(&mut self, balance: i64, win: i64) {
        self.state.current_balance = balance;
        self.state.total_win_amount = self.state.total_win_amount.saturating_add(win);
        self.state.iterations += 1;
    }

    /// One primary response: fixes the start on the first call, then records.
    pub fn record_primary(&mut self, balance: i64, win: i64) {
        self.record_first_spin(balance, win);
        self.record_spin(balance, win);
    }

    /// Per-category breakdown only; balance and total win are untouched.
    pub fn record_bonus_outcome(&mut self, category: BonusCategory, sub_spins: u32, win: i64) {
        let stats = self.state.categories.entry(category).or_default();
        stats.trigger_count = stats.trigger_count.saturating_add(1);
        stats.sub_spins_played = stats.sub_spins_played.saturating_add(u64::from(sub_spins));
        stats.win_amount = stats.win_amount.saturating_add(win);
    }

    pub fn record_bonus(&mut self, outcome: &BonusOutcome) {
        self.record_bonus_outcome(outcome.category, outcome.spins_played, outcome.total_win);
    }

    /// Wheel spins carry no balance; only the iteration count and progress move.
    pub fn record_wheel_spin(&mut self, progress: WheelProgress) {
        self.state.iterations += 1;
        self.state.wheel = Some(progress);
    }

    #[must_use]
    pub const fn iterations(&self) -> u64 {
        self.state.iterations
    }

    #[must_use]
    pub fn snapshot(&self) -> LedgerSnapshot {
        self.state.clone()
    }
}
