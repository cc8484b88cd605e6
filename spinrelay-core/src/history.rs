//! One record per finished session, newest first, capped per mode.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bonus::BonusCategory;
use crate::constants::MAX_HISTORY_ITEMS;
use crate::error::HistoryError;
use crate::ledger::LedgerSnapshot;
use crate::mode::{GameMode, StopReason};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub timestamp: DateTime<Utc>,
    pub mode: GameMode,
    pub reason: StopReason,
    pub iterations: u64,
    pub total_win_amount: i64,
    pub start_balance: i64,
    pub end_balance: i64,
    pub profit: i64,
    pub per_category_win: BTreeMap<BonusCategory, i64>,
    pub per_category_spins: BTreeMap<BonusCategory, u64>,
    pub duration_ms: i64,
}

impl HistoryRecord {
    #[must_use]
    pub fn from_snapshot(
        mode: GameMode,
        reason: StopReason,
        ledger: &LedgerSnapshot,
        ended_at: DateTime<Utc>,
    ) -> Self {
        Self {
            timestamp: ended_at,
            mode,
            reason,
            iterations: ledger.iterations,
            total_win_amount: ledger.total_win_amount,
            start_balance: ledger.start_balance,
            end_balance: ledger.current_balance,
            profit: ledger.profit(),
            per_category_win: ledger
                .categories
                .iter()
                .map(|(c, s)| (*c, s.win_amount))
                .collect(),
            per_category_spins: ledger
                .categories
                .iter()
                .map(|(c, s)| (*c, s.sub_spins_played))
                .collect(),
            duration_ms: (ended_at - ledger.started_at).num_milliseconds().max(0),
        }
    }
}

/// Sink for finished sessions.
pub trait HistoryStore: Send + Sync {
    /// # Errors
    ///
    /// Storage or serialization failure.
    fn append(&self, record: HistoryRecord) -> Result<(), HistoryError>;

    /// Newest first.
    ///
    /// # Errors
    ///
    /// Storage or serialization failure.
    fn list(&self, mode: GameMode) -> Result<Vec<HistoryRecord>, HistoryError>;

    /// # Errors
    ///
    /// Storage or serialization failure.
    fn clear(&self, mode: GameMode) -> Result<(), HistoryError>;
}

/// Insert `record` at the front and drop the oldest of its mode past the cap.
pub fn push_capped(records: &mut Vec<HistoryRecord>, record: HistoryRecord) {
    let mode = record.mode;
    records.insert(0, record);
    let mut seen = 0;
    records.retain(|r| {
        if r.mode != mode {
            return true;
        }
        seen += 1;
        seen <= MAX_HISTORY_ITEMS
    });
}

#[derive(Debug, Default)]
pub struct MemoryHistory {
    records: Mutex<Vec<HistoryRecord>>,
}

impl MemoryHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryStore for MemoryHistory {
    fn append(&self, record: HistoryRecord) -> Result<(), HistoryError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| HistoryError::Storage("history lock poisoned".into()))?;
        push_capped(&mut records, record);
        Ok(())
    }

    fn list(&self, mode: GameMode) -> Result<Vec<HistoryRecord>, HistoryError> {
        let records = self
            .records
            .lock()
            .map_err(|_| HistoryError::Storage("history lock poisoned".into()))?;
        Ok(records.iter().filter(|r| r.mode == mode).cloned().collect())
    }

    fn clear(&self, mode: GameMode) -> Result<(), HistoryError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| HistoryError::Storage("history lock poisoned".into()))?;
        records.retain(|r| r.mode != mode);
        Ok(())
    }
}
