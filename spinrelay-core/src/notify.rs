//! Fire-and-forget lifecycle events for whatever is displaying the session.

use serde::Serialize;
use tokio::sync::mpsc::UnboundedSender;

use crate::bonus::BonusOutcome;
use crate::config::LoopConfig;
use crate::ledger::LedgerSnapshot;
use crate::mode::{GameMode, StopReason};
use crate::spin::SpinHighlights;

/// Emitted after every completed iteration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressReport {
    pub mode: GameMode,
    pub iteration: u64,
    pub last_win: i64,
    pub ledger: LedgerSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlights: Option<SpinHighlights>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bonuses: Vec<BonusOutcome>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    Started {
        mode: GameMode,
        config: LoopConfig,
    },
    Progress(ProgressReport),
    BonusPlayed {
        mode: GameMode,
        outcome: BonusOutcome,
    },
    LevelUp {
        mode: GameMode,
        old_level: i64,
        new_level: i64,
    },
    Warning {
        mode: GameMode,
        message: String,
        consecutive_errors: u32,
    },
    Stopped {
        mode: GameMode,
        reason: StopReason,
        ledger: LedgerSnapshot,
    },
}

/// Receives session events. Must not block and must not fail.
pub trait SessionNotifier: Send + Sync {
    fn notify(&self, event: SessionEvent);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NullNotifier;

impl SessionNotifier for NullNotifier {
    fn notify(&self, _event: SessionEvent) {}
}

/// Writes a one-line summary of each event through `log`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl SessionNotifier for LogNotifier {
    fn notify(&self, event: SessionEvent) {
        match event {
            SessionEvent::Started { mode, config } => log::info!(
                "[{mode}] started (delay {}-{} ms, max iterations {})",
                config.min_delay_ms,
                config.max_delay_ms,
                config.max_iterations
            ),
            SessionEvent::Progress(report) => log::info!(
                "[{}] #{} win {} balance {}",
                report.mode,
                report.iteration,
                report.last_win,
                report.ledger.current_balance
            ),
            SessionEvent::BonusPlayed { mode, outcome } => log::info!(
                "[{mode}] {} finished: {} spins, won {}",
                outcome.kind,
                outcome.spins_played,
                outcome.total_win
            ),
            SessionEvent::LevelUp {
                mode,
                old_level,
                new_level,
            } => log::info!("[{mode}] level up {old_level} -> {new_level}"),
            SessionEvent::Warning {
                mode,
                message,
                consecutive_errors,
            } => log::warn!("[{mode}] {message} ({consecutive_errors} in a row)"),
            SessionEvent::Stopped {
                mode,
                reason,
                ledger,
            } => log::info!(
                "[{mode}] {reason} after {} iterations, profit {}",
                ledger.iterations,
                ledger.profit()
            ),
        }
    }
}

impl SessionNotifier for UnboundedSender<SessionEvent> {
    fn notify(&self, event: SessionEvent) {
        let _ = self.send(event);
    }
}
