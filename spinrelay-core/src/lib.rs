//! Replay engine for captured slot-machine spin requests.
//!
//! A [`LoopController`] replays the most recent captured spin through a
//! [`RequestExecutor`], folds each response into a [`StatsLedger`], detects
//! bonus rounds and plays them to exhaustion (following chained bonuses),
//! then waits a randomized, cancellable delay before the next spin.
//!
//! ```no_run
//! use std::sync::Arc;
//! use spinrelay_core::{
//!     Collaborators, GameMode, LogNotifier, LoopConfig, LoopController, MemoryCaptureStore,
//!     RequestExecutor,
//! };
//!
//! # async fn demo(executor: Arc<dyn RequestExecutor>) {
//! let captures = Arc::new(MemoryCaptureStore::new());
//! let deps = Collaborators::new(executor, captures).with_notifier(Arc::new(LogNotifier));
//! let controller = LoopController::new(GameMode::Slots, deps);
//! controller.start(LoopConfig::default()).ok();
//! let final_stats = controller.stop();
//! println!("profit {}", final_stats.profit());
//! # }
//! ```

pub mod bonus;
pub mod cancel;
pub mod capture;
pub mod config;
pub mod constants;
pub mod controller;
pub mod error;
pub mod history;
pub mod ledger;
pub mod mode;
pub mod notify;
pub mod numbers;
pub mod retry;
pub mod spin;
pub mod transport;
pub mod wheel;

pub use bonus::{BonusCategory, BonusDescriptor, BonusEnd, BonusKind, BonusOutcome, detect};
pub use cancel::{CancelHandle, CancelSignal};
pub use capture::{CaptureStore, CapturedRequest, Header, MemoryCaptureStore, RequestClass};
pub use config::{LoopConfig, TelemetryConfig};
pub use controller::{Collaborators, LoopController, LoopSession, LoopStatus, StartOutcome};
pub use error::{HistoryError, LoopConfigError, SpinError};
pub use history::{HistoryRecord, HistoryStore, MemoryHistory};
pub use ledger::{CategoryStats, LedgerSnapshot, StatsLedger};
pub use mode::{GameMode, StopReason};
pub use notify::{LogNotifier, NullNotifier, ProgressReport, SessionEvent, SessionNotifier};
pub use retry::retry_with_backoff;
pub use spin::{PrimaryOutcome, SpinHighlights, interpret_primary};
pub use transport::{ExecutorReply, RequestExecutor, RequestIds, forwardable_headers, parse_body_text};
pub use wheel::WheelProgress;
