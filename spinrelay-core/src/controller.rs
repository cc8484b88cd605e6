//! The replay loop and its session lifecycle.
//!
//! A [`LoopController`] owns one [`GameMode`]. `start` builds a fresh
//! [`LoopSession`] (ledger, error counter, cancel handle) and spawns the loop
//! on the current tokio runtime; `stop` trips the session's cancel handle and
//! freezes its ledger under the same lock the loop mutates it through, so no
//! response that resolves afterwards can change the reported totals.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::bonus::{self, BonusContext, BonusEnd};
use crate::cancel::{CancelHandle, CancelSignal};
use crate::capture::CaptureStore;
use crate::config::LoopConfig;
use crate::error::{LoopConfigError, SpinError};
use crate::history::{HistoryRecord, HistoryStore, MemoryHistory};
use crate::ledger::{LedgerSnapshot, StatsLedger};
use crate::mode::{GameMode, StopReason};
use crate::notify::{NullNotifier, ProgressReport, SessionEvent, SessionNotifier};
use crate::spin::{interpret_primary, log_side_features};
use crate::transport::{RequestExecutor, RequestIds, dispatch};
use crate::wheel::{claim_level_reward, interpret_wheel};

/// External services a controller talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub executor: Arc<dyn RequestExecutor>,
    pub captures: Arc<dyn CaptureStore>,
    pub history: Arc<dyn HistoryStore>,
    pub notifier: Arc<dyn SessionNotifier>,
}

impl Collaborators {
    /// In-memory history and no notifications.
    pub fn new(executor: Arc<dyn RequestExecutor>, captures: Arc<dyn CaptureStore>) -> Self {
        Self {
            executor,
            captures,
            history: Arc::new(MemoryHistory::new()),
            notifier: Arc::new(NullNotifier),
        }
    }

    #[must_use]
    pub fn with_history(mut self, history: Arc<dyn HistoryStore>) -> Self {
        self.history = history;
        self
    }

    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn SessionNotifier>) -> Self {
        self.notifier = notifier;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// A session was already running; nothing changed.
    AlreadyActive,
}

/// Side-effect-free view of a controller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoopStatus {
    pub mode: GameMode,
    pub is_active: bool,
    pub ledger: LedgerSnapshot,
    pub config: LoopConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<StopReason>,
}

#[derive(Debug, Default)]
struct ErrorState {
    consecutive: u32,
    last: Option<String>,
}

#[derive(Debug)]
struct SessionState {
    ledger: StatsLedger,
    errors: ErrorState,
    finalized: bool,
}

/// Live state of one `start()`..`stop()` run.
#[derive(Debug)]
pub struct LoopSession {
    config: LoopConfig,
    cancel: CancelHandle,
    state: Mutex<SessionState>,
}

impl LoopSession {
    fn new(config: LoopConfig) -> Self {
        Self {
            config,
            cancel: CancelHandle::new(),
            state: Mutex::new(SessionState {
                ledger: StatsLedger::new(Utc::now()),
                errors: ErrorState::default(),
                finalized: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Apply `f` to the ledger unless the session has been stopped.
    fn update<T>(&self, f: impl FnOnce(&mut StatsLedger) -> T) -> Result<T, SpinError> {
        let mut state = self.lock();
        if state.finalized || self.cancel.is_cancelled() {
            return Err(SpinError::Cancelled);
        }
        Ok(f(&mut state.ledger))
    }

    fn snapshot(&self) -> LedgerSnapshot {
        self.lock().ledger.snapshot()
    }

    fn finalize(&self) -> LedgerSnapshot {
        let mut state = self.lock();
        state.finalized = true;
        state.ledger.snapshot()
    }

    fn record_failure(&self, err: &SpinError) -> u32 {
        let mut state = self.lock();
        state.errors.consecutive += 1;
        state.errors.last = Some(err.to_string());
        state.errors.consecutive
    }

    fn record_success(&self) {
        self.lock().errors.consecutive = 0;
    }

    fn last_error(&self) -> Option<String> {
        self.lock().errors.last.clone()
    }

    fn limit_reached(&self) -> Option<StopReason> {
        let snap = self.snapshot();
        if self.config.max_iterations > 0 && snap.iterations >= self.config.max_iterations {
            return Some(StopReason::MaxIterations);
        }
        if self.config.stop_on_loss > 0
            && snap.start_balance > 0
            && snap.loss() >= self.config.stop_on_loss
        {
            return Some(StopReason::LossLimit);
        }
        None
    }
}

struct ControllerState {
    active: Option<Arc<LoopSession>>,
    last: Option<(LedgerSnapshot, StopReason, Option<String>)>,
    config: LoopConfig,
    task: Option<JoinHandle<()>>,
}

struct Inner {
    mode: GameMode,
    deps: Collaborators,
    state: Mutex<ControllerState>,
}

/// Drives one game mode's replay loop. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct LoopController {
    inner: Arc<Inner>,
}

impl LoopController {
    pub fn new(mode: GameMode, deps: Collaborators) -> Self {
        Self {
            inner: Arc::new(Inner {
                mode,
                deps,
                state: Mutex::new(ControllerState {
                    active: None,
                    last: None,
                    config: LoopConfig::default(),
                    task: None,
                }),
            }),
        }
    }

    #[must_use]
    pub fn mode(&self) -> GameMode {
        self.inner.mode
    }

    /// Begin a new session on the current tokio runtime.
    ///
    /// Starting while a session is active is a logged no-op that leaves the
    /// running ledger untouched.
    ///
    /// # Errors
    ///
    /// Returns [`LoopConfigError`] when `config` fails validation.
    pub fn start(&self, config: LoopConfig) -> Result<StartOutcome, LoopConfigError> {
        config.validate()?;
        let mode = self.inner.mode;
        let mut state = self.inner.lock();
        if state.active.is_some() {
            log::info!("[{mode}] already running; start ignored");
            return Ok(StartOutcome::AlreadyActive);
        }
        let session = Arc::new(LoopSession::new(config.clone()));
        state.active = Some(Arc::clone(&session));
        state.config = config.clone();
        state.last = None;
        drop(state);
        log::info!("[{mode}] session started");
        self.inner
            .deps
            .notifier
            .notify(SessionEvent::Started { mode, config });
        // A stop() issued from the notifier has already cancelled the session;
        // the spawned loop then exits on its first check.
        let task = tokio::spawn(run_loop(Arc::clone(&self.inner), session));
        self.inner.lock().task = Some(task);
        Ok(StartOutcome::Started)
    }

    /// Stop the active session and return its final ledger. Idempotent: with
    /// no active session this returns the last known snapshot and does nothing.
    pub fn stop(&self) -> LedgerSnapshot {
        let session = self.inner.lock().active.clone();
        match session {
            Some(session) => self
                .inner
                .stop_session(&session, StopReason::Requested)
                .unwrap_or_else(|| self.inner.last_snapshot()),
            None => self.inner.last_snapshot(),
        }
    }

    #[must_use]
    pub fn status(&self) -> LoopStatus {
        let state = self.inner.lock();
        match &state.active {
            Some(session) => LoopStatus {
                mode: self.inner.mode,
                is_active: true,
                ledger: session.snapshot(),
                config: state.config.clone(),
                last_error: session.last_error(),
                stop_reason: None,
            },
            None => {
                let (ledger, stop_reason, last_error) = match &state.last {
                    Some((ledger, reason, err)) => (ledger.clone(), Some(*reason), err.clone()),
                    None => (LedgerSnapshot::empty(Utc::now()), None, None),
                };
                LoopStatus {
                    mode: self.inner.mode,
                    is_active: false,
                    ledger,
                    config: state.config.clone(),
                    last_error,
                    stop_reason,
                }
            }
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.inner.lock().active.is_some()
    }

    /// Wait for the most recently spawned loop task to exit.
    pub async fn join(&self) {
        let task = self.inner.lock().task.take();
        if let Some(task) = task
            && let Err(err) = task.await
        {
            log::error!("[{}] loop task failed: {err}", self.inner.mode);
        }
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn last_snapshot(&self) -> LedgerSnapshot {
        self.lock()
            .last
            .as_ref()
            .map_or_else(|| LedgerSnapshot::empty(Utc::now()), |(l, _, _)| l.clone())
    }

    /// Finalize `session` if it is still the active one. `None` if another
    /// caller already stopped it.
    fn stop_session(&self, session: &Arc<LoopSession>, reason: StopReason) -> Option<LedgerSnapshot> {
        let mut state = self.lock();
        let is_current = state
            .active
            .as_ref()
            .is_some_and(|active| Arc::ptr_eq(active, session));
        if !is_current {
            return None;
        }
        state.active = None;
        session.cancel.cancel();
        let ledger = session.finalize();
        let last_error = session.last_error();
        state.last = Some((ledger.clone(), reason, last_error));
        drop(state);

        let mode = self.mode;
        log::info!(
            "[{mode}] {reason}: {} iterations, profit {}",
            ledger.iterations,
            ledger.profit()
        );
        if ledger.iterations > 0 {
            let record = HistoryRecord::from_snapshot(mode, reason, &ledger, Utc::now());
            if let Err(err) = self.deps.history.append(record) {
                log::warn!("[{mode}] could not save history: {err}");
            }
        }
        self.deps.notifier.notify(SessionEvent::Stopped {
            mode,
            reason,
            ledger: ledger.clone(),
        });
        Some(ledger)
    }
}

async fn run_loop(inner: Arc<Inner>, session: Arc<LoopSession>) {
    let mode = inner.mode;
    let signal = session.cancel.signal();
    loop {
        if signal.is_cancelled() {
            return;
        }
        if let Some(reason) = session.limit_reached() {
            inner.stop_session(&session, reason);
            return;
        }
        let result = match mode {
            GameMode::Slots => slots_iteration(&inner, &session, &signal).await,
            GameMode::Wheel => wheel_iteration(&inner, &session, &signal).await,
        };
        match result {
            Ok(()) => session.record_success(),
            Err(err) if !err.counts_toward_limit() => return,
            Err(err) => {
                let count = session.record_failure(&err);
                log::warn!("[{mode}] iteration failed ({count} in a row): {err}");
                inner.deps.notifier.notify(SessionEvent::Warning {
                    mode,
                    message: err.to_string(),
                    consecutive_errors: count,
                });
                if count >= session.config.max_consecutive_errors {
                    inner.stop_session(&session, StopReason::ConsecutiveErrors);
                    return;
                }
            }
        }
        let delay = session.config.next_delay();
        if signal.sleep(delay).await.is_err() {
            return;
        }
    }
}

async fn slots_iteration(
    inner: &Inner,
    session: &LoopSession,
    signal: &CancelSignal,
) -> Result<(), SpinError> {
    let mode = inner.mode;
    let deps = &inner.deps;
    let capture = deps
        .captures
        .current(mode.primary_class())
        .ok_or(SpinError::CaptureMissing(mode.primary_class()))?;
    let body = capture.body_with_id(&RequestIds::spin_id())?;
    let reply = dispatch(
        deps.executor.as_ref(),
        signal,
        &capture.url,
        &body,
        &capture.headers,
    )
    .await?;
    let spin = interpret_primary(reply)?;
    let iteration = session.update(|ledger| {
        ledger.record_primary(spin.balance, spin.win);
        ledger.iterations()
    })?;
    log::info!(
        "[{mode}] spin #{iteration}: win {}, balance {}",
        spin.win,
        spin.balance
    );
    if !spin.highlights.is_empty() {
        log::info!("[{mode}] features: {}", spin.highlights.features.join(", "));
    }
    log_side_features(&spin.body, iteration);

    let mut bonuses = Vec::new();
    if let Some(desc) = bonus::detect(&spin.body) {
        signal.check()?;
        let ctx = BonusContext {
            executor: deps.executor.as_ref(),
            captures: deps.captures.as_ref(),
            cancel: signal,
            config: &session.config,
            primary: &capture,
            primary_response: &spin.body,
        };
        if let Some(outcome) = bonus::play(&ctx, &desc).await {
            if outcome.ended_by == BonusEnd::Cancelled {
                return Err(SpinError::Cancelled);
            }
            session.update(|ledger| ledger.record_bonus(&outcome))?;
            deps.notifier.notify(SessionEvent::BonusPlayed {
                mode,
                outcome: outcome.clone(),
            });
            bonuses.push(outcome);
        }
    }

    signal.check()?;
    deps.notifier.notify(SessionEvent::Progress(ProgressReport {
        mode,
        iteration,
        last_win: spin.win,
        ledger: session.snapshot(),
        highlights: (!spin.highlights.is_empty()).then_some(spin.highlights),
        bonuses,
    }));
    Ok(())
}

async fn wheel_iteration(
    inner: &Inner,
    session: &LoopSession,
    signal: &CancelSignal,
) -> Result<(), SpinError> {
    let mode = inner.mode;
    let deps = &inner.deps;
    let capture = deps
        .captures
        .current(mode.primary_class())
        .ok_or(SpinError::CaptureMissing(mode.primary_class()))?;
    let body = capture.body_with_id_or_verbatim(&RequestIds::spin_id());
    let reply = dispatch(
        deps.executor.as_ref(),
        signal,
        &capture.url,
        &body,
        &capture.headers,
    )
    .await?;
    let progress = interpret_wheel(reply)?;
    let (iteration, previous_level) = session.update(|ledger| {
        let previous = ledger.snapshot().wheel.map_or(0, |w| w.level);
        ledger.record_wheel_spin(progress.clone());
        (ledger.iterations(), previous)
    })?;
    log::info!(
        "[{mode}] spin #{iteration}: wedge {}, bones {}, points {}/{} ({}%), level {}",
        progress.last_wedge,
        progress.bones,
        progress.points,
        progress.points_total,
        progress.progress_percent,
        progress.level
    );
    if let Some((old_level, new_level)) = progress.level_up_from(previous_level) {
        log::info!("[{mode}] level up {old_level} -> {new_level}");
        deps.notifier.notify(SessionEvent::LevelUp {
            mode,
            old_level,
            new_level,
        });
        match claim_level_reward(deps.executor.as_ref(), deps.captures.as_ref(), signal).await {
            Ok(true) => log::info!("[{mode}] level {new_level} reward claimed"),
            Ok(false) => log::debug!("[{mode}] no claim request captured"),
            Err(SpinError::Cancelled) => return Err(SpinError::Cancelled),
            Err(err) => log::warn!("[{mode}] reward claim failed: {err}"),
        }
    }
    signal.check()?;
    deps.notifier.notify(SessionEvent::Progress(ProgressReport {
        mode,
        iteration,
        last_win: 0,
        ledger: session.snapshot(),
        highlights: None,
        bonuses: Vec::new(),
    }));
    Ok(())
}
