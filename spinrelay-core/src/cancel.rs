//! Per-session cooperative cancellation.
//!
//! A [`CancelHandle`] is created by `start()` and tripped by `stop()`. Every
//! suspension point in the loop holds a [`CancelSignal`] and either races
//! against it (delays, in-flight requests) or checks it on resumption.

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;

use crate::error::SpinError;

/// Owning side of a session's abort signal.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

/// Observing side; cheap to clone into every awaitable.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelHandle {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    #[must_use]
    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Trip the signal. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelSignal {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// `Err(Cancelled)` once the session has been stopped.
    ///
    /// # Errors
    ///
    /// Returns [`SpinError::Cancelled`] if the signal has tripped.
    pub fn check(&self) -> Result<(), SpinError> {
        if self.is_cancelled() {
            Err(SpinError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolves when the signal trips. A dropped handle counts as tripped:
    /// its session no longer exists.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Sleep that wakes early when the session stops.
    ///
    /// # Errors
    ///
    /// Returns [`SpinError::Cancelled`] when interrupted or already cancelled.
    pub async fn sleep(&self, duration: Duration) -> Result<(), SpinError> {
        self.check()?;
        tokio::select! {
            biased;
            () = self.cancelled() => Err(SpinError::Cancelled),
            () = tokio::time::sleep(duration) => self.check(),
        }
    }

    /// Run `fut` only if not yet cancelled, abandon it if cancellation
    /// arrives mid-flight, and discard its output if cancellation arrived
    /// while it was resolving.
    ///
    /// # Errors
    ///
    /// Returns [`SpinError::Cancelled`] at any of the three checkpoints.
    pub async fn guard<F>(&self, fut: F) -> Result<F::Output, SpinError>
    where
        F: Future,
    {
        self.check()?;
        let output = tokio::select! {
            biased;
            () = self.cancelled() => return Err(SpinError::Cancelled),
            out = fut => out,
        };
        self.check()?;
        Ok(output)
    }
}
