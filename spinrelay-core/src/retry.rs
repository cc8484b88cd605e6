use std::future::Future;
use std::time::Duration;

use crate::cancel::CancelSignal;
use crate::error::SpinError;

/// Run `op` up to `schedule.len() + 1` times, waiting `schedule[n]` after the
/// n-th failure. Waits are cancellable and `Cancelled` is never retried.
///
/// `op` receives the zero-based attempt number.
///
/// # Errors
///
/// The last failure once every attempt is spent, or [`SpinError::Cancelled`].
pub async fn retry_with_backoff<T, F, Fut>(
    schedule: &[Duration],
    cancel: &CancelSignal,
    mut op: F,
) -> Result<T, SpinError>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, SpinError>>,
{
    let mut attempt = 0;
    loop {
        cancel.check()?;
        let err = match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(SpinError::Cancelled) => return Err(SpinError::Cancelled),
            Err(err) => err,
        };
        let Some(wait) = schedule.get(attempt) else {
            return Err(err);
        };
        log::debug!("attempt {} failed ({err}); retrying in {wait:?}", attempt + 1);
        cancel.sleep(*wait).await?;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelHandle;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SCHEDULE: [Duration; 2] = [Duration::from_millis(100), Duration::from_millis(200)];

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let handle = CancelHandle::new();
        let result = retry_with_backoff(&SCHEDULE, &handle.signal(), |attempt| async move {
            if attempt < 2 {
                Err(SpinError::Transport("flaky".into()))
            } else {
                Ok(attempt)
            }
        })
        .await;
        assert_eq!(result, Ok(2));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_schedule_plus_one_attempts() {
        let handle = CancelHandle::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let result: Result<(), _> = retry_with_backoff(&SCHEDULE, &handle.signal(), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(SpinError::rejected(500, "down")) }
        })
        .await;
        assert!(matches!(result, Err(SpinError::UpstreamRejected { status: 500, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_is_not_retried() {
        let handle = CancelHandle::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let result: Result<(), _> = retry_with_backoff(&SCHEDULE, &handle.signal(), move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Err(SpinError::Cancelled) }
        })
        .await;
        assert_eq!(result, Err(SpinError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
