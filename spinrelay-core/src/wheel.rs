//! Secondary wheel game: progress tracking and level-reward claims.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cancel::CancelSignal;
use crate::capture::{CaptureStore, RequestClass};
use crate::constants::{DEFAULT_WHEEL_POINTS_TOTAL, MILESTONE_PENDING, WHEEL_CLAIM_BACKOFF};
use crate::error::SpinError;
use crate::numbers::{amount, truthy};
use crate::retry::retry_with_backoff;
use crate::transport::{ExecutorReply, RequestExecutor, RequestIds, dispatch};

/// Where the wheel stands after the latest spin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WheelProgress {
    pub bones: i64,
    pub points: i64,
    pub points_total: i64,
    pub level: i64,
    pub progress_percent: i64,
    pub last_wedge: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_milestone: Option<Value>,
}

impl WheelProgress {
    /// `(old, new)` when this spin moved the wheel to a higher level.
    #[must_use]
    pub fn level_up_from(&self, previous_level: i64) -> Option<(i64, i64)> {
        (previous_level > 0 && self.level > previous_level).then_some((previous_level, self.level))
    }
}

/// Read a wheel spin reply.
///
/// # Errors
///
/// [`SpinError::Transport`] for a failed execution and
/// [`SpinError::UpstreamRejected`] for a non-200 status or an empty body.
pub fn interpret_wheel(reply: ExecutorReply) -> Result<WheelProgress, SpinError> {
    let data = reply.into_success()?;
    if !truthy(&data) {
        return Err(SpinError::rejected(200, "empty wheel response"));
    }
    let read = |path: &str| data.pointer(path).and_then(amount).filter(|v| *v != 0);
    let points = read("/progressBar/points/current").unwrap_or(0);
    let points_total = read("/progressBar/points/total").unwrap_or(DEFAULT_WHEEL_POINTS_TOTAL);
    let progress_percent = if points_total > 0 {
        points.saturating_mul(100) / points_total
    } else {
        0
    };
    let next_milestone = data
        .pointer("/progressBar/milestones")
        .and_then(Value::as_array)
        .and_then(|list| {
            list.iter()
                .find(|m| m.get("status").and_then(Value::as_str) == Some(MILESTONE_PENDING))
        })
        .cloned();
    Ok(WheelProgress {
        bones: read("/wheel/boneAmount").unwrap_or(0),
        points,
        points_total,
        level: read("/version").unwrap_or(0),
        progress_percent,
        last_wedge: read("/wonWedgeNumber").unwrap_or(0),
        next_milestone,
    })
}

/// Replay the captured level-reward claim, retrying on the fixed schedule.
///
/// `Ok(false)` when no claim request has been captured.
///
/// # Errors
///
/// The last failure after every retry, or [`SpinError::Cancelled`].
pub async fn claim_level_reward(
    executor: &dyn RequestExecutor,
    captures: &dyn CaptureStore,
    cancel: &CancelSignal,
) -> Result<bool, SpinError> {
    let Some(claim) = captures.current(RequestClass::WheelClaim) else {
        return Ok(false);
    };
    retry_with_backoff(&WHEEL_CLAIM_BACKOFF, cancel, |attempt| {
        let body = claim.body_with_id_or_verbatim(&RequestIds::spin_id());
        let headers = claim.headers_with_request_id(&RequestIds::header_token());
        let url = claim.url.as_str();
        async move {
            log::debug!("claiming wheel reward (attempt {})", attempt + 1);
            dispatch(executor, cancel, url, &body, &headers)
                .await?
                .into_success()
        }
    })
    .await?;
    Ok(true)
}
