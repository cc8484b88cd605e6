//! Boundary to whatever actually performs the HTTP call.
//!
//! The engine never talks to the network itself: it hands a URL, body and
//! header list to a [`RequestExecutor`] and reads back an [`ExecutorReply`].
//! Executors own credential attachment (page cookies, captured `Cookie`
//! header) and must return non-JSON bodies as a JSON string.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::cancel::CancelSignal;
use crate::capture::Header;
use crate::constants::{BROWSER_CONTROLLED_HEADERS, SPIN_ID_DIGITS};
use crate::error::SpinError;

/// Either a completed exchange (any status) or an execution failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExecutorReply {
    Failed {
        error: String,
    },
    Completed {
        status: u16,
        #[serde(default)]
        data: Value,
    },
}

impl ExecutorReply {
    pub fn ok(data: Value) -> Self {
        Self::Completed { status: 200, data }
    }

    /// The body of a 200 response.
    ///
    /// # Errors
    ///
    /// [`SpinError::Transport`] for a failed execution and
    /// [`SpinError::UpstreamRejected`] for any other status.
    pub fn into_success(self) -> Result<Value, SpinError> {
        match self {
            Self::Failed { error } => Err(SpinError::Transport(error)),
            Self::Completed { status: 200, data } => Ok(data),
            Self::Completed { status, .. } => Err(SpinError::rejected(status, "non-200 status")),
        }
    }
}

#[async_trait]
pub trait RequestExecutor: Send + Sync {
    /// POST `body` to `url` with `headers` from inside the authenticated
    /// context. Never panics on network failure; reports it as `Failed`.
    async fn execute(&self, url: &str, body: &str, headers: &[Header]) -> ExecutorReply;
}

/// Drop headers the browser sets itself.
#[must_use]
pub fn forwardable_headers(headers: &[Header]) -> Vec<Header> {
    headers
        .iter()
        .filter(|h| {
            let lower = h.name.to_ascii_lowercase();
            !BROWSER_CONTROLLED_HEADERS.contains(&lower.as_str())
        })
        .cloned()
        .collect()
}

/// Parse a response body, keeping non-JSON text as a string value.
#[must_use]
pub fn parse_body_text(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// Dispatch through `executor` under the session's cancellation signal.
///
/// # Errors
///
/// [`SpinError::Cancelled`] if the session stopped before dispatch or before
/// the reply could be used.
pub async fn dispatch(
    executor: &dyn RequestExecutor,
    cancel: &CancelSignal,
    url: &str,
    body: &str,
    headers: &[Header],
) -> Result<ExecutorReply, SpinError> {
    cancel.guard(executor.execute(url, body, headers)).await
}

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Generators for the identifiers the upstream insists are never reused.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestIds;

impl RequestIds {
    /// A 32-digit numeric string: millisecond clock, a process-wide sequence,
    /// then random digits.
    #[must_use]
    pub fn spin_id() -> String {
        let millis = chrono::Utc::now().timestamp_millis().max(0);
        let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed) % 1_000_000;
        let mut id = format!("{millis:013}{seq:06}");
        let mut rng = rand::thread_rng();
        while id.len() < SPIN_ID_DIGITS {
            let digit: u8 = rng.gen_range(0..10);
            id.push(char::from(b'0' + digit));
        }
        id.truncate(SPIN_ID_DIGITS);
        id
    }

    /// 32 lowercase hex characters (a dashless v4 uuid).
    #[must_use]
    pub fn hex_uuid() -> String {
        Uuid::new_v4().simple().to_string()
    }

    /// Random base-36 token for the `request_id` header.
    #[must_use]
    pub fn header_token() -> String {
        const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
        let mut rng = rand::thread_rng();
        (0..22)
            .map(|_| char::from(ALPHABET[rng.gen_range(0..ALPHABET.len())]))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn replies_deserialize_from_both_shapes() {
        let ok: ExecutorReply =
            serde_json::from_value(json!({ "status": 200, "data": { "a": 1 } })).unwrap();
        assert_eq!(ok, ExecutorReply::ok(json!({ "a": 1 })));
        let failed: ExecutorReply =
            serde_json::from_value(json!({ "status": 0, "error": "offline" })).unwrap();
        assert_eq!(
            failed,
            ExecutorReply::Failed {
                error: "offline".into()
            }
        );
    }

    #[test]
    fn into_success_maps_failures() {
        let rejected = ExecutorReply::Completed {
            status: 403,
            data: Value::Null,
        };
        assert!(matches!(
            rejected.into_success(),
            Err(SpinError::UpstreamRejected { status: 403, .. })
        ));
        let failed = ExecutorReply::Failed {
            error: "reset".into(),
        };
        assert_eq!(
            failed.into_success(),
            Err(SpinError::Transport("reset".into()))
        );
    }

    #[test]
    fn browser_controlled_headers_are_stripped() {
        let headers = vec![
            Header::new("Host", "games.example"),
            Header::new("Sec-Fetch-Mode", "cors"),
            Header::new("Authorization", "Bearer x"),
        ];
        let kept = forwardable_headers(&headers);
        assert_eq!(kept, vec![Header::new("Authorization", "Bearer x")]);
    }

    #[test]
    fn non_json_bodies_become_strings() {
        assert_eq!(parse_body_text("<html>"), json!("<html>"));
        assert_eq!(parse_body_text("{\"ok\":true}"), json!({ "ok": true }));
    }

    #[test]
    fn spin_ids_are_numeric_and_unique() {
        let ids: HashSet<String> = (0..500).map(|_| RequestIds::spin_id()).collect();
        assert_eq!(ids.len(), 500);
        assert!(ids.iter().all(|id| id.len() == SPIN_ID_DIGITS
            && id.chars().all(|c| c.is_ascii_digit())));
    }

    #[test]
    fn hex_uuid_shape() {
        let uuid = RequestIds::hex_uuid();
        assert_eq!(uuid.len(), 32);
        assert!(uuid.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(&uuid[12..13], "4");
        assert!(!RequestIds::header_token().is_empty());
    }
}
