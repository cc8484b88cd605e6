//! Captured request snapshots and the read-only store the loop pulls them from.

use std::collections::HashMap;
use std::fmt;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::DEFAULT_GAME_ID;
use crate::error::SpinError;

/// Which kind of outbound call a capture represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestClass {
    PrimarySpin,
    WheelSpin,
    WheelClaim,
    EventStream,
}

impl RequestClass {
    pub const ALL: [Self; 4] = [
        Self::PrimarySpin,
        Self::WheelSpin,
        Self::WheelClaim,
        Self::EventStream,
    ];

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::PrimarySpin => "primary_spin",
            Self::WheelSpin => "wheel_spin",
            Self::WheelClaim => "wheel_claim",
            Self::EventStream => "event_stream",
        }
    }

    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|class| class.key() == key)
    }
}

impl fmt::Display for RequestClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One header as observed on the wire; order is preserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Immutable snapshot of a legitimate request observed by the capture tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedRequest {
    pub url: String,
    #[serde(default)]
    pub body: String,
    #[serde(rename = "headersArray", alias = "headers", default)]
    pub headers: Vec<Header>,
    #[serde(rename = "tabId", default, skip_serializing_if = "Option::is_none")]
    pub captured_at_tab_id: Option<i64>,
    #[serde(rename = "timestamp", default, skip_serializing_if = "Option::is_none")]
    pub captured_at_ms: Option<i64>,
}

/// Session and game identifiers carried in the body's double-encoded `params`.
#[derive(Debug, Clone, PartialEq)]
pub struct SpinParams {
    pub session: String,
    pub game_id: Value,
    pub raw: Map<String, Value>,
}

impl CapturedRequest {
    pub fn new(url: impl Into<String>, body: impl Into<String>, headers: Vec<Header>) -> Self {
        Self {
            url: url.into(),
            body: body.into(),
            headers,
            captured_at_tab_id: None,
            captured_at_ms: None,
        }
    }

    fn body_object(&self) -> Result<Map<String, Value>, SpinError> {
        match serde_json::from_str::<Value>(&self.body) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(SpinError::MalformedCapture(
                "request body is not a JSON object".into(),
            )),
            Err(err) => Err(SpinError::MalformedCapture(format!(
                "request body is not JSON: {err}"
            ))),
        }
    }

    /// Decode `params` from the body. `gameId` falls back to the default table.
    ///
    /// # Errors
    ///
    /// Returns [`SpinError::MalformedCapture`] when the body or its `params`
    /// string is not a JSON object.
    pub fn spin_params(&self) -> Result<SpinParams, SpinError> {
        let body = self.body_object()?;
        let raw = match body.get("params") {
            Some(Value::String(encoded)) => match serde_json::from_str::<Value>(encoded) {
                Ok(Value::Object(map)) => map,
                _ => {
                    return Err(SpinError::MalformedCapture(
                        "params is not an encoded JSON object".into(),
                    ));
                }
            },
            Some(Value::Object(map)) => map.clone(),
            _ => return Err(SpinError::MalformedCapture("params is missing".into())),
        };
        let session = raw
            .get("session")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let game_id = raw
            .get("gameId")
            .filter(|v| crate::numbers::truthy(v))
            .cloned()
            .unwrap_or_else(|| Value::from(DEFAULT_GAME_ID));
        Ok(SpinParams {
            session,
            game_id,
            raw,
        })
    }

    /// Body re-serialized with a new top-level `id`.
    ///
    /// # Errors
    ///
    /// Returns [`SpinError::MalformedCapture`] when the body is not a JSON object.
    pub fn body_with_id(&self, id: &str) -> Result<String, SpinError> {
        let mut body = self.body_object()?;
        body.insert("id".into(), Value::String(id.to_string()));
        serde_json::to_string(&Value::Object(body))
            .map_err(|err| SpinError::MalformedCapture(err.to_string()))
    }

    /// Body with a fresh `id` when it is a JSON object, otherwise unchanged.
    #[must_use]
    pub fn body_with_id_or_verbatim(&self, id: &str) -> String {
        self.body_with_id(id).unwrap_or_else(|_| self.body.clone())
    }

    /// Headers with any `request_id` header replaced by `id`.
    #[must_use]
    pub fn headers_with_request_id(&self, id: &str) -> Vec<Header> {
        self.headers
            .iter()
            .map(|h| {
                if h.name.eq_ignore_ascii_case(crate::constants::REQUEST_ID_HEADER) {
                    Header::new(h.name.clone(), id)
                } else {
                    h.clone()
                }
            })
            .collect()
    }
}

/// Read-only access to the most recent capture per request class.
///
/// The loop calls [`CaptureStore::current`] at the start of every iteration and
/// never caches the result across iterations.
pub trait CaptureStore: Send + Sync {
    fn current(&self, class: RequestClass) -> Option<CapturedRequest>;
}

/// In-process store; the capture side publishes, the loop reads.
#[derive(Debug, Default)]
pub struct MemoryCaptureStore {
    entries: RwLock<HashMap<RequestClass, CapturedRequest>>,
}

impl MemoryCaptureStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Last-write-wins replacement of the capture for `class`.
    pub fn publish(&self, class: RequestClass, request: CapturedRequest) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(class, request);
        }
    }

    pub fn clear(&self, class: RequestClass) {
        if let Ok(mut entries) = self.entries.write() {
            entries.remove(&class);
        }
    }
}

impl CaptureStore for MemoryCaptureStore {
    fn current(&self, class: RequestClass) -> Option<CapturedRequest> {
        self.entries
            .read()
            .ok()
            .and_then(|entries| entries.get(&class).cloned())
    }
}
