#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use spinrelay_core::{
    CapturedRequest, Collaborators, ExecutorReply, GameMode, Header, LoopConfig, LoopController,
    MemoryCaptureStore, MemoryHistory, RequestClass, RequestExecutor, SessionEvent,
};
use tokio::sync::mpsc::{UnboundedReceiver, unbounded_channel};

pub const GAME_URL: &str = "https://game.test/api";
pub const WHEEL_URL: &str = "https://game.test/wheel";
pub const CLAIM_URL: &str = "https://game.test/wheel/claim";
pub const EVENTS_URL: &str = "https://events.test/stream";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Primary,
    BonusGame,
    PollSpin,
    Event,
    Wheel,
    Claim,
}

#[derive(Debug, Clone)]
pub struct Call {
    pub url: String,
    pub body: Value,
    pub headers: Vec<Header>,
}

impl Call {
    /// Decoded `params` of a command envelope.
    pub fn params(&self) -> Value {
        self.body["params"]
            .as_str()
            .and_then(|p| serde_json::from_str(p).ok())
            .unwrap_or(Value::Null)
    }

    pub fn route(&self) -> Route {
        if self.url == EVENTS_URL {
            return Route::Event;
        }
        if self.url == CLAIM_URL {
            return Route::Claim;
        }
        if self.url == WHEEL_URL {
            return Route::Wheel;
        }
        if self.body["cmd"] == "bonusGame" {
            return Route::BonusGame;
        }
        let params = self.params();
        let is_poll = ["isStartsSpin", "isJackpotSpin", "isMiniGame", "isBOJSpin"]
            .iter()
            .any(|flag| params[*flag] == true);
        if is_poll { Route::PollSpin } else { Route::Primary }
    }
}

/// Executor answering from per-route queues. The last reply of a queue
/// repeats once the others are used up.
#[derive(Default)]
pub struct ScriptedExecutor {
    calls: Mutex<Vec<Call>>,
    routes: Mutex<HashMap<Route, VecDeque<ExecutorReply>>>,
    latency: Option<Duration>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    pub fn script(self, route: Route, replies: Vec<ExecutorReply>) -> Self {
        self.routes.lock().unwrap().insert(route, replies.into());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, route: Route) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.route() == route)
            .collect()
    }
}

#[async_trait]
impl RequestExecutor for ScriptedExecutor {
    async fn execute(&self, url: &str, body: &str, headers: &[Header]) -> ExecutorReply {
        let call = Call {
            url: url.to_string(),
            body: serde_json::from_str(body).unwrap_or_else(|_| Value::String(body.into())),
            headers: headers.to_vec(),
        };
        let route = call.route();
        self.calls.lock().unwrap().push(call);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let mut routes = self.routes.lock().unwrap();
        routes
            .get_mut(&route)
            .and_then(|queue| {
                if queue.len() > 1 {
                    queue.pop_front()
                } else {
                    queue.front().cloned()
                }
            })
            .unwrap_or_else(|| ExecutorReply::Failed {
                error: format!("no reply scripted for {route:?}"),
            })
    }
}

pub fn primary_capture() -> CapturedRequest {
    let params = json!({ "session": "S1", "gameId": 204, "bet": 5_000 }).to_string();
    let body = json!({ "cmd": "spin", "id": "0", "params": params }).to_string();
    CapturedRequest::new(
        GAME_URL,
        body,
        vec![
            Header::new("Content-Type", "application/json"),
            Header::new("Cookie", "sid=abc"),
        ],
    )
}

pub fn capture_for(url: &str) -> CapturedRequest {
    CapturedRequest::new(url, json!({ "cmd": "wheel", "id": "0" }).to_string(), Vec::new())
}

/// Primary spin reply; `extra` fields are merged into `gameInfo`.
pub fn spin_reply(balance: i64, win: i64, extra: Value) -> ExecutorReply {
    let mut game_info = json!({
        "common": { "balance": balance },
        "wins": if win > 0 { json!([{ "win": win, "type": "line" }]) } else { json!([]) },
    });
    if let (Some(target), Some(fields)) = (game_info.as_object_mut(), extra.as_object()) {
        for (k, v) in fields {
            target.insert(k.clone(), v.clone());
        }
    }
    ExecutorReply::ok(json!({ "result": { "gameInfo": game_info } }))
}

pub fn bonus_reply(bonus_game_play: Value) -> ExecutorReply {
    ExecutorReply::ok(json!({ "result": { "gameInfo": { "bonusGamePlay": bonus_game_play } } }))
}

pub fn transport_error() -> ExecutorReply {
    ExecutorReply::Failed {
        error: "connection reset".into(),
    }
}

/// Zero delays so limit-driven tests finish in one pass of the paused clock.
pub fn fast_config() -> LoopConfig {
    LoopConfig {
        min_delay_ms: 0,
        max_delay_ms: 0,
        ..LoopConfig::default()
    }
}

pub struct Harness {
    pub executor: Arc<ScriptedExecutor>,
    pub captures: Arc<MemoryCaptureStore>,
    pub history: Arc<MemoryHistory>,
    pub events: UnboundedReceiver<SessionEvent>,
    pub controller: LoopController,
}

impl Harness {
    pub fn new(mode: GameMode, executor: ScriptedExecutor) -> Self {
        let executor = Arc::new(executor);
        let captures = Arc::new(MemoryCaptureStore::new());
        let history = Arc::new(MemoryHistory::new());
        let (tx, events) = unbounded_channel();
        let deps = Collaborators::new(executor.clone(), captures.clone())
            .with_history(history.clone())
            .with_notifier(Arc::new(tx));
        Self {
            executor,
            captures,
            history,
            events,
            controller: LoopController::new(mode, deps),
        }
    }

    pub fn slots(executor: ScriptedExecutor) -> Self {
        let harness = Self::new(GameMode::Slots, executor);
        harness
            .captures
            .publish(RequestClass::PrimarySpin, primary_capture());
        harness
    }

    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }
}
