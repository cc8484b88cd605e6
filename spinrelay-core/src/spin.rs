//! Reading primary spin responses.

use num_traits::cast::cast;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::JACKPOT_LOG_INTERVAL;
use crate::error::SpinError;
use crate::numbers::{amount, truthy};
use crate::transport::ExecutorReply;

const PLAIN_WIN_TYPES: [&str; 4] = ["line", "scatter", "bonus", "freespins"];

/// Win features spotted on one primary spin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpinHighlights {
    pub free_spins_awarded: i64,
    pub scatter_win: i64,
    pub bonus_game: bool,
    pub features: Vec<String>,
}

impl SpinHighlights {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// A successful primary spin.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimaryOutcome {
    pub balance: i64,
    pub win: i64,
    pub highlights: SpinHighlights,
    /// Full response body, kept for bonus detection and user-info lookup.
    pub body: Value,
}

/// Turn a primary spin reply into balance, win and highlights.
///
/// # Errors
///
/// [`SpinError::Transport`] for a failed execution, and
/// [`SpinError::UpstreamRejected`] for a non-200 status or a body without a
/// `result` object.
pub fn interpret_primary(reply: ExecutorReply) -> Result<PrimaryOutcome, SpinError> {
    let body = reply.into_success()?;
    if !body.get("result").is_some_and(Value::is_object) {
        return Err(SpinError::rejected(200, "response has no result object"));
    }
    let game_info = body.pointer("/result/gameInfo");
    let balance = game_info
        .and_then(|g| g.pointer("/common/balance"))
        .and_then(amount)
        .unwrap_or(0);
    let wins: &[Value] = game_info
        .and_then(|g| g.get("wins"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let win = wins
        .iter()
        .filter_map(|w| w.get("win").and_then(amount))
        .fold(0, i64::saturating_add);
    let highlights = analyze_wins(wins);
    Ok(PrimaryOutcome {
        balance,
        win,
        highlights,
        body,
    })
}

fn analyze_wins(wins: &[Value]) -> SpinHighlights {
    let mut out = SpinHighlights::default();
    for entry in wins {
        let kind = entry.get("type").and_then(Value::as_str);
        let value = entry.get("win").and_then(amount).unwrap_or(0);
        let free = ["freeSpins", "freespins"]
            .iter()
            .filter_map(|k| entry.get(*k))
            .find(|v| truthy(v));
        if free.is_some() || kind == Some("freespins") {
            let awarded = free.and_then(amount).unwrap_or(0);
            out.free_spins_awarded = out.free_spins_awarded.saturating_add(awarded);
            out.features.push(format!("{awarded} free spins"));
        }
        if kind == Some("scatter") || entry.get("scatter").is_some_and(truthy) {
            out.scatter_win = out.scatter_win.saturating_add(value);
            out.features.push(format!("scatter win {value}"));
        }
        if kind == Some("bonus")
            || entry.get("bonusGame").is_some_and(truthy)
            || entry.get("bonus").is_some_and(truthy)
        {
            out.bonus_game = true;
            out.features.push("bonus game triggered".to_string());
        }
        if let Some(kind) = kind.filter(|k| !k.is_empty() && !PLAIN_WIN_TYPES.contains(k)) {
            out.features.push(format!("special: {kind}"));
        }
    }
    out
}

/// Log pots that are accumulating and, every few spins, star jackpot balances.
pub(crate) fn log_side_features(body: &Value, iteration: u64) {
    let Some(game_info) = body.pointer("/result/gameInfo") else {
        return;
    };
    if let Some(pots) = game_info.get("pots").and_then(Value::as_array) {
        let summary: Vec<String> = pots
            .iter()
            .filter_map(|pot| {
                let total = pot.get("total").and_then(amount).filter(|t| *t > 0)?;
                let collected = pot.get("collected").and_then(amount).unwrap_or(0);
                let id = pot.get("id").map_or_else(String::new, Value::to_string);
                let status = if collected >= total {
                    "full".to_string()
                } else {
                    format!("{}%", collected.saturating_mul(100) / total)
                };
                Some(format!("pot#{id}: {collected}/{total} [{status}]"))
            })
            .collect();
        if !summary.is_empty() {
            log::debug!("pots: {}", summary.join(", "));
        }
    }
    if iteration % JACKPOT_LOG_INTERVAL != 0 {
        return;
    }
    if let Some(jackpots) = game_info.get("jackpots").and_then(Value::as_array) {
        let stars: Vec<String> = jackpots
            .iter()
            .filter_map(|j| {
                let name = j.get("type")?.as_str()?.strip_prefix("star_")?;
                let balance = j.get("balance").and_then(amount).unwrap_or(0);
                let millions = cast::<i64, f64>(balance).unwrap_or(0.0) / 1e6;
                Some(format!("{}: {millions:.1}M", name.to_uppercase()))
            })
            .collect();
        if !stars.is_empty() {
            log::info!("star jackpots: {}", stars.join(", "));
        }
    }
}
