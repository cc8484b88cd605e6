use std::time::Duration;

use serde_json::{Map, Value, json};

use super::detect::find_chained;
use super::telemetry::{announce_free_spins, announce_round, replay_event_stream};
use super::{BonusDescriptor, BonusEnd, BonusKind, BonusOutcome};
use crate::cancel::CancelSignal;
use crate::capture::{CaptureStore, CapturedRequest, SpinParams};
use crate::config::LoopConfig;
use crate::constants::{EVENT_REPLAY_SETTLE, MAX_SUB_SPINS_PER_BONUS};
use crate::error::SpinError;
use crate::numbers::{amount, first_nonzero};
use crate::transport::{RequestExecutor, RequestIds, dispatch};

/// Everything a bonus round borrows from the iteration that triggered it.
#[derive(Clone, Copy)]
pub struct BonusContext<'a> {
    pub executor: &'a dyn RequestExecutor,
    pub captures: &'a dyn CaptureStore,
    pub cancel: &'a CancelSignal,
    pub config: &'a LoopConfig,
    /// Capture whose session, url and headers the sub-spins reuse.
    pub primary: &'a CapturedRequest,
    /// Response that carried the trigger.
    pub primary_response: &'a Value,
}

/// Play a detected bonus to exhaustion.
///
/// Returns `None` without touching the network when the descriptor has no
/// token or no spins.
pub async fn play(ctx: &BonusContext<'_>, desc: &BonusDescriptor) -> Option<BonusOutcome> {
    let Some(token) = desc.token.clone().filter(|_| desc.is_playable()) else {
        log::warn!(
            "{} bonus not playable (spins {}, token present: {})",
            desc.kind,
            desc.expected_spins,
            desc.token.is_some()
        );
        return None;
    };
    log::info!("{} bonus triggered: {} spins", desc.kind, desc.expected_spins);
    let params = match ctx.primary.spin_params() {
        Ok(params) => params,
        Err(err) => {
            log::warn!("cannot play {} bonus: {err}", desc.kind);
            return Some(BonusOutcome {
                ended_by: BonusEnd::Protocol,
                ..BonusOutcome::empty(desc.kind)
            });
        }
    };
    let outcome = if desc.kind.chains_tokens() {
        play_chain(ctx, desc.kind, token, &params).await
    } else {
        play_poll(ctx, desc, token, &params).await
    };
    log::info!(
        "{} bonus finished ({:?}): {} spins, won {}, {} chained",
        outcome.kind,
        outcome.ended_by,
        outcome.spins_played,
        outcome.total_win,
        outcome.chain_switches
    );
    Some(outcome)
}

fn end_for(err: &SpinError) -> BonusEnd {
    match err {
        SpinError::Cancelled => BonusEnd::Cancelled,
        SpinError::Transport(_) => BonusEnd::Transport,
        SpinError::UpstreamRejected { .. } => BonusEnd::Rejected,
        SpinError::CaptureMissing(_)
        | SpinError::MalformedCapture(_)
        | SpinError::BonusProtocol(_) => BonusEnd::Protocol,
    }
}

async fn send(ctx: &BonusContext<'_>, body: &str) -> Result<Value, SpinError> {
    dispatch(
        ctx.executor,
        ctx.cancel,
        &ctx.primary.url,
        body,
        &ctx.primary.headers,
    )
    .await?
    .into_success()
}

/// The object at `pointer`, or a protocol error naming what was missing.
fn section<'a>(data: &'a Value, pointer: &str) -> Result<&'a Value, SpinError> {
    data.pointer(pointer)
        .filter(|v| v.is_object())
        .ok_or_else(|| SpinError::BonusProtocol(format!("response has no {pointer}")))
}

fn envelope(cmd: &str, params: &Map<String, Value>) -> String {
    json!({
        "cmd": cmd,
        "id": RequestIds::spin_id(),
        "params": Value::Object(params.clone()).to_string(),
    })
    .to_string()
}

pub(crate) fn chain_body(token: &str, params: &SpinParams) -> String {
    let mut inner = Map::new();
    inner.insert("bonusToken".into(), Value::String(token.to_string()));
    inner.insert("gameId".into(), params.game_id.clone());
    inner.insert("session".into(), Value::String(params.session.clone()));
    envelope("bonusGame", &inner)
}

pub(crate) fn poll_body(kind: BonusKind, token: &str, params: &SpinParams) -> String {
    let mut inner = params.raw.clone();
    inner.insert("session".into(), Value::String(params.session.clone()));
    inner.insert("gameId".into(), params.game_id.clone());
    if let Some((token_field, flag)) = kind.poll_fields() {
        inner.insert(token_field.into(), Value::String(token.to_string()));
        inner.insert(flag.into(), Value::Bool(true));
    }
    envelope("spin", &inner)
}

/// Wait between sub-spins; `false` means the session stopped.
async fn pause(ctx: &BonusContext<'_>, delay: Duration) -> bool {
    ctx.cancel.sleep(delay).await.is_ok()
}

async fn play_chain(
    ctx: &BonusContext<'_>,
    kind: BonusKind,
    token: String,
    params: &SpinParams,
) -> BonusOutcome {
    let mut outcome = BonusOutcome::empty(kind);
    if kind == BonusKind::FreeSpins && announce_free_spins(ctx).await.is_err() {
        outcome.ended_by = BonusEnd::Cancelled;
        return outcome;
    }
    let legacy = kind == BonusKind::Legacy;
    if legacy {
        let settled = match replay_event_stream(ctx).await {
            Ok(true) => pause(ctx, EVENT_REPLAY_SETTLE).await,
            Ok(false) => true,
            Err(_) => false,
        };
        if !settled {
            outcome.ended_by = BonusEnd::Cancelled;
            return outcome;
        }
    }
    let mut active = token;
    loop {
        if outcome.spins_played >= MAX_SUB_SPINS_PER_BONUS {
            log::warn!("{kind} bonus never reported exhaustion; giving up");
            outcome.ended_by = BonusEnd::Protocol;
            break;
        }
        let data = match send(ctx, &chain_body(&active, params)).await {
            Ok(data) => data,
            Err(err) => {
                log::warn!("{kind} sub-spin failed: {err}");
                outcome.ended_by = end_for(&err);
                break;
            }
        };
        let play = match section(&data, "/result/gameInfo/bonusGamePlay") {
            Ok(play) => play,
            Err(err) => {
                log::warn!("{kind} sub-spin ended the round: {err}");
                outcome.ended_by = end_for(&err);
                break;
            }
        };
        let win = play
            .get("bonusWin")
            .and_then(amount)
            .or_else(|| play.get("totalWin").and_then(amount))
            .unwrap_or(0);
        outcome.total_win = outcome.total_win.saturating_add(win);
        outcome.spins_played += 1;

        if let Some(next) = find_chained(&data, &active).and_then(|d| d.token) {
            log::info!("{kind} bonus chained into a new round ({} so far)", outcome.spins_played);
            active = next;
            outcome.chain_switches += 1;
            continue;
        }
        let countdown = play.get("spinsCountdown").and_then(amount).unwrap_or(0);
        log::debug!(
            "{kind} sub-spin {}: won {win}, {countdown} left",
            outcome.spins_played
        );
        if countdown <= 0 {
            outcome.ended_by = BonusEnd::Exhausted;
            break;
        }
        if !pause(ctx, ctx.config.bonus_delay()).await {
            outcome.ended_by = BonusEnd::Cancelled;
            break;
        }
    }
    if legacy && outcome.ended_by != BonusEnd::Cancelled {
        let _ = replay_event_stream(ctx).await;
    }
    outcome
}

async fn play_poll(
    ctx: &BonusContext<'_>,
    desc: &BonusDescriptor,
    token: String,
    params: &SpinParams,
) -> BonusOutcome {
    let kind = desc.kind;
    let mut outcome = BonusOutcome::empty(kind);
    if announce_round(ctx, desc, &params.game_id).await.is_err() {
        outcome.ended_by = BonusEnd::Cancelled;
        return outcome;
    }
    let mut remaining = i64::from(desc.expected_spins);
    let delay = Duration::from_millis(ctx.config.mini_game_delay_ms);
    while remaining > 0 {
        if outcome.spins_played >= MAX_SUB_SPINS_PER_BONUS {
            log::warn!("{kind} bonus never reported exhaustion; giving up");
            outcome.ended_by = BonusEnd::Protocol;
            return outcome;
        }
        let data = match send(ctx, &poll_body(kind, &token, params)).await {
            Ok(data) => data,
            Err(err) => {
                log::warn!("{kind} sub-spin failed: {err}");
                outcome.ended_by = end_for(&err);
                return outcome;
            }
        };
        let game_info = match section(&data, "/result/gameInfo") {
            Ok(game_info) => game_info,
            Err(err) => {
                log::warn!("{kind} sub-spin ended the round: {err}");
                outcome.ended_by = end_for(&err);
                return outcome;
            }
        };
        let win = first_nonzero(
            ["miniGameWin", "startsWin", "jackpotWin", "totalWin", "win"]
                .iter()
                .map(|k| game_info.get(*k)),
        )
        .unwrap_or(0);
        outcome.total_win = outcome.total_win.saturating_add(win);
        outcome.spins_played += 1;
        remaining = first_nonzero(
            ["miniGameSpinsRemaining", "startsRemaining", "spinsRemaining"]
                .iter()
                .map(|k| game_info.get(*k)),
        )
        .unwrap_or(remaining - 1);
        log::debug!(
            "{kind} sub-spin {}: won {win}, {remaining} left",
            outcome.spins_played
        );
        if remaining > 0 && !pause(ctx, delay).await {
            outcome.ended_by = BonusEnd::Cancelled;
            return outcome;
        }
    }
    outcome.ended_by = BonusEnd::Exhausted;
    outcome
}
