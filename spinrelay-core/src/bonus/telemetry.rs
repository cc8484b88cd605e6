//! Advisory event-stream calls around bonus rounds. Failures are logged and
//! never stop a round from being played.

use serde_json::{Value, json};

use super::{BonusDescriptor, BonusKind};
use super::player::BonusContext;
use crate::capture::{CapturedRequest, Header, RequestClass};
use crate::constants::{
    BONUS_POPUP_ENTITY_ID, BONUS_POPUP_NAME, ENTITY_ACTION_SHOW_POPUP, ENTITY_ACTION_START_CLICKED,
    GAME_ACTION_SHOW_POPUP, GAME_ACTION_START_CLICKED, REQUEST_ID_HEADER, TELEMETRY_BACKOFF,
    TELEMETRY_POPUP_SETTLE, TELEMETRY_START_SETTLE,
};
use crate::error::SpinError;
use crate::numbers::first_positive_lenient;
use crate::retry::retry_with_backoff;
use crate::transport::{RequestIds, dispatch};

/// Identity fields the event stream expects alongside every game event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserInfo {
    pub session: String,
    pub user_id: i64,
    pub level_id: i64,
}

/// Session from the captured request; user and level from the spin response.
#[must_use]
pub fn extract_user_info(primary: &CapturedRequest, response: &Value) -> UserInfo {
    let session = primary
        .spin_params()
        .map(|p| p.session)
        .unwrap_or_default();
    let game_info = response.pointer("/result/gameInfo");
    let lookup = |paths: &[&str]| {
        game_info
            .map(|g| first_positive_lenient(paths.iter().map(|p| g.pointer(p))))
            .unwrap_or_default()
            .unwrap_or(0)
    };
    UserInfo {
        session,
        user_id: lookup(&["/uid", "/userId", "/player/uid", "/player/userId"]),
        level_id: lookup(&[
            "/levelId",
            "/level_id",
            "/level",
            "/player/level",
            "/player/levelId",
        ]),
    }
}

fn event_headers(event_capture: Option<&CapturedRequest>) -> Vec<Header> {
    let mut headers: Vec<Header> = event_capture
        .map(|c| c.headers.clone())
        .unwrap_or_default()
        .into_iter()
        .filter(|h| {
            !h.name.eq_ignore_ascii_case("content-type")
                && !h.name.eq_ignore_ascii_case(REQUEST_ID_HEADER)
        })
        .collect();
    headers.push(Header::new("content-type", "application/json"));
    headers.push(Header::new(REQUEST_ID_HEADER, RequestIds::header_token()));
    headers
}

fn game_event_body(
    ctx: &BonusContext<'_>,
    action: u32,
    user: &UserInfo,
    game_id: &Value,
    extra: Option<Value>,
) -> String {
    let telemetry = &ctx.config.telemetry;
    let mut payload = json!({
        "app_version": telemetry.app_version,
        "game_action_id": action,
        "game_id": game_id,
        "platform_id": telemetry.platform_id,
        "sid": user.session,
        "time_stamp": chrono::Utc::now().timestamp(),
        "type": "eventGame",
        "uid": user.user_id,
        "uuid": RequestIds::hex_uuid(),
    });
    if let (Some(extra), Some(map)) = (extra, payload.as_object_mut()) {
        map.insert("extra".into(), Value::String(format!("{extra}\n")));
    }
    format!("{payload}\n")
}

fn entity_impression_body(ctx: &BonusContext<'_>, action: u32, user: &UserInfo) -> String {
    let telemetry = &ctx.config.telemetry;
    let payload = json!({
        "action_id": action,
        "app_version": telemetry.app_version,
        "entity_id": BONUS_POPUP_ENTITY_ID,
        "extra": json!({ "name": BONUS_POPUP_NAME }).to_string(),
        "level_id": user.level_id,
        "platform_id": telemetry.platform_id,
        "sid": user.session,
        "time_stamp": chrono::Utc::now().timestamp(),
        "type": "eventEntityImpression",
        "uid": user.user_id,
        "uuid": RequestIds::hex_uuid(),
    });
    format!("{payload}\n")
}

/// Post one event, retrying transport failures. Only cancellation is
/// returned; anything else is logged.
async fn post_event(
    ctx: &BonusContext<'_>,
    url: &str,
    label: &str,
    build: impl Fn() -> String,
) -> Result<(), SpinError> {
    let event_capture = ctx.captures.current(RequestClass::EventStream);
    let result = retry_with_backoff(&TELEMETRY_BACKOFF, ctx.cancel, |_| {
        let body = build();
        let headers = event_headers(event_capture.as_ref());
        async move {
            dispatch(ctx.executor, ctx.cancel, url, &body, &headers)
                .await?
                .into_success()
                .map(|_| ())
        }
    })
    .await;
    match result {
        Err(SpinError::Cancelled) => Err(SpinError::Cancelled),
        Err(err) => {
            log::warn!("{label} failed: {err}");
            Ok(())
        }
        Ok(()) => {
            log::debug!("{label} sent");
            Ok(())
        }
    }
}

/// Endpoint to post to, or `None` when telemetry is off or nothing is known.
fn event_url(ctx: &BonusContext<'_>, kind: BonusKind) -> Option<String> {
    let telemetry = &ctx.config.telemetry;
    if !telemetry.enabled {
        return None;
    }
    let url = telemetry.url.clone().or_else(|| {
        ctx.captures
            .current(RequestClass::EventStream)
            .map(|c| c.url)
    });
    if url.is_none() {
        log::debug!("no event-stream endpoint known; skipping {kind} events");
    }
    url
}

/// "Show popup" then "start clicked" before a poll-family round.
///
/// Only cancellation is reported; everything else is logged.
pub(crate) async fn announce_round(
    ctx: &BonusContext<'_>,
    desc: &BonusDescriptor,
    game_id: &Value,
) -> Result<(), SpinError> {
    let Some(url) = event_url(ctx, desc.kind) else {
        return Ok(());
    };
    let user = extract_user_info(ctx.primary, ctx.primary_response);
    if user.session.is_empty() || user.user_id <= 0 {
        log::warn!(
            "missing user info for {} events (session present: {}, uid {}); playing anyway",
            desc.kind,
            !user.session.is_empty(),
            user.user_id
        );
        return Ok(());
    }
    let popup = format!("game event {GAME_ACTION_SHOW_POPUP}");
    post_event(ctx, &url, &popup, || {
        game_event_body(ctx, GAME_ACTION_SHOW_POPUP, &user, game_id, None)
    })
    .await?;
    ctx.cancel.sleep(TELEMETRY_POPUP_SETTLE).await?;
    let extra = json!({ "numSpins": desc.expected_spins });
    let start = format!("game event {GAME_ACTION_START_CLICKED}");
    post_event(ctx, &url, &start, || {
        game_event_body(ctx, GAME_ACTION_START_CLICKED, &user, game_id, Some(extra.clone()))
    })
    .await?;
    ctx.cancel.sleep(TELEMETRY_START_SETTLE).await
}

/// Bonus popup impressions ("shown" then "start clicked") before a free-spins
/// round. Needs session, user and level; skipped with a warning otherwise.
pub(crate) async fn announce_free_spins(ctx: &BonusContext<'_>) -> Result<(), SpinError> {
    let Some(url) = event_url(ctx, BonusKind::FreeSpins) else {
        return Ok(());
    };
    let user = extract_user_info(ctx.primary, ctx.primary_response);
    if user.session.is_empty() || user.user_id <= 0 || user.level_id <= 0 {
        log::warn!(
            "missing user info for free spins impressions (session present: {}, uid {}, level {}); playing anyway",
            !user.session.is_empty(),
            user.user_id,
            user.level_id
        );
        return Ok(());
    }
    let shown = format!("impression {ENTITY_ACTION_SHOW_POPUP}");
    post_event(ctx, &url, &shown, || {
        entity_impression_body(ctx, ENTITY_ACTION_SHOW_POPUP, &user)
    })
    .await?;
    ctx.cancel.sleep(TELEMETRY_POPUP_SETTLE).await?;
    let clicked = format!("impression {ENTITY_ACTION_START_CLICKED}");
    post_event(ctx, &url, &clicked, || {
        entity_impression_body(ctx, ENTITY_ACTION_START_CLICKED, &user)
    })
    .await?;
    ctx.cancel.sleep(TELEMETRY_START_SETTLE).await
}

/// Replay the captured event-stream request with a fresh `request_id`.
/// `Ok(false)` when nothing has been captured.
pub(crate) async fn replay_event_stream(ctx: &BonusContext<'_>) -> Result<bool, SpinError> {
    let Some(capture) = ctx.captures.current(RequestClass::EventStream) else {
        return Ok(false);
    };
    let body = if capture.body.is_empty() {
        "[]".to_string()
    } else {
        capture.body.clone()
    };
    let headers = capture.headers_with_request_id(&RequestIds::hex_uuid());
    match dispatch(ctx.executor, ctx.cancel, &capture.url, &body, &headers)
        .await?
        .into_success()
    {
        Ok(_) => log::debug!("event stream replayed"),
        Err(err) => log::warn!("event stream replay failed: {err}"),
    }
    Ok(true)
}
