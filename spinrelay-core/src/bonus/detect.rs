use serde_json::{Map, Value, json};

use super::{BonusDescriptor, BonusKind};
use crate::constants::{DEFAULT_FREE_SPINS, DEFAULT_POLL_BONUS_SPINS};
use crate::numbers::{first_positive_lenient, lenient_int, to_count, token_string, truthy};

type GameInfo = Map<String, Value>;
type Matcher = fn(&GameInfo) -> Option<BonusDescriptor>;

/// Tried in order; the first match wins.
const MATCHERS: [Matcher; 6] = [
    match_starts,
    match_jackpot,
    match_mini_game,
    match_boj,
    match_free_spins,
    match_legacy,
];

/// Find the bonus trigger in a primary response body (`{result:{gameInfo}}`).
#[must_use]
pub fn detect(body: &Value) -> Option<BonusDescriptor> {
    let game_info = body.pointer("/result/gameInfo")?.as_object()?;
    MATCHERS.iter().find_map(|matcher| matcher(game_info))
}

/// A fresh free-spins bonus nested in a sub-spin response.
///
/// Looks at `gameInfo.bonus` then `gameInfo.bonusGamePlay.bonus`; a token equal
/// to `active_token` is the round already being played, not a new one.
#[must_use]
pub fn find_chained(body: &Value, active_token: &str) -> Option<BonusDescriptor> {
    let game_info = body.pointer("/result/gameInfo")?;
    [
        game_info.get("bonus"),
        game_info.pointer("/bonusGamePlay/bonus"),
    ]
    .into_iter()
    .flatten()
    .filter_map(Value::as_object)
    .filter_map(free_spins_descriptor)
    .find(|desc| desc.token.as_deref().is_some_and(|t| t != active_token))
}

fn first_token(obj: &GameInfo, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| truthy(v))
        .and_then(token_string)
}

fn spins_or(obj: &GameInfo, keys: &[&str], fallback: u32) -> u32 {
    first_positive_lenient(keys.iter().map(|k| obj.get(*k))).map_or(fallback, to_count)
}

fn match_starts(game_info: &GameInfo) -> Option<BonusDescriptor> {
    let starts = game_info.get("starts").and_then(lenient_int)?;
    if starts <= 0 {
        return None;
    }
    Some(BonusDescriptor {
        kind: BonusKind::Starts,
        expected_spins: to_count(starts),
        token: first_token(game_info, &["startsToken", "token"]),
        payload: game_info
            .get("startsData")
            .filter(|v| truthy(v))
            .cloned()
            .unwrap_or_else(|| json!({})),
    })
}

fn match_jackpot(game_info: &GameInfo) -> Option<BonusDescriptor> {
    let jackpot = game_info
        .get("jackpots")?
        .as_array()?
        .iter()
        .filter_map(Value::as_object)
        .find(|j| {
            j.get("active").is_some_and(truthy) || j.get("triggered").is_some_and(truthy)
        })?;
    Some(BonusDescriptor {
        kind: BonusKind::Jackpot,
        expected_spins: spins_or(jackpot, &["spins", "count"], DEFAULT_POLL_BONUS_SPINS),
        token: first_token(jackpot, &["token", "id"]),
        payload: Value::Object(jackpot.clone()),
    })
}

fn match_mini_game(game_info: &GameInfo) -> Option<BonusDescriptor> {
    let mini = game_info.get("miniGame")?.as_object()?;
    if !mini.get("active").is_some_and(truthy) {
        return None;
    }
    Some(BonusDescriptor {
        kind: BonusKind::MiniGame,
        expected_spins: spins_or(mini, &["spins", "spinsRemaining"], DEFAULT_POLL_BONUS_SPINS),
        token: first_token(mini, &["token", "id"]),
        payload: Value::Object(mini.clone()),
    })
}

fn match_boj(game_info: &GameInfo) -> Option<BonusDescriptor> {
    let boj = ["boj", "bankOfJustice"]
        .iter()
        .filter_map(|k| game_info.get(*k))
        .find(|v| truthy(v))?;
    let empty = Map::new();
    let fields = boj.as_object().unwrap_or(&empty);
    Some(BonusDescriptor {
        kind: BonusKind::Boj,
        expected_spins: spins_or(fields, &["spins"], DEFAULT_POLL_BONUS_SPINS),
        token: first_token(fields, &["token"]),
        payload: boj.clone(),
    })
}

fn free_spins_descriptor(bonus: &GameInfo) -> Option<BonusDescriptor> {
    if bonus.get("type").and_then(Value::as_str) != Some("freeSpins") {
        return None;
    }
    let spins = bonus
        .get("init")
        .and_then(|init| init.get("spinsAmount"))
        .and_then(lenient_int)
        .filter(|n| *n > 0)
        .map_or(DEFAULT_FREE_SPINS, to_count);
    Some(BonusDescriptor {
        kind: BonusKind::FreeSpins,
        expected_spins: spins,
        token: first_token(bonus, &["bonusToken"]),
        payload: Value::Object(bonus.clone()),
    })
}

fn match_free_spins(game_info: &GameInfo) -> Option<BonusDescriptor> {
    free_spins_descriptor(game_info.get("bonus")?.as_object()?)
}

fn match_legacy(game_info: &GameInfo) -> Option<BonusDescriptor> {
    let play = game_info.get("bonusGamePlay")?.as_object()?;
    let token = first_token(play, &["bonusToken"])?;
    Some(BonusDescriptor {
        kind: BonusKind::Legacy,
        expected_spins: spins_or(play, &["spinsAmount"], 0),
        token: Some(token),
        payload: Value::Object(play.clone()),
    })
}
