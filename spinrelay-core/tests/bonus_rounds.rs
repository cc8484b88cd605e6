mod common;

use common::*;
use serde_json::json;
use spinrelay_core::{
    BonusCategory, BonusEnd, BonusKind, BonusOutcome, CapturedRequest, Header, LoopConfig,
    RequestClass, SessionEvent, TelemetryConfig,
};

fn once() -> LoopConfig {
    LoopConfig {
        max_iterations: 1,
        ..fast_config()
    }
}

fn free_spins_trigger(token: &str) -> serde_json::Value {
    json!({ "bonus": { "type": "freeSpins", "bonusToken": token, "init": { "spinsAmount": 10 } } })
}

fn played(h: &mut Harness) -> Vec<BonusOutcome> {
    h.drain_events()
        .into_iter()
        .filter_map(|e| match e {
            SessionEvent::BonusPlayed { outcome, .. } => Some(outcome),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn free_spins_play_until_the_countdown_runs_out() {
    let executor = ScriptedExecutor::new()
        .script(Route::Primary, vec![spin_reply(1_000, 0, free_spins_trigger("A"))])
        .script(
            Route::BonusGame,
            vec![
                bonus_reply(json!({ "bonusWin": 50, "spinsCountdown": 2 })),
                bonus_reply(json!({ "bonusWin": 30, "spinsCountdown": 0 })),
            ],
        );
    let mut h = Harness::slots(executor);
    h.controller.start(once()).unwrap();
    h.controller.join().await;

    let outcomes = played(&mut h);
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].spins_played, 2);
    assert_eq!(outcomes[0].total_win, 80);
    assert_eq!(outcomes[0].ended_by, BonusEnd::Exhausted);

    let stats = h.controller.status().ledger.category(BonusCategory::FreeSpins);
    assert_eq!(stats.trigger_count, 1);
    assert_eq!(stats.sub_spins_played, 2);
    assert_eq!(stats.win_amount, 80);
    // Bonus wins are a breakdown only.
    assert_eq!(h.controller.status().ledger.total_win_amount, 0);

    let sub_spins = h.executor.calls_to(Route::BonusGame);
    assert_eq!(sub_spins.len(), 2);
    assert_eq!(
        sub_spins[0].params(),
        json!({ "bonusToken": "A", "gameId": 204, "session": "S1" })
    );
    assert_ne!(sub_spins[0].body["id"], sub_spins[1].body["id"]);
    assert_eq!(sub_spins[0].headers, primary_capture().headers);
}

#[tokio::test(start_paused = true)]
async fn chained_bonus_wins_over_the_countdown() {
    let chain = json!({
        "bonusWin": 10,
        "spinsCountdown": 0,
        "bonus": { "type": "freeSpins", "bonusToken": "B", "init": { "spinsAmount": 20 } }
    });
    let executor = ScriptedExecutor::new()
        .script(Route::Primary, vec![spin_reply(1_000, 0, free_spins_trigger("A"))])
        .script(
            Route::BonusGame,
            vec![
                bonus_reply(json!({ "bonusWin": 5, "spinsCountdown": 4 })),
                bonus_reply(chain),
                bonus_reply(json!({ "bonusWin": 20, "spinsCountdown": 0 })),
            ],
        );
    let mut h = Harness::slots(executor);
    h.controller.start(once()).unwrap();
    h.controller.join().await;

    let outcome = &played(&mut h)[0];
    assert_eq!(outcome.spins_played, 3);
    assert_eq!(outcome.total_win, 35);
    assert_eq!(outcome.chain_switches, 1);
    let tokens: Vec<_> = h
        .executor
        .calls_to(Route::BonusGame)
        .iter()
        .map(|c| c.params()["bonusToken"].clone())
        .collect();
    assert_eq!(tokens, vec![json!("A"), json!("A"), json!("B")]);
}

#[tokio::test(start_paused = true)]
async fn repeated_token_is_not_a_new_bonus() {
    let same = json!({
        "bonusWin": 7,
        "spinsCountdown": 0,
        "bonus": { "type": "freeSpins", "bonusToken": "A" }
    });
    let executor = ScriptedExecutor::new()
        .script(Route::Primary, vec![spin_reply(1_000, 0, free_spins_trigger("A"))])
        .script(Route::BonusGame, vec![bonus_reply(same)]);
    let mut h = Harness::slots(executor);
    h.controller.start(once()).unwrap();
    h.controller.join().await;

    let outcome = &played(&mut h)[0];
    assert_eq!(outcome.spins_played, 1);
    assert_eq!(outcome.chain_switches, 0);
}

#[tokio::test(start_paused = true)]
async fn malformed_sub_spin_ends_the_round_with_partial_totals() {
    let executor = ScriptedExecutor::new()
        .script(Route::Primary, vec![spin_reply(1_000, 0, free_spins_trigger("A"))])
        .script(
            Route::BonusGame,
            vec![
                bonus_reply(json!({ "bonusWin": 40, "spinsCountdown": 3 })),
                spinrelay_core::ExecutorReply::ok(json!({ "result": {} })),
            ],
        );
    let mut h = Harness::slots(executor);
    h.controller.start(once()).unwrap();
    h.controller.join().await;

    let outcome = &played(&mut h)[0];
    assert_eq!(outcome.spins_played, 1);
    assert_eq!(outcome.total_win, 40);
    assert_eq!(outcome.ended_by, BonusEnd::Protocol);
    // The primary iteration itself still succeeded.
    let status = h.controller.status();
    assert_eq!(status.ledger.iterations, 1);
    assert_eq!(status.last_error, None);
}

#[tokio::test(start_paused = true)]
async fn transport_failure_mid_round_keeps_the_loop_alive() {
    let executor = ScriptedExecutor::new()
        .script(Route::Primary, vec![spin_reply(1_000, 0, free_spins_trigger("A"))])
        .script(
            Route::BonusGame,
            vec![
                bonus_reply(json!({ "bonusWin": 40, "spinsCountdown": 3 })),
                transport_error(),
            ],
        );
    let mut h = Harness::slots(executor);
    h.controller
        .start(LoopConfig {
            max_iterations: 2,
            ..fast_config()
        })
        .unwrap();
    h.controller.join().await;

    let outcomes = played(&mut h);
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].ended_by, BonusEnd::Transport);
    assert_eq!(h.controller.status().ledger.iterations, 2);
}

#[tokio::test(start_paused = true)]
async fn star_spins_announce_the_round_then_poll_to_zero() {
    let trigger = json!({ "starts": 2, "startsToken": "star-1", "uid": "777", "levelId": 12 });
    let executor = ScriptedExecutor::new()
        .script(Route::Primary, vec![spin_reply(1_000, 0, trigger)])
        .script(Route::Event, vec![spinrelay_core::ExecutorReply::ok(json!({ "ok": true }))])
        .script(
            Route::PollSpin,
            vec![
                spinrelay_core::ExecutorReply::ok(json!({ "result": { "gameInfo": { "startsWin": 100, "startsRemaining": 1 } } })),
                spinrelay_core::ExecutorReply::ok(json!({ "result": { "gameInfo": { "startsWin": 50 } } })),
            ],
        );
    let mut h = Harness::slots(executor);
    h.captures.publish(
        RequestClass::EventStream,
        CapturedRequest::new(EVENTS_URL, "[]", vec![Header::new("Authorization", "Bearer t")]),
    );
    h.controller.start(once()).unwrap();
    h.controller.join().await;

    let events = h.executor.calls_to(Route::Event);
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].body["game_action_id"], 1005);
    assert_eq!(events[0].body["uid"], 777);
    assert_eq!(events[0].body["sid"], "S1");
    assert_eq!(events[0].body["game_id"], 204);
    assert_eq!(events[1].body["game_action_id"], 32);
    assert_eq!(events[1].body["extra"], "{\"numSpins\":2}\n");
    assert_eq!(events[0].body["uuid"].as_str().unwrap().len(), 32);
    assert!(events[0].headers.iter().any(|h| h.name == "Authorization"));

    let spins = h.executor.calls_to(Route::PollSpin);
    assert_eq!(spins.len(), 2);
    let params = spins[0].params();
    assert_eq!(params["startsToken"], "star-1");
    assert_eq!(params["isStartsSpin"], true);
    assert_eq!(params["bet"], 5_000);

    let outcome = &played(&mut h)[0];
    assert_eq!(outcome.kind, BonusKind::Starts);
    assert_eq!(outcome.total_win, 150);
    let stats = h.controller.status().ledger.category(BonusCategory::StarSpins);
    assert_eq!((stats.trigger_count, stats.sub_spins_played, stats.win_amount), (1, 2, 150));
}

#[tokio::test(start_paused = true)]
async fn telemetry_failures_do_not_block_the_round() {
    let trigger = json!({ "miniGame": { "active": true, "spins": 1, "token": "m-1" }, "uid": 9 });
    let executor = ScriptedExecutor::new()
        .script(Route::Primary, vec![spin_reply(1_000, 0, trigger)])
        .script(Route::Event, vec![transport_error()])
        .script(
            Route::PollSpin,
            vec![spinrelay_core::ExecutorReply::ok(json!({ "result": { "gameInfo": { "miniGameWin": 25 } } }))],
        );
    let mut h = Harness::slots(executor);
    let config = LoopConfig {
        telemetry: TelemetryConfig {
            url: Some(EVENTS_URL.into()),
            ..TelemetryConfig::default()
        },
        ..once()
    };
    h.controller.start(config).unwrap();
    h.controller.join().await;

    // Each event is tried once plus its retries.
    assert_eq!(h.executor.calls_to(Route::Event).len(), 6);
    let outcome = &played(&mut h)[0];
    assert_eq!(outcome.category, BonusCategory::MiniGame);
    assert_eq!(outcome.total_win, 25);
    assert_eq!(outcome.ended_by, BonusEnd::Exhausted);
}

#[tokio::test(start_paused = true)]
async fn disabled_telemetry_sends_no_events() {
    let trigger = json!({ "starts": 1, "startsToken": "s", "uid": 9 });
    let executor = ScriptedExecutor::new()
        .script(Route::Primary, vec![spin_reply(1_000, 0, trigger)])
        .script(
            Route::PollSpin,
            vec![spinrelay_core::ExecutorReply::ok(json!({ "result": { "gameInfo": { "startsWin": 5 } } }))],
        );
    let h = Harness::slots(executor);
    h.captures.publish(
        RequestClass::EventStream,
        CapturedRequest::new(EVENTS_URL, "[]", Vec::new()),
    );
    let config = LoopConfig {
        telemetry: TelemetryConfig {
            enabled: false,
            ..TelemetryConfig::default()
        },
        ..once()
    };
    h.controller.start(config).unwrap();
    h.controller.join().await;
    assert!(h.executor.calls_to(Route::Event).is_empty());
    assert_eq!(h.executor.calls_to(Route::PollSpin).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn legacy_bonus_replays_the_event_stream_around_the_round() {
    let trigger = json!({ "bonusGamePlay": { "bonusToken": "L-1", "spinsAmount": 2 } });
    let executor = ScriptedExecutor::new()
        .script(Route::Primary, vec![spin_reply(1_000, 0, trigger)])
        .script(Route::Event, vec![spinrelay_core::ExecutorReply::ok(json!([]))])
        .script(
            Route::BonusGame,
            vec![bonus_reply(json!({ "bonusWin": 15, "spinsCountdown": 0 }))],
        );
    let mut h = Harness::slots(executor);
    h.captures.publish(
        RequestClass::EventStream,
        CapturedRequest::new(
            EVENTS_URL,
            "",
            vec![Header::new("request_id", "stale")],
        ),
    );
    h.controller.start(once()).unwrap();
    h.controller.join().await;

    let routes: Vec<Route> = h.executor.calls().iter().map(Call::route).collect();
    assert_eq!(
        routes,
        vec![Route::Primary, Route::Event, Route::BonusGame, Route::Event]
    );
    let first_event = &h.executor.calls_to(Route::Event)[0];
    assert_eq!(first_event.body, json!([]));
    assert_ne!(first_event.headers[0].value, "stale");
    let outcome = &played(&mut h)[0];
    assert_eq!(outcome.category, BonusCategory::Legacy);
    assert_eq!(outcome.total_win, 15);
}

#[tokio::test(start_paused = true)]
async fn free_spins_send_popup_impressions_with_the_player_level() {
    let mut trigger = free_spins_trigger("A");
    trigger["uid"] = json!("777");
    trigger["levelId"] = json!(12);
    let executor = ScriptedExecutor::new()
        .script(Route::Primary, vec![spin_reply(1_000, 0, trigger)])
        .script(Route::Event, vec![spinrelay_core::ExecutorReply::ok(json!({ "ok": true }))])
        .script(
            Route::BonusGame,
            vec![bonus_reply(json!({ "bonusWin": 20, "spinsCountdown": 0 }))],
        );
    let mut h = Harness::slots(executor);
    h.captures.publish(
        RequestClass::EventStream,
        CapturedRequest::new(EVENTS_URL, "[]", Vec::new()),
    );
    h.controller.start(once()).unwrap();
    h.controller.join().await;

    let routes: Vec<Route> = h.executor.calls().iter().map(Call::route).collect();
    assert_eq!(
        routes,
        vec![Route::Primary, Route::Event, Route::Event, Route::BonusGame]
    );
    let events = h.executor.calls_to(Route::Event);
    assert_eq!(events[0].body["action_id"], 1);
    assert_eq!(events[1].body["action_id"], 4);
    for event in &events {
        assert_eq!(event.body["type"], "eventEntityImpression");
        assert_eq!(event.body["entity_id"], 129);
        assert_eq!(event.body["level_id"], 12);
        assert_eq!(event.body["uid"], 777);
        assert_eq!(event.body["sid"], "S1");
    }
    assert_eq!(played(&mut h)[0].total_win, 20);
}

#[tokio::test(start_paused = true)]
async fn free_spins_without_a_level_skip_the_impressions() {
    let mut trigger = free_spins_trigger("A");
    trigger["uid"] = json!(777);
    let executor = ScriptedExecutor::new()
        .script(Route::Primary, vec![spin_reply(1_000, 0, trigger)])
        .script(
            Route::BonusGame,
            vec![bonus_reply(json!({ "bonusWin": 20, "spinsCountdown": 0 }))],
        );
    let mut h = Harness::slots(executor);
    h.captures.publish(
        RequestClass::EventStream,
        CapturedRequest::new(EVENTS_URL, "[]", Vec::new()),
    );
    h.controller.start(once()).unwrap();
    h.controller.join().await;

    assert!(h.executor.calls_to(Route::Event).is_empty());
    assert_eq!(h.executor.calls_to(Route::BonusGame).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn legacy_bonus_without_spin_count_is_not_played() {
    let trigger = json!({ "bonusGamePlay": { "bonusToken": "L-1" } });
    let executor = ScriptedExecutor::new().script(Route::Primary, vec![spin_reply(1_000, 0, trigger)]);
    let mut h = Harness::slots(executor);
    h.controller.start(once()).unwrap();
    h.controller.join().await;
    assert!(played(&mut h).is_empty());
    assert!(h.executor.calls_to(Route::BonusGame).is_empty());
}

#[tokio::test(start_paused = true)]
async fn stop_mid_round_abandons_the_bonus() {
    let executor = ScriptedExecutor::new()
        .script(Route::Primary, vec![spin_reply(1_000, 0, free_spins_trigger("A"))])
        .script(
            Route::BonusGame,
            vec![bonus_reply(json!({ "bonusWin": 1, "spinsCountdown": 100 }))],
        );
    let mut h = Harness::slots(executor);
    h.controller
        .start(LoopConfig {
            bonus_min_delay_ms: 1_000,
            bonus_max_delay_ms: 1_000,
            ..fast_config()
        })
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(1_500)).await;
    let final_stats = h.controller.stop();
    tokio::time::sleep(std::time::Duration::from_secs(30)).await;
    h.controller.join().await;

    assert_eq!(h.executor.calls_to(Route::BonusGame).len(), 2);
    assert_eq!(h.executor.calls_to(Route::Primary).len(), 1);
    assert_eq!(final_stats.category(BonusCategory::FreeSpins).trigger_count, 0);
    assert!(played(&mut h).is_empty());
}
