//! Centralized pacing, limit and wire constants for the replay engine.
//!
//! Delay values are the defaults applied when an operator leaves a field of
//! [`crate::LoopConfig`] unset; limits guard the loop against an upstream
//! that never reports completion.

use std::time::Duration;

// Primary loop pacing ------------------------------------------------------
pub const DEFAULT_MIN_DELAY_MS: u64 = 1_000;
pub const DEFAULT_MAX_DELAY_MS: u64 = 2_000;
pub const DEFAULT_MAX_CONSECUTIVE_ERRORS: u32 = 3;

// Bonus pacing -------------------------------------------------------------
pub const BONUS_SPIN_MIN_DELAY_MS: u64 = 5;
pub const BONUS_SPIN_MAX_DELAY_MS: u64 = 25;
pub const MINI_GAME_SPIN_DELAY_MS: u64 = 30;
pub(crate) const TELEMETRY_POPUP_SETTLE: Duration = Duration::from_millis(300);
pub(crate) const TELEMETRY_START_SETTLE: Duration = Duration::from_millis(500);
pub(crate) const EVENT_REPLAY_SETTLE: Duration = Duration::from_millis(500);

/// Upper bound on sub-spins within one bonus invocation, chains included.
pub const MAX_SUB_SPINS_PER_BONUS: u32 = 5_000;

// Detection defaults -------------------------------------------------------
pub(crate) const DEFAULT_POLL_BONUS_SPINS: u32 = 5;
pub(crate) const DEFAULT_FREE_SPINS: u32 = 3;
pub const DEFAULT_GAME_ID: u64 = 190;

// Wheel --------------------------------------------------------------------
pub(crate) const DEFAULT_WHEEL_POINTS_TOTAL: i64 = 20_000;
pub(crate) const MILESTONE_PENDING: &str = "NOT_ACHIEVED";
pub(crate) const WHEEL_CLAIM_BACKOFF: [Duration; 3] = [
    Duration::from_millis(500),
    Duration::from_millis(1_000),
    Duration::from_millis(2_000),
];

// Telemetry ----------------------------------------------------------------
pub const DEFAULT_APP_VERSION: &str = "5.6.030";
pub const DEFAULT_PLATFORM_ID: u32 = 18;
pub(crate) const GAME_ACTION_SHOW_POPUP: u32 = 1005;
pub(crate) const GAME_ACTION_START_CLICKED: u32 = 32;
pub(crate) const ENTITY_ACTION_SHOW_POPUP: u32 = 1;
pub(crate) const ENTITY_ACTION_START_CLICKED: u32 = 4;
pub(crate) const BONUS_POPUP_ENTITY_ID: u32 = 129;
pub(crate) const BONUS_POPUP_NAME: &str = "GameBOJ_JapckpotPopups_CGameBOJ_MiniGamePopUpStart";
pub(crate) const TELEMETRY_BACKOFF: [Duration; 2] =
    [Duration::from_millis(250), Duration::from_millis(750)];

// Reporting ----------------------------------------------------------------
pub const MAX_HISTORY_ITEMS: usize = 50;
pub(crate) const JACKPOT_LOG_INTERVAL: u64 = 50;

// Wire ---------------------------------------------------------------------
pub const SPIN_ID_DIGITS: usize = 32;
pub const REQUEST_ID_HEADER: &str = "request_id";

/// Headers the browser controls itself; never forwarded on replay.
pub const BROWSER_CONTROLLED_HEADERS: [&str; 10] = [
    "host",
    "connection",
    "content-length",
    "accept-encoding",
    "sec-fetch-dest",
    "sec-fetch-mode",
    "sec-fetch-site",
    "sec-ch-ua",
    "sec-ch-ua-mobile",
    "sec-ch-ua-platform",
];
