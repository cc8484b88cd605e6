//! Bonus rounds: detection on primary responses and play to exhaustion.
//!
//! Every upstream bonus shape is normalised into a [`BonusDescriptor`] by
//! [`detect`]. Two play families exist: the token-chaining family
//! (`bonusGame` sub-spins that may hand over a fresh token mid-round) and the
//! poll family (flagged `spin` sub-spins counted down by the server).

mod detect;
mod player;
mod telemetry;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use detect::{detect, find_chained};
pub use player::{BonusContext, play};
pub use telemetry::{UserInfo, extract_user_info};

/// Closed set of bonus shapes, in detection priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BonusKind {
    Starts,
    Jackpot,
    MiniGame,
    Boj,
    FreeSpins,
    Legacy,
}

/// Ledger bucket a bonus's sub-spins and wins are reported under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BonusCategory {
    FreeSpins,
    StarSpins,
    Legacy,
    MiniGame,
}

impl BonusCategory {
    pub const ALL: [Self; 4] = [Self::FreeSpins, Self::StarSpins, Self::Legacy, Self::MiniGame];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::FreeSpins => "free spins",
            Self::StarSpins => "star spins",
            Self::Legacy => "legacy bonus",
            Self::MiniGame => "mini-game",
        }
    }
}

impl fmt::Display for BonusCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl BonusKind {
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Starts => "starts",
            Self::Jackpot => "jackpot",
            Self::MiniGame => "miniGame",
            Self::Boj => "boj",
            Self::FreeSpins => "freeSpins",
            Self::Legacy => "legacy",
        }
    }

    #[must_use]
    pub const fn category(self) -> BonusCategory {
        match self {
            Self::FreeSpins => BonusCategory::FreeSpins,
            Self::Starts => BonusCategory::StarSpins,
            Self::Legacy => BonusCategory::Legacy,
            Self::Jackpot | Self::MiniGame | Self::Boj => BonusCategory::MiniGame,
        }
    }

    /// Whether sub-spins go through the token-chaining `bonusGame` command.
    #[must_use]
    pub const fn chains_tokens(self) -> bool {
        matches!(self, Self::FreeSpins | Self::Legacy)
    }

    /// Token field and spin flag merged into poll-family sub-spin params.
    pub(crate) const fn poll_fields(self) -> Option<(&'static str, &'static str)> {
        match self {
            Self::Starts => Some(("startsToken", "isStartsSpin")),
            Self::Jackpot => Some(("jackpotToken", "isJackpotSpin")),
            Self::MiniGame => Some(("miniGameToken", "isMiniGame")),
            Self::Boj => Some(("bojToken", "isBOJSpin")),
            Self::FreeSpins | Self::Legacy => None,
        }
    }
}

impl fmt::Display for BonusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Normalised trigger found in a primary response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BonusDescriptor {
    pub kind: BonusKind,
    pub expected_spins: u32,
    pub token: Option<String>,
    pub payload: Value,
}

impl BonusDescriptor {
    #[must_use]
    pub const fn category(&self) -> BonusCategory {
        self.kind.category()
    }

    /// Playable only with a token and a non-zero spin count.
    #[must_use]
    pub fn is_playable(&self) -> bool {
        self.expected_spins > 0 && self.token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// How a bonus loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BonusEnd {
    Exhausted,
    Cancelled,
    Protocol,
    Transport,
    Rejected,
}

/// Totals from one bonus invocation, chained rounds included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BonusOutcome {
    pub kind: BonusKind,
    pub category: BonusCategory,
    pub spins_played: u32,
    pub total_win: i64,
    pub chain_switches: u32,
    pub ended_by: BonusEnd,
}

impl BonusOutcome {
    pub(crate) const fn empty(kind: BonusKind) -> Self {
        Self {
            kind,
            category: kind.category(),
            spins_played: 0,
            total_win: 0,
            chain_switches: 0,
            ended_by: BonusEnd::Exhausted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn categories_follow_kind() {
        assert_eq!(BonusKind::FreeSpins.category(), BonusCategory::FreeSpins);
        assert_eq!(BonusKind::Starts.category(), BonusCategory::StarSpins);
        assert_eq!(BonusKind::Boj.category(), BonusCategory::MiniGame);
        assert_eq!(BonusKind::Legacy.category(), BonusCategory::Legacy);
    }

    #[test]
    fn descriptors_without_token_or_spins_are_not_playable() {
        let mut desc = BonusDescriptor {
            kind: BonusKind::Starts,
            expected_spins: 0,
            token: Some("tok".into()),
            payload: json!({}),
        };
        assert!(!desc.is_playable());
        desc.expected_spins = 3;
        assert!(desc.is_playable());
        desc.token = None;
        assert!(!desc.is_playable());
    }

    #[test]
    fn kinds_serialize_with_upstream_names() {
        assert_eq!(
            serde_json::to_string(&BonusKind::MiniGame).unwrap(),
            "\"miniGame\""
        );
        assert_eq!(BonusKind::FreeSpins.key(), "freeSpins");
    }
}
