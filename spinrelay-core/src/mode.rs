use std::fmt;

use serde::{Deserialize, Serialize};

use crate::capture::RequestClass;

/// Which loop a controller drives. Each mode has its own session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    /// Primary slot spins with bonus detection and chaining.
    Slots,
    /// Secondary wheel game with level-up reward claims.
    Wheel,
}

impl GameMode {
    /// Capture replayed once per iteration.
    #[must_use]
    pub const fn primary_class(self) -> RequestClass {
        match self {
            Self::Slots => RequestClass::PrimarySpin,
            Self::Wheel => RequestClass::WheelSpin,
        }
    }

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Slots => "slots",
            Self::Wheel => "wheel",
        }
    }
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Terminal state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    #[serde(rename = "stopped-by-request")]
    Requested,
    #[serde(rename = "stopped-by-max-iterations")]
    MaxIterations,
    #[serde(rename = "stopped-by-loss-limit")]
    LossLimit,
    #[serde(rename = "stopped-by-consecutive-errors")]
    ConsecutiveErrors,
}

impl StopReason {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Requested => "stopped-by-request",
            Self::MaxIterations => "stopped-by-max-iterations",
            Self::LossLimit => "stopped-by-loss-limit",
            Self::ConsecutiveErrors => "stopped-by-consecutive-errors",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
