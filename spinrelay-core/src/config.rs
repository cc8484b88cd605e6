use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::constants::{
    BONUS_SPIN_MAX_DELAY_MS, BONUS_SPIN_MIN_DELAY_MS, DEFAULT_APP_VERSION,
    DEFAULT_MAX_CONSECUTIVE_ERRORS, DEFAULT_MAX_DELAY_MS, DEFAULT_MIN_DELAY_MS,
    DEFAULT_PLATFORM_ID, MINI_GAME_SPIN_DELAY_MS,
};
use crate::error::LoopConfigError;

/// Operator-supplied limits and pacing for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    /// 0 runs until stopped.
    pub max_iterations: u64,
    /// Stop once the balance has fallen this far below the start; 0 disables.
    pub stop_on_loss: i64,
    pub max_consecutive_errors: u32,
    pub bonus_min_delay_ms: u64,
    pub bonus_max_delay_ms: u64,
    pub mini_game_delay_ms: u64,
    pub telemetry: TelemetryConfig,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: DEFAULT_MIN_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            max_iterations: 0,
            stop_on_loss: 0,
            max_consecutive_errors: DEFAULT_MAX_CONSECUTIVE_ERRORS,
            bonus_min_delay_ms: BONUS_SPIN_MIN_DELAY_MS,
            bonus_max_delay_ms: BONUS_SPIN_MAX_DELAY_MS,
            mini_game_delay_ms: MINI_GAME_SPIN_DELAY_MS,
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl LoopConfig {
    /// # Errors
    ///
    /// Returns [`LoopConfigError`] when a delay range is inverted, the error
    /// budget is zero, or the loss limit is negative.
    pub fn validate(&self) -> Result<(), LoopConfigError> {
        if self.min_delay_ms > self.max_delay_ms {
            return Err(LoopConfigError::DelayBounds {
                field: "delay",
                min: self.min_delay_ms,
                max: self.max_delay_ms,
            });
        }
        if self.bonus_min_delay_ms > self.bonus_max_delay_ms {
            return Err(LoopConfigError::DelayBounds {
                field: "bonus delay",
                min: self.bonus_min_delay_ms,
                max: self.bonus_max_delay_ms,
            });
        }
        if self.max_consecutive_errors == 0 {
            return Err(LoopConfigError::ErrorBudget(self.max_consecutive_errors));
        }
        if self.stop_on_loss < 0 {
            return Err(LoopConfigError::NegativeLossLimit(self.stop_on_loss));
        }
        Ok(())
    }

    /// Pause before the next primary spin, uniform over the inclusive range.
    #[must_use]
    pub fn next_delay(&self) -> Duration {
        jitter(self.min_delay_ms, self.max_delay_ms)
    }

    /// Pause between chained-bonus sub-spins.
    #[must_use]
    pub fn bonus_delay(&self) -> Duration {
        jitter(self.bonus_min_delay_ms, self.bonus_max_delay_ms)
    }
}

fn jitter(min_ms: u64, max_ms: u64) -> Duration {
    let (lo, hi) = (min_ms.min(max_ms), min_ms.max(max_ms));
    Duration::from_millis(rand::thread_rng().gen_range(lo..=hi))
}

/// Advisory game-event posts sent before poll-family bonus rounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub enabled: bool,
    /// Falls back to the captured event-stream request's URL.
    pub url: Option<String>,
    pub app_version: String,
    pub platform_id: u32,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: None,
            app_version: DEFAULT_APP_VERSION.to_string(),
            platform_id: DEFAULT_PLATFORM_ID,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = LoopConfig::default();
        assert_eq!(cfg.min_delay_ms, 1_000);
        assert_eq!(cfg.max_delay_ms, 2_000);
        assert_eq!(cfg.max_consecutive_errors, 3);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: LoopConfig =
            serde_json::from_str(r#"{ "max_iterations": 5, "telemetry": { "enabled": false } }"#)
                .unwrap();
        assert_eq!(cfg.max_iterations, 5);
        assert_eq!(cfg.min_delay_ms, DEFAULT_MIN_DELAY_MS);
        assert!(!cfg.telemetry.enabled);
        assert_eq!(cfg.telemetry.platform_id, DEFAULT_PLATFORM_ID);
    }

    #[test]
    fn inverted_delays_are_rejected() {
        let cfg = LoopConfig {
            min_delay_ms: 50,
            max_delay_ms: 10,
            ..LoopConfig::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(LoopConfigError::DelayBounds {
                field: "delay",
                min: 50,
                max: 10
            })
        );
        let cfg = LoopConfig {
            max_consecutive_errors: 0,
            ..LoopConfig::default()
        };
        assert_eq!(cfg.validate(), Err(LoopConfigError::ErrorBudget(0)));
    }

    #[test]
    fn delays_stay_inside_inclusive_bounds() {
        let cfg = LoopConfig {
            min_delay_ms: 3,
            max_delay_ms: 5,
            ..LoopConfig::default()
        };
        for _ in 0..200 {
            let d = cfg.next_delay().as_millis();
            assert!((3..=5).contains(&d));
        }
        let fixed = LoopConfig {
            min_delay_ms: 7,
            max_delay_ms: 7,
            ..LoopConfig::default()
        };
        assert_eq!(fixed.next_delay(), Duration::from_millis(7));
    }
}
