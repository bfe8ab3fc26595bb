//! Clock model: maps anchor state and "now" to the displayed value.
//!
//! Everything here is pure. The engine and the tests call [`read`] the same way,
//! and the value is always `anchor - now` (countdown) or `now - anchor` (countup),
//! never an accumulated tick count, so a suspended process reads the right value
//! as soon as it runs again.

use crate::state::TimerMode;

/// Inputs to one recomputation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockInput {
    pub mode: TimerMode,
    pub anchor_ms: i64,
    pub now_ms: i64,
    pub duration_ms: Option<i64>,
    pub stop_at_duration: bool,
}

/// Result of one recomputation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockReading {
    pub value_ms: i64,
    pub progress: Option<f64>,
    pub ended: bool,
}

/// Compute the displayed value.
///
/// A countup timer that auto-stops freezes at the threshold: once
/// `elapsed >= duration_ms` it reports exactly `duration_ms`.
pub fn read(input: &ClockInput) -> ClockReading {
    let duration = input.duration_ms.filter(|d| *d > 0);

    match input.mode {
        TimerMode::Countdown => {
            let remaining = input.anchor_ms.saturating_sub(input.now_ms).max(0);
            ClockReading {
                value_ms: remaining,
                progress: duration.map(|d| ratio(d - remaining, d)),
                ended: remaining <= 0,
            }
        }
        TimerMode::Countup => {
            let elapsed = input.now_ms.saturating_sub(input.anchor_ms).max(0);
            let ended = match duration {
                Some(d) if input.stop_at_duration => elapsed >= d,
                _ => false,
            };
            let value_ms = match duration {
                Some(d) if ended => d,
                _ => elapsed,
            };
            ClockReading {
                value_ms,
                progress: duration.map(|d| ratio(value_ms, d)),
                ended,
            }
        }
    }
}

/// Reading for a timer that is not running and shows a frozen value
pub fn frozen(mode: TimerMode, value_ms: i64, duration_ms: Option<i64>, ended: bool) -> ClockReading {
    let value_ms = value_ms.max(0);
    let progress = duration_ms.filter(|d| *d > 0).map(|d| match mode {
        TimerMode::Countdown => ratio(d - value_ms, d),
        TimerMode::Countup => ratio(value_ms, d),
    });
    ClockReading {
        value_ms,
        progress,
        ended,
    }
}

fn ratio(part: i64, whole: i64) -> f64 {
    (part as f64 / whole as f64).clamp(0.0, 1.0)
}
