//! Timer state types: mode, run state, anchor and the caller-facing view

use serde::{Deserialize, Serialize};

/// Direction a timer counts in. Fixed for the life of a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerMode {
    #[default]
    Countdown,
    Countup,
}

impl TimerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerMode::Countdown => "countdown",
            TimerMode::Countup => "countup",
        }
    }
}

/// Lifecycle of a timer.
///
/// `Ended` is terminal until an explicit `reset` or `start` lays down a new anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    #[default]
    Idle,
    Running,
    Paused,
    Ended,
}

impl RunState {
    pub fn is_running(&self) -> bool {
        matches!(self, RunState::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Running => "running",
            RunState::Paused => "paused",
            RunState::Ended => "ended",
        }
    }
}

/// Absolute wall-clock reference (ms since the Unix epoch) the displayed value
/// is derived from by subtraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// Countdown target
    EndAt(i64),
    /// Countup origin
    StartAt(i64),
}

impl Anchor {
    /// Build the anchor kind that belongs to `mode`
    pub fn for_mode(mode: TimerMode, at_ms: i64) -> Self {
        match mode {
            TimerMode::Countdown => Anchor::EndAt(at_ms),
            TimerMode::Countup => Anchor::StartAt(at_ms),
        }
    }

    /// Anchor that reproduces `value_ms` at `now_ms`.
    ///
    /// Used when resuming from a frozen value: remaining time for countdown,
    /// elapsed time for countup.
    pub fn rebase(mode: TimerMode, value_ms: i64, now_ms: i64) -> Self {
        match mode {
            TimerMode::Countdown => Anchor::EndAt(now_ms.saturating_add(value_ms)),
            TimerMode::Countup => Anchor::StartAt(now_ms.saturating_sub(value_ms)),
        }
    }

    pub fn ms(&self) -> i64 {
        match self {
            Anchor::EndAt(ms) | Anchor::StartAt(ms) => *ms,
        }
    }

    pub fn mode(&self) -> TimerMode {
        match self {
            Anchor::EndAt(_) => TimerMode::Countdown,
            Anchor::StartAt(_) => TimerMode::Countup,
        }
    }
}

/// What a caller renders: the returned surface of a timer.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerView {
    pub value_ms: i64,
    pub progress: Option<f64>,
    pub running: bool,
    pub ended: bool,
    pub mode: TimerMode,
    pub run_state: RunState,
    pub duration_ms: Option<i64>,
}
