//! Persisted snapshot of a timer and its JSON encoding.
//!
//! A snapshot is self-sufficient: restoring it and reading the clock model at
//! the current wall-clock time reproduces the displayed value without any other
//! history. Running timers carry their anchor; every other state carries the
//! frozen value it displays.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Anchor, RunState, TimerMode};

/// Current wire format version
pub const SNAPSHOT_VERSION: u32 = 1;

/// Why a stored value could not be turned into a snapshot
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid snapshot: {0}")]
    Invalid(String),
}

/// Authoritative, serializable state of one timer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PersistedSnapshot {
    pub mode: TimerMode,
    pub run_state: RunState,
    pub anchor: Option<Anchor>,
    pub duration_ms: Option<i64>,
    /// Displayed value while not running: remaining (countdown) or elapsed (countup)
    pub frozen_ms: Option<i64>,
    /// Wall-clock time of the write, used to order snapshots from different writers
    pub saved_at_ms: i64,
}

impl PersistedSnapshot {
    /// Decode a stored string
    pub fn decode(raw: &str) -> Result<Self, SnapshotError> {
        let wire: WireSnapshot = serde_json::from_str(raw)?;
        Self::try_from(wire)
    }

    /// Encode for storage
    pub fn encode(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(&WireSnapshot::from(*self))?)
    }

    /// Whether two snapshots describe a different timeline.
    ///
    /// Write time is ignored: re-saving the same state is not a change.
    pub fn differs_from(&self, other: &PersistedSnapshot) -> bool {
        self.mode != other.mode
            || self.run_state != other.run_state
            || self.anchor != other.anchor
            || self.duration_ms != other.duration_ms
            || self.frozen_ms != other.frozen_ms
    }

    /// Whether `self`, observed from another writer, is older than `local`.
    ///
    /// A running snapshot on the same anchor as a locally ended timer is the
    /// pre-completion state of that timeline and never wins.
    pub fn is_stale_against(&self, local: &PersistedSnapshot) -> bool {
        if self.saved_at_ms < local.saved_at_ms {
            return true;
        }
        local.run_state == RunState::Ended
            && self.run_state == RunState::Running
            && self.anchor == local.anchor
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireSnapshot {
    version: u32,
    mode: TimerMode,
    run_state: RunState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    end_at_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    start_at_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    duration_ms: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    frozen_ms: Option<i64>,
    saved_at_ms: i64,
}

impl From<PersistedSnapshot> for WireSnapshot {
    fn from(snapshot: PersistedSnapshot) -> Self {
        let (end_at_ms, start_at_ms) = match snapshot.anchor {
            Some(Anchor::EndAt(ms)) => (Some(ms), None),
            Some(Anchor::StartAt(ms)) => (None, Some(ms)),
            None => (None, None),
        };
        Self {
            version: SNAPSHOT_VERSION,
            mode: snapshot.mode,
            run_state: snapshot.run_state,
            end_at_ms,
            start_at_ms,
            duration_ms: snapshot.duration_ms,
            frozen_ms: snapshot.frozen_ms,
            saved_at_ms: snapshot.saved_at_ms,
        }
    }
}

impl TryFrom<WireSnapshot> for PersistedSnapshot {
    type Error = SnapshotError;

    fn try_from(wire: WireSnapshot) -> Result<Self, Self::Error> {
        if wire.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::Invalid(format!(
                "unsupported version {}",
                wire.version
            )));
        }

        let anchor = match (wire.mode, wire.end_at_ms, wire.start_at_ms) {
            (_, None, None) => None,
            (TimerMode::Countdown, Some(ms), None) => Some(Anchor::EndAt(ms)),
            (TimerMode::Countup, None, Some(ms)) => Some(Anchor::StartAt(ms)),
            (mode, _, _) => {
                return Err(SnapshotError::Invalid(format!(
                    "anchor does not match {} mode",
                    mode.as_str()
                )))
            }
        };

        if matches!(wire.duration_ms, Some(d) if d <= 0) {
            return Err(SnapshotError::Invalid("duration must be positive".to_string()));
        }
        if matches!(wire.frozen_ms, Some(v) if v < 0) {
            return Err(SnapshotError::Invalid("frozen value is negative".to_string()));
        }

        match wire.run_state {
            RunState::Running if anchor.is_none() => {
                return Err(SnapshotError::Invalid("running snapshot without anchor".to_string()))
            }
            RunState::Idle | RunState::Paused | RunState::Ended if wire.frozen_ms.is_none() => {
                return Err(SnapshotError::Invalid(format!(
                    "{} snapshot without frozen value",
                    wire.run_state.as_str()
                )))
            }
            _ => {}
        }

        Ok(Self {
            mode: wire.mode,
            run_state: wire.run_state,
            anchor,
            duration_ms: wire.duration_ms,
            frozen_ms: wire.frozen_ms,
            saved_at_ms: wire.saved_at_ms,
        })
    }
}
