//! Timer options and their normalization

use std::{fmt, sync::Arc, time::Duration};

use tracing::warn;

use crate::{
    state::TimerMode,
    storage::{StorageAdapter, StorageError},
};

/// Tick period used when none (or a non-positive one) is configured
pub const DEFAULT_INTERVAL_MS: i64 = 1000;

pub type TickCallback = Arc<dyn Fn(i64) + Send + Sync>;
pub type EndCallback = Arc<dyn Fn() + Send + Sync>;
pub type PersistErrorCallback = Arc<dyn Fn(&StorageError) + Send + Sync>;

/// Everything a timer can be configured with. All fields are optional.
#[derive(Clone, Default)]
pub struct TimerOptions {
    pub mode: TimerMode,
    /// Reference duration for the default anchor, progress and auto-stop
    pub duration_ms: Option<i64>,
    /// Absolute countdown target
    pub end_at_ms: Option<i64>,
    /// Absolute countup origin
    pub start_at_ms: Option<i64>,
    /// Start immediately when nothing was restored
    pub auto_start: bool,
    pub interval_ms: Option<i64>,
    pub persist: Option<PersistOptions>,
    /// Countup stops once elapsed reaches `duration_ms`
    pub stop_at_duration: bool,
    pub on_end: Option<EndCallback>,
    pub on_tick: Option<TickCallback>,
    /// Diagnostic hook for swallowed persistence failures
    pub on_persist_error: Option<PersistErrorCallback>,
}

impl TimerOptions {
    pub fn new(mode: TimerMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn countdown(duration_ms: i64) -> Self {
        Self::new(TimerMode::Countdown).duration_ms(duration_ms)
    }

    pub fn countup() -> Self {
        Self::new(TimerMode::Countup)
    }

    pub fn duration_ms(mut self, duration_ms: i64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn end_at_ms(mut self, end_at_ms: i64) -> Self {
        self.end_at_ms = Some(end_at_ms);
        self
    }

    pub fn start_at_ms(mut self, start_at_ms: i64) -> Self {
        self.start_at_ms = Some(start_at_ms);
        self
    }

    pub fn auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }

    pub fn interval_ms(mut self, interval_ms: i64) -> Self {
        self.interval_ms = Some(interval_ms);
        self
    }

    pub fn persist(mut self, persist: PersistOptions) -> Self {
        self.persist = Some(persist);
        self
    }

    pub fn stop_at_duration(mut self, stop_at_duration: bool) -> Self {
        self.stop_at_duration = stop_at_duration;
        self
    }

    pub fn on_end<F>(mut self, on_end: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_end = Some(Arc::new(on_end));
        self
    }

    pub fn on_tick<F>(mut self, on_tick: F) -> Self
    where
        F: Fn(i64) + Send + Sync + 'static,
    {
        self.on_tick = Some(Arc::new(on_tick));
        self
    }

    pub fn on_persist_error<F>(mut self, on_persist_error: F) -> Self
    where
        F: Fn(&StorageError) + Send + Sync + 'static,
    {
        self.on_persist_error = Some(Arc::new(on_persist_error));
        self
    }

    /// Coerce invalid numbers to safe defaults. Never fails.
    pub(crate) fn normalize(&self) -> TimerConfig {
        let interval_ms = match self.interval_ms {
            None => DEFAULT_INTERVAL_MS,
            Some(ms) if ms > 0 => ms,
            Some(ms) => {
                warn!("Invalid tick interval {}ms, using {}ms", ms, DEFAULT_INTERVAL_MS);
                DEFAULT_INTERVAL_MS
            }
        };

        TimerConfig {
            mode: self.mode,
            duration_ms: positive_duration(self.duration_ms),
            end_at_ms: self.end_at_ms,
            start_at_ms: self.start_at_ms,
            auto_start: self.auto_start,
            interval: Duration::from_millis(interval_ms as u64),
            stop_at_duration: self.stop_at_duration,
        }
    }
}

impl fmt::Debug for TimerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerOptions")
            .field("mode", &self.mode)
            .field("duration_ms", &self.duration_ms)
            .field("end_at_ms", &self.end_at_ms)
            .field("start_at_ms", &self.start_at_ms)
            .field("auto_start", &self.auto_start)
            .field("interval_ms", &self.interval_ms)
            .field("persist", &self.persist)
            .field("stop_at_duration", &self.stop_at_duration)
            .finish_non_exhaustive()
    }
}

/// Where and how a timer persists
#[derive(Clone)]
pub struct PersistOptions {
    pub key: String,
    /// Storage backend; a [`FileStorage`](crate::storage::FileStorage) for `key` when absent
    pub adapter: Option<Arc<dyn StorageAdapter>>,
    /// Follow changes written by other instances sharing the key
    pub cross_tab: bool,
}

impl PersistOptions {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            adapter: None,
            cross_tab: false,
        }
    }

    pub fn adapter(mut self, adapter: impl StorageAdapter + 'static) -> Self {
        self.adapter = Some(Arc::new(adapter));
        self
    }

    pub fn cross_tab(mut self, cross_tab: bool) -> Self {
        self.cross_tab = cross_tab;
        self
    }
}

impl fmt::Debug for PersistOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistOptions")
            .field("key", &self.key)
            .field("custom_adapter", &self.adapter.is_some())
            .field("cross_tab", &self.cross_tab)
            .finish()
    }
}

/// Overrides for one `start` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartOptions {
    pub duration_ms: Option<i64>,
    pub end_at_ms: Option<i64>,
    pub start_at_ms: Option<i64>,
}

impl StartOptions {
    pub fn duration_ms(duration_ms: i64) -> Self {
        Self {
            duration_ms: Some(duration_ms),
            ..Self::default()
        }
    }

    pub fn end_at_ms(end_at_ms: i64) -> Self {
        Self {
            end_at_ms: Some(end_at_ms),
            ..Self::default()
        }
    }

    pub fn start_at_ms(start_at_ms: i64) -> Self {
        Self {
            start_at_ms: Some(start_at_ms),
            ..Self::default()
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Overrides for one `reset` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetOptions {
    pub duration_ms: Option<i64>,
}

impl ResetOptions {
    pub fn duration_ms(duration_ms: i64) -> Self {
        Self {
            duration_ms: Some(duration_ms),
        }
    }
}

/// Validated configuration the engine runs on
#[derive(Debug, Clone)]
pub(crate) struct TimerConfig {
    pub mode: TimerMode,
    pub duration_ms: Option<i64>,
    pub end_at_ms: Option<i64>,
    pub start_at_ms: Option<i64>,
    pub auto_start: bool,
    pub interval: Duration,
    pub stop_at_duration: bool,
}

impl TimerConfig {
    /// Start options equivalent to the configured anchor
    pub fn start_options(&self) -> StartOptions {
        StartOptions {
            duration_ms: None,
            end_at_ms: self.end_at_ms,
            start_at_ms: self.start_at_ms,
        }
    }
}

/// A duration is usable only when positive
pub(crate) fn positive_duration(duration_ms: Option<i64>) -> Option<i64> {
    match duration_ms {
        Some(ms) if ms > 0 => Some(ms),
        Some(ms) => {
            warn!("Ignoring non-positive duration {}ms", ms);
            None
        }
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_countdown_every_second() {
        let config = TimerOptions::default().normalize();
        assert_eq!(config.mode, TimerMode::Countdown);
        assert_eq!(config.interval, Duration::from_millis(1000));
        assert_eq!(config.duration_ms, None);
        assert!(!config.auto_start);
    }

    #[test]
    fn invalid_numbers_are_coerced() {
        let config = TimerOptions::countdown(-5).interval_ms(0).normalize();
        assert_eq!(config.interval, Duration::from_millis(DEFAULT_INTERVAL_MS as u64));
        assert_eq!(config.duration_ms, None);

        let config = TimerOptions::countup().interval_ms(-20).duration_ms(0).normalize();
        assert_eq!(config.interval, Duration::from_millis(1000));
        assert_eq!(config.duration_ms, None);
    }

    #[test]
    fn valid_numbers_are_kept() {
        let config = TimerOptions::countdown(30_000)
            .interval_ms(250)
            .end_at_ms(99)
            .normalize();
        assert_eq!(config.interval, Duration::from_millis(250));
        assert_eq!(config.duration_ms, Some(30_000));
        assert_eq!(config.start_options(), StartOptions::end_at_ms(99));
    }

    #[test]
    fn empty_start_options() {
        assert!(StartOptions::default().is_empty());
        assert!(!StartOptions::duration_ms(5).is_empty());
    }
}
