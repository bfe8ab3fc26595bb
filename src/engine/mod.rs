//! Timer engine
//!
//! Owns the state machine of one timer: anchors and run state, periodic
//! recomputation through the injected [`Scheduler`], persistence through the
//! injected [`StorageAdapter`] and reconciliation with snapshots written by
//! other instances sharing the same key.
//!
//! Completion is only ever detected by recomputing the clock model, at tick
//! time or when adopting a snapshot. There is no separate deadline timer.

mod options;
mod sync;
mod transitions;


use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, error, info};

use crate::{
    clock::{Clock, ClockReading, ManualClock, SystemClock},
    scheduler::{ManualScheduler, Scheduler, TokioScheduler},
    state::{Anchor, PersistedSnapshot, RunState, TimerMode, TimerView},
    storage::{FileStorage, StorageAdapter},
    utils::CancelGuard,
};

pub use options::{
    EndCallback, PersistErrorCallback, PersistOptions, ResetOptions, StartOptions, TickCallback,
    TimerOptions, DEFAULT_INTERVAL_MS,
};
use options::TimerConfig;

/// The time source and scheduler an engine runs on
#[derive(Clone)]
pub struct TimerRuntime {
    pub clock: Arc<dyn Clock>,
    pub scheduler: Arc<dyn Scheduler>,
}

impl TimerRuntime {
    pub fn new(clock: Arc<dyn Clock>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self { clock, scheduler }
    }

    /// Wall clock and tokio intervals on the current runtime.
    ///
    /// `None` when called outside a tokio runtime.
    pub fn tokio() -> Option<Self> {
        let scheduler = TokioScheduler::try_current()?;
        Some(Self::new(Arc::new(SystemClock), Arc::new(scheduler)))
    }

    /// Virtual time starting at `now_ms`; the returned scheduler moves it
    pub fn manual(now_ms: i64) -> (Self, ManualScheduler) {
        let clock = ManualClock::new(now_ms);
        let scheduler = ManualScheduler::new(clock.clone());
        (
            Self::new(Arc::new(clock), Arc::new(scheduler.clone())),
            scheduler,
        )
    }
}

/// Handle to a running timer.
///
/// Dropping the handle disposes the timer.
pub struct TimerEngine {
    shared: Arc<Shared>,
}

pub(crate) struct Shared {
    config: TimerConfig,
    clock: Arc<dyn Clock>,
    scheduler: Arc<dyn Scheduler>,
    storage: Option<Arc<dyn StorageAdapter>>,
    on_tick: Option<TickCallback>,
    on_end: Option<EndCallback>,
    on_persist_error: Option<PersistErrorCallback>,
    /// Held across a mutation and its write so writes leave in operation order
    write_order: Mutex<()>,
    inner: Mutex<Inner>,
}

pub(crate) struct Inner {
    run_state: RunState,
    anchor: Option<Anchor>,
    duration_ms: Option<i64>,
    frozen_ms: Option<i64>,
    reading: ClockReading,
    saved_at_ms: i64,
    /// Bumped whenever the tick stream is replaced; stale ticks are ignored
    generation: u64,
    tick: Option<CancelGuard>,
    subscription: Option<CancelGuard>,
    disposed: bool,
}

/// What a state change asks for once locks are released
#[derive(Debug, Default)]
pub(crate) struct Effects {
    tick_value: Option<i64>,
    ended: bool,
    persist: Option<PersistedSnapshot>,
}

impl TimerEngine {
    /// Build a timer. Never fails: bad numbers are coerced and unreadable
    /// storage counts as nothing restored.
    pub fn new(options: TimerOptions, runtime: TimerRuntime) -> Self {
        let config = options.normalize();
        let now = runtime.clock.now_ms();

        let storage = options.persist.as_ref().map(|persist| {
            persist.adapter.clone().unwrap_or_else(|| {
                let storage = FileStorage::for_key(&persist.key);
                info!("Persisting timer {} to {}", persist.key, storage.path().display());
                Arc::new(storage) as Arc<dyn StorageAdapter>
            })
        });

        let inner = Inner::idle(&config, config.duration_ms, now);
        let shared = Arc::new(Shared {
            config,
            clock: runtime.clock,
            scheduler: runtime.scheduler,
            storage,
            on_tick: options.on_tick,
            on_end: options.on_end,
            on_persist_error: options.on_persist_error,
            write_order: Mutex::new(()),
            inner: Mutex::new(inner),
        });

        if !shared.restore() && shared.config.auto_start {
            info!("Nothing restored, auto-starting {} timer", shared.config.mode.as_str());
            shared.start(shared.config.start_options());
        }

        if options.persist.as_ref().is_some_and(|p| p.cross_tab) {
            shared.follow_external_changes();
        }

        Self { shared }
    }

    /// Start or resume. No-op while running.
    pub fn start(&self, opts: StartOptions) {
        self.shared.start(opts);
    }

    /// Freeze the current value. No-op unless running.
    pub fn pause(&self) {
        self.shared.pause();
    }

    /// Back to idle with a fresh default anchor. Never fires `on_end`.
    pub fn reset(&self, opts: ResetOptions) {
        self.shared.reset(opts);
    }

    /// Recompute the value now instead of waiting for the next tick.
    ///
    /// Useful after the host was suspended. No-op unless running.
    pub fn refresh(&self) {
        self.shared.refresh();
    }

    /// Cancel the tick and the storage subscription. Nothing fires afterwards.
    pub fn dispose(&self) {
        self.shared.dispose();
    }

    pub fn view(&self) -> TimerView {
        let inner = self.shared.lock_inner();
        TimerView {
            value_ms: inner.reading.value_ms,
            progress: inner.reading.progress,
            running: inner.run_state.is_running(),
            ended: inner.run_state == RunState::Ended,
            mode: self.shared.config.mode,
            run_state: inner.run_state,
            duration_ms: inner.duration_ms,
        }
    }

    pub fn value_ms(&self) -> i64 {
        self.view().value_ms
    }

    pub fn progress(&self) -> Option<f64> {
        self.view().progress
    }

    pub fn running(&self) -> bool {
        self.view().running
    }

    pub fn ended(&self) -> bool {
        self.view().ended
    }

    pub fn run_state(&self) -> RunState {
        self.view().run_state
    }

    pub fn mode(&self) -> TimerMode {
        self.shared.config.mode
    }

    /// The snapshot this instance would persist right now
    pub fn snapshot(&self) -> PersistedSnapshot {
        let inner = self.shared.lock_inner();
        self.shared.snapshot_of(&inner)
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.is_disposed()
    }
}

impl Drop for TimerEngine {
    fn drop(&mut self) {
        self.shared.dispose();
    }
}

impl Shared {
    /// Lock the state, recovering it if a callback panicked while it was held
    pub(crate) fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            error!("Timer state lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    pub(crate) fn lock_write_order(&self) -> MutexGuard<'_, ()> {
        self.write_order.lock().unwrap_or_else(|poisoned| {
            error!("Timer write lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Invoke callbacks for a finished state change. Must run with no locks held.
    ///
    /// A `dispose` that completed while the change was being persisted wins:
    /// nothing is reported afterwards.
    pub(crate) fn fire(&self, effects: Effects) {
        if let (Some(value), Some(on_tick)) = (effects.tick_value, &self.on_tick) {
            if self.is_disposed() {
                debug!("Timer disposed, dropping tick callback");
                return;
            }
            on_tick(value);
        }
        if effects.ended {
            info!("Timer ended");
            if let Some(on_end) = &self.on_end {
                if self.is_disposed() {
                    debug!("Timer disposed, dropping end callback");
                    return;
                }
                on_end();
            }
        }
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.lock_inner().disposed
    }

    pub(crate) fn dispose(&self) {
        let (tick, subscription) = {
            let mut inner = self.lock_inner();
            if inner.disposed {
                return;
            }
            inner.disposed = true;
            inner.generation += 1;
            (inner.tick.take(), inner.subscription.take())
        };
        // Cancelled outside the lock: a subscription guard may wait on the store
        drop(tick);
        drop(subscription);
        info!("Timer disposed");
    }
}

impl Inner {
    /// Idle state with the default anchor for `duration_ms`
    fn idle(config: &TimerConfig, duration_ms: Option<i64>, now: i64) -> Self {
        let (anchor, frozen_ms) = transitions::default_anchor(config.mode, duration_ms, now);
        Self {
            run_state: RunState::Idle,
            anchor: Some(anchor),
            duration_ms,
            frozen_ms: Some(frozen_ms),
            reading: crate::clock::model::frozen(config.mode, frozen_ms, duration_ms, false),
            saved_at_ms: 0,
            generation: 0,
            tick: None,
            subscription: None,
            disposed: false,
        }
    }
}
