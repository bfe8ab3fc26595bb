//! State transitions: start, pause, reset and recomputation on ticks

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{options::positive_duration, Effects, Inner, ResetOptions, Shared, StartOptions};
use crate::{
    clock::model::{self, ClockInput, ClockReading},
    state::{Anchor, PersistedSnapshot, RunState, TimerMode},
};

/// Anchor an idle timer shows, and the value it displays
pub(super) fn default_anchor(mode: TimerMode, duration_ms: Option<i64>, now: i64) -> (Anchor, i64) {
    match mode {
        TimerMode::Countdown => {
            let duration = duration_ms.unwrap_or(0);
            (Anchor::EndAt(now.saturating_add(duration)), duration)
        }
        TimerMode::Countup => (Anchor::StartAt(now), 0),
    }
}

impl Shared {
    /// Run a mutation: state change under both locks, persistence under the
    /// write-order lock only, callbacks with nothing held.
    fn mutate<F>(&self, op: &str, change: F)
    where
        F: FnOnce(&mut Inner, i64) -> Effects,
    {
        let order = self.lock_write_order();
        let effects = {
            let mut inner = self.lock_inner();
            if inner.disposed {
                debug!("Ignoring {} on disposed timer", op);
                return;
            }
            let now = self.clock.now_ms();
            change(&mut *inner, now)
        };
        if let Some(snapshot) = &effects.persist {
            self.persist(snapshot);
        }
        drop(order);
        self.fire(effects);
    }

    pub(super) fn start(self: &Arc<Self>, opts: StartOptions) {
        self.mutate("start", |inner, now| {
            if inner.run_state.is_running() {
                debug!("Start ignored, timer already running");
                return Effects::default();
            }

            let mode = self.config.mode;
            if let Some(duration) = positive_duration(opts.duration_ms) {
                inner.duration_ms = Some(duration);
            }

            let explicit = match mode {
                TimerMode::Countdown => opts.end_at_ms,
                TimerMode::Countup => opts.start_at_ms,
            };
            if explicit.is_none() && (opts.end_at_ms.is_some() || opts.start_at_ms.is_some()) {
                warn!("Anchor option does not apply to a {} timer, ignoring", mode.as_str());
            }

            let anchor = match (explicit, inner.run_state, inner.frozen_ms) {
                (Some(at), _, _) => Anchor::for_mode(mode, at),
                (None, RunState::Paused, Some(frozen)) if opts.is_empty() => {
                    Anchor::rebase(mode, frozen, now)
                }
                _ => default_anchor(mode, inner.duration_ms, now).0,
            };

            info!(
                "Starting {} timer (anchor={}, duration={:?})",
                mode.as_str(),
                anchor.ms(),
                inner.duration_ms
            );
            inner.run_state = RunState::Running;
            inner.anchor = Some(anchor);
            inner.frozen_ms = None;
            self.advance_running(inner, now)
        });
    }

    pub(super) fn pause(self: &Arc<Self>) {
        self.mutate("pause", |inner, now| {
            if !inner.run_state.is_running() {
                debug!("Pause ignored, timer not running");
                return Effects::default();
            }

            let reading = self.read(inner, now);
            if reading.ended {
                // Completion noticed on the way to pausing
                return self.finish(inner, reading, now);
            }

            info!("Pausing timer at {}ms", reading.value_ms);
            inner.cancel_ticks();
            inner.run_state = RunState::Paused;
            inner.frozen_ms = Some(reading.value_ms);
            inner.reading = reading;
            inner.saved_at_ms = now;
            Effects {
                tick_value: Some(reading.value_ms),
                ended: false,
                persist: Some(self.snapshot_of(inner)),
            }
        });
    }

    pub(super) fn reset(self: &Arc<Self>, opts: ResetOptions) {
        self.mutate("reset", |inner, now| {
            let duration_ms = positive_duration(opts.duration_ms).or(self.config.duration_ms);
            let (anchor, frozen) = default_anchor(self.config.mode, duration_ms, now);

            info!("Resetting timer (duration={:?})", duration_ms);
            inner.cancel_ticks();
            inner.run_state = RunState::Idle;
            inner.anchor = Some(anchor);
            inner.duration_ms = duration_ms;
            inner.frozen_ms = Some(frozen);
            inner.reading = model::frozen(self.config.mode, frozen, duration_ms, false);
            inner.saved_at_ms = now;
            Effects {
                tick_value: Some(frozen),
                ended: false,
                persist: Some(self.snapshot_of(inner)),
            }
        });
    }

    /// Recompute now, exactly like a tick would. No-op unless running.
    pub(super) fn refresh(self: &Arc<Self>) {
        self.mutate("refresh", |inner, now| {
            if !inner.run_state.is_running() {
                return Effects::default();
            }
            self.recompute(inner, now)
        });
    }

    /// Scheduler callback for tick stream `generation`
    fn tick(self: &Arc<Self>, generation: u64) {
        self.mutate("tick", |inner, now| {
            if generation != inner.generation || !inner.run_state.is_running() {
                debug!("Dropping stale tick of generation {}", generation);
                return Effects::default();
            }
            self.recompute(inner, now)
        });
    }

    fn recompute(&self, inner: &mut Inner, now: i64) -> Effects {
        let reading = self.read(inner, now);
        inner.reading = reading;
        if reading.ended {
            return self.finish(inner, reading, now);
        }

        Effects {
            tick_value: Some(reading.value_ms),
            ..Effects::default()
        }
    }

    /// Recompute a freshly anchored running timer: end it right away or arm ticks.
    pub(super) fn advance_running(self: &Arc<Self>, inner: &mut Inner, now: i64) -> Effects {
        let reading = self.read(inner, now);
        if reading.ended {
            return self.finish(inner, reading, now);
        }

        inner.reading = reading;
        inner.saved_at_ms = now;
        self.arm_ticks(inner);
        Effects {
            tick_value: Some(reading.value_ms),
            ended: false,
            persist: Some(self.snapshot_of(inner)),
        }
    }

    /// Transition into `Ended`
    pub(super) fn finish(&self, inner: &mut Inner, reading: ClockReading, now: i64) -> Effects {
        inner.cancel_ticks();
        inner.run_state = RunState::Ended;
        inner.frozen_ms = Some(reading.value_ms);
        inner.reading = ClockReading {
            ended: true,
            ..reading
        };
        inner.saved_at_ms = now;
        Effects {
            tick_value: Some(reading.value_ms),
            ended: true,
            persist: Some(self.snapshot_of(inner)),
        }
    }

    /// Replace the tick stream. At most one is live per engine.
    pub(super) fn arm_ticks(self: &Arc<Self>, inner: &mut Inner) {
        inner.cancel_ticks();
        let generation = inner.generation;
        let engine = Arc::downgrade(self);
        inner.tick = Some(self.scheduler.every(
            self.config.interval,
            Arc::new(move || {
                if let Some(engine) = engine.upgrade() {
                    engine.tick(generation);
                }
            }),
        ));
    }

    /// Clock model reading of a running timer
    pub(super) fn read(&self, inner: &Inner, now: i64) -> ClockReading {
        let anchor_ms = inner.anchor.map(|a| a.ms()).unwrap_or(now);
        model::read(&ClockInput {
            mode: self.config.mode,
            anchor_ms,
            now_ms: now,
            duration_ms: inner.duration_ms,
            stop_at_duration: self.config.stop_at_duration,
        })
    }

    pub(crate) fn snapshot_of(&self, inner: &Inner) -> PersistedSnapshot {
        PersistedSnapshot {
            mode: self.config.mode,
            run_state: inner.run_state,
            anchor: inner.anchor,
            duration_ms: inner.duration_ms,
            frozen_ms: match inner.run_state {
                RunState::Running => None,
                _ => inner.frozen_ms,
            },
            saved_at_ms: inner.saved_at_ms,
        }
    }
}

impl Inner {
    /// Drop the live tick stream and invalidate any tick already in flight
    pub(super) fn cancel_ticks(&mut self) {
        self.generation += 1;
        if let Some(tick) = self.tick.take() {
            tick.cancel();
        }
    }
}
