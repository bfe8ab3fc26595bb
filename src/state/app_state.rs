//! State of the HTTP host around one timer

use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::TimerView;
use crate::engine::{ResetOptions, StartOptions, TimerEngine};

/// Everything the API handlers share
pub struct AppState {
    /// The hosted timer
    pub timer: TimerEngine,
    /// Persistence key of the timer
    pub key: String,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
    /// Last action tracking
    pub last_action: Arc<Mutex<Option<String>>>,
    pub last_action_time: Arc<Mutex<Option<DateTime<Utc>>>>,
    /// Change feed, bumped on every tick and action
    pub view_tx: ViewSender,
}

/// Change feed fed by the timer callbacks
pub type ViewSender = Arc<watch::Sender<TimerView>>;

/// A change feed with no listeners yet
pub fn view_channel() -> ViewSender {
    Arc::new(watch::channel(TimerView::default()).0)
}

impl AppState {
    /// Wrap a timer whose callbacks push into `view_tx`
    pub fn new(
        timer: TimerEngine,
        view_tx: ViewSender,
        key: String,
        port: u16,
        host: String,
    ) -> Self {
        // Callbacks fired during construction only saw a partial view
        view_tx.send_replace(timer.view());

        Self {
            timer,
            key,
            start_time: Instant::now(),
            port,
            host,
            last_action: Arc::new(Mutex::new(None)),
            last_action_time: Arc::new(Mutex::new(None)),
            view_tx,
        }
    }

    /// Apply an action to the timer and record it
    pub fn apply<F>(&self, action: &str, operation: F) -> TimerView
    where
        F: FnOnce(&TimerEngine),
    {
        info!("Timer action: {}", action);
        operation(&self.timer);

        match self.last_action.lock() {
            Ok(mut last_action) => *last_action = Some(action.to_string()),
            Err(e) => warn!("Failed to record last action: {}", e),
        }
        if let Ok(mut last_time) = self.last_action_time.lock() {
            *last_time = Some(Utc::now());
        }

        let view = self.timer.view();
        self.view_tx.send_replace(view);
        view
    }

    pub fn start(&self, opts: StartOptions) -> TimerView {
        self.apply("start", |timer| timer.start(opts))
    }

    pub fn pause(&self) -> TimerView {
        self.apply("pause", |timer| timer.pause())
    }

    pub fn reset(&self, opts: ResetOptions) -> TimerView {
        self.apply("reset", |timer| timer.reset(opts))
    }

    /// Current timer view
    pub fn view(&self) -> TimerView {
        self.timer.view()
    }

    /// Wait until the timer changes or `timeout` passes, then return the view
    pub async fn next_view(&self, timeout: Duration) -> TimerView {
        let mut changes = self.view_tx.subscribe();
        if tokio::time::timeout(timeout, changes.changed()).await.is_err() {
            debug!("No timer change within {:?}", timeout);
        }
        self.timer.view()
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }

    /// Get last action information
    pub fn get_last_action(&self) -> (Option<String>, Option<DateTime<Utc>>) {
        let last_action = self.last_action.lock().ok().and_then(|a| a.clone());
        let last_action_time = self.last_action_time.lock().ok().and_then(|t| *t);
        (last_action, last_action_time)
    }
}
