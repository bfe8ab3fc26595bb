//! File-backed storage: one JSON file per key.
//!
//! This is the default adapter. Separate processes pointing at the same
//! directory share timers; changes made by another process are picked up by
//! the [`store_watch`](crate::tasks::store_watch) polling task.

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard,
    },
    time::Duration,
};

use tracing::{debug, error, warn};

use super::{ChangeListener, StorageAdapter, StorageError};
use crate::{tasks::store_watch_task, utils::CancelGuard};

/// Environment variable overriding the default storage directory
pub const STORE_DIR_ENV: &str = "ANCHOR_TIMER_DIR";

/// Default interval at which external changes are polled
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Distinguishes temp files of concurrent writers within one process
static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Adapter storing a single key in `<dir>/<key>.json`
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
    poll_interval: Duration,
    /// Last content this adapter wrote or observed, shared with the watch task.
    /// Held across every file access so the watcher never sees our own write
    /// before it is recorded here.
    last_seen: Arc<Mutex<Option<String>>>,
}

impl FileStorage {
    /// Adapter for `key` inside `dir`
    pub fn new(dir: impl AsRef<Path>, key: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{}.json", sanitize_key(key))),
            poll_interval: DEFAULT_POLL_INTERVAL,
            last_seen: Arc::new(Mutex::new(None)),
        }
    }

    /// Adapter for `key` in the default directory
    pub fn for_key(key: &str) -> Self {
        Self::new(default_dir(), key)
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_last_seen(&self) -> MutexGuard<'_, Option<String>> {
        self.last_seen.lock().unwrap_or_else(|poisoned| {
            error!("File storage state poisoned, recovering");
            poisoned.into_inner()
        })
    }

    fn tmp_path(&self) -> PathBuf {
        let n = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.path
            .with_extension(format!("json.{}.{}.tmp", std::process::id(), n))
    }
}

/// `$ANCHOR_TIMER_DIR`, or `anchor-timer` under the system temp directory
pub fn default_dir() -> PathBuf {
    std::env::var_os(STORE_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("anchor-timer"))
}

/// Keep keys usable as file names
fn sanitize_key(key: &str) -> String {
    let cleaned: String = key
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "default".to_string()
    } else {
        cleaned
    }
}

/// Read a file, treating a missing file as no value
pub(crate) fn read_value(path: &Path) -> io::Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

impl StorageAdapter for FileStorage {
    fn get(&self) -> Result<Option<String>, StorageError> {
        let mut last_seen = self.lock_last_seen();
        let value = read_value(&self.path)?;
        *last_seen = value.clone();
        Ok(value)
    }

    fn set(&self, value: &str) -> Result<(), StorageError> {
        let mut last_seen = self.lock_last_seen();
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }

        // Write a private temp file then rename so readers never see a partial file
        let tmp = self.tmp_path();
        if let Err(e) = fs::write(&tmp, value) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        *last_seen = Some(value.to_string());

        debug!("Wrote {} bytes to {}", value.len(), self.path.display());
        Ok(())
    }

    fn remove(&self) -> Result<(), StorageError> {
        let mut last_seen = self.lock_last_seen();
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        *last_seen = None;
        Ok(())
    }

    fn subscribe(&self, listener: ChangeListener) -> Option<CancelGuard> {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!(
                    "No tokio runtime, changes to {} by other processes will not be observed",
                    self.path.display()
                );
                return None;
            }
        };

        let task = runtime.spawn(store_watch_task(
            self.path.clone(),
            self.poll_interval,
            Arc::clone(&self.last_seen),
            listener,
        ));
        Some(CancelGuard::new(move || task.abort()))
    }
}
