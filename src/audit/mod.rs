//! # Audit Log
//!
//! Every authenticated action is written to the process log and, for
//! mutating actions, appended to a bounded history that clients read back
//! with `getLog`. The history holds at most [`LOG_HISTORY_SIZE`] entries
//! (oldest evicted first) and is rewritten atomically to disk after each
//! append so it survives restarts.
//!
//! Persistence is best effort: a failed write is logged at error level and
//! the in-memory history stays authoritative. Inside a tokio runtime the
//! file is written on the blocking pool, never on a runtime worker; each
//! write carries a generation so an older snapshot never replaces a newer
//! one. [`AuditLog::flush`] writes synchronously.

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};

use crate::logutil::escape_log;

/// Maximum number of retained history entries.
pub const LOG_HISTORY_SIZE: usize = 100;

/// Seconds since the epoch with millisecond precision.
pub fn epoch_seconds(at: DateTime<Utc>) -> f64 {
    at.timestamp_millis() as f64 / 1000.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub timestamp: f64,
    pub caller: String,
    pub message: String,
}

#[derive(Default)]
struct History {
    entries: VecDeque<HistoryEntry>,
    /// Bumped on every append.
    generation: u64,
}

/// The history file and the newest generation written to it.
struct HistoryStore {
    path: PathBuf,
    written: Mutex<u64>,
}

impl HistoryStore {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            written: Mutex::new(0),
        }
    }

    fn save(&self, generation: u64, entries: &[HistoryEntry]) {
        let mut written = self.written.lock().unwrap_or_else(PoisonError::into_inner);
        if generation <= *written {
            return;
        }
        match persist(&self.path, entries) {
            Ok(()) => *written = generation,
            Err(e) => error!("Failed to save history to {}: {}", self.path.display(), e),
        }
    }
}

pub struct AuditLog {
    history: Mutex<History>,
    store: Option<Arc<HistoryStore>>,
}

impl AuditLog {
    /// Open the history persisted at `path`, starting empty if it is missing
    /// or unreadable.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = Self::load(&path, LOG_HISTORY_SIZE);
        info!(
            "Loaded {} history entries from {}",
            entries.len(),
            path.display()
        );
        Self {
            history: Mutex::new(History {
                entries,
                generation: 0,
            }),
            store: Some(Arc::new(HistoryStore::new(path))),
        }
    }

    /// History that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            history: Mutex::new(History::default()),
            store: None,
        }
    }

    /// Read a persisted history, keeping only the newest `max_entries`.
    pub fn load(path: &Path, max_entries: usize) -> VecDeque<HistoryEntry> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return VecDeque::new(),
            Err(e) => {
                warn!("Could not read history file {}: {}", path.display(), e);
                return VecDeque::new();
            }
        };
        let mut entries: VecDeque<HistoryEntry> = match serde_json::from_str(&content) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Ignoring unreadable history file {}: {}", path.display(), e);
                return VecDeque::new();
            }
        };
        while entries.len() > max_entries {
            entries.pop_front();
        }
        entries
    }

    /// Log an action and append it to the history.
    pub fn record(&self, caller: &str, message: &str) {
        self.record_with(caller, message, true);
    }

    /// Log an action to the process log only.
    pub fn note(&self, caller: &str, message: &str) {
        self.record_with(caller, message, false);
    }

    pub fn record_with(&self, caller: &str, message: &str, include_in_history: bool) {
        info!("[{}] {}", escape_log(caller), escape_log(message));
        if !include_in_history {
            return;
        }

        let snapshot = {
            let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
            history.entries.push_back(HistoryEntry {
                timestamp: epoch_seconds(Utc::now()),
                caller: caller.to_string(),
                message: message.to_string(),
            });
            while history.entries.len() > LOG_HISTORY_SIZE {
                history.entries.pop_front();
            }
            history.generation += 1;
            self.store.as_ref().map(|_| Self::snapshot(&history))
        };

        if let (Some(store), Some((generation, entries))) = (&self.store, snapshot) {
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    let store = Arc::clone(store);
                    runtime.spawn_blocking(move || store.save(generation, &entries));
                }
                Err(_) => store.save(generation, &entries),
            }
        }
    }

    fn snapshot(history: &History) -> (u64, Vec<HistoryEntry>) {
        (history.generation, history.entries.iter().cloned().collect())
    }

    /// Write the current history to disk now, blocking the caller.
    pub fn flush(&self) {
        if let Some(store) = &self.store {
            let (generation, entries) = {
                let history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
                Self::snapshot(&history)
            };
            store.save(generation, &entries);
        }
    }

    /// The last `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<HistoryEntry> {
        let history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        let skip = history.entries.len().saturating_sub(n);
        history.entries.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Replace the history file under an exclusive lock via temp file + rename.
fn persist(path: &Path, entries: &[HistoryEntry]) -> Result<()> {
    let content = serde_json::to_string(entries)?;

    let lock_file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(path)?;
    lock_file.lock_exclusive()?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let base = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("arcom.history");
    let mut counter = 0u32;
    let tmp_path = loop {
        let candidate = dir.join(format!(".{}.tmp-{}-{}", base, std::process::id(), counter));
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(mut tmp) => {
                tmp.write_all(content.as_bytes())?;
                tmp.flush()?;
                let _ = tmp.sync_all();
                break candidate;
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                counter = counter.saturating_add(1);
            }
            Err(e) => return Err(anyhow!("Failed to create temp file for atomic write: {}", e)),
        }
    };

    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    if let Ok(dir_file) = File::open(dir) {
        let _ = dir_file.sync_all();
    }
    drop(lock_file);
    Ok(())
}
