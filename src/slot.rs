//! The shared persistent slot behind the session codec.
//!
//! One process-wide key-value slot holds the current stored session. Every
//! execution context of the application shares it, and every write or
//! delete is announced on a broadcast channel carrying the changed key so
//! observers in other contexts can re-read. This is the non-browser
//! rendition of an origin-scoped storage area plus its change events.
//!
//! Two hosts are provided: an in-process cell for tests and ephemeral
//! embedders, and a file-backed slot that survives restarts.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::debug;

/// Buffered change notifications per subscriber before lagging.
const CHANGE_CHANNEL_CAPACITY: usize = 16;

/// A shared key-value slot with change notifications.
///
/// Writers announce every `write` and `delete` on the channel returned by
/// [`subscribe`](SessionSlot::subscribe). Delivery is best-effort and
/// in-process only; ordering between racing writers is last-write-wins.
pub trait SessionSlot: Send + Sync {
    /// Read the current value, `None` if the key is absent.
    fn read(&self, key: &str) -> Result<Option<String>>;

    /// Write (or overwrite) the value and notify subscribers.
    fn write(&self, key: &str, value: &str) -> Result<()>;

    /// Delete the key if present and notify subscribers.
    fn delete(&self, key: &str) -> Result<()>;

    /// Subscribe to changed-key notifications.
    fn subscribe(&self) -> broadcast::Receiver<String>;
}

// ── In-process slot ─────────────────────────────────────────────────

/// In-memory slot shared between contexts of one process.
pub struct MemorySessionSlot {
    cells: Mutex<HashMap<String, String>>,
    changes: broadcast::Sender<String>,
}

impl MemorySessionSlot {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            cells: Mutex::new(HashMap::new()),
            changes,
        }
    }

    fn notify(&self, key: &str) {
        // Nobody listening is fine; the send result only reports that.
        let _ = self.changes.send(key.to_string());
        debug!(key, "session slot changed");
    }
}

impl Default for MemorySessionSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionSlot for MemorySessionSlot {
    fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.cells.lock().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        self.cells.lock().insert(key.to_string(), value.to_string());
        self.notify(key);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.cells.lock().remove(key);
        self.notify(key);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<String> {
        self.changes.subscribe()
    }
}

// ── File-backed slot ────────────────────────────────────────────────

/// Durable slot backed by one file per key under a state directory.
///
/// Survives process restarts; change notifications still reach only
/// in-process subscribers.
pub struct FileSessionSlot {
    dir: PathBuf,
    changes: broadcast::Sender<String>,
}

impl FileSessionSlot {
    /// Open (or create) the slot directory.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating session slot dir {}", dir.display()))?;
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self::check_writable(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            changes,
        })
    }

    fn check_writable(dir: &Path) -> Result<()> {
        let probe = dir.join(".slot_probe");
        fs::write(&probe, b"")
            .with_context(|| format!("session slot dir {} not writable", dir.display()))?;
        let _ = fs::remove_file(&probe);
        Ok(())
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    fn notify(&self, key: &str) {
        let _ = self.changes.send(key.to_string());
        debug!(key, "session slot changed");
    }
}

impl SessionSlot for FileSessionSlot {
    fn read(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading session slot key {key}")),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        fs::write(self.path_for(key), value)
            .with_context(|| format!("writing session slot key {key}"))?;
        self.notify(key);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| format!("deleting session slot key {key}"));
            }
        }
        self.notify(key);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<String> {
        self.changes.subscribe()
    }
}

// ── Tests ───────────────────────────────────────────────────────────
