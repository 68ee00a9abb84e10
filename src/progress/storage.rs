//! Snapshot persistence.
//!
//! The whole [`GameState`] is stored as one JSON document under a fixed key in
//! an opaque key-value store. Three backends implement [`StateStore`]:
//!
//! - [`JsonFileStore`]: `<dir>/<key>.json`, fs2 shared lock for reads and an
//!   exclusive lock plus temp-file rename for writes
//! - [`SledStore`]: one sled tree, key → JSON bytes
//! - [`MemoryStore`]: process-local map, used by tests and embedders
//!
//! [`load_snapshot`] and [`save_snapshot`] form the adapter the engine uses.
//! They never fail: unreadable or unparsable data loads as absent, and a
//! rejected write is logged and reported as `false`.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use fs2::FileExt;
use log::{debug, warn};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::Value;

use crate::progress::errors::ProgressError;
use crate::progress::types::GameState;

/// Fixed storage key of the game snapshot.
pub const DEFAULT_STATE_KEY: &str = "usaco-treasure-state";

const SLED_TREE: &str = "snapshots";

/// Characters kept verbatim in snapshot filenames; everything else is percent-encoded.
const KEY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_');

/// Raw key-value backend. Values are serialized snapshot text.
pub trait StateStore: Send + Sync {
    /// Fetch the stored text, `Ok(None)` when nothing is stored under `key`.
    fn read(&self, key: &str) -> Result<Option<String>, ProgressError>;

    fn write(&self, key: &str, contents: &str) -> Result<(), ProgressError>;
}

impl<T: StateStore + ?Sized> StateStore for Arc<T> {
    fn read(&self, key: &str) -> Result<Option<String>, ProgressError> {
        (**self).read(key)
    }

    fn write(&self, key: &str, contents: &str) -> Result<(), ProgressError> {
        (**self).write(key, contents)
    }
}

// ============================================================================
// Adapter
// ============================================================================

/// Load the raw snapshot stored under `key`. Missing, unreadable or
/// unparsable data is treated as absent.
pub fn load_snapshot<S: StateStore + ?Sized>(store: &S, key: &str) -> Option<Value> {
    let text = match store.read(key) {
        Ok(Some(text)) => text,
        Ok(None) => {
            debug!("snapshot '{}' not found", key);
            return None;
        }
        Err(e) => {
            warn!("snapshot '{}' unreadable, starting from defaults: {}", key, e);
            return None;
        }
    };
    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Null) => None,
        Ok(value) => Some(value),
        Err(e) => {
            warn!("snapshot '{}' is not valid JSON, starting from defaults: {}", key, e);
            None
        }
    }
}

/// Best-effort write of the full state. Returns whether it was stored.
pub fn save_snapshot<S: StateStore + ?Sized>(store: &S, key: &str, state: &GameState) -> bool {
    let data = match serde_json::to_string(state) {
        Ok(data) => data,
        Err(e) => {
            warn!("snapshot '{}' serialize error: {}", key, e);
            return false;
        }
    };
    match store.write(key, &data) {
        Ok(()) => true,
        Err(e) => {
            warn!("snapshot '{}' not saved, keeping in-memory state: {}", key, e);
            false
        }
    }
}

// ============================================================================
// JSON file backend
// ============================================================================

pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, ProgressError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        let name = utf8_percent_encode(key, KEY_ENCODE_SET).to_string();
        self.dir.join(format!("{}.json", name))
    }
}

impl StateStore for JsonFileStore {
    fn read(&self, key: &str) -> Result<Option<String>, ProgressError> {
        let path = self.path_for(key);
        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        file.lock_shared()?;
        let mut text = String::new();
        let read = file.read_to_string(&mut text);
        let _ = file.unlock();
        read?;
        let cleaned = text.trim_start_matches('\0').trim();
        if cleaned.is_empty() {
            return Ok(None);
        }
        Ok(Some(cleaned.to_string()))
    }

    fn write(&self, key: &str, contents: &str) -> Result<(), ProgressError> {
        let path = self.path_for(key);

        // Lock the destination itself so concurrent readers see old or new, never partial
        let lock_file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)?;
        lock_file.lock_exclusive()?;

        let base = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("state.json");
        let mut counter = 0u32;
        let tmp_path = loop {
            let candidate = self
                .dir
                .join(format!(".{}.tmp-{}-{}", base, std::process::id(), counter));
            match OpenOptions::new().write(true).create_new(true).open(&candidate) {
                Ok(tmp) => {
                    let tmp = fill_temp(tmp, &candidate, contents.as_bytes())?;
                    let _ = tmp.sync_all();
                    break candidate;
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    counter = counter.saturating_add(1);
                }
                Err(e) => return Err(e.into()),
            }
        };

        if let Err(e) = fs::rename(&tmp_path, &path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }
        if let Ok(dir_file) = File::open(&self.dir) {
            let _ = dir_file.sync_all();
        }
        drop(lock_file);
        Ok(())
    }
}

/// Write `contents` to a freshly created temp file. On failure the handle is
/// closed and the file at `path` removed before the error is returned.
fn fill_temp<W: Write>(mut tmp: W, path: &Path, contents: &[u8]) -> std::io::Result<W> {
    match tmp.write_all(contents).and_then(|()| tmp.flush()) {
        Ok(()) => Ok(tmp),
        Err(e) => {
            drop(tmp);
            let _ = fs::remove_file(path);
            Err(e)
        }
    }
}

// ============================================================================
// Sled backend
// ============================================================================

pub struct SledStore {
    _db: sled::Db,
    snapshots: sled::Tree,
}

impl SledStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ProgressError> {
        let path_ref = path.as_ref();
        fs::create_dir_all(path_ref)?;
        let db = sled::open(path_ref)?;
        let snapshots = db.open_tree(SLED_TREE)?;
        Ok(Self { _db: db, snapshots })
    }
}

impl StateStore for SledStore {
    fn read(&self, key: &str) -> Result<Option<String>, ProgressError> {
        let Some(bytes) = self.snapshots.get(key.as_bytes())? else {
            return Ok(None);
        };
        Ok(Some(std::str::from_utf8(&bytes)?.to_string()))
    }

    fn write(&self, key: &str, contents: &str) -> Result<(), ProgressError> {
        self.snapshots.insert(key.as_bytes(), contents.as_bytes())?;
        self.snapshots.flush()?;
        Ok(())
    }
}

// ============================================================================
// In-memory backend
// ============================================================================

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    reject_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an entry directly, bypassing the snapshot serializer.
    pub fn with_entry(key: &str, contents: &str) -> Self {
        let store = Self::new();
        if let Ok(mut entries) = store.entries.lock() {
            entries.insert(key.to_string(), contents.to_string());
        }
        store
    }

    /// Make every following write fail, simulating an unavailable store.
    pub fn set_reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }
}

impl StateStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>, ProgressError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| ProgressError::Unavailable("memory store poisoned".into()))?;
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, contents: &str) -> Result<(), ProgressError> {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(ProgressError::Unavailable("writes rejected".into()));
        }
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| ProgressError::Unavailable("memory store poisoned".into()))?;
        entries.insert(key.to_string(), contents.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "no space left"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failed_temp_write_leaves_no_file_behind() {
        let dir = TempDir::new().expect("tempdir");
        let tmp_path = dir.path().join(".state.json.tmp-1-0");
        File::create(&tmp_path).expect("create tmp");

        assert!(fill_temp(FullDisk, &tmp_path, b"{}").is_err());
        assert!(!tmp_path.exists());

        let kept = dir.path().join(".state.json.tmp-1-1");
        let file = File::create(&kept).expect("create tmp");
        assert!(fill_temp(file, &kept, b"{}").is_ok());
        assert_eq!(fs::read_to_string(&kept).expect("read"), "{}");
    }

    #[test]
    fn json_store_round_trip_state() {
        let dir = TempDir::new().expect("tempdir");
        let store = JsonFileStore::open(dir.path()).expect("store");
        let mut state = GameState::new_default("2026-10-12T00:00:00.000Z");
        state.players.get_mut("grace").expect("grace").coins = 42;
        assert!(save_snapshot(&store, DEFAULT_STATE_KEY, &state));

        let raw = load_snapshot(&store, DEFAULT_STATE_KEY).expect("stored");
        assert_eq!(raw["players"]["grace"]["coins"], 42);
        assert_eq!(raw["currentPlayer"], "gilbert");
        assert!(store.path_for(DEFAULT_STATE_KEY).ends_with("usaco-treasure-state.json"));
    }

    #[test]
    fn unsafe_keys_are_encoded() {
        let dir = TempDir::new().expect("tempdir");
        let store = JsonFileStore::open(dir.path()).expect("store");
        let path = store.path_for("../escape");
        assert_eq!(path.parent(), Some(dir.path()));
        assert!(path.ends_with("%2E%2E%2Fescape.json"));
    }

    #[test]
    fn missing_and_corrupt_snapshots_load_as_absent() {
        let dir = TempDir::new().expect("tempdir");
        let store = JsonFileStore::open(dir.path()).expect("store");
        assert!(load_snapshot(&store, DEFAULT_STATE_KEY).is_none());

        fs::write(store.path_for(DEFAULT_STATE_KEY), "{ not json").expect("write");
        assert!(load_snapshot(&store, DEFAULT_STATE_KEY).is_none());

        fs::write(store.path_for(DEFAULT_STATE_KEY), "\0\0null").expect("write");
        assert!(load_snapshot(&store, DEFAULT_STATE_KEY).is_none());
    }

    #[test]
    fn sled_store_round_trip() {
        let dir = TempDir::new().expect("tempdir");
        let store = SledStore::open(dir.path()).expect("sled");
        assert!(store.read("k").expect("read").is_none());
        store.write("k", "{\"a\":1}").expect("write");
        assert_eq!(store.read("k").expect("read").as_deref(), Some("{\"a\":1}"));
    }

    #[test]
    fn rejected_writes_report_false() {
        let store = MemoryStore::new();
        store.set_reject_writes(true);
        let state = GameState::new_default("w");
        assert!(!save_snapshot(&store, DEFAULT_STATE_KEY, &state));
        assert!(store.get(DEFAULT_STATE_KEY).is_none());

        store.set_reject_writes(false);
        assert!(save_snapshot(&store, DEFAULT_STATE_KEY, &state));
        assert!(store.get(DEFAULT_STATE_KEY).is_some());
    }
}
