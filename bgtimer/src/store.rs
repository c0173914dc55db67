use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use metrics::counter;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::stopwatch::ZERO_DISPLAY;

/// The two persisted keys: the stopped duration and its rendered form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub end: i64,
    pub time: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("state file io: {0}")]
    Io(#[from] io::Error),
    #[error("state file encoding: {0}")]
    Codec(#[from] bincode::Error),
    #[error("state store lock poisoned")]
    Poisoned,
}

impl<T> From<PoisonError<T>> for StoreError {
    fn from(_: PoisonError<T>) -> Self {
        StoreError::Poisoned
    }
}

/// Durable backend for a single namespace.
pub trait StateStore: std::fmt::Debug + Send + Sync + 'static {
    fn load(&self) -> Result<Option<Snapshot>, StoreError>;

    /// Writes both keys at once; readers never see one without the other.
    fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError>;
}

#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl AsRef<Path>, namespace: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{namespace}.state")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        self.path.with_extension("state.tmp")
    }
}

impl StateStore for FileStore {
    fn load(&self) -> Result<Option<Snapshot>, StoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(bincode::deserialize(&bytes)?))
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let bytes = bincode::serialize(snapshot)?;

        let tmp = self.tmp_path();
        {
            let mut f = File::create(&tmp)?;
            f.write_all(&bytes)?;
            f.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// In-process store. Clones share the same slot, so a clone handed to a new
/// `TimerService` behaves like the same durable storage seen after a restart.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slot: Arc<Mutex<Option<Snapshot>>>,
}

impl StateStore for MemoryStore {
    fn load(&self) -> Result<Option<Snapshot>, StoreError> {
        Ok(self.slot.lock()?.clone())
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        *self.slot.lock()? = Some(snapshot.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedState {
    pub end: Option<i64>,
    pub time: String,
}

impl Default for LoadedState {
    fn default() -> Self {
        Self {
            end: None,
            time: ZERO_DISPLAY.to_string(),
        }
    }
}

/// Infallible view over a `StateStore`: a broken backend reads as "no prior
/// state" and a failed write is dropped.
#[derive(Debug, Clone)]
pub struct PersistedState {
    store: Arc<dyn StateStore>,
}

impl PersistedState {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    pub fn load(&self) -> LoadedState {
        match self.store.load() {
            Ok(Some(Snapshot { end, time })) => LoadedState {
                end: Some(end),
                time,
            },
            Ok(None) => LoadedState::default(),
            Err(e) => {
                warn!("loading timer state failed, starting fresh: {e}");
                counter!("store::load_failed").increment(1);
                LoadedState::default()
            }
        }
    }

    pub fn save(&self, end: i64, time: &str) {
        let snapshot = Snapshot {
            end,
            time: time.to_string(),
        };
        match self.store.save(&snapshot) {
            Ok(()) => debug!("persisted timer state: {snapshot:?}"),
            Err(e) => {
                warn!("persisting timer state failed: {e}");
                counter!("store::save_failed").increment(1);
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;

    /// Backend that is never available.
    #[derive(Debug, Default)]
    pub(crate) struct BrokenStore;

    impl StateStore for BrokenStore {
        fn load(&self) -> Result<Option<Snapshot>, StoreError> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied").into())
        }

        fn save(&self, _: &Snapshot) -> Result<(), StoreError> {
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied").into())
        }
    }

    #[test]
    fn file_store_round_trip_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let want = Snapshot {
            end: 65_000,
            time: "00:01:05".to_string(),
        };

        FileStore::new(dir.path(), "prefs").save(&want).unwrap();

        let fresh = FileStore::new(dir.path(), "prefs");
        assert_eq!(Some(want), fresh.load().unwrap());
        assert!(!fresh.tmp_path().exists());
    }

    #[test]
    fn file_store_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("not-yet-created"), "prefs");
        assert_eq!(None, store.load().unwrap());
    }

    #[test]
    fn file_store_namespaces_are_separate() {
        let dir = tempfile::tempdir().unwrap();
        let a = FileStore::new(dir.path(), "a");
        a.save(&Snapshot {
            end: 1,
            time: "00:00:00".to_string(),
        })
        .unwrap();

        assert_eq!(None, FileStore::new(dir.path(), "b").load().unwrap());
    }

    #[test]
    fn file_store_latest_save_wins() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path(), "prefs");
        for end in [1_000, 2_000, 3_000] {
            store
                .save(&Snapshot {
                    end,
                    time: format!("00:00:0{}", end / 1_000),
                })
                .unwrap();
        }
        let got = store.load().unwrap().unwrap();
        assert_eq!(3_000, got.end);
        assert_eq!("00:00:03", got.time);
    }

    #[test]
    fn corrupt_file_reads_as_fresh_state() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path(), "prefs");
        fs::write(store.path(), [1, 2, 3]).unwrap();

        assert!(matches!(store.load(), Err(StoreError::Codec(_))));
        let persisted = PersistedState::new(Arc::new(store));
        assert_eq!(LoadedState::default(), persisted.load());
    }

    #[test]
    fn persisted_state_defaults_when_empty() {
        let persisted = PersistedState::new(Arc::new(MemoryStore::default()));
        let loaded = persisted.load();
        assert_eq!(None, loaded.end);
        assert_eq!("00:00:00", loaded.time);
    }

    #[test]
    fn persisted_state_round_trip() {
        let store = MemoryStore::default();
        PersistedState::new(Arc::new(store.clone())).save(5_000, "00:00:05");

        let loaded = PersistedState::new(Arc::new(store)).load();
        assert_eq!(Some(5_000), loaded.end);
        assert_eq!("00:00:05", loaded.time);
    }

    #[test]
    fn broken_backend_is_swallowed() {
        let persisted = PersistedState::new(Arc::new(BrokenStore));
        persisted.save(1_000, "00:00:01");
        assert_eq!(LoadedState::default(), persisted.load());
    }
}
