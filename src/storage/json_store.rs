//! Single-document JSON store with an exclusive lock.
//!
//! The in-memory copy is authoritative for the lifetime of the process. Every
//! mutation runs on a clone of the document while the lock is held; the clone
//! is written to a temp file, renamed over the real file, and only then
//! swapped in. A failed write leaves both memory and disk untouched.

use std::fs;
use std::io::{ErrorKind, Write as _};
use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use super::StorageError;

/// Whether a transaction changed the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Write {
    Persist,
    Skip,
}

/// A JSON document persisted to one file.
pub struct JsonStore<T> {
    name: &'static str,
    path: PathBuf,
    lock_timeout: Duration,
    state: Mutex<T>,
}

impl<T> JsonStore<T>
where
    T: Serialize + DeserializeOwned + Default + Clone,
{
    /// Open (or create) the store at `path`.
    ///
    /// A file that does not parse is moved aside to `<file>.corrupt-<unix_ts>`
    /// and reported at error level; the store then starts from an empty
    /// document instead of overwriting the damaged one.
    pub fn open(
        name: &'static str,
        path: impl Into<PathBuf>,
        lock_timeout: Duration,
    ) -> Result<Self, StorageError> {
        let path = path.into();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
        }

        let state = load(name, &path)?;
        debug!("Opened {} store at {}", name, path.display());

        Ok(Self {
            name,
            path,
            lock_timeout,
            state: Mutex::new(state),
        })
    }

    /// Run a read-only closure against the document.
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> Result<R, StorageError> {
        let guard = self.acquire()?;
        Ok(f(&guard))
    }

    /// Run a read-modify-write closure under the lock and persist the result.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R, StorageError> {
        self.transact(|doc| (f(doc), Write::Persist))
    }

    /// Run a closure under the lock; persist only when it returns
    /// [`Write::Persist`].
    pub fn transact<R>(&self, f: impl FnOnce(&mut T) -> (R, Write)) -> Result<R, StorageError> {
        let mut guard = self.acquire()?;

        let mut draft = guard.clone();
        let (result, write) = f(&mut draft);

        if write == Write::Persist {
            self.persist(&draft)?;
            *guard = draft;
        }

        Ok(result)
    }

    fn acquire(&self) -> Result<parking_lot::MutexGuard<'_, T>, StorageError> {
        self.state.try_lock_for(self.lock_timeout).ok_or_else(|| {
            error!(
                "Lock on {} store not acquired within {:?}",
                self.name, self.lock_timeout
            );
            StorageError::LockTimeout {
                store: self.name,
                waited: self.lock_timeout,
            }
        })
    }

    fn persist(&self, doc: &T) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(doc).map_err(|source| StorageError::Encode {
            store: self.name,
            source,
        })?;

        let tmp = tmp_path(&self.path);
        {
            let mut file = fs::File::create(&tmp).map_err(|e| StorageError::io(&tmp, e))?;
            file.write_all(&bytes).map_err(|e| StorageError::io(&tmp, e))?;
            file.sync_all().map_err(|e| StorageError::io(&tmp, e))?;
        }
        fs::rename(&tmp, &self.path).map_err(|e| StorageError::io(&self.path, e))?;

        Ok(())
    }
}

impl<T> std::fmt::Debug for JsonStore<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonStore")
            .field("name", &self.name)
            .field("path", &self.path)
            .finish()
    }
}

fn load<T>(name: &'static str, path: &Path) -> Result<T, StorageError>
where
    T: DeserializeOwned + Default,
{
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(T::default()),
        Err(e) => return Err(StorageError::io(path, e)),
    };

    if text.trim().is_empty() {
        return Ok(T::default());
    }

    match serde_json::from_str(&text) {
        Ok(doc) => Ok(doc),
        Err(e) => {
            let quarantine = quarantine_path(path);
            fs::rename(path, &quarantine).map_err(|err| StorageError::io(path, err))?;
            error!(
                "{} store at {} is corrupt ({}); moved to {} and starting empty",
                name,
                path.display(),
                e,
                quarantine.display()
            );
            Ok(T::default())
        }
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn quarantine_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".corrupt-{}", chrono::Utc::now().timestamp()));
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use super::*;
    use crate::storage::test_dir;

    type Doc = BTreeMap<u64, u32>;

    fn open(path: &Path) -> JsonStore<Doc> {
        JsonStore::open("test", path, Duration::from_millis(200)).unwrap()
    }

    #[test]
    fn update_persists_and_reloads() {
        let path = test_dir("store").join("doc.json");
        let store = open(&path);

        store.update(|doc| doc.insert(7, 3)).unwrap();

        let reopened = open(&path);
        assert_eq!(reopened.read(|doc| doc.get(&7).copied()).unwrap(), Some(3));
        assert!(!tmp_path(&path).exists());
    }

    #[test]
    fn skipped_transaction_discards_changes() {
        let path = test_dir("store").join("doc.json");
        let store = open(&path);

        store
            .transact(|doc| {
                doc.insert(1, 1);
                ((), Write::Skip)
            })
            .unwrap();

        assert!(store.read(|doc| doc.is_empty()).unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn corrupt_file_is_quarantined() {
        let dir = test_dir("store");
        let path = dir.join("doc.json");
        fs::write(&path, "{ not json").unwrap();

        let store = open(&path);
        assert!(store.read(|doc| doc.is_empty()).unwrap());

        let quarantined: Vec<_> = fs::read_dir(&dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("doc.json.corrupt-"))
            .collect();
        assert_eq!(quarantined.len(), 1);
        assert_eq!(fs::read_to_string(quarantined[0].path()).unwrap(), "{ not json");
    }

    #[test]
    fn lock_timeout_is_reported() {
        let path = test_dir("store").join("doc.json");
        let store = Arc::new(open(&path));

        let held = store.state.lock();
        let other = Arc::clone(&store);
        let result = std::thread::spawn(move || other.update(|doc| doc.insert(1, 1)))
            .join()
            .unwrap();
        drop(held);

        assert!(matches!(result, Err(StorageError::LockTimeout { store: "test", .. })));
    }

    #[test]
    fn concurrent_updates_are_serialized() {
        let path = test_dir("store").join("doc.json");
        let store = Arc::new(JsonStore::<Doc>::open("test", &path, Duration::from_secs(5)).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        store.update(|doc| *doc.entry(1).or_default() += 1).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(open(&path).read(|doc| doc[&1]).unwrap(), 200);
    }
}
