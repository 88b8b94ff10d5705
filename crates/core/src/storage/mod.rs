//! Key-value persistence for the profile, sentinels and measurement history.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use serde::{de::DeserializeOwned, Serialize};

use crate::{Result, SessionRecord, UserProfile};

pub const USER_DATA_KEY: &str = "user_data";
pub const VISITED_KEY: &str = "visited";
pub const INSTALL_PROMPT_DISMISSED_KEY: &str = "install_prompt_dismissed";
pub const MEASUREMENT_HISTORY_KEY: &str = "measurement_history";

const ALL_KEYS: [&str; 4] = [
    USER_DATA_KEY,
    VISITED_KEY,
    INSTALL_PROMPT_DISMISSED_KEY,
    MEASUREMENT_HISTORY_KEY,
];

/// Opaque string blobs keyed by string.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: String) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

/// Volatile store, handy for tests and dry runs.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// A single JSON object on disk mapping keys to string blobs. Every write
/// goes to a sibling temp file first and is then renamed into place.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Opens the store at `path`; a missing file starts out empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(contents) if contents.trim().is_empty() => BTreeMap::new(),
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };
        tracing::debug!(?path, keys = entries.len(), "opened data file");
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&self.entries)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        self.entries.insert(key.to_string(), value);
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}

/// Typed access to the application's persisted state.
#[derive(Debug)]
pub struct AppStorage<S> {
    store: S,
}

impl<S: KeyValueStore> AppStorage<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    /// The stored profile, or a fresh one when missing or unreadable.
    pub fn load_profile(&self) -> Result<UserProfile> {
        self.load_json(USER_DATA_KEY)
    }

    pub fn save_profile(&mut self, profile: &UserProfile) -> Result<()> {
        self.save_json(USER_DATA_KEY, profile)
    }

    /// Session records, newest first.
    pub fn load_history(&self) -> Result<Vec<SessionRecord>> {
        self.load_json(MEASUREMENT_HISTORY_KEY)
    }

    pub fn save_history(&mut self, records: &[SessionRecord]) -> Result<()> {
        self.save_json(MEASUREMENT_HISTORY_KEY, records)
    }

    /// Returns `true` the first time it is called, then sets the sentinel.
    pub fn check_first_visit(&mut self) -> Result<bool> {
        let first = !self.flag(VISITED_KEY)?;
        if first {
            self.store.set(VISITED_KEY, "true".into())?;
            tracing::info!("first visit");
        }
        Ok(first)
    }

    pub fn install_prompt_dismissed(&self) -> Result<bool> {
        self.flag(INSTALL_PROMPT_DISMISSED_KEY)
    }

    pub fn dismiss_install_prompt(&mut self) -> Result<()> {
        self.store.set(INSTALL_PROMPT_DISMISSED_KEY, "true".into())
    }

    /// Removes every key this application writes.
    pub fn wipe(&mut self) -> Result<()> {
        for key in ALL_KEYS {
            self.store.remove(key)?;
        }
        tracing::info!("stored data wiped");
        Ok(())
    }

    fn flag(&self, key: &str) -> Result<bool> {
        Ok(self.store.get(key)?.as_deref() == Some("true"))
    }

    fn load_json<T: DeserializeOwned + Default>(&self, key: &str) -> Result<T> {
        let Some(raw) = self.store.get(key)? else {
            return Ok(T::default());
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Ok(value),
            Err(err) => {
                tracing::warn!(key, %err, "stored value is unreadable, using defaults");
                Ok(T::default())
            }
        }
    }

    fn save_json<T: Serialize + ?Sized>(&mut self, key: &str, value: &T) -> Result<()> {
        self.store.set(key, serde_json::to_string(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Achievement, ExposureBucket};

    fn record(label: &str) -> SessionRecord {
        SessionRecord {
            timestamp_label: label.into(),
            duration_seconds: 12,
            average_db: 72,
            maximum_db: 90,
            risk_label: "NORMAL".into(),
        }
    }

    #[test]
    fn first_visit_sentinel() {
        let mut storage = AppStorage::new(MemoryStore::new());
        assert!(storage.check_first_visit().unwrap());
        assert!(!storage.check_first_visit().unwrap());
    }

    #[test]
    fn corrupt_profile_falls_back_to_default() {
        let mut store = MemoryStore::new();
        store.set(USER_DATA_KEY, "{not json".into()).unwrap();
        let storage = AppStorage::new(store);

        assert_eq!(storage.load_profile().unwrap(), UserProfile::default());
    }

    #[test]
    fn file_store_round_trips_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("data.json");

        let mut profile = UserProfile::default();
        profile.unlock(Achievement::MeterStarted);
        profile.exposure.add(ExposureBucket::Danger, 0.5);

        {
            let mut storage = AppStorage::new(JsonFileStore::open(&path).unwrap());
            storage.save_profile(&profile).unwrap();
            storage.save_history(&[record("b"), record("a")]).unwrap();
            storage.dismiss_install_prompt().unwrap();
        }

        let storage = AppStorage::new(JsonFileStore::open(&path).unwrap());
        assert_eq!(storage.load_profile().unwrap(), profile);
        let history = storage.load_history().unwrap();
        assert_eq!(history[0].timestamp_label, "b");
        assert!(storage.install_prompt_dismissed().unwrap());
    }

    #[test]
    fn wipe_clears_everything() {
        let mut storage = AppStorage::new(MemoryStore::new());
        storage.check_first_visit().unwrap();
        storage.save_history(&[record("x")]).unwrap();
        storage.wipe().unwrap();

        assert!(storage.load_history().unwrap().is_empty());
        assert!(storage.check_first_visit().unwrap());
    }
}
