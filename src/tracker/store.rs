use std::{
    collections::HashMap,
    fs::File,
    io::{ErrorKind, Read, Write},
    ops::Deref,
    path::PathBuf,
    sync::{Mutex, MutexGuard},
};

use anyhow::{anyhow, Result};
use fs4::fs_std::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::{
    entities::{Session, SessionId},
    entry::EntryError,
};

/// Key the session list is stored under.
pub const SESSIONS_KEY: &str = "timerSessions";

/// Version written into the persisted document. Bump it when the session layout changes.
pub const SCHEMA_VERSION: u32 = 1;

/// Callback handed to [`KeyValueStore::modify`]. The alias keeps the signature mockable.
pub type ChangeFn<'a> = dyn FnMut(Option<String>) -> Result<Option<String>> + 'a;

/// Port to whatever medium keeps the sessions between runs.
#[cfg_attr(test, mockall::automock)]
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Reads the current value and replaces it with whatever `change` returns, with no other
    /// writer in between. `Ok(None)` from `change` leaves the value as it is.
    fn modify<'a>(
        &self,
        key: &str,
        change: &'a mut ChangeFn<'a>,
    ) -> Result<()>;
}

impl<T: Deref> KeyValueStore for T
where
    T::Target: KeyValueStore,
{
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.deref().get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.deref().set(key, value)
    }

    fn modify(
        &self,
        key: &str,
        change: &mut dyn FnMut(Option<String>) -> Result<Option<String>>,
    ) -> Result<()> {
        self.deref().modify(key, change)
    }
}

/// Keeps every key in its own `<key>.json` file. Writes go to a temporary file that replaces
/// the previous one, under an exclusive lock so concurrent invocations don't interleave.
pub struct FileKeyValueStore {
    dir: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(dir: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&dir)?;

        Ok(Self { dir })
    }

    fn value_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    fn lock_file(&self, key: &str) -> std::io::Result<File> {
        File::options()
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.dir.join(format!("{key}.lock")))
    }

    /// Caller holds the lock.
    fn read_value(&self, key: &str) -> std::io::Result<Option<String>> {
        match File::open(self.value_path(key)) {
            Ok(mut file) => {
                let mut value = String::new();
                file.read_to_string(&mut value).map(|_| Some(value))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Caller holds the exclusive lock.
    fn write_value(&self, key: &str, value: &str) -> std::io::Result<()> {
        let path = self.value_path(key);
        let temporary = self.dir.join(format!("{key}.json.tmp"));
        let mut file = File::create(&temporary)?;
        file.write_all(value.as_bytes())?;
        file.sync_all()?;
        std::fs::rename(&temporary, &path)?;
        debug!("Wrote {} bytes into {path:?}", value.len());
        Ok(())
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        debug!("Reading {key}");
        let lock = self.lock_file(key)?;
        FileExt::lock_shared(&lock)?;
        let result = self.read_value(key);
        FileExt::unlock(&lock)?;
        Ok(result?)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let lock = self.lock_file(key)?;
        FileExt::lock_exclusive(&lock)?;
        let result = self.write_value(key, value);
        FileExt::unlock(&lock)?;
        Ok(result?)
    }

    fn modify(
        &self,
        key: &str,
        change: &mut dyn FnMut(Option<String>) -> Result<Option<String>>,
    ) -> Result<()> {
        let lock = self.lock_file(key)?;
        FileExt::lock_exclusive(&lock)?;
        let result = self
            .read_value(key)
            .map_err(anyhow::Error::from)
            .and_then(|current| change(current))
            .and_then(|replacement| match replacement {
                Some(value) => Ok(self.write_value(key, &value)?),
                None => Ok(()),
            });
        FileExt::unlock(&lock)?;
        result
    }
}

/// In-memory store for tests and dry runs.
#[derive(Default)]
pub struct MemoryKeyValueStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    fn values(&self) -> Result<MutexGuard<'_, HashMap<String, String>>> {
        self.values
            .lock()
            .map_err(|_| anyhow!("Memory store lock was poisoned"))
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn modify(
        &self,
        key: &str,
        change: &mut dyn FnMut(Option<String>) -> Result<Option<String>>,
    ) -> Result<()> {
        let mut values = self.values()?;
        if let Some(value) = change(values.get(key).cloned())? {
            values.insert(key.to_string(), value);
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct SessionDocumentRef<'a> {
    version: u32,
    sessions: &'a [Session],
}

/// Every layout that has been written under [SESSIONS_KEY]. Rows are kept as raw values so
/// that a single broken row doesn't take the rest of the list with it.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredLayout {
    Versioned {
        version: u32,
        sessions: Vec<serde_json::Value>,
    },
    Legacy(Vec<serde_json::Value>),
}

/// Ordered list of sessions, newest first, mirrored into a [KeyValueStore] on every change.
pub struct SessionStore<S: KeyValueStore> {
    storage: S,
    sessions: Vec<Session>,
}

impl<S: KeyValueStore> SessionStore<S> {
    /// Restores the sessions from `storage`. Missing or unreadable data results in an empty
    /// store that will overwrite it on the next save.
    pub fn load(storage: S) -> Self {
        let sessions = match storage.get(SESSIONS_KEY) {
            Ok(Some(raw)) => parse_sessions(&raw),
            Ok(None) => {
                debug!("No sessions persisted yet");
                vec![]
            }
            Err(e) => {
                warn!("Failed to read persisted sessions, starting empty {e:?}");
                vec![]
            }
        };
        info!("Loaded {} sessions", sessions.len());
        Self { storage, sessions }
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn get(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.iter().find(|v| &v.id == id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Adds a session in front of the list.
    pub fn append(&mut self, session: Session) -> Result<()> {
        debug!("Appending session {session:?}");
        self.change(|sessions| {
            sessions.insert(0, session.clone());
            Ok(Some(()))
        })?;
        Ok(())
    }

    /// Removes the session with `id`. An unknown id changes nothing and doesn't write.
    pub fn remove(&mut self, id: &SessionId) -> Result<Option<Session>> {
        self.change(|sessions| {
            let Some(position) = sessions.iter().position(|v| &v.id == id) else {
                debug!("Session {id} not found, nothing to remove");
                return Ok(None);
            };
            Ok(Some(sessions.remove(position)))
        })
    }

    /// Replaces the session with `id` in place. The replacement is validated first, a refused
    /// update leaves the store untouched.
    pub fn update(&mut self, id: &SessionId, session: Session) -> Result<()> {
        session.validate()?;
        self.change(|sessions| {
            let Some(slot) = sessions.iter_mut().find(|v| &v.id == id) else {
                return Err(EntryError::UnknownSession(id.clone()).into());
            };
            debug!("Updating session {id} to {session:?}");
            *slot = session.clone();
            Ok(Some(()))
        })?;
        Ok(())
    }

    /// Writes the full list into storage, replacing whatever is there.
    pub fn persist(&self) -> Result<()> {
        let document = encode_sessions(&self.sessions)?;
        self.storage
            .set(SESSIONS_KEY, &document)
            .inspect_err(|e| error!("Failed to persist sessions {e:?}"))
    }

    /// Applies `apply` to the sessions currently in storage, so changes saved by another
    /// process since [SessionStore::load] are kept. `Ok(None)` from `apply` skips the write.
    /// Either way the in-memory list is refreshed from what was read.
    fn change<T>(
        &mut self,
        mut apply: impl FnMut(&mut Vec<Session>) -> Result<Option<T>>,
    ) -> Result<Option<T>> {
        let mut outcome = None;
        let mut current = None;
        self.storage
            .modify(
                SESSIONS_KEY,
                &mut |raw: Option<String>| -> Result<Option<String>> {
                    let mut sessions = raw.as_deref().map(parse_sessions).unwrap_or_default();
                    outcome = apply(&mut sessions)?;
                    let document = match outcome {
                        Some(_) => Some(encode_sessions(&sessions)?),
                        None => None,
                    };
                    current = Some(sessions);
                    Ok(document)
                },
            )
            .inspect_err(|e| error!("Failed to change sessions {e:?}"))?;
        if let Some(sessions) = current {
            self.sessions = sessions;
        }
        Ok(outcome)
    }
}

fn encode_sessions(sessions: &[Session]) -> Result<String> {
    Ok(serde_json::to_string(&SessionDocumentRef {
        version: SCHEMA_VERSION,
        sessions,
    })?)
}

fn parse_sessions(raw: &str) -> Vec<Session> {
    let rows = match serde_json::from_str::<StoredLayout>(raw) {
        Ok(StoredLayout::Versioned { version, sessions }) if version == SCHEMA_VERSION => sessions,
        Ok(StoredLayout::Versioned { version, .. }) => {
            warn!("Unsupported session schema version {version}, starting empty");
            return vec![];
        }
        Ok(StoredLayout::Legacy(sessions)) => {
            info!("Found unversioned session list, it will be rewritten on next save");
            sessions
        }
        Err(e) => {
            warn!("Persisted sessions are not valid json, starting empty {e}");
            return vec![];
        }
    };

    rows.into_iter()
        .filter_map(|row| match serde_json::from_value::<Session>(row.clone()) {
            Ok(session) => Some(session),
            Err(e) => {
                // ignore illegal rows, keep the rest
                warn!("Skipping malformed session {row}: {e}");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use chrono::{Duration, TimeZone, Utc};
    use tempfile::tempdir;

    use super::{
        FileKeyValueStore, KeyValueStore, MemoryKeyValueStore, MockKeyValueStore, SessionStore,
        SESSIONS_KEY,
    };
    use crate::{
        tracker::{
            entities::{Category, Session, SessionId},
            entry::EntryError,
        },
        utils::logging::TEST_LOGGING,
    };

    fn session(id: &str, category: Category, minutes: i64) -> Session {
        let start = Utc.with_ymd_and_hms(2025, 3, 15, 9, 0, 0).unwrap()
            + Duration::milliseconds(123);
        Session::from_span(
            SessionId::from(id),
            category,
            start,
            start + Duration::minutes(minutes),
        )
        .unwrap()
    }

    #[test]
    fn append_prepends_and_round_trips() -> Result<()> {
        *TEST_LOGGING;
        let storage = Arc::new(MemoryKeyValueStore::default());
        let mut store = SessionStore::load(storage.clone());
        store.append(session("a", Category::Gwen, 10))?;
        store.append(session("b", Category::Jb, 20))?;
        store.append(session("c", Category::Unmapped("old".into()), 5))?;

        let ids = store.sessions().iter().map(|v| v.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["c", "b", "a"]);

        let reloaded = SessionStore::load(storage);
        assert_eq!(reloaded.sessions(), store.sessions());
        Ok(())
    }

    #[test]
    fn remove_takes_exactly_one_entry() -> Result<()> {
        let storage = Arc::new(MemoryKeyValueStore::default());
        let mut store = SessionStore::load(storage.clone());
        for id in ["a", "b", "c"] {
            store.append(session(id, Category::Gwen, 10))?;
        }
        let before = store.sessions().to_vec();

        let removed = store.remove(&SessionId::from("b"))?;
        assert_eq!(removed.map(|v| v.id), Some(SessionId::from("b")));
        let expected = before
            .iter()
            .filter(|v| v.id.as_str() != "b")
            .cloned()
            .collect::<Vec<_>>();
        assert_eq!(store.sessions(), expected.as_slice());

        assert_eq!(store.remove(&SessionId::from("missing"))?, None);
        assert_eq!(store.sessions(), expected.as_slice());
        assert_eq!(SessionStore::load(storage).sessions(), expected.as_slice());
        Ok(())
    }

    #[test]
    fn removing_unknown_id_does_not_write() {
        let mut storage = MockKeyValueStore::new();
        storage.expect_get().returning(|_| Ok(None));
        storage.expect_set().never();
        storage.expect_modify().times(1).returning(|_, change| {
            assert_eq!(change(None)?, None);
            Ok(())
        });
        let mut store = SessionStore::load(storage);
        assert!(store.remove(&SessionId::from("missing")).unwrap().is_none());
    }

    #[test]
    fn handles_keep_each_others_changes() -> Result<()> {
        let storage = Arc::new(MemoryKeyValueStore::default());
        let mut timer = SessionStore::load(storage.clone());
        let mut manual = SessionStore::load(storage.clone());

        manual.append(session("added", Category::Jb, 30))?;
        timer.append(session("timed", Category::Gwen, 10))?;
        assert_eq!(timer.len(), 2);

        manual.remove(&SessionId::from("timed"))?;
        timer.update(&SessionId::from("added"), session("added", Category::Smartback, 30))?;

        let ids = SessionStore::load(storage)
            .sessions()
            .iter()
            .map(|v| (v.id.to_string(), v.category.clone()))
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![("added".to_string(), Category::Smartback)]);
        Ok(())
    }

    #[test]
    fn file_handles_keep_each_others_changes() -> Result<()> {
        let dir = tempdir()?;
        let open = || -> Result<SessionStore<FileKeyValueStore>> {
            Ok(SessionStore::load(FileKeyValueStore::new(dir.path().join("store"))?))
        };
        let mut timer = open()?;
        let mut manual = open()?;

        manual.append(session("added", Category::Jb, 30))?;
        timer.append(session("timed", Category::Gwen, 10))?;

        let ids = open()?
            .sessions()
            .iter()
            .map(|v| v.id.to_string())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["timed", "added"]);
        assert_eq!(timer.sessions(), open()?.sessions());
        Ok(())
    }

    #[test]
    fn update_of_session_removed_elsewhere_is_refused() -> Result<()> {
        let storage = Arc::new(MemoryKeyValueStore::default());
        let mut first = SessionStore::load(storage.clone());
        first.append(session("a", Category::Gwen, 10))?;
        let mut second = SessionStore::load(storage.clone());
        first.remove(&SessionId::from("a"))?;

        let error = second
            .update(&SessionId::from("a"), session("a", Category::Jb, 10))
            .unwrap_err();
        assert_eq!(
            error.downcast_ref::<EntryError>(),
            Some(&EntryError::UnknownSession(SessionId::from("a")))
        );
        assert!(SessionStore::load(storage).is_empty());
        Ok(())
    }

    #[test]
    fn persist_rewrites_legacy_layout() -> Result<()> {
        let storage = Arc::new(MemoryKeyValueStore::default());
        let legacy = serde_json::to_string(&vec![session("a", Category::Gwen, 10)])?;
        storage.set(SESSIONS_KEY, &legacy)?;

        let store = SessionStore::load(storage.clone());
        store.persist()?;
        let raw = storage.get(SESSIONS_KEY)?.unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw)?;
        assert_eq!(value["version"], 1);
        assert_eq!(value["sessions"][0]["id"], "a");
        Ok(())
    }

    #[test]
    fn update_preserves_position() -> Result<()> {
        let mut store = SessionStore::load(MemoryKeyValueStore::default());
        for id in ["a", "b", "c"] {
            store.append(session(id, Category::Gwen, 10))?;
        }
        let replacement = session("b", Category::Smartback, 45);
        store.update(&SessionId::from("b"), replacement.clone())?;
        assert_eq!(store.sessions()[1], replacement);
        assert_eq!(store.len(), 3);
        Ok(())
    }

    #[test]
    fn rejected_update_leaves_store_unchanged() -> Result<()> {
        let mut store = SessionStore::load(MemoryKeyValueStore::default());
        store.append(session("a", Category::Gwen, 10))?;
        let before = store.sessions().to_vec();

        let mut backwards = session("a", Category::Gwen, 10);
        std::mem::swap(&mut backwards.start_time, &mut backwards.end_time);
        let error = store
            .update(&SessionId::from("a"), backwards)
            .unwrap_err();
        assert_eq!(
            error.downcast_ref::<EntryError>(),
            Some(&EntryError::EndBeforeStart)
        );

        let error = store
            .update(&SessionId::from("zzz"), session("zzz", Category::Jb, 5))
            .unwrap_err();
        assert_eq!(
            error.downcast_ref::<EntryError>(),
            Some(&EntryError::UnknownSession(SessionId::from("zzz")))
        );
        assert_eq!(store.sessions(), before.as_slice());
        Ok(())
    }

    #[test]
    fn load_fails_soft() {
        *TEST_LOGGING;
        for raw in ["not json", r#"{"version": 99, "sessions": []}"#, r#"{"a": 1}"#] {
            let storage = MemoryKeyValueStore::default();
            storage.set(SESSIONS_KEY, raw).unwrap();
            assert!(SessionStore::load(storage).is_empty());
        }

        let mut failing = MockKeyValueStore::new();
        failing
            .expect_get()
            .returning(|_| Err(anyhow::anyhow!("disk on fire")));
        assert!(SessionStore::load(failing).is_empty());
    }

    #[test]
    fn load_accepts_legacy_array_and_skips_broken_rows() {
        let raw = r#"[
            {"id":"a","type":"admin","startTime":"2024-11-02T08:00:00.000Z","endTime":"2024-11-02T09:00:00.000Z","duration":3600},
            {"id":"b","type":"compta","startTime":"yesterday","endTime":"2024-11-02T09:00:00.000Z","duration":3600},
            {"id":"c","type":"acme","startTime":"2024-11-02T10:00:00.000Z","endTime":"2024-11-02T10:30:00.000Z","duration":1800}
        ]"#;
        let storage = MemoryKeyValueStore::default();
        storage.set(SESSIONS_KEY, raw).unwrap();
        let store = SessionStore::load(storage);
        assert_eq!(store.len(), 2);
        assert_eq!(store.sessions()[0].category, Category::Admin);
        assert_eq!(
            store.sessions()[1].category,
            Category::Unmapped("acme".into())
        );
    }

    #[test]
    fn persisted_document_is_versioned() -> Result<()> {
        let storage = Arc::new(MemoryKeyValueStore::default());
        let mut store = SessionStore::load(storage.clone());
        store.append(session("a", Category::Gwen, 10))?;
        let raw = storage.get(SESSIONS_KEY)?.unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw)?;
        assert_eq!(value["version"], 1);
        assert_eq!(value["sessions"][0]["id"], "a");
        assert_eq!(value["sessions"][0]["startTime"], "2025-03-15T09:00:00.123Z");
        Ok(())
    }

    #[test]
    fn file_store_round_trip() -> Result<()> {
        let dir = tempdir()?;
        let storage = FileKeyValueStore::new(dir.path().join("store"))?;
        assert_eq!(storage.get(SESSIONS_KEY)?, None);

        let mut store = SessionStore::load(storage);
        store.append(session("a", Category::Gwen, 10))?;
        store.append(session("b", Category::Factures, 95))?;

        let reloaded = SessionStore::load(FileKeyValueStore::new(dir.path().join("store"))?);
        assert_eq!(reloaded.sessions(), store.sessions());
        assert!(!dir.path().join("store/timerSessions.json.tmp").exists());
        Ok(())
    }
}
