//! Persistent credential cache.
//!
//! All credentials live in one JSON object keyed by account id. The
//! in-memory map is the single source of truth between writes; every
//! mutation rewrites the whole document atomically while still holding the
//! store mutex, so a reader can never observe a map that disagrees with what
//! is (or is about to be) on disk.

use crate::error::{AccountsError, AccountsResult};
use crate::id::AccountId;
use crate::login::Credentials;
use parking_lot::Mutex;
use shelfdb_storage::write_atomic;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A process-wide store mapping account ids to credentials.
///
/// The store is shared between the database and its accounts as an
/// `Arc<CredentialStore>`; it only holds ids, never account handles.
#[derive(Debug)]
pub struct CredentialStore {
    path: PathBuf,
    temp_path: PathBuf,
    map: Mutex<BTreeMap<AccountId, Credentials>>,
}

impl CredentialStore {
    /// Opens the store at `path`, using `temp_path` as the write buffer.
    ///
    /// A missing or empty file yields an empty store. Whatever was loaded is
    /// immediately written back, normalizing the document format.
    ///
    /// # Errors
    ///
    /// Returns `Parse` if the existing document is not a valid credential map,
    /// or an I/O error if it cannot be read or rewritten.
    pub fn open(path: &Path, temp_path: &Path) -> AccountsResult<Self> {
        let map = match fs::read(path) {
            Ok(data) if data.iter().all(u8::is_ascii_whitespace) => BTreeMap::new(),
            Ok(data) => serde_json::from_slice(&data).map_err(|source| AccountsError::Parse {
                path: path.to_path_buf(),
                source,
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        info!(path = %path.display(), entries = map.len(), "opened credential store");

        let store = Self {
            path: path.to_path_buf(),
            temp_path: temp_path.to_path_buf(),
            map: Mutex::new(map),
        };
        store.persist(&store.map.lock())?;
        Ok(store)
    }

    /// Returns the credentials stored for `id`.
    #[must_use]
    pub fn get(&self, id: &AccountId) -> Option<Credentials> {
        self.map.lock().get(id).cloned()
    }

    /// Stores `credentials` for `id`, replacing any previous entry, and
    /// persists the store before returning.
    pub fn put(&self, id: AccountId, credentials: Credentials) -> AccountsResult<()> {
        let mut map = self.map.lock();
        map.insert(id, credentials);
        debug!(account = %id, "stored credentials");
        self.persist(&map)
    }

    /// Removes the entry for `id` if present, and persists the store before
    /// returning.
    pub fn delete(&self, id: &AccountId) -> AccountsResult<()> {
        let mut map = self.map.lock();
        if map.remove(id).is_some() {
            debug!(account = %id, "removed credentials");
        }
        self.persist(&map)
    }

    /// Number of stored entries.
    #[must_use]
    pub fn size(&self) -> usize {
        self.map.lock().len()
    }

    /// Returns the path of the credential document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, map: &BTreeMap<AccountId, Credentials>) -> AccountsResult<()> {
        let data = serde_json::to_vec_pretty(map).map_err(AccountsError::Serialize)?;
        write_atomic(&self.path, &self.temp_path, &data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use tempfile::tempdir;

    fn paths(dir: &Path) -> (PathBuf, PathBuf) {
        (dir.join("credentials.json"), dir.join("credentials.json.tmp"))
    }

    #[test]
    fn open_missing_file_creates_empty_document() {
        let temp = tempdir().unwrap();
        let (file, tmp) = paths(temp.path());

        let store = CredentialStore::open(&file, &tmp).unwrap();
        assert_eq!(store.size(), 0);
        assert_eq!(fs::read_to_string(&file).unwrap().trim(), "{}");
    }

    #[test]
    fn open_empty_file_is_empty_store() {
        let temp = tempdir().unwrap();
        let (file, tmp) = paths(temp.path());
        fs::write(&file, b"").unwrap();

        let store = CredentialStore::open(&file, &tmp).unwrap();
        assert_eq!(store.size(), 0);
    }

    #[test]
    fn put_get_delete() {
        let temp = tempdir().unwrap();
        let (file, tmp) = paths(temp.path());
        let store = CredentialStore::open(&file, &tmp).unwrap();
        let id = AccountId::new();

        store.put(id, Credentials::basic("u", "p")).unwrap();
        assert_eq!(store.get(&id), Some(Credentials::basic("u", "p")));
        assert_eq!(store.size(), 1);

        store.delete(&id).unwrap();
        assert_eq!(store.get(&id), None);
        assert_eq!(store.size(), 0);

        // Deleting an absent entry is not an error.
        store.delete(&id).unwrap();
    }

    #[test]
    fn survives_reopen() {
        let temp = tempdir().unwrap();
        let (file, tmp) = paths(temp.path());
        let id = AccountId::new();

        {
            let store = CredentialStore::open(&file, &tmp).unwrap();
            store.put(id, Credentials::oauth("token")).unwrap();
        }

        let store = CredentialStore::open(&file, &tmp).unwrap();
        assert_eq!(store.get(&id), Some(Credentials::oauth("token")));
    }

    #[test]
    fn corrupt_document_fails_open() {
        let temp = tempdir().unwrap();
        let (file, tmp) = paths(temp.path());
        fs::write(&file, b"[1, 2").unwrap();

        let result = CredentialStore::open(&file, &tmp);
        assert!(matches!(result, Err(AccountsError::Parse { .. })));
        assert_eq!(fs::read(&file).unwrap(), b"[1, 2");
    }

    #[test]
    fn concurrent_puts_are_all_persisted() {
        let temp = tempdir().unwrap();
        let (file, tmp) = paths(temp.path());
        let store = Arc::new(CredentialStore::open(&file, &tmp).unwrap());

        let ids: Vec<AccountId> = (0..8).map(|_| AccountId::new()).collect();
        let handles: Vec<_> = ids
            .iter()
            .map(|&id| {
                let store = Arc::clone(&store);
                thread::spawn(move || store.put(id, Credentials::oauth(id.to_string())).unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let reopened = CredentialStore::open(&file, &tmp).unwrap();
        assert_eq!(reopened.size(), ids.len());
        for id in &ids {
            assert_eq!(reopened.get(id), Some(Credentials::oauth(id.to_string())));
        }
    }
}
