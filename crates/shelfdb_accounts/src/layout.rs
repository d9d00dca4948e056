//! Account directory layout.
//!
//! ```text
//! <root>/<account-uuid>/
//! ├─ account.json        # AccountDescription
//! ├─ account.json.tmp    # write buffer for atomic replacement
//! ├─ lock                # advisory lock serializing description writes
//! └─ books/              # book database
//! ```

use crate::description::{AccountDescription, DescriptionDocument};
use crate::error::{AccountsError, AccountsResult};
use crate::id::AccountId;
use shelfdb_storage::{with_lock_polling, write_atomic};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const DESCRIPTION_FILE: &str = "account.json";
const DESCRIPTION_TEMP: &str = "account.json.tmp";
const LOCK_FILE: &str = "lock";
const BOOKS_DIR: &str = "books";

/// Paths and file operations for one account directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountDirectory {
    path: PathBuf,
}

impl AccountDirectory {
    /// The directory of account `id` under `root`.
    #[must_use]
    pub fn new(root: &Path, id: AccountId) -> Self {
        Self {
            path: root.join(id.directory_name()),
        }
    }

    /// Wraps an existing directory path.
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the account directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path of `account.json`.
    #[must_use]
    pub fn description_path(&self) -> PathBuf {
        self.path.join(DESCRIPTION_FILE)
    }

    /// Returns the write buffer for `account.json`.
    #[must_use]
    pub fn description_temp_path(&self) -> PathBuf {
        self.path.join(DESCRIPTION_TEMP)
    }

    /// Returns the advisory lock file.
    #[must_use]
    pub fn lock_path(&self) -> PathBuf {
        self.path.join(LOCK_FILE)
    }

    /// Returns the book database directory.
    #[must_use]
    pub fn books_path(&self) -> PathBuf {
        self.path.join(BOOKS_DIR)
    }

    /// Creates the directory if it doesn't exist.
    pub fn create(&self) -> AccountsResult<()> {
        fs::create_dir_all(&self.path)?;
        Ok(())
    }

    /// Reads and decodes `account.json`.
    pub fn read_description(&self) -> AccountsResult<DescriptionDocument> {
        DescriptionDocument::read(&self.description_path())
    }

    /// Atomically replaces `account.json` while holding the account's file
    /// lock.
    ///
    /// # Errors
    ///
    /// Returns `LockTimeout` if the lock isn't acquired within `timeout`; the
    /// previous description is then left untouched.
    pub fn write_description(
        &self,
        description: &AccountDescription,
        timeout: Duration,
        retry_interval: Duration,
    ) -> AccountsResult<()> {
        let data = description.encode()?;
        with_lock_polling(&self.lock_path(), timeout, retry_interval, || {
            write_atomic(
                &self.description_path(),
                &self.description_temp_path(),
                &data,
            )
            .map_err(AccountsError::from)
        })?;
        debug!(directory = %self.path.display(), "wrote account description");
        Ok(())
    }

    /// Recursively deletes the directory. A directory that is already gone
    /// counts as deleted.
    pub fn remove(&self) -> AccountsResult<()> {
        match fs::remove_dir_all(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::provider;
    use shelfdb_storage::{FileLock, DEFAULT_RETRY_INTERVAL};
    use tempfile::tempdir;

    #[test]
    fn paths_are_correct() {
        let root = Path::new("/accounts");
        let id = AccountId::new();
        let dir = AccountDirectory::new(root, id);

        assert_eq!(dir.path(), root.join(id.to_string()));
        assert_eq!(dir.description_path(), dir.path().join("account.json"));
        assert_eq!(dir.description_temp_path(), dir.path().join("account.json.tmp"));
        assert_eq!(dir.lock_path(), dir.path().join("lock"));
        assert_eq!(dir.books_path(), dir.path().join("books"));
    }

    #[test]
    fn description_round_trip() {
        let temp = tempdir().unwrap();
        let dir = AccountDirectory::new(temp.path(), AccountId::new());
        dir.create().unwrap();

        let description = AccountDescription::new(provider("urn:a", 1));
        dir.write_description(&description, Duration::from_secs(1), DEFAULT_RETRY_INTERVAL)
            .unwrap();

        assert_eq!(
            dir.read_description().unwrap(),
            DescriptionDocument::Current(description)
        );
        assert!(!dir.description_temp_path().exists());
    }

    #[test]
    fn write_times_out_while_locked() {
        let temp = tempdir().unwrap();
        let dir = AccountDirectory::new(temp.path(), AccountId::new());
        dir.create().unwrap();
        let original = AccountDescription::new(provider("urn:a", 1));
        dir.write_description(&original, Duration::ZERO, DEFAULT_RETRY_INTERVAL)
            .unwrap();

        let _held =
            FileLock::acquire(&dir.lock_path(), Duration::ZERO, DEFAULT_RETRY_INTERVAL).unwrap();
        let result = dir.write_description(
            &AccountDescription::new(provider("urn:a", 2)),
            Duration::from_millis(30),
            Duration::from_millis(5),
        );

        assert!(matches!(result, Err(AccountsError::LockTimeout { .. })));
        assert_eq!(
            dir.read_description().unwrap(),
            DescriptionDocument::Current(original)
        );
    }

    #[test]
    fn remove_is_idempotent() {
        let temp = tempdir().unwrap();
        let dir = AccountDirectory::new(temp.path(), AccountId::new());
        dir.create().unwrap();
        fs::create_dir_all(dir.books_path()).unwrap();

        dir.remove().unwrap();
        assert!(!dir.path().exists());
        dir.remove().unwrap();
    }
}
