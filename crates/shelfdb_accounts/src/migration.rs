//! Legacy account directory migration.
//!
//! Older releases named account directories with small integers (`0`, `1`,
//! `42`, ...). Account identity is now a UUID that doubles as the directory
//! name, so on open every directory whose name doesn't parse as a UUID is
//! renamed to a fresh one. Contents are moved untouched.

use crate::error::{AccountsError, AccountsResult};
use crate::id::AccountId;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Renames legacy account directories to fresh UUID names.
#[derive(Debug, Clone)]
pub struct DirectoryMigrator {
    root: PathBuf,
    max_attempts: u32,
}

impl DirectoryMigrator {
    /// Creates a migrator for account directories under `root`.
    #[must_use]
    pub fn new(root: &Path, max_attempts: u32) -> Self {
        Self {
            root: root.to_path_buf(),
            max_attempts,
        }
    }

    /// Whether a directory name needs migrating: anything that isn't a
    /// UUID in canonical lowercase hyphenated form.
    #[must_use]
    pub fn is_legacy_name(name: &str) -> bool {
        AccountId::parse(name).map_or(true, |id| id.directory_name() != name)
    }

    /// Moves `legacy` to a fresh UUID-named directory under the root and
    /// returns the new id.
    ///
    /// # Errors
    ///
    /// - `IdExhaustion` if every generated id was already taken
    /// - `Migration` if the rename fails
    pub fn migrate(&self, legacy: &Path) -> AccountsResult<AccountId> {
        self.migrate_with(legacy, AccountId::new)
    }

    /// Like [`migrate`](Self::migrate), drawing candidate ids from `next_id`.
    pub fn migrate_with(
        &self,
        legacy: &Path,
        next_id: impl FnMut() -> AccountId,
    ) -> AccountsResult<AccountId> {
        let id = allocate_id(self.max_attempts, next_id, |id| {
            self.root.join(id.directory_name()).exists()
        })?;

        let target = self.root.join(id.directory_name());
        fs::rename(legacy, &target).map_err(|source| AccountsError::Migration {
            directory: legacy.to_path_buf(),
            source,
        })?;

        info!(
            from = %legacy.display(),
            to = %target.display(),
            "migrated legacy account directory"
        );
        Ok(id)
    }
}

/// Draws ids from `next_id` until one is not `taken`, trying at most
/// `max_attempts` times.
pub(crate) fn allocate_id(
    max_attempts: u32,
    mut next_id: impl FnMut() -> AccountId,
    taken: impl Fn(&AccountId) -> bool,
) -> AccountsResult<AccountId> {
    for _ in 0..max_attempts {
        let id = next_id();
        if !taken(&id) {
            return Ok(id);
        }
    }
    Err(AccountsError::IdExhaustion {
        attempts: max_attempts,
    })
}
