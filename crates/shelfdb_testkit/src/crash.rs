//! On-disk states from interrupted writes and older releases.
//!
//! Each helper writes files directly, bypassing the database, so tests can
//! check how an open copes with what a crash or a previous version left
//! behind.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use shelfdb_testkit::prelude::*;
//!
//! let env = TestAccounts::new();
//! let legacy = write_legacy_account(&env.root(), "3", "urn:lib")?;
//! let db = env.open()?;
//! ```

use serde_json::json;
use shelfdb_accounts::{AccountDescription, AccountDirectory, AccountId, AccountsResult};
use shelfdb_storage::StagedWrite;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Writes an account directory named `name` holding a version 1 description
/// that only references `provider`.
///
/// Pass a non-UUID `name` to also exercise directory migration.
pub fn write_legacy_account(root: &Path, name: &str, provider: &str) -> io::Result<PathBuf> {
    let directory = root.join(name);
    fs::create_dir_all(&directory)?;
    let document = json!({
        "provider": provider,
        "preferences": {
            "bookmarkSyncingPermitted": true,
            "announcementsAcknowledged": ["legacy-notice"]
        }
    });
    fs::write(
        directory.join("account.json"),
        serde_json::to_vec_pretty(&document)?,
    )?;
    Ok(directory)
}

/// Writes a current-format account for `description` with a fresh id and
/// returns that id.
pub fn write_account(root: &Path, description: &AccountDescription) -> AccountsResult<AccountId> {
    let id = AccountId::new();
    let directory = AccountDirectory::new(root, id);
    directory.create()?;
    fs::write(directory.description_path(), description.encode()?)?;
    Ok(id)
}

/// Writes an account directory whose description is `bytes` verbatim.
pub fn write_raw_account(root: &Path, bytes: &[u8]) -> io::Result<AccountId> {
    let id = AccountId::new();
    let directory = AccountDirectory::new(root, id);
    fs::create_dir_all(directory.path())?;
    fs::write(directory.description_path(), bytes)?;
    Ok(id)
}

/// Overwrites an account's description with invalid JSON.
pub fn corrupt_description(directory: &AccountDirectory) -> io::Result<()> {
    fs::write(directory.description_path(), b"{\"provider\": ")
}

/// Stages `bytes` as the account's next description without committing,
/// leaving the buffer file behind as a crash between write and rename would.
pub fn crash_before_commit(directory: &AccountDirectory, bytes: &[u8]) -> io::Result<()> {
    let staged = StagedWrite::stage(&directory.description_temp_path(), bytes)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    drop(staged);
    Ok(())
}
