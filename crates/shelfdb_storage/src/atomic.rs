//! Atomic file replacement.
//!
//! A document is never written in place. The new content goes to a
//! temporary sibling first, is synced, and is then renamed over the target:
//!
//! ```text
//! account.json.tmp   <- write_all + sync_all
//! account.json       <- rename(account.json.tmp)
//! ```
//!
//! The rename is the only transition a reader of the target can observe. A
//! crash before it leaves the previous target untouched; the temporary file
//! may survive and is simply truncated by the next writer.

use crate::error::StorageResult;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Atomically replaces `target` with `content`, staging it in `temp`.
///
/// `temp` must be on the same filesystem as `target` (in practice, a sibling).
///
/// # Errors
///
/// Returns an error if writing, syncing or renaming fails. In every failure
/// case `target` still holds its previous content (or is still absent).
pub fn write_atomic(target: &Path, temp: &Path, content: &[u8]) -> StorageResult<()> {
    StagedWrite::stage(temp, content)?.commit(target)
}

/// Content that has been durably written to a temporary path but not yet
/// published.
///
/// Dropping a `StagedWrite` without calling [`commit`](Self::commit) is
/// equivalent to a crash between the two steps: the target is not touched.
#[derive(Debug)]
#[must_use = "staged content is not visible until committed"]
pub struct StagedWrite {
    temp: PathBuf,
}

impl StagedWrite {
    /// Writes `content` to `temp` and syncs it to disk.
    ///
    /// Any previous file at `temp` is truncated.
    pub fn stage(temp: &Path, content: &[u8]) -> StorageResult<Self> {
        let mut file = File::create(temp)?;
        file.write_all(content)?;
        file.sync_all()?;
        drop(file);

        Ok(Self {
            temp: temp.to_path_buf(),
        })
    }

    /// Returns the temporary path holding the staged content.
    #[must_use]
    pub fn temp_path(&self) -> &Path {
        &self.temp
    }

    /// Publishes the staged content by renaming it over `target`.
    ///
    /// Only a failed rename is an error. Once the rename succeeds the new
    /// content is visible, so a failure to sync the parent directory
    /// afterwards is logged and the commit still reports success.
    pub fn commit(self, target: &Path) -> StorageResult<()> {
        self.commit_with(target, sync_directory)
    }

    fn commit_with(
        self,
        target: &Path,
        sync_parent: impl FnOnce(&Path) -> StorageResult<()>,
    ) -> StorageResult<()> {
        fs::rename(&self.temp, target)?;
        if let Some(parent) = target.parent() {
            if let Err(e) = sync_parent(parent) {
                warn!(
                    target = %target.display(),
                    error = %e,
                    "renamed file but failed to sync its directory"
                );
            }
        }
        debug!(target = %target.display(), "replaced file atomically");
        Ok(())
    }
}

/// Syncs a directory so that a completed rename survives power loss.
#[cfg(unix)]
fn sync_directory(path: &Path) -> StorageResult<()> {
    // An empty parent means the current directory.
    let path = if path.as_os_str().is_empty() {
        Path::new(".")
    } else {
        path
    };
    File::open(path)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_directory(_path: &Path) -> StorageResult<()> {
    // NTFS journals metadata; directory handles cannot be fsynced.
    Ok(())
}
