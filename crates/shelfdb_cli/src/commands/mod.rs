//! CLI command implementations.

pub mod list;
pub mod verify;

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Resolves the credential document, defaulting to `<root>/credentials.json`.
pub fn credentials_path(root: &Path, explicit: Option<PathBuf>) -> PathBuf {
    explicit.unwrap_or_else(|| root.join("credentials.json"))
}

/// The write buffer next to a credential document.
pub fn credentials_temp_path(credentials: &Path) -> PathBuf {
    let mut name = credentials
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("credentials.json"));
    name.push(".tmp");
    credentials.with_file_name(name)
}
