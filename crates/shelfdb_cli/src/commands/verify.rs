//! Verify command implementation.
//!
//! Verification only reads. Opening the database would migrate and repair
//! the tree, so the checks here mirror what an open would find instead.

use shelfdb_accounts::{
    AccountDirectory, AccountId, Credentials, DescriptionDocument, DirectoryMigrator, ProviderId,
};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Verification result.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Number of account directories checked.
    pub accounts_checked: usize,
    /// Problems an open would repair or fail on.
    pub errors: Vec<String>,
    /// Account directories whose description predates provider snapshots.
    pub legacy_descriptions: Vec<PathBuf>,
}

impl VerifyResult {
    fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Runs the verify command.
pub fn run(path: &Path, credentials: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying accounts at {}", path.display());
    println!();

    let result = scan(path, credentials)?;
    println!("Accounts checked: {}", result.accounts_checked);
    for error in &result.errors {
        println!("  ERROR: {error}");
    }

    println!();
    if result.is_ok() {
        println!("✓ Accounts verification passed");
        Ok(())
    } else {
        println!("✗ Accounts verification failed");
        Err("Verification failed".into())
    }
}

/// Checks every account directory under `root` and the credential document.
pub fn scan(root: &Path, credentials: &Path) -> io::Result<VerifyResult> {
    let mut result = VerifyResult::default();
    let mut providers: HashMap<ProviderId, PathBuf> = HashMap::new();

    let mut directories = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            directories.push(entry.path());
        }
    }
    directories.sort();

    for directory in directories {
        result.accounts_checked += 1;
        let name = directory
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if DirectoryMigrator::is_legacy_name(&name) {
            result
                .errors
                .push(format!("{}: legacy directory name", directory.display()));
        }

        let description = AccountDirectory::at(directory.clone()).description_path();
        match DescriptionDocument::read(&description) {
            Ok(document) => {
                if document.is_legacy() {
                    result
                        .errors
                        .push(format!("{}: legacy description", directory.display()));
                    result.legacy_descriptions.push(directory.clone());
                }
                let provider = document.provider_id().clone();
                if let Some(first) = providers.get(&provider) {
                    result.errors.push(format!(
                        "{}: provider {provider} already used by {}",
                        directory.display(),
                        first.display()
                    ));
                } else {
                    providers.insert(provider, directory.clone());
                }
            }
            Err(e) => result
                .errors
                .push(format!("{}: unreadable description: {e}", directory.display())),
        }
    }

    match fs::read(credentials) {
        Ok(data) if data.iter().all(u8::is_ascii_whitespace) => {}
        Ok(data) => {
            if let Err(e) = serde_json::from_slice::<BTreeMap<AccountId, Credentials>>(&data) {
                result.errors.push(format!(
                    "{}: unparseable credentials: {e}",
                    credentials.display()
                ));
            }
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    Ok(result)
}
