//! List command implementation.

use super::credentials_temp_path;
use serde::Serialize;
use shelfdb_accounts::{
    AccountsDatabase, AccountsError, CredentialStore, DirectoryBookDatabases, ProviderDescription,
    ProviderId,
};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// One listed account.
#[derive(Debug, Serialize)]
pub struct AccountSummary {
    /// Account id.
    pub id: String,
    /// Provider identity URI.
    pub provider: String,
    /// Provider display name.
    pub title: String,
    /// Whether credentials are stored for the account.
    pub logged_in: bool,
}

/// Runs the list command.
///
/// Accounts with legacy descriptions cannot be resolved without a provider
/// registry, so opening would delete them. Unless `discard_legacy` is set
/// the command refuses to open such a tree.
pub fn run(
    path: &Path,
    credentials: &Path,
    format: &str,
    repair: bool,
    discard_legacy: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if path.is_dir() {
        let scan = super::verify::scan(path, credentials)?;
        if !scan.legacy_descriptions.is_empty() {
            if !discard_legacy {
                for directory in &scan.legacy_descriptions {
                    warn!(directory = %directory.display(), "account has a legacy description");
                }
                return Err(format!(
                    "{} account(s) with legacy descriptions would be deleted; \
                     pass --discard-legacy to proceed",
                    scan.legacy_descriptions.len()
                )
                .into());
            }
            warn!(
                accounts = scan.legacy_descriptions.len(),
                "discarding accounts with legacy descriptions"
            );
        }
    }

    if let Some(parent) = credentials.parent() {
        fs::create_dir_all(parent)?;
    }
    let store = Arc::new(CredentialStore::open(
        credentials,
        &credentials_temp_path(credentials),
    )?);

    let db = match open(path, &store) {
        Err(AccountsError::Open(errors)) if repair => {
            for error in &errors {
                warn!(error = %error, "removed broken account");
            }
            open(path, &store)?
        }
        other => other?,
    };

    let summaries: Vec<AccountSummary> = db
        .accounts()
        .values()
        .map(|account| {
            let provider = account.provider();
            AccountSummary {
                id: account.id().to_string(),
                provider: provider.id.to_string(),
                title: provider.title,
                logged_in: account.login_state().is_logged_in(),
            }
        })
        .collect();

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }
        _ => {
            print_text_output(path, &summaries);
        }
    }

    Ok(())
}

/// No provider registry is reachable from the command line, so stored
/// snapshots are used as they are.
fn open(path: &Path, store: &Arc<CredentialStore>) -> Result<AccountsDatabase, AccountsError> {
    let no_registry = |_: &ProviderId| -> Option<ProviderDescription> { None };
    AccountsDatabase::open(
        path,
        Arc::clone(store),
        &no_registry,
        Arc::new(DirectoryBookDatabases),
    )
}

fn print_text_output(path: &Path, summaries: &[AccountSummary]) {
    println!("Accounts at {}", path.display());
    println!();
    if summaries.is_empty() {
        println!("  (none)");
    }
    for summary in summaries {
        let state = if summary.logged_in {
            "logged in"
        } else {
            "not logged in"
        };
        println!("  {}  {} ({}) [{}]", summary.id, summary.title, summary.provider, state);
    }
}
