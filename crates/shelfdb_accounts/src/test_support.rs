//! Shared helpers for unit tests.

use crate::account::{Account, AccountContext};
use crate::books::{BookDatabase, BookDatabaseError, BookDatabaseFactory, DirectoryBookDatabases};
use crate::credentials::CredentialStore;
use crate::description::AccountDescription;
use crate::events::AccountEvents;
use crate::id::AccountId;
use crate::layout::AccountDirectory;
use crate::login::LoginState;
use crate::provider::{ProviderDescription, ProviderId};
use chrono::{TimeZone, Utc};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// A provider whose `updated` timestamp is `secs` after the epoch.
pub(crate) fn provider(id: &str, secs: i64) -> ProviderDescription {
    ProviderDescription::new(id, format!("Library {id}"), Utc.timestamp_opt(secs, 0).unwrap())
}

/// A resolver that knows nothing.
pub(crate) fn no_providers(_: &ProviderId) -> Option<ProviderDescription> {
    None
}

/// Temporary root, credential store and event feed.
pub(crate) struct Fixture {
    pub(crate) temp: TempDir,
    pub(crate) credentials: Arc<CredentialStore>,
    pub(crate) events: Arc<AccountEvents>,
}

impl Fixture {
    pub(crate) fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let credentials = Arc::new(
            CredentialStore::open(
                &temp.path().join("credentials.json"),
                &temp.path().join("credentials.json.tmp"),
            )
            .unwrap(),
        );
        Self {
            temp,
            credentials,
            events: Arc::new(AccountEvents::new()),
        }
    }

    pub(crate) fn root(&self) -> PathBuf {
        self.temp.path().join("accounts")
    }

    pub(crate) fn context(&self) -> AccountContext {
        AccountContext {
            credentials: Arc::clone(&self.credentials),
            events: Arc::clone(&self.events),
            lock_timeout: Duration::from_secs(1),
            lock_retry_interval: Duration::from_millis(5),
        }
    }

    /// A standalone account for `provider_id` with `updated` = 100s.
    pub(crate) fn account(&self, provider_id: &str) -> Account {
        self.account_with(provider_id, &DirectoryBookDatabases)
    }

    /// Like [`account`](Self::account), with books opened through `books`.
    pub(crate) fn account_with(
        &self,
        provider_id: &str,
        books: &dyn BookDatabaseFactory,
    ) -> Account {
        let id = AccountId::new();
        let directory = AccountDirectory::new(&self.root(), id);
        directory.create().unwrap();
        let description = AccountDescription::new(provider(provider_id, 100));
        directory
            .write_description(&description, Duration::from_secs(1), Duration::from_millis(5))
            .unwrap();
        let books = books.open_database(id, &directory.books_path()).unwrap();
        Account::new(
            id,
            directory,
            description,
            LoginState::NotLoggedIn,
            books,
            self.context(),
        )
    }
}

/// Book databases whose open or delete can be made to fail.
#[derive(Debug, Default)]
pub(crate) struct FlakyBookDatabases {
    pub(crate) fail_open: Arc<AtomicBool>,
    pub(crate) fail_delete: Arc<AtomicBool>,
}

impl BookDatabaseFactory for FlakyBookDatabases {
    fn open_database(
        &self,
        owner: AccountId,
        directory: &Path,
    ) -> Result<Box<dyn BookDatabase>, BookDatabaseError> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(BookDatabaseError::new("open refused"));
        }
        let inner = DirectoryBookDatabases.open_database(owner, directory)?;
        Ok(Box::new(FlakyBookDatabase {
            inner,
            fail_delete: Arc::clone(&self.fail_delete),
        }))
    }
}

#[derive(Debug)]
struct FlakyBookDatabase {
    inner: Box<dyn BookDatabase>,
    fail_delete: Arc<AtomicBool>,
}

impl BookDatabase for FlakyBookDatabase {
    fn owner(&self) -> AccountId {
        self.inner.owner()
    }

    fn delete(&self) -> Result<(), BookDatabaseError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(BookDatabaseError::new("delete refused"));
        }
        self.inner.delete()
    }
}
