//! Test fixtures for accounts databases.
//!
//! [`TestAccounts`] owns a temporary directory holding an accounts root and a
//! credential store, plus a provider registry and book database factory that
//! tests can steer.

use chrono::{TimeZone, Utc};
use parking_lot::{Mutex, RwLock};
use shelfdb_accounts::{
    AccountId, AccountsConfig, AccountsDatabase, AccountsResult, BookDatabase,
    BookDatabaseError, BookDatabaseFactory, CredentialStore, DirectoryBookDatabases,
    ProviderDescription, ProviderId, ProviderResolver,
};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// A provider titled after its id whose `updated` timestamp is `secs` after
/// the epoch.
pub fn provider(id: &str, secs: i64) -> ProviderDescription {
    ProviderDescription::new(
        id,
        format!("Library {id}"),
        Utc.timestamp_opt(secs, 0)
            .single()
            .expect("timestamp in range"),
    )
}

/// A provider registry tests can fill and update.
#[derive(Debug, Default)]
pub struct StaticProviderRegistry {
    providers: RwLock<BTreeMap<ProviderId, ProviderDescription>>,
}

impl StaticProviderRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a provider.
    pub fn insert(&self, provider: ProviderDescription) {
        self.providers.write().insert(provider.id.clone(), provider);
    }

    /// Forgets a provider.
    pub fn remove(&self, id: &ProviderId) {
        self.providers.write().remove(id);
    }
}

impl ProviderResolver for StaticProviderRegistry {
    fn resolve(&self, id: &ProviderId) -> Option<ProviderDescription> {
        self.providers.read().get(id).cloned()
    }
}

/// Directory-backed book databases with failure injection and a log of
/// deletions.
#[derive(Debug, Default)]
pub struct RecordingBookDatabases {
    fail_open: AtomicBool,
    fail_delete: Arc<AtomicBool>,
    refused_owners: Mutex<BTreeSet<AccountId>>,
    deleted: Arc<Mutex<Vec<AccountId>>>,
}

impl RecordingBookDatabases {
    /// Creates a factory that never fails.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent open fail.
    pub fn set_fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    /// Makes every delete, including on already opened databases, fail.
    pub fn set_fail_delete(&self, fail: bool) {
        self.fail_delete.store(fail, Ordering::SeqCst);
    }

    /// Makes opening the database of `owner` fail.
    pub fn refuse_owner(&self, owner: AccountId) {
        self.refused_owners.lock().insert(owner);
    }

    /// Owners whose databases were successfully deleted, in order.
    pub fn deleted(&self) -> Vec<AccountId> {
        self.deleted.lock().clone()
    }
}

impl BookDatabaseFactory for RecordingBookDatabases {
    fn open_database(
        &self,
        owner: AccountId,
        directory: &Path,
    ) -> Result<Box<dyn BookDatabase>, BookDatabaseError> {
        if self.fail_open.load(Ordering::SeqCst) || self.refused_owners.lock().contains(&owner) {
            return Err(BookDatabaseError::new(format!(
                "injected open failure for {owner}"
            )));
        }
        let inner = DirectoryBookDatabases.open_database(owner, directory)?;
        Ok(Box::new(RecordingBookDatabase {
            inner,
            fail_delete: Arc::clone(&self.fail_delete),
            deleted: Arc::clone(&self.deleted),
        }))
    }
}

#[derive(Debug)]
struct RecordingBookDatabase {
    inner: Box<dyn BookDatabase>,
    fail_delete: Arc<AtomicBool>,
    deleted: Arc<Mutex<Vec<AccountId>>>,
}

impl BookDatabase for RecordingBookDatabase {
    fn owner(&self) -> AccountId {
        self.inner.owner()
    }

    fn delete(&self) -> Result<(), BookDatabaseError> {
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(BookDatabaseError::new(format!(
                "injected delete failure for {}",
                self.owner()
            )));
        }
        self.inner.delete()?;
        self.deleted.lock().push(self.owner());
        Ok(())
    }
}

/// A temporary accounts environment with automatic cleanup.
pub struct TestAccounts {
    /// Provider registry consulted on open.
    pub registry: StaticProviderRegistry,
    /// Book database factory handed to every open.
    pub books: Arc<RecordingBookDatabases>,
    credentials: Arc<CredentialStore>,
    temp_dir: TempDir,
}

impl TestAccounts {
    /// Creates an empty environment.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let credentials = Arc::new(
            CredentialStore::open(
                &temp_dir.path().join("credentials.json"),
                &temp_dir.path().join("credentials.json.tmp"),
            )
            .expect("Failed to open credential store"),
        );
        Self {
            registry: StaticProviderRegistry::new(),
            books: Arc::new(RecordingBookDatabases::new()),
            credentials,
            temp_dir,
        }
    }

    /// The accounts root.
    pub fn root(&self) -> PathBuf {
        self.temp_dir.path().join("accounts")
    }

    /// The credential document.
    pub fn credentials_path(&self) -> PathBuf {
        self.temp_dir.path().join("credentials.json")
    }

    /// The shared credential store.
    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    /// Re-reads the credential store from disk, as a new process would.
    pub fn reload_credentials(&mut self) {
        self.credentials = Arc::new(
            CredentialStore::open(
                &self.credentials_path(),
                &self.temp_dir.path().join("credentials.json.tmp"),
            )
            .expect("Failed to reopen credential store"),
        );
    }

    /// A config with a short lock timeout, suitable for tests.
    pub fn config() -> AccountsConfig {
        AccountsConfig::new()
            .lock_timeout(Duration::from_millis(500))
            .lock_retry_interval(Duration::from_millis(5))
    }

    /// Opens the database with [`config`](Self::config).
    pub fn open(&self) -> AccountsResult<AccountsDatabase> {
        self.open_with_config(Self::config())
    }

    /// Opens the database with `config`.
    pub fn open_with_config(&self, config: AccountsConfig) -> AccountsResult<AccountsDatabase> {
        AccountsDatabase::open_with_config(
            &self.root(),
            config,
            Arc::clone(&self.credentials),
            &self.registry,
            Arc::clone(&self.books) as Arc<dyn BookDatabaseFactory>,
        )
    }

    /// Opens the database, retrying once if the first attempt reported
    /// broken accounts.
    pub fn open_repaired(&self) -> AccountsDatabase {
        match self.open() {
            Ok(db) => db,
            Err(_) => self.open().expect("second open should succeed"),
        }
    }
}

impl Default for TestAccounts {
    fn default() -> Self {
        Self::new()
    }
}

/// Test scenario helpers.
pub mod scenarios {
    use super::*;

    /// An environment whose database holds one account per provider id,
    /// each provider registered with `updated` = 100s.
    pub fn with_accounts(providers: &[&str]) -> (TestAccounts, AccountsDatabase) {
        let env = TestAccounts::new();
        let db = env.open().expect("Failed to open accounts database");
        for id in providers {
            let description = provider(id, 100);
            env.registry.insert(description.clone());
            db.create_account(description)
                .expect("Failed to create account");
        }
        (env, db)
    }
}
