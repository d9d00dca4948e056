//! The accounts database.
//!
//! `AccountsDatabase` owns a root directory with one subdirectory per
//! account and keeps two indices over the same set of accounts: by id and by
//! provider. Both are swapped together under one lock, so they always agree.
//!
//! Index mutations follow a prepare-then-commit pattern: all directory I/O
//! for a new account happens before the index lock is taken, and the lock is
//! only held for the map update itself.

use crate::account::{Account, AccountContext};
use crate::books::BookDatabaseFactory;
use crate::config::AccountsConfig;
use crate::credentials::CredentialStore;
use crate::description::AccountDescription;
use crate::error::{AccountsError, AccountsResult, ErrorList};
use crate::events::{AccountEvent, AccountEvents};
use crate::id::AccountId;
use crate::layout::AccountDirectory;
use crate::login::LoginState;
use crate::migration::{allocate_id, DirectoryMigrator};
use crate::provider::{ProviderDescription, ProviderId, ProviderResolver};
use crate::view::AccountsView;
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Both account indices. They are only ever changed together.
#[derive(Default)]
struct Indices {
    by_id: Arc<BTreeMap<AccountId, Arc<Account>>>,
    by_provider: Arc<BTreeMap<ProviderId, Arc<Account>>>,
}

impl Indices {
    fn insert(&mut self, provider: ProviderId, account: Arc<Account>) {
        Arc::make_mut(&mut self.by_id).insert(account.id(), Arc::clone(&account));
        Arc::make_mut(&mut self.by_provider).insert(provider, account);
    }

    fn remove(&mut self, provider: &ProviderId) -> Option<Arc<Account>> {
        let account = Arc::make_mut(&mut self.by_provider).remove(provider)?;
        Arc::make_mut(&mut self.by_id).remove(&account.id());
        Some(account)
    }
}

/// The set of configured library accounts.
///
/// # Opening
///
/// ```rust,ignore
/// use shelfdb_accounts::{AccountsDatabase, CredentialStore, DirectoryBookDatabases};
///
/// let credentials = Arc::new(CredentialStore::open(&creds, &creds_tmp)?);
/// let db = match AccountsDatabase::open(&root, credentials.clone(), &registry, books.clone()) {
///     Ok(db) => db,
///     // Corrupt accounts were removed; the next open sees the cleaned tree.
///     Err(AccountsError::Open(_)) => {
///         AccountsDatabase::open(&root, credentials, &registry, books)?
///     }
///     Err(e) => return Err(e),
/// };
/// ```
pub struct AccountsDatabase {
    root: PathBuf,
    config: AccountsConfig,
    context: AccountContext,
    book_databases: Arc<dyn BookDatabaseFactory>,
    indices: RwLock<Indices>,
}

impl AccountsDatabase {
    /// Opens the accounts database rooted at `root` with default settings.
    ///
    /// See [`open_with_config`](Self::open_with_config).
    pub fn open(
        root: &Path,
        credentials: Arc<CredentialStore>,
        resolver: &dyn ProviderResolver,
        book_databases: Arc<dyn BookDatabaseFactory>,
    ) -> AccountsResult<Self> {
        Self::open_with_config(
            root,
            AccountsConfig::default(),
            credentials,
            resolver,
            book_databases,
        )
    }

    /// Opens the accounts database rooted at `root`.
    ///
    /// The method:
    /// - Creates `root` if needed (unless `create_if_missing` is false)
    /// - Renames legacy, non-UUID account directories to fresh UUIDs
    /// - Loads every account, re-attaching credentials from `credentials`
    ///   and reconciling provider metadata through `resolver`
    /// - Deletes the directories of accounts that fail to load, and of
    ///   accounts whose provider is already taken by an earlier account
    ///
    /// # Errors
    ///
    /// Returns `Open` listing every account that failed to migrate or load.
    /// Those accounts have already been cleaned up, so opening again will
    /// succeed with the remaining accounts. Duplicate providers are resolved
    /// silently and are not errors.
    ///
    /// Returns `InvalidFormat` if `root` is not a directory, or an I/O error
    /// if it cannot be listed.
    pub fn open_with_config(
        root: &Path,
        config: AccountsConfig,
        credentials: Arc<CredentialStore>,
        resolver: &dyn ProviderResolver,
        book_databases: Arc<dyn BookDatabaseFactory>,
    ) -> AccountsResult<Self> {
        if !root.exists() {
            if config.create_if_missing {
                fs::create_dir_all(root)?;
            } else {
                return Err(AccountsError::invalid_format(format!(
                    "accounts directory does not exist: {}",
                    root.display()
                )));
            }
        }
        if !root.is_dir() {
            return Err(AccountsError::invalid_format(format!(
                "path is not a directory: {}",
                root.display()
            )));
        }

        let context = AccountContext {
            credentials,
            events: Arc::new(AccountEvents::new()),
            lock_timeout: config.lock_timeout,
            lock_retry_interval: config.lock_retry_interval,
        };

        let mut errors = Vec::new();
        let candidates = Self::collect_candidates(root, &config, &mut errors)?;

        let mut indices = Indices::default();
        for id in candidates {
            let directory = AccountDirectory::new(root, id);
            match Self::load_account(
                id,
                directory.clone(),
                resolver,
                book_databases.as_ref(),
                &context,
            ) {
                Ok(account) => {
                    let provider = account.provider().id;
                    if indices.by_provider.contains_key(&provider) {
                        warn!(
                            account = %id,
                            provider = %provider,
                            "discarding account with duplicate provider"
                        );
                        if let Err(e) = account.delete() {
                            warn!(
                                account = %id,
                                error = %e,
                                "failed to clean up duplicate account"
                            );
                        }
                        continue;
                    }
                    indices.insert(provider, Arc::new(account));
                }
                Err(e) => {
                    warn!(account = %id, error = %e, "removing account that failed to load");
                    if let Err(cleanup) = directory.remove() {
                        warn!(account = %id, error = %cleanup, "failed to remove broken account");
                    }
                    if let Err(cleanup) = context.credentials.delete(&id) {
                        warn!(
                            account = %id,
                            error = %cleanup,
                            "failed to remove credentials of broken account"
                        );
                    }
                    errors.push(e.in_account(directory.path()));
                }
            }
        }

        if let Some(list) = ErrorList::from_errors(errors) {
            warn!(
                root = %root.display(),
                errors = list.len(),
                "accounts database open failed"
            );
            return Err(AccountsError::Open(list));
        }

        info!(
            root = %root.display(),
            accounts = indices.by_id.len(),
            "opened accounts database"
        );

        Ok(Self {
            root: root.to_path_buf(),
            config,
            context,
            book_databases,
            indices: RwLock::new(indices),
        })
    }

    /// Lists the root, migrating legacy directory names, and returns the
    /// account ids to load in order.
    fn collect_candidates(
        root: &Path,
        config: &AccountsConfig,
        errors: &mut Vec<AccountsError>,
    ) -> AccountsResult<BTreeSet<AccountId>> {
        // Snapshot the listing first: migration renames entries in place.
        let mut entries = Vec::new();
        for entry in fs::read_dir(root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                entries.push(entry.path());
            } else {
                debug!(path = %entry.path().display(), "ignoring non-directory entry");
            }
        }

        let migrator = DirectoryMigrator::new(root, config.max_id_attempts);
        let mut candidates = BTreeSet::new();
        for path in entries {
            let canonical = path
                .file_name()
                .and_then(|name| name.to_str())
                .filter(|name| !DirectoryMigrator::is_legacy_name(name))
                .and_then(AccountId::parse);

            match canonical {
                Some(id) => {
                    candidates.insert(id);
                }
                None => match migrator.migrate(&path) {
                    Ok(id) => {
                        candidates.insert(id);
                    }
                    Err(e) => {
                        // An unmigratable directory can never load; drop it so
                        // the next open succeeds.
                        warn!(
                            path = %path.display(),
                            error = %e,
                            "removing legacy directory that failed to migrate"
                        );
                        if let Err(cleanup) = AccountDirectory::at(path.clone()).remove() {
                            warn!(
                                path = %path.display(),
                                error = %cleanup,
                                "failed to remove legacy directory"
                            );
                        }
                        errors.push(e.in_account(&path));
                    }
                },
            }
        }
        Ok(candidates)
    }

    fn load_account(
        id: AccountId,
        directory: AccountDirectory,
        resolver: &dyn ProviderResolver,
        book_databases: &dyn BookDatabaseFactory,
        context: &AccountContext,
    ) -> AccountsResult<Account> {
        let book_database = book_databases.open_database(id, &directory.books_path())?;
        let document = directory.read_description()?;
        let legacy = document.is_legacy();
        let (description, rewrite) = document.resolve(resolver)?;

        if rewrite {
            directory.write_description(
                &description,
                context.lock_timeout,
                context.lock_retry_interval,
            )?;
            if legacy {
                info!(account = %id, "re-serialized legacy account description");
            }
        }

        let login_state = LoginState::from_credentials(context.credentials.get(&id));
        debug!(
            account = %id,
            provider = %description.provider.id,
            logged_in = login_state.is_logged_in(),
            "loaded account"
        );

        Ok(Account::new(
            id,
            directory,
            description,
            login_state,
            book_database,
            context.clone(),
        ))
    }

    /// Creates an account for `provider`.
    ///
    /// The account's directory, book database and initial description are
    /// all on disk before the account becomes visible in the indices.
    ///
    /// # Errors
    ///
    /// - `DuplicateProvider` if an account for this provider already exists
    /// - `IdExhaustion` if no unused id could be generated
    /// - I/O, lock or book database errors from preparing the account; any
    ///   partially created directory is removed
    pub fn create_account(&self, provider: ProviderDescription) -> AccountsResult<Arc<Account>> {
        let provider_id = provider.id.clone();
        let existing = {
            let indices = self.indices.read();
            if indices.by_provider.contains_key(&provider_id) {
                return Err(AccountsError::DuplicateProvider {
                    provider: provider_id,
                });
            }
            Arc::clone(&indices.by_id)
        };

        let id = allocate_id(self.config.max_id_attempts, AccountId::new, |id| {
            existing.contains_key(id) || AccountDirectory::new(&self.root, *id).path().exists()
        })?;
        let directory = AccountDirectory::new(&self.root, id);

        let account = match self.prepare_account(id, directory.clone(), provider) {
            Ok(account) => Arc::new(account),
            Err(e) => {
                if let Err(cleanup) = directory.remove() {
                    warn!(
                        account = %id,
                        error = %cleanup,
                        "failed to remove partially created account"
                    );
                }
                return Err(e);
            }
        };

        {
            let mut indices = self.indices.write();
            if indices.by_provider.contains_key(&provider_id) || indices.by_id.contains_key(&id) {
                drop(indices);
                if let Err(e) = account.delete() {
                    warn!(account = %id, error = %e, "failed to clean up losing account");
                }
                return Err(AccountsError::DuplicateProvider {
                    provider: provider_id,
                });
            }
            indices.insert(provider_id.clone(), Arc::clone(&account));
        }

        info!(account = %id, provider = %provider_id, "created account");
        self.context.events.emit(AccountEvent::Created { id });
        Ok(account)
    }

    fn prepare_account(
        &self,
        id: AccountId,
        directory: AccountDirectory,
        provider: ProviderDescription,
    ) -> AccountsResult<Account> {
        directory.create()?;
        let book_database = self
            .book_databases
            .open_database(id, &directory.books_path())?;
        let description = AccountDescription::new(provider);
        directory.write_description(
            &description,
            self.config.lock_timeout,
            self.config.lock_retry_interval,
        )?;

        Ok(Account::new(
            id,
            directory,
            description,
            LoginState::NotLoggedIn,
            book_database,
            self.context.clone(),
        ))
    }

    /// Deletes the account for `provider` and returns its id.
    ///
    /// The account leaves both indices before any of its data is deleted, so
    /// even a partially failed cleanup never leaves it visible.
    ///
    /// # Errors
    ///
    /// - `NonexistentAccount` if no account has this provider
    /// - `LastAccountRemaining` if it is the only account
    /// - `Delete` if some cleanup steps failed; the account is gone from the
    ///   database regardless
    pub fn delete_account_by_provider(&self, provider: &ProviderId) -> AccountsResult<AccountId> {
        let account = {
            let mut indices = self.indices.write();
            if !indices.by_provider.contains_key(provider) {
                return Err(AccountsError::NonexistentAccount {
                    provider: provider.clone(),
                });
            }
            if indices.by_id.len() == 1 {
                return Err(AccountsError::LastAccountRemaining {
                    provider: provider.clone(),
                });
            }
            indices
                .remove(provider)
                .ok_or_else(|| AccountsError::NonexistentAccount {
                    provider: provider.clone(),
                })?
        };

        let id = account.id();
        info!(account = %id, provider = %provider, "deleting account");
        let deleted = account.delete();
        self.context.events.emit(AccountEvent::Deleted { id });
        deleted.map(|()| id)
    }

    /// Returns a snapshot of all accounts keyed by id.
    #[must_use]
    pub fn accounts(&self) -> AccountsView<AccountId> {
        AccountsView::new(Arc::clone(&self.indices.read().by_id))
    }

    /// Returns a snapshot of all accounts keyed by provider.
    #[must_use]
    pub fn accounts_by_provider(&self) -> AccountsView<ProviderId> {
        AccountsView::new(Arc::clone(&self.indices.read().by_provider))
    }

    /// Returns the account with `id`.
    #[must_use]
    pub fn account(&self, id: &AccountId) -> Option<Arc<Account>> {
        self.indices.read().by_id.get(id).cloned()
    }

    /// Returns the account for `provider`.
    #[must_use]
    pub fn account_by_provider(&self, provider: &ProviderId) -> Option<Arc<Account>> {
        self.indices.read().by_provider.get(provider).cloned()
    }

    /// Number of accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.indices.read().by_id.len()
    }

    /// Whether there are no accounts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.read().by_id.is_empty()
    }

    /// Returns the root directory.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.root
    }

    /// Returns the configuration the database was opened with.
    #[must_use]
    pub fn config(&self) -> &AccountsConfig {
        &self.config
    }

    /// Returns the credential store shared with every account.
    #[must_use]
    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.context.credentials
    }

    /// Returns the event feed.
    #[must_use]
    pub fn events(&self) -> &Arc<AccountEvents> {
        &self.context.events
    }
}

impl fmt::Debug for AccountsDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let indices = self.indices.read();
        f.debug_struct("AccountsDatabase")
            .field("root", &self.root)
            .field("accounts", &indices.by_id.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::books::DirectoryBookDatabases;
    use crate::test_support::{no_providers, provider, Fixture, FlakyBookDatabases};
    use std::sync::atomic::Ordering;

    fn open(fixture: &Fixture) -> AccountsResult<AccountsDatabase> {
        AccountsDatabase::open(
            &fixture.root(),
            Arc::clone(&fixture.credentials),
            &no_providers,
            Arc::new(DirectoryBookDatabases),
        )
    }

    #[test]
    fn open_creates_root() {
        let fixture = Fixture::new();
        let db = open(&fixture).unwrap();
        assert!(fixture.root().is_dir());
        assert!(db.is_empty());
        assert_eq!(db.directory(), fixture.root());
    }

    #[test]
    fn open_without_create_fails_on_missing_root() {
        let fixture = Fixture::new();
        let result = AccountsDatabase::open_with_config(
            &fixture.root(),
            AccountsConfig::new().create_if_missing(false),
            Arc::clone(&fixture.credentials),
            &no_providers,
            Arc::new(DirectoryBookDatabases),
        );
        assert!(matches!(result, Err(AccountsError::InvalidFormat { .. })));
    }

    #[test]
    fn open_rejects_file_root() {
        let fixture = Fixture::new();
        fs::write(fixture.root(), b"not a directory").unwrap();
        assert!(matches!(open(&fixture), Err(AccountsError::InvalidFormat { .. })));
    }

    #[test]
    fn indices_stay_in_step() {
        let fixture = Fixture::new();
        let db = open(&fixture).unwrap();

        let a = db.create_account(provider("urn:a", 1)).unwrap();
        let b = db.create_account(provider("urn:b", 1)).unwrap();

        let by_id = db.accounts();
        let by_provider = db.accounts_by_provider();
        assert_eq!(by_id.len(), 2);
        assert_eq!(by_provider.len(), 2);
        for (account, provider) in [(&a, "urn:a"), (&b, "urn:b")] {
            assert!(Arc::ptr_eq(
                by_id.get(&account.id()).unwrap(),
                by_provider.get(&ProviderId::from(provider)).unwrap()
            ));
        }

        db.delete_account_by_provider(&ProviderId::from("urn:a")).unwrap();
        assert_eq!(db.accounts().len(), 1);
        assert_eq!(db.accounts_by_provider().len(), 1);
        assert!(db.account(&a.id()).is_none());

        // Snapshots taken earlier are unaffected.
        assert_eq!(by_id.len(), 2);
    }

    #[test]
    fn create_failure_removes_partial_directory() {
        let fixture = Fixture::new();
        let books = FlakyBookDatabases::default();
        let fail_open = Arc::clone(&books.fail_open);
        let db = AccountsDatabase::open(
            &fixture.root(),
            Arc::clone(&fixture.credentials),
            &no_providers,
            Arc::new(books),
        )
        .unwrap();

        fail_open.store(true, Ordering::SeqCst);
        let result = db.create_account(provider("urn:a", 1));

        assert!(matches!(result, Err(AccountsError::BookDatabase(_))));
        assert!(db.is_empty());
        assert_eq!(fs::read_dir(fixture.root()).unwrap().count(), 0);
    }

    #[test]
    fn create_emits_event() {
        let fixture = Fixture::new();
        let db = open(&fixture).unwrap();
        let rx = db.events().subscribe();

        let account = db.create_account(provider("urn:a", 1)).unwrap();
        assert_eq!(rx.try_recv().unwrap(), AccountEvent::Created { id: account.id() });
    }

    #[test]
    fn delete_unknown_provider_fails() {
        let fixture = Fixture::new();
        let db = open(&fixture).unwrap();
        db.create_account(provider("urn:a", 1)).unwrap();

        let result = db.delete_account_by_provider(&ProviderId::from("urn:zzz"));
        assert!(matches!(result, Err(AccountsError::NonexistentAccount { .. })));
    }

    #[test]
    fn duplicate_provider_on_disk_is_dropped_without_error() {
        let fixture = Fixture::new();
        let first = fixture.account("urn:dup");
        let second = fixture.account("urn:dup");

        let db = open(&fixture).unwrap();

        assert_eq!(db.len(), 1);
        let kept = db.account_by_provider(&ProviderId::from("urn:dup")).unwrap();
        let (winner, loser) = if first.id() < second.id() {
            (first.id(), second.id())
        } else {
            (second.id(), first.id())
        };
        assert_eq!(kept.id(), winner);
        assert!(!fixture.root().join(loser.directory_name()).exists());
    }

    #[test]
    fn stray_files_in_root_are_ignored() {
        let fixture = Fixture::new();
        fs::create_dir_all(fixture.root()).unwrap();
        fs::write(fixture.root().join("notes.txt"), b"hello").unwrap();

        let db = open(&fixture).unwrap();
        assert!(db.is_empty());
        assert!(fixture.root().join("notes.txt").exists());
    }

    #[test]
    fn uppercase_uuid_directory_is_renamed() {
        let fixture = Fixture::new();
        let account = fixture.account("urn:a");
        let original = account.directory().path().to_path_buf();
        let shouted = fixture.root().join(account.id().to_string().to_uppercase());
        drop(account);
        fs::rename(&original, &shouted).unwrap();

        let db = open(&fixture).unwrap();

        assert_eq!(db.len(), 1);
        let loaded = db.accounts().values().next().unwrap().clone();
        assert_eq!(
            loaded.directory().path(),
            fixture.root().join(loaded.id().directory_name())
        );
        assert!(!shouted.exists());
    }

    #[test]
    fn failed_migration_removes_legacy_directory() {
        let fixture = Fixture::new();
        let legacy = fixture.root().join("42");
        fs::create_dir_all(&legacy).unwrap();
        let open_exhausted = || {
            AccountsDatabase::open_with_config(
                &fixture.root(),
                AccountsConfig::new().max_id_attempts(0),
                Arc::clone(&fixture.credentials),
                &no_providers,
                Arc::new(DirectoryBookDatabases),
            )
        };

        match open_exhausted() {
            Err(AccountsError::Open(errors)) => {
                assert_eq!(errors.len(), 1);
                assert!(matches!(
                    errors.first().root(),
                    AccountsError::IdExhaustion { attempts: 0 }
                ));
            }
            other => panic!("expected an open failure, got {other:?}"),
        }
        assert!(!legacy.exists());

        assert!(open_exhausted().unwrap().is_empty());
    }

    #[test]
    fn broken_account_loses_its_credentials() {
        let fixture = Fixture::new();
        let account = fixture.account("urn:a");
        account
            .set_login_state(LoginState::LoggedIn(crate::login::Credentials::oauth("t")))
            .unwrap();
        let id = account.id();
        fs::write(account.directory().description_path(), b"{ not json").unwrap();
        drop(account);

        assert!(matches!(open(&fixture), Err(AccountsError::Open(_))));

        assert_eq!(fixture.credentials.get(&id), None);
        assert!(open(&fixture).unwrap().is_empty());
    }
}
