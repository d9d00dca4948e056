//! A single account.
//!
//! An [`Account`] owns its directory and book database handle and holds its
//! current description and login state behind a per-account lock. Every
//! mutation is a read-modify-persist sequence performed under that lock, with
//! the account's advisory file lock taken innermost around the file write.
//! Distinct accounts never contend.

use crate::books::BookDatabase;
use crate::credentials::CredentialStore;
use crate::description::{AccountDescription, AccountPreferences};
use crate::error::{AccountsError, AccountsResult, ErrorList};
use crate::events::{AccountEvent, AccountEvents};
use crate::id::AccountId;
use crate::layout::AccountDirectory;
use crate::login::LoginState;
use crate::provider::ProviderDescription;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Services an account shares with the database that owns it.
#[derive(Debug, Clone)]
pub(crate) struct AccountContext {
    pub(crate) credentials: Arc<CredentialStore>,
    pub(crate) events: Arc<AccountEvents>,
    pub(crate) lock_timeout: Duration,
    pub(crate) lock_retry_interval: Duration,
}

#[derive(Debug)]
struct AccountState {
    description: AccountDescription,
    login_state: LoginState,
}

/// One configured library account.
///
/// Accounts are owned by the [`AccountsDatabase`](crate::AccountsDatabase)
/// and handed out as `Arc<Account>`.
pub struct Account {
    id: AccountId,
    directory: AccountDirectory,
    state: Mutex<AccountState>,
    book_database: Box<dyn BookDatabase>,
    context: AccountContext,
}

impl Account {
    /// Assembles an account whose description is already on disk.
    pub(crate) fn new(
        id: AccountId,
        directory: AccountDirectory,
        description: AccountDescription,
        login_state: LoginState,
        book_database: Box<dyn BookDatabase>,
        context: AccountContext,
    ) -> Self {
        Self {
            id,
            directory,
            state: Mutex::new(AccountState {
                description,
                login_state,
            }),
            book_database,
            context,
        }
    }

    /// Returns the account id.
    #[must_use]
    pub fn id(&self) -> AccountId {
        self.id
    }

    /// Returns the account directory.
    #[must_use]
    pub fn directory(&self) -> &AccountDirectory {
        &self.directory
    }

    /// Returns the current description.
    #[must_use]
    pub fn description(&self) -> AccountDescription {
        self.state.lock().description.clone()
    }

    /// Returns the current provider snapshot.
    #[must_use]
    pub fn provider(&self) -> ProviderDescription {
        self.state.lock().description.provider.clone()
    }

    /// Returns the current preferences.
    #[must_use]
    pub fn preferences(&self) -> AccountPreferences {
        self.state.lock().description.preferences.clone()
    }

    /// Returns the current login state.
    #[must_use]
    pub fn login_state(&self) -> LoginState {
        self.state.lock().login_state.clone()
    }

    /// Returns the account's book database.
    #[must_use]
    pub fn book_database(&self) -> &dyn BookDatabase {
        self.book_database.as_ref()
    }

    /// Replaces the provider snapshot with updated metadata for the same
    /// provider.
    ///
    /// If the current snapshot is newer than `provider`, the call does
    /// nothing: a stale copy must never overwrite fresher metadata.
    ///
    /// # Errors
    ///
    /// - `WrongProvider` if `provider` has a different identity
    /// - `LockTimeout` or an I/O error if the description cannot be written;
    ///   the in-memory description is then unchanged
    pub fn set_provider(&self, provider: ProviderDescription) -> AccountsResult<()> {
        {
            let mut state = self.state.lock();
            let current = &state.description.provider;
            if current.id != provider.id {
                return Err(AccountsError::WrongProvider {
                    expected: current.id.clone(),
                    received: provider.id,
                });
            }
            if current.is_newer_than(&provider) {
                warn!(
                    account = %self.id,
                    provider = %provider.id,
                    current = %current.updated,
                    received = %provider.updated,
                    "ignoring stale provider update"
                );
                return Ok(());
            }

            let updated = state.description.with_provider(provider);
            self.write_description(&updated)?;
            state.description = updated;
        }

        self.context.events.emit(AccountEvent::Updated { id: self.id });
        Ok(())
    }

    /// Replaces the preferences.
    ///
    /// # Errors
    ///
    /// `LockTimeout` or an I/O error if the description cannot be written;
    /// the in-memory description is then unchanged.
    pub fn set_preferences(&self, preferences: AccountPreferences) -> AccountsResult<()> {
        {
            let mut state = self.state.lock();
            let updated = state.description.with_preferences(preferences);
            self.write_description(&updated)?;
            state.description = updated;
        }

        self.context.events.emit(AccountEvent::Updated { id: self.id });
        Ok(())
    }

    /// Records a new login state.
    ///
    /// The credential store is brought in line with `state` on every call,
    /// even when the state did not change, so it always reflects the most
    /// recent call. A change notification is emitted only on an actual change.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential store cannot be persisted. The
    /// in-memory state has been updated regardless.
    pub fn set_login_state(&self, login_state: LoginState) -> AccountsResult<()> {
        let (previous, stored) = {
            let mut state = self.state.lock();
            let previous = std::mem::replace(&mut state.login_state, login_state.clone());
            let stored = match &login_state {
                LoginState::LoggedIn(credentials) => {
                    self.context.credentials.put(self.id, credentials.clone())
                }
                LoginState::NotLoggedIn => self.context.credentials.delete(&self.id),
            };
            (previous, stored)
        };

        if previous != login_state {
            debug!(
                account = %self.id,
                logged_in = login_state.is_logged_in(),
                "login state changed"
            );
            self.context.events.emit(AccountEvent::LoginStateChanged {
                id: self.id,
                old: previous,
                new: login_state,
            });
        }
        stored
    }

    /// Deletes everything this account owns: its book database, its stored
    /// credentials and its directory.
    ///
    /// Every step is attempted even if an earlier one fails.
    ///
    /// # Errors
    ///
    /// `Delete` listing each step that failed, in order.
    pub fn delete(&self) -> AccountsResult<()> {
        let _state = self.state.lock();
        let mut errors = Vec::new();

        if let Err(e) = self.book_database.delete() {
            errors.push(AccountsError::BookDatabase(e));
        }
        if let Err(e) = self.context.credentials.delete(&self.id) {
            errors.push(e);
        }
        if let Err(e) = self.directory.remove() {
            errors.push(e);
        }

        match ErrorList::from_errors(errors) {
            None => {
                info!(account = %self.id, "deleted account data");
                Ok(())
            }
            Some(list) => {
                warn!(account = %self.id, errors = list.len(), "account deletion partially failed");
                Err(AccountsError::Delete(list))
            }
        }
    }

    fn write_description(&self, description: &AccountDescription) -> AccountsResult<()> {
        self.directory.write_description(
            description,
            self.context.lock_timeout,
            self.context.lock_retry_interval,
        )
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("directory", &self.directory.path())
            .field("provider", &state.description.provider.id)
            .field("logged_in", &state.login_state.is_logged_in())
            .finish()
    }
}
