//! Error types for the accounts database.

use crate::books::BookDatabaseError;
use crate::provider::ProviderId;
use shelfdb_storage::StorageError;
use std::fmt;
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type for accounts operations.
pub type AccountsResult<T> = Result<T, AccountsError>;

/// Errors that can occur in accounts database operations.
#[derive(Debug, Error)]
pub enum AccountsError {
    /// Filesystem error during read, write, rename or delete.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A JSON document on disk could not be decoded.
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        /// The document that failed to parse.
        path: PathBuf,
        /// The decoder error.
        #[source]
        source: serde_json::Error,
    },

    /// A value could not be encoded as JSON.
    #[error("failed to serialize document: {0}")]
    Serialize(#[source] serde_json::Error),

    /// A document or directory does not have the expected shape.
    #[error("invalid format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// Opening the database failed; every per-account problem is listed.
    #[error("failed to open accounts database: {0}")]
    Open(ErrorList),

    /// Deleting an account failed partway; every failed step is listed.
    #[error("failed to delete account: {0}")]
    Delete(ErrorList),

    /// An account for this provider already exists.
    #[error("an account already exists for provider {provider}")]
    DuplicateProvider {
        /// The provider that is already in use.
        provider: ProviderId,
    },

    /// The only remaining account cannot be deleted.
    #[error("cannot delete the last remaining account (provider {provider})")]
    LastAccountRemaining {
        /// The provider of the remaining account.
        provider: ProviderId,
    },

    /// No account exists for this provider.
    #[error("no account exists for provider {provider}")]
    NonexistentAccount {
        /// The provider that was looked up.
        provider: ProviderId,
    },

    /// A provider with a different identity was given to an account.
    #[error("account belongs to provider {expected}, not {received}")]
    WrongProvider {
        /// The provider the account belongs to.
        expected: ProviderId,
        /// The provider that was supplied.
        received: ProviderId,
    },

    /// A legacy description names a provider the resolver does not know.
    #[error("provider {provider} could not be resolved")]
    UnresolvableProvider {
        /// The unresolved provider.
        provider: ProviderId,
    },

    /// The advisory lock on an account was not acquired in time.
    #[error("timed out after {timeout:?} waiting for lock {}", path.display())]
    LockTimeout {
        /// The contended lock file.
        path: PathBuf,
        /// How long the caller waited.
        timeout: Duration,
    },

    /// The book database collaborator failed.
    #[error("book database error: {0}")]
    BookDatabase(#[from] BookDatabaseError),

    /// No unused account id could be generated.
    #[error("could not generate an unused account id after {attempts} attempts")]
    IdExhaustion {
        /// Number of ids tried.
        attempts: u32,
    },

    /// A legacy account directory could not be renamed.
    #[error("failed to migrate legacy account directory {}: {source}", directory.display())]
    Migration {
        /// The legacy directory.
        directory: PathBuf,
        /// The rename failure.
        #[source]
        source: io::Error,
    },

    /// A failure attributed to one account directory.
    #[error("account directory {}: {source}", directory.display())]
    InAccount {
        /// The account directory.
        directory: PathBuf,
        /// What went wrong there.
        #[source]
        source: Box<AccountsError>,
    },
}

impl AccountsError {
    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }

    /// Attributes this error to an account directory.
    pub fn in_account(self, directory: impl Into<PathBuf>) -> Self {
        Self::InAccount {
            directory: directory.into(),
            source: Box::new(self),
        }
    }

    /// Returns the innermost error, looking through `InAccount` wrappers.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::InAccount { source, .. } => source.root(),
            other => other,
        }
    }
}

impl From<StorageError> for AccountsError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::Io(e) => Self::Io(e),
            StorageError::LockTimeout { path, timeout } => Self::LockTimeout { path, timeout },
        }
    }
}

/// A non-empty list of errors collected while every step was still attempted.
#[derive(Debug)]
pub struct ErrorList {
    errors: Vec<AccountsError>,
}

impl ErrorList {
    /// Creates a list from its first error.
    #[must_use]
    pub fn new(first: AccountsError) -> Self {
        Self {
            errors: vec![first],
        }
    }

    /// Creates a list from collected errors, or `None` if nothing failed.
    #[must_use]
    pub fn from_errors(errors: Vec<AccountsError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self { errors })
        }
    }

    /// Appends another error.
    pub fn push(&mut self, error: AccountsError) {
        self.errors.push(error);
    }

    /// Returns the first error recorded.
    #[must_use]
    pub fn first(&self) -> &AccountsError {
        &self.errors[0]
    }

    /// Number of errors; never zero.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Always `false`; present for API symmetry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Iterates over the errors in the order they were recorded.
    pub fn iter(&self) -> std::slice::Iter<'_, AccountsError> {
        self.errors.iter()
    }

    /// Consumes the list.
    #[must_use]
    pub fn into_vec(self) -> Vec<AccountsError> {
        self.errors
    }
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.len() == 1 {
            return write!(f, "{}", self.errors[0]);
        }
        write!(f, "{} errors: ", self.errors.len())?;
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a ErrorList {
    type Item = &'a AccountsError;
    type IntoIter = std::slice::Iter<'a, AccountsError>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl IntoIterator for ErrorList {
    type Item = AccountsError;
    type IntoIter = std::vec::IntoIter<AccountsError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_list_is_none() {
        assert!(ErrorList::from_errors(Vec::new()).is_none());
    }

    #[test]
    fn list_keeps_order() {
        let mut list = ErrorList::new(AccountsError::invalid_format("a"));
        list.push(AccountsError::IdExhaustion { attempts: 3 });

        assert_eq!(list.len(), 2);
        assert!(matches!(list.first(), AccountsError::InvalidFormat { .. }));
        let text = list.to_string();
        assert!(text.starts_with("2 errors: "));
        assert!(text.contains("invalid format: a"));
    }

    #[test]
    fn single_error_displays_plainly() {
        let list = ErrorList::new(AccountsError::invalid_format("x"));
        assert_eq!(list.to_string(), "invalid format: x");
    }

    #[test]
    fn lock_timeout_maps_across_crates() {
        let error: AccountsError = StorageError::LockTimeout {
            path: PathBuf::from("lock"),
            timeout: Duration::from_millis(5),
        }
        .into();
        assert!(matches!(error, AccountsError::LockTimeout { .. }));
    }

    #[test]
    fn root_unwraps_account_context() {
        let error = AccountsError::IdExhaustion { attempts: 1 }
            .in_account("/a")
            .in_account("/b");
        assert!(matches!(error.root(), AccountsError::IdExhaustion { .. }));
    }
}
