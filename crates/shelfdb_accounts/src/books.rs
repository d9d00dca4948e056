//! Book database collaborator.
//!
//! Each account owns a book database rooted in its `books/` directory. Its
//! format is opaque here: the accounts database only opens a handle when an
//! account is loaded or created, and asks it to delete itself when the
//! account goes away.

use crate::id::AccountId;
use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// An error reported by a book database implementation.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct BookDatabaseError {
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl BookDatabaseError {
    /// Creates an error with a message only.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an error wrapping an underlying cause.
    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

/// A handle to one account's book database.
pub trait BookDatabase: Send + Sync + fmt::Debug {
    /// The account that owns this database.
    fn owner(&self) -> AccountId;

    /// Deletes all data held by this database.
    fn delete(&self) -> Result<(), BookDatabaseError>;
}

/// Opens book databases for accounts.
pub trait BookDatabaseFactory: Send + Sync {
    /// Opens (creating if necessary) the database stored in `directory`.
    fn open_database(
        &self,
        owner: AccountId,
        directory: &Path,
    ) -> Result<Box<dyn BookDatabase>, BookDatabaseError>;
}

/// The plain directory-backed book database: it creates its directory on
/// open and removes it on delete.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryBookDatabases;

impl BookDatabaseFactory for DirectoryBookDatabases {
    fn open_database(
        &self,
        owner: AccountId,
        directory: &Path,
    ) -> Result<Box<dyn BookDatabase>, BookDatabaseError> {
        fs::create_dir_all(directory).map_err(|e| {
            BookDatabaseError::with_source(
                format!("cannot create book directory {}", directory.display()),
                e,
            )
        })?;
        Ok(Box::new(DirectoryBookDatabase {
            owner,
            directory: directory.to_path_buf(),
        }))
    }
}

#[derive(Debug)]
struct DirectoryBookDatabase {
    owner: AccountId,
    directory: PathBuf,
}

impl BookDatabase for DirectoryBookDatabase {
    fn owner(&self) -> AccountId {
        self.owner
    }

    fn delete(&self) -> Result<(), BookDatabaseError> {
        match fs::remove_dir_all(&self.directory) {
            Ok(()) => {
                debug!(account = %self.owner, "deleted book database");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BookDatabaseError::with_source(
                format!("cannot delete book directory {}", self.directory.display()),
                e,
            )),
        }
    }
}
