//! # shelfdb Accounts
//!
//! The embedded accounts database of a library reading application.
//!
//! This crate provides:
//! - [`AccountsDatabase`] - the on-disk set of configured library accounts,
//!   indexed by id and by provider, with open-time migration and self-healing
//! - [`Account`] - one account, whose mutations persist themselves atomically
//! - [`CredentialStore`] - the per-account credential cache
//! - [`AccountEvents`] - notifications for created, updated, deleted and
//!   logged-in/out accounts
//!
//! ## On-disk layout
//!
//! ```text
//! <root>/
//! ├─ <account-uuid>/
//! │  ├─ account.json        # AccountDescription
//! │  ├─ account.json.tmp    # transient write buffer
//! │  ├─ lock                # advisory lock for description writes
//! │  └─ books/              # owned by the book database
//! └─ ...
//! <credentials>.json        # CredentialStore document
//! <credentials>.json.tmp
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use shelfdb_accounts::{AccountsDatabase, CredentialStore, DirectoryBookDatabases};
//! use std::sync::Arc;
//!
//! let credentials = Arc::new(CredentialStore::open(&creds, &creds_tmp)?);
//! let db = AccountsDatabase::open(
//!     &root,
//!     credentials,
//!     &|_: &ProviderId| -> Option<ProviderDescription> { None },
//!     Arc::new(DirectoryBookDatabases),
//! )?;
//! let account = db.create_account(provider)?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod account;
mod books;
mod config;
mod credentials;
mod database;
mod description;
mod error;
mod events;
mod id;
mod layout;
mod login;
mod migration;
mod provider;
mod view;

#[cfg(test)]
mod test_support;

pub use account::Account;
pub use books::{BookDatabase, BookDatabaseError, BookDatabaseFactory, DirectoryBookDatabases};
pub use config::AccountsConfig;
pub use credentials::CredentialStore;
pub use database::AccountsDatabase;
pub use description::{
    AccountDescription, AccountPreferences, DescriptionDocument, DESCRIPTION_VERSION,
};
pub use error::{AccountsError, AccountsResult, ErrorList};
pub use events::{AccountEvent, AccountEvents};
pub use id::AccountId;
pub use layout::AccountDirectory;
pub use login::{Cookie, Credentials, LoginState};
pub use migration::DirectoryMigrator;
pub use provider::{ProviderDescription, ProviderId, ProviderResolver};
pub use view::AccountsView;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
