//! # shelfdb Storage
//!
//! File-level persistence primitives for shelfdb.
//!
//! This crate knows nothing about accounts or JSON. It provides the two
//! building blocks every shelfdb document write goes through:
//!
//! - [`write_atomic`] / [`StagedWrite`] - write-to-temporary-then-rename, so a
//!   reader of the target path only ever sees a complete file
//! - [`with_lock`] / [`FileLock`] - a cooperative, timeout-bounded advisory lock
//!   keyed on a lock file
//!
//! ## Example
//!
//! ```no_run
//! use shelfdb_storage::{with_lock, write_atomic, StorageError};
//! use std::path::Path;
//! use std::time::Duration;
//!
//! let dir = Path::new("account");
//! with_lock(&dir.join("lock"), Duration::from_secs(1), || {
//!     write_atomic(&dir.join("account.json"), &dir.join("account.json.tmp"), b"{}")
//! })?;
//! # Ok::<(), StorageError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod atomic;
mod error;
mod lock;

pub use atomic::{write_atomic, StagedWrite};
pub use error::{StorageError, StorageResult};
pub use lock::{with_lock, with_lock_polling, FileLock, DEFAULT_RETRY_INTERVAL};
