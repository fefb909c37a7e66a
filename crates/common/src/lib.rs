//! Session state, persistence, and value formatting shared by the Integram
//! client crates.
//!
//! This crate contains the side-effect-light foundation of the SDK:
//! - [`session`]: per-database credential records, the active-session state
//!   machine, and the persisted-format codec with legacy migration
//! - [`storage`]: the key-value persistence seam plus file-backed and
//!   in-memory implementations, wrapped in a degrade-instead-of-fail layer
//! - [`format`]: normalization of date-like requisite values into the
//!   backend's canonical textual form
//! - [`error`]: error classification shared with the I/O crate

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod error;
pub mod format;
pub mod session;
pub mod storage;

pub use error::{ErrorClassification, ErrorSeverity};
pub use format::RequisiteValue;
pub use session::store::{SessionError, SessionStore, MY_DATABASE};
pub use session::types::{AuthInfo, DatabaseSession};
pub use storage::{FileStorage, MemoryStorage, SafeStorage, SessionStorage, StorageError};
