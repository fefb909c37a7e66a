//! The client's operation surface.
//!
//! [`client`] holds the core type and the raw read/write calls with error
//! classification and the single-shot 401 restore-retry; the sibling modules
//! extend it with the backend's operation groups: authentication, schema
//! (DDL), objects (DML), queries/reports, and file management.

pub mod auth;
pub mod client;
pub mod errors;
pub mod files;
pub mod objects;
pub mod queries;
pub mod schema;
