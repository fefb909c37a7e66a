//! Multi-database session state and its persisted representations.
//!
//! [`store`] owns the in-memory state machine (per-database credential
//! records, the active credential set, database switching with owned-database
//! delegation). [`restore`] is the codec between that state and the
//! persistence medium: it writes the current format, reads three generations
//! of persisted shapes, and migrates the older ones forward.

pub mod restore;
pub mod store;
pub mod types;

/// Persistence key names, shared with deployments that wrote the older
/// formats.
pub mod keys {
    /// Current session document (version-2 or legacy single-session shape).
    pub const SESSION: &str = "integram_session";
    /// Bare server URL, kept outside the session document so it survives
    /// logout.
    pub const SERVER: &str = "integram_server";
    /// Millisecond timestamp of the last session write, used for stale-data
    /// eviction.
    pub const SESSION_TIMESTAMP: &str = "session_timestamp";

    /// Oldest-generation flat keys, implicitly bound to the "my" database.
    pub const MY_TOKEN: &str = "my_token";
    pub const MY_XSRF: &str = "my_xsrf";
    pub const MY_USER: &str = "my_user";
    pub const MY_ID: &str = "my_id";

    /// Even older flat keys that carried an explicit database name.
    pub const FLAT_TOKEN: &str = "token";
    pub const FLAT_XSRF: &str = "_xsrf";
    pub const FLAT_USER: &str = "user";
    pub const FLAT_ID: &str = "id";
    pub const FLAT_DB: &str = "db";
}
