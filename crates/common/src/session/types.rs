//! Persisted session shapes and identity snapshots.
//!
//! Field names serialize in camelCase to stay byte-compatible with documents
//! written by earlier deployments of the backend's own console. The backend
//! is loose about numeric identifiers (sometimes a JSON number, sometimes a
//! string); deserialization normalizes them to strings once, here, so the
//! rest of the code never has to care.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// One authenticated database session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseSession {
    /// Opaque bearer credential.
    pub token: String,

    /// Anti-forgery credential; defaults to `token` when the backend omits
    /// it.
    #[serde(default)]
    pub xsrf_token: String,

    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub user_id: Option<String>,

    #[serde(default)]
    pub user_name: Option<String>,

    #[serde(default)]
    pub user_role: Option<String>,

    /// Databases this session may delegate into. Populated only for the
    /// distinguished "my" database.
    #[serde(default)]
    pub owned_databases: Vec<String>,
}

impl DatabaseSession {
    /// A session is usable only with both credentials present.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        !self.token.is_empty() && !self.xsrf_token.is_empty()
    }
}

/// Version-2 persisted shape: the whole multi-database store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub version: u32,
    pub server: String,
    #[serde(default)]
    pub current_database: Option<String>,
    pub databases: BTreeMap<String, DatabaseSession>,
}

/// Format tag for [`SessionSnapshot`].
pub const SNAPSHOT_VERSION: u32 = 2;

/// Legacy persisted shape: a single session with its auth metadata inline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacySession {
    #[serde(default)]
    pub database: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub xsrf_token: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub user_id: Option<String>,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub user_role: Option<String>,
    #[serde(default)]
    pub auth_server: Option<String>,
    #[serde(default)]
    pub auth_database: Option<String>,
}

/// Read-only snapshot of the active credential set, for callers that render
/// user identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthInfo {
    pub token: Option<String>,
    pub xsrf: Option<String>,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub user_role: Option<String>,
    pub database: Option<String>,
}

/// Accept a string, a number, or null where an identifier is expected.
fn lenient_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| match value {
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }))
}
