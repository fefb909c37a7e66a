//! In-memory credential store: one record per authenticated database plus
//! the active credential set.
//!
//! The store is plain data; the client crate owns the single instance and
//! guards it with a lock. All methods are synchronous and never touch the
//! persistence medium — the codec in [`super::restore`] does that.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tracing::debug;

use super::types::{AuthInfo, DatabaseSession, LegacySession, SessionSnapshot, SNAPSHOT_VERSION};

/// The distinguished tenant whose credentials delegate into owned databases.
pub const MY_DATABASE: &str = "my";

/// A server URL with a single database segment appended
/// (`scheme://host/dbname`).
static SERVER_WITH_DATABASE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(https?://[^/]+)/([A-Za-z0-9_]+)$").expect("pattern compiles")
});

/// Failures of in-memory session operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("no session for database `{0}`; authenticate first")]
    UnknownDatabase(String),

    #[error("no database selected")]
    NoDatabaseSelected,
}

/// Process-wide session state: server URL, per-database records, and the
/// active credential set.
#[derive(Debug, Default)]
pub struct SessionStore {
    server: String,
    databases: BTreeMap<String, DatabaseSession>,
    current_database: Option<String>,

    // Active credential set. Mirrors the current database's record, except
    // when authorization is delegated from "my".
    database: Option<String>,
    token: Option<String>,
    xsrf_token: Option<String>,
    user_id: Option<String>,
    user_name: Option<String>,
    user_role: Option<String>,
    auth_database: Option<String>,
}

/// Strip a trailing slash and any embedded database segment from a server
/// URL.
///
/// Returns the bare server URL and whether a database segment was removed
/// (callers persist the normalized form when it was).
#[must_use]
pub fn normalize_server_url(url: &str) -> (String, bool) {
    let trimmed = url.trim_end_matches('/');
    if let Some(captures) = SERVER_WITH_DATABASE.captures(trimmed) {
        (captures[1].to_string(), true)
    } else {
        (trimmed.to_string(), false)
    }
}

impl SessionStore {
    #[must_use]
    pub fn new(server: &str) -> Self {
        let (server, _) = normalize_server_url(server);
        Self { server, ..Self::default() }
    }

    #[must_use]
    pub fn server(&self) -> &str {
        &self.server
    }

    /// Replace the server URL, normalizing it first.
    ///
    /// Returns `true` if an embedded database segment was stripped, so the
    /// caller can persist the corrected form.
    pub fn set_server(&mut self, url: &str) -> bool {
        let (server, stripped) = normalize_server_url(url);
        self.server = server;
        stripped
    }

    #[must_use]
    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    /// Point the active credential set at `database` without touching
    /// credentials. Used before unauthenticated calls such as login.
    pub fn set_database(&mut self, database: &str) {
        self.database = Some(database.to_string());
    }

    #[must_use]
    pub fn current_database(&self) -> Option<&str> {
        self.current_database.as_deref()
    }

    #[must_use]
    pub fn auth_database(&self) -> Option<&str> {
        self.auth_database.as_deref()
    }

    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    #[must_use]
    pub fn xsrf_token(&self) -> Option<&str> {
        self.xsrf_token.as_deref()
    }

    #[must_use]
    pub fn databases(&self) -> &BTreeMap<String, DatabaseSession> {
        &self.databases
    }

    #[must_use]
    pub fn session_for(&self, database: &str) -> Option<&DatabaseSession> {
        self.databases.get(database)
    }

    /// Token of the "my" session, when one exists.
    #[must_use]
    pub fn my_token(&self) -> Option<&str> {
        self.databases.get(MY_DATABASE).map(|session| session.token.as_str())
    }

    /// Record a credential pair without registering a database session.
    ///
    /// `xsrf` defaults to `token`; `auth_database` defaults to `database`.
    pub fn set_credentials(
        &mut self,
        database: &str,
        token: &str,
        xsrf: Option<&str>,
        auth_database: Option<&str>,
    ) {
        self.database = Some(database.to_string());
        self.token = Some(token.to_string());
        self.xsrf_token = Some(xsrf.unwrap_or(token).to_string());
        self.auth_database = Some(auth_database.unwrap_or(database).to_string());
    }

    /// Insert or overwrite the session for `database` and make it active.
    pub fn record_authentication(
        &mut self,
        database: &str,
        token: &str,
        xsrf: Option<&str>,
        user_id: Option<String>,
        user_name: Option<String>,
        user_role: Option<String>,
    ) {
        let session = DatabaseSession {
            token: token.to_string(),
            xsrf_token: xsrf.unwrap_or(token).to_string(),
            user_id,
            user_name,
            user_role,
            owned_databases: Vec::new(),
        };
        self.databases.insert(database.to_string(), session);
        self.current_database = Some(database.to_string());
        self.activate(database);
        debug!(database, "authentication recorded");
    }

    /// Replace the owned-database list on an existing session.
    pub fn set_owned_databases(&mut self, database: &str, owned: Vec<String>) {
        if let Some(session) = self.databases.get_mut(database) {
            session.owned_databases = owned;
        }
    }

    /// Activate the session for `database`.
    ///
    /// Falls back to the "my" session when `database` has no session of its
    /// own but appears in the "my" session's owned list; authorization is
    /// then delegated (`auth_database = "my"`).
    pub fn switch_database(&mut self, database: &str) -> Result<(), SessionError> {
        if self.databases.contains_key(database) {
            self.current_database = Some(database.to_string());
            self.activate(database);
            return Ok(());
        }

        let delegated = self
            .databases
            .get(MY_DATABASE)
            .is_some_and(|my| my.owned_databases.iter().any(|owned| owned == database));
        if !delegated {
            return Err(SessionError::UnknownDatabase(database.to_string()));
        }

        self.current_database = Some(database.to_string());
        // Unwrap-free: `delegated` guarantees the "my" record exists.
        if let Some(my) = self.databases.get(MY_DATABASE).cloned() {
            self.database = Some(database.to_string());
            self.token = Some(my.token);
            self.xsrf_token = Some(my.xsrf_token);
            self.user_id = my.user_id;
            self.user_name = my.user_name;
            self.user_role = my.user_role;
            self.auth_database = Some(MY_DATABASE.to_string());
        }
        debug!(database, "switched with delegated authorization");
        Ok(())
    }

    /// True iff the active session carries both credentials.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.is_empty())
            && self.xsrf_token.as_deref().is_some_and(|x| !x.is_empty())
    }

    /// Clear every in-memory field except the server URL.
    pub fn logout(&mut self) {
        self.databases.clear();
        self.current_database = None;
        self.database = None;
        self.token = None;
        self.xsrf_token = None;
        self.user_id = None;
        self.user_name = None;
        self.user_role = None;
        self.auth_database = None;
    }

    /// Snapshot of the active credential set.
    #[must_use]
    pub fn auth_info(&self) -> AuthInfo {
        AuthInfo {
            token: self.token.clone(),
            xsrf: self.xsrf_token.clone(),
            user_id: self.user_id.clone(),
            user_name: self.user_name.clone(),
            user_role: self.user_role.clone(),
            database: self.database.clone(),
        }
    }

    /// Refresh the active credential fields, e.g. from a session probe.
    pub fn refresh_active(
        &mut self,
        token: Option<&str>,
        xsrf: Option<&str>,
        user_id: Option<String>,
        user_name: Option<String>,
        user_role: Option<String>,
    ) {
        if let Some(token) = token {
            self.token = Some(token.to_string());
        }
        if let Some(xsrf) = xsrf {
            self.xsrf_token = Some(xsrf.to_string());
        }
        if user_id.is_some() {
            self.user_id = user_id;
        }
        if user_name.is_some() {
            self.user_name = user_name;
        }
        if user_role.is_some() {
            self.user_role = user_role;
        }
    }

    /// Copy the record for `database` into the active credential set.
    pub(crate) fn activate(&mut self, database: &str) {
        if let Some(session) = self.databases.get(database).cloned() {
            self.database = Some(database.to_string());
            self.token = Some(session.token);
            self.xsrf_token = Some(session.xsrf_token);
            self.user_id = session.user_id;
            self.user_name = session.user_name;
            self.user_role = session.user_role;
            self.auth_database = Some(database.to_string());
        }
    }

    /// Version-2 snapshot of the whole store, when any sessions exist.
    #[must_use]
    pub(crate) fn snapshot(&self) -> Option<SessionSnapshot> {
        if self.databases.is_empty() {
            return None;
        }
        Some(SessionSnapshot {
            version: SNAPSHOT_VERSION,
            server: self.server.clone(),
            current_database: self.current_database.clone(),
            databases: self.databases.clone(),
        })
    }

    /// Legacy single-session record, when only the active fields are
    /// populated.
    #[must_use]
    pub(crate) fn legacy_record(&self) -> Option<LegacySession> {
        let token = self.token.clone()?;
        let xsrf_token = self.xsrf_token.clone()?;
        let database = self.database.clone()?;
        Some(LegacySession {
            database: Some(database),
            token: Some(token),
            xsrf_token: Some(xsrf_token),
            user_id: self.user_id.clone(),
            user_name: self.user_name.clone(),
            user_role: self.user_role.clone(),
            auth_server: Some(self.server.clone()),
            auth_database: self.auth_database.clone(),
        })
    }

    /// Replace the store with the contents of a version-2 snapshot.
    ///
    /// The current database's record only becomes the active credential set
    /// when it is usable; a record persisted with a missing credential stays
    /// in the map but leaves the store unauthenticated.
    pub(crate) fn apply_snapshot(&mut self, snapshot: SessionSnapshot) {
        self.server = snapshot.server;
        self.databases = snapshot.databases;
        self.current_database = snapshot.current_database;
        if let Some(current) = self.current_database.clone() {
            if self.databases.get(&current).is_some_and(DatabaseSession::is_usable) {
                self.activate(&current);
            }
        }
    }

    /// Adopt a legacy single-session record as the active credential set.
    ///
    /// Returns `true` when the record carried a database and token, in which
    /// case it has also been registered in the multi-database map (the
    /// one-time migration).
    pub(crate) fn adopt_legacy(&mut self, legacy: LegacySession) -> bool {
        self.database = legacy.database.clone();
        self.token = legacy.token.clone();
        self.xsrf_token = legacy.xsrf_token.clone();
        self.user_id = legacy.user_id.clone();
        self.user_name = legacy.user_name.clone();
        self.user_role = legacy.user_role.clone();
        self.auth_database = legacy.auth_database.or_else(|| legacy.database.clone());

        if let Some(server) = legacy.auth_server {
            self.server = server;
        }

        let (Some(database), Some(token)) = (legacy.database, legacy.token) else {
            return false;
        };
        self.databases.insert(
            database.clone(),
            DatabaseSession {
                token,
                xsrf_token: self.xsrf_token.clone().unwrap_or_default(),
                user_id: self.user_id.clone(),
                user_name: self.user_name.clone(),
                user_role: self.user_role.clone(),
                owned_databases: Vec::new(),
            },
        );
        self.current_database = Some(database);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_my(owned: &[&str]) -> SessionStore {
        let mut store = SessionStore::new("https://app.example.com");
        store.record_authentication(
            MY_DATABASE,
            "my-token",
            Some("my-xsrf"),
            Some("7".into()),
            Some("ann".into()),
            Some("admin".into()),
        );
        store.set_owned_databases(MY_DATABASE, owned.iter().map(|s| s.to_string()).collect());
        store
    }

    #[test]
    fn normalize_strips_trailing_slash_and_database_segment() {
        assert_eq!(
            normalize_server_url("https://app.example.com/"),
            ("https://app.example.com".to_string(), false)
        );
        assert_eq!(
            normalize_server_url("https://app.example.com/work"),
            ("https://app.example.com".to_string(), true)
        );
        // A deeper path is not a database segment.
        assert_eq!(
            normalize_server_url("https://app.example.com/a/b"),
            ("https://app.example.com/a/b".to_string(), false)
        );
    }

    #[test]
    fn authenticated_iff_both_credentials_present() {
        let mut store = SessionStore::new("https://app.example.com");
        assert!(!store.is_authenticated());

        store.set_credentials("work", "tok", None, None);
        // xsrf defaulted to the token, so both are present.
        assert!(store.is_authenticated());
        assert_eq!(store.xsrf_token(), Some("tok"));

        store.logout();
        assert!(!store.is_authenticated());
    }

    #[test]
    fn set_credentials_defaults() {
        let mut store = SessionStore::new("https://app.example.com");
        store.set_credentials("work", "tok", Some("x"), None);

        assert_eq!(store.database(), Some("work"));
        assert_eq!(store.auth_database(), Some("work"));
        assert_eq!(store.xsrf_token(), Some("x"));
    }

    #[test]
    fn record_authentication_sets_current_and_active() {
        let mut store = SessionStore::new("https://app.example.com");
        store.record_authentication("work", "tok", Some("x"), None, Some("bob".into()), None);

        assert_eq!(store.current_database(), Some("work"));
        assert_eq!(store.auth_database(), Some("work"));
        assert!(store.is_authenticated());
        assert!(store.session_for("work").is_some());
    }

    #[test]
    fn switch_to_existing_session() {
        let mut store = store_with_my(&[]);
        store.record_authentication("work", "work-token", Some("work-xsrf"), None, None, None);

        store.switch_database(MY_DATABASE).unwrap();
        assert_eq!(store.token(), Some("my-token"));
        assert_eq!(store.auth_database(), Some(MY_DATABASE));
    }

    #[test]
    fn switch_to_owned_database_delegates_authorization() {
        let mut store = store_with_my(&["acme"]);

        store.switch_database("acme").unwrap();
        assert_eq!(store.database(), Some("acme"));
        assert_eq!(store.current_database(), Some("acme"));
        assert_eq!(store.token(), Some("my-token"));
        assert_eq!(store.auth_database(), Some(MY_DATABASE));
    }

    #[test]
    fn switch_to_unknown_database_fails() {
        let mut store = store_with_my(&["acme"]);

        let err = store.switch_database("shop").unwrap_err();
        assert_eq!(err, SessionError::UnknownDatabase("shop".to_string()));
    }

    #[test]
    fn logout_clears_everything_but_server() {
        let mut store = store_with_my(&["acme"]);
        store.logout();

        assert!(store.databases().is_empty());
        assert_eq!(store.current_database(), None);
        assert_eq!(store.auth_info(), AuthInfo::default());
        assert_eq!(store.server(), "https://app.example.com");
    }

    #[test]
    fn legacy_record_requires_active_session() {
        let mut store = SessionStore::new("https://app.example.com");
        assert!(store.legacy_record().is_none());

        store.set_credentials("work", "tok", Some("x"), None);
        let legacy = store.legacy_record().unwrap();
        assert_eq!(legacy.database.as_deref(), Some("work"));
        assert_eq!(legacy.auth_server.as_deref(), Some("https://app.example.com"));
    }

    #[test]
    fn snapshot_with_unusable_current_record_does_not_activate() {
        let mut store = SessionStore::new("https://app.example.com");
        let mut databases = BTreeMap::new();
        databases.insert(
            "work".to_string(),
            DatabaseSession { token: "tok".into(), xsrf_token: String::new(), ..Default::default() },
        );
        store.apply_snapshot(SessionSnapshot {
            version: SNAPSHOT_VERSION,
            server: "https://app.example.com".into(),
            current_database: Some("work".into()),
            databases,
        });

        assert!(!store.is_authenticated());
        // The record itself is kept for a later re-authentication.
        assert!(store.session_for("work").is_some());
    }

    #[test]
    fn adopt_legacy_migrates_into_database_map() {
        let mut store = SessionStore::new("https://app.example.com");
        let migrated = store.adopt_legacy(LegacySession {
            database: Some("work".into()),
            token: Some("tok".into()),
            xsrf_token: Some("x".into()),
            auth_server: Some("https://other.example.com".into()),
            ..Default::default()
        });

        assert!(migrated);
        assert_eq!(store.current_database(), Some("work"));
        assert_eq!(store.server(), "https://other.example.com");
        assert_eq!(store.session_for("work").unwrap().token, "tok");
    }
}
