//! Codec between [`SessionStore`] and the persistence medium.
//!
//! Three generations of persisted state exist in the field:
//! 1. the version-2 snapshot (whole multi-database store),
//! 2. the legacy single-session document,
//! 3. flat non-namespaced keys implicitly bound to the "my" database.
//!
//! Writes always emit the newest shape the state allows. Reads try each
//! generation in order through [`STRATEGIES`]; a legacy read migrates the
//! document forward so the old shape is written at most once more, never
//! again. A corrupt document is discarded and the store is left
//! unauthenticated — persistence failures never propagate to callers.

use tracing::{debug, warn};

use super::keys;
use super::store::{SessionStore, MY_DATABASE};
use super::types::{LegacySession, SessionSnapshot, SNAPSHOT_VERSION};
use crate::storage::SafeStorage;

/// One restoration strategy: applies a persisted shape to the store,
/// reporting whether it matched.
pub type RestoreFn = fn(&mut SessionStore, &SafeStorage) -> bool;

/// Restoration strategies in priority order: newest format first.
pub const STRATEGIES: &[(&str, RestoreFn)] = &[
    ("snapshot-v2", restore_snapshot),
    ("legacy-session", restore_legacy),
    ("flat-my-keys", restore_flat_keys),
];

/// Persist the store in the newest shape its state allows.
///
/// Multi-database sessions persist as a version-2 snapshot; a lone active
/// credential set persists in the legacy shape; an empty store erases the
/// entry.
pub fn save(store: &SessionStore, storage: &SafeStorage) {
    if let Some(snapshot) = store.snapshot() {
        write_document(storage, &snapshot);
        return;
    }

    if let Some(legacy) = store.legacy_record() {
        write_document(storage, &legacy);
        return;
    }

    storage.remove(keys::SESSION);
}

fn write_document<T: serde::Serialize>(storage: &SafeStorage, document: &T) {
    match serde_json::to_string(document) {
        Ok(raw) => {
            if storage.set(keys::SESSION, &raw) {
                storage.touch_session_timestamp();
            }
        }
        Err(err) => warn!(error = %err, "failed to encode session for persistence"),
    }
}

/// Populate the store from persisted state at process start.
///
/// A corrupt document is discarded (non-fatal) and the store stays
/// unauthenticated.
pub fn load(store: &mut SessionStore, storage: &SafeStorage) {
    let Some(raw) = storage.get(keys::SESSION) else {
        if restore_flat_keys(store, storage) {
            debug!("session reconstructed from flat keys");
        }
        return;
    };

    if serde_json::from_str::<serde_json::Value>(&raw).is_err() {
        warn!("corrupt persisted session discarded");
        storage.remove(keys::SESSION);
        return;
    }

    if restore_snapshot(store, storage) {
        debug!("session loaded from version-2 snapshot");
    } else if restore_legacy(store, storage) {
        debug!("legacy session loaded and migrated");
    }
}

/// Re-attempt restoration from persisted state.
///
/// A no-op success when the store is already authenticated; otherwise tries
/// each strategy in order and reports whether authentication was recovered.
pub fn try_restore(store: &mut SessionStore, storage: &SafeStorage) -> bool {
    if store.is_authenticated() {
        return true;
    }

    for (name, strategy) in STRATEGIES {
        if strategy(store, storage) {
            debug!(strategy = name, "persisted session restored");
            break;
        }
    }

    store.is_authenticated()
}

/// Version-2 snapshot: restore databases, current database, and server.
fn restore_snapshot(store: &mut SessionStore, storage: &SafeStorage) -> bool {
    let Some(raw) = storage.get(keys::SESSION) else {
        return false;
    };
    let Ok(snapshot) = serde_json::from_str::<SessionSnapshot>(&raw) else {
        return false;
    };
    if snapshot.version != SNAPSHOT_VERSION {
        return false;
    }

    store.apply_snapshot(snapshot);
    storage.set(keys::SERVER, store.server());
    true
}

/// Legacy single-session document: adopt as the active session and migrate
/// the persisted entry to the version-2 shape.
fn restore_legacy(store: &mut SessionStore, storage: &SafeStorage) -> bool {
    let Some(raw) = storage.get(keys::SESSION) else {
        return false;
    };
    let Ok(legacy) = serde_json::from_str::<LegacySession>(&raw) else {
        return false;
    };
    if legacy.token.is_none() {
        return false;
    }

    let had_server = legacy.auth_server.is_some();
    let migrated = store.adopt_legacy(legacy);
    if had_server {
        storage.set(keys::SERVER, store.server());
    }
    if migrated {
        // One-time migration: the next read sees the version-2 shape.
        save(store, storage);
    }
    true
}

/// Oldest fallback: flat keys holding a single "my" credential set.
fn restore_flat_keys(store: &mut SessionStore, storage: &SafeStorage) -> bool {
    if let (Some(token), Some(xsrf)) = (storage.get(keys::MY_TOKEN), storage.get(keys::MY_XSRF)) {
        store.set_credentials(MY_DATABASE, &token, Some(&xsrf), Some(MY_DATABASE));
        store.refresh_active(None, None, storage.get(keys::MY_ID), storage.get(keys::MY_USER), None);
        return true;
    }

    let bound_to_my = storage.get(keys::FLAT_DB).as_deref() == Some(MY_DATABASE);
    if let (Some(token), Some(xsrf), true) =
        (storage.get(keys::FLAT_TOKEN), storage.get(keys::FLAT_XSRF), bound_to_my)
    {
        store.set_credentials(MY_DATABASE, &token, Some(&xsrf), Some(MY_DATABASE));
        store
            .refresh_active(None, None, storage.get(keys::FLAT_ID), storage.get(keys::FLAT_USER), None);
        return true;
    }

    false
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::storage::MemoryStorage;

    fn storage() -> SafeStorage {
        SafeStorage::new(Arc::new(MemoryStorage::new()))
    }

    fn authenticated_store() -> SessionStore {
        let mut store = SessionStore::new("https://app.example.com");
        store.record_authentication(
            "work",
            "work-token",
            Some("work-xsrf"),
            Some("7".into()),
            Some("ann".into()),
            Some("user".into()),
        );
        store
    }

    #[test]
    fn save_then_load_round_trips() {
        let storage = storage();
        let mut original = authenticated_store();
        original.record_authentication(MY_DATABASE, "my-token", Some("my-xsrf"), None, None, None);
        save(&original, &storage);

        let mut restored = SessionStore::new("https://placeholder.invalid");
        load(&mut restored, &storage);

        assert_eq!(restored.server(), "https://app.example.com");
        assert_eq!(restored.current_database(), original.current_database());
        assert_eq!(restored.databases().len(), 2);
        assert_eq!(restored.session_for("work").unwrap().token, "work-token");
        assert_eq!(restored.session_for(MY_DATABASE).unwrap().xsrf_token, "my-xsrf");
        assert!(restored.is_authenticated());
    }

    #[test]
    fn empty_store_erases_persisted_entry() {
        let storage = storage();
        save(&authenticated_store(), &storage);
        assert!(storage.get(keys::SESSION).is_some());

        let mut store = authenticated_store();
        store.logout();
        save(&store, &storage);
        assert_eq!(storage.get(keys::SESSION), None);
    }

    #[test]
    fn legacy_document_migrates_to_snapshot() {
        let storage = storage();
        storage.set(
            keys::SESSION,
            r#"{"database":"work","token":"tok","xsrfToken":"x","userId":7,
                "authServer":"https://legacy.example.com","authDatabase":"work"}"#,
        );

        let mut store = SessionStore::new("https://placeholder.invalid");
        load(&mut store, &storage);

        assert!(store.is_authenticated());
        assert_eq!(store.server(), "https://legacy.example.com");
        assert_eq!(storage.get(keys::SERVER).as_deref(), Some("https://legacy.example.com"));

        // The persisted entry is now version-2; a fresh load takes the
        // snapshot path and a subsequent save never re-emits the legacy
        // shape.
        let raw = storage.get(keys::SESSION).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["version"], 2);
        assert_eq!(value["databases"]["work"]["token"], "tok");
    }

    #[test]
    fn corrupt_document_is_discarded() {
        let storage = storage();
        storage.set(keys::SESSION, "{ definitely not json");

        let mut store = SessionStore::new("https://app.example.com");
        load(&mut store, &storage);

        assert!(!store.is_authenticated());
        assert_eq!(storage.get(keys::SESSION), None);
    }

    #[test]
    fn flat_my_keys_reconstruct_a_my_session() {
        let storage = storage();
        storage.set(keys::MY_TOKEN, "tok");
        storage.set(keys::MY_XSRF, "xsrf");
        storage.set(keys::MY_USER, "ann");
        storage.set(keys::MY_ID, "7");

        let mut store = SessionStore::new("https://app.example.com");
        load(&mut store, &storage);

        assert!(store.is_authenticated());
        assert_eq!(store.database(), Some(MY_DATABASE));
        assert_eq!(store.auth_database(), Some(MY_DATABASE));
        assert_eq!(store.auth_info().user_name.as_deref(), Some("ann"));
    }

    #[test]
    fn oldest_flat_keys_require_my_binding() {
        let storage = storage();
        storage.set(keys::FLAT_TOKEN, "tok");
        storage.set(keys::FLAT_XSRF, "xsrf");
        storage.set(keys::FLAT_DB, "work");

        let mut store = SessionStore::new("https://app.example.com");
        load(&mut store, &storage);
        assert!(!store.is_authenticated());

        storage.set(keys::FLAT_DB, MY_DATABASE);
        let mut store = SessionStore::new("https://app.example.com");
        load(&mut store, &storage);
        assert!(store.is_authenticated());
    }

    #[test]
    fn try_restore_is_noop_when_authenticated() {
        let storage = storage();
        let mut store = authenticated_store();

        assert!(try_restore(&mut store, &storage));
        // Nothing was persisted, proving the early return.
        assert_eq!(storage.get(keys::SESSION), None);
    }

    #[test]
    fn try_restore_recovers_from_snapshot() {
        let storage = storage();
        save(&authenticated_store(), &storage);

        let mut store = SessionStore::new("https://app.example.com");
        assert!(!store.is_authenticated());
        assert!(try_restore(&mut store, &storage));
        assert_eq!(store.token(), Some("work-token"));
    }

    #[test]
    fn try_restore_rejects_a_snapshot_missing_a_credential() {
        let storage = storage();
        storage.set(
            keys::SESSION,
            r#"{"version":2,"server":"https://app.example.com",
                "currentDatabase":"work",
                "databases":{"work":{"token":"tok","xsrfToken":""}}}"#,
        );

        let mut store = SessionStore::new("https://app.example.com");
        assert!(!try_restore(&mut store, &storage));
        assert!(!store.is_authenticated());
    }

    #[test]
    fn try_restore_reports_failure_without_state() {
        let storage = storage();
        let mut store = SessionStore::new("https://app.example.com");

        assert!(!try_restore(&mut store, &storage));
    }
}
