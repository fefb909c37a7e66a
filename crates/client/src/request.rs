//! Request construction: URL addressing and auth header resolution.
//!
//! Two addressing schemes exist in the field. Most deployments sit behind a
//! gateway and take `/api/{database}/{endpoint}`; a handful of self-hosted
//! deployments (and anything addressed by raw IP) expose the database
//! directly after the host as `/{database}/{endpoint}`.
//!
//! Auth headers are asymmetric by design: a request against the "my"
//! database carries its own token in `X-Authorization`, while a request
//! against any other database carries the "my" token in the `my` header when
//! one exists — that single "my" login authorizes actions against every
//! database the user owns without re-authenticating.

use once_cell::sync::Lazy;
use regex::Regex;

use integram_common::{SessionStore, MY_DATABASE};

use crate::api::errors::ApiError;
use crate::config::{AddressingMode, ClientConfig};

/// Header carrying a database's own token.
pub const AUTH_HEADER: &str = "X-Authorization";

/// Header carrying the "my" token for cross-database delegated auth.
pub const DELEGATED_AUTH_HEADER: &str = "my";

/// Query flag requesting JSON-object (not JSON-array) response encoding.
pub const JSON_KV_FLAG: (&str, &str) = ("JSON_KV", "");

/// Form field carrying the anti-forgery token on every write.
pub const XSRF_FIELD: &str = "_xsrf";

static IP_LITERAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}").expect("pattern compiles"));

/// Whether requests to `server` use direct-path addressing.
#[must_use]
pub fn uses_direct_path(server: &str, config: &ClientConfig) -> bool {
    match config.addressing {
        AddressingMode::DirectPath => true,
        AddressingMode::ApiPrefix => false,
        AddressingMode::Auto => {
            IP_LITERAL.is_match(server)
                || config.direct_path_hosts.iter().any(|host| server.contains(host.as_str()))
        }
    }
}

/// Build the full URL for `endpoint` against `database`.
///
/// Idempotent under re-application: a server URL already ending in the
/// database segment, or an endpoint already carrying it, does not get a
/// second copy.
pub fn build_url(
    server: &str,
    database: Option<&str>,
    endpoint: &str,
    config: &ClientConfig,
) -> Result<String, ApiError> {
    let database = database.ok_or(ApiError::NoDatabaseSelected)?;
    let server = server.trim_end_matches('/');

    if uses_direct_path(server, config) {
        if server.ends_with(&format!("/{database}")) {
            return Ok(format!("{server}/{endpoint}"));
        }
        if endpoint.starts_with(&format!("{database}/")) {
            return Ok(format!("{server}/{endpoint}"));
        }
        return Ok(format!("{server}/{database}/{endpoint}"));
    }

    Ok(format!("{server}/api/{database}/{endpoint}"))
}

/// Resolve the auth headers for a request against `target` (or the active
/// database when `target` is `None`).
pub fn auth_headers(
    store: &SessionStore,
    target: Option<&str>,
) -> Result<Vec<(&'static str, String)>, ApiError> {
    let database = target
        .or_else(|| store.current_database())
        .or_else(|| store.database())
        .ok_or(ApiError::NoDatabaseSelected)?;

    let mut headers = Vec::new();

    if database == MY_DATABASE {
        if let Some(token) = store.my_token() {
            headers.push((AUTH_HEADER, token.to_string()));
        } else if let Some(token) = store.token() {
            headers.push((AUTH_HEADER, token.to_string()));
        }
        return Ok(headers);
    }

    if let Some(token) = store.my_token() {
        headers.push((DELEGATED_AUTH_HEADER, token.to_string()));
    } else if store.auth_database() == Some(MY_DATABASE) {
        if let Some(token) = store.token() {
            headers.push((DELEGATED_AUTH_HEADER, token.to_string()));
        }
    } else if let Some(token) = store.token() {
        headers.push((AUTH_HEADER, token.to_string()));
    }

    Ok(headers)
}

/// Header selection for multipart uploads.
///
/// Uploads authenticate with the active token directly: `X-Authorization`
/// when acting as the session's own database, the `my` header when
/// authorization is delegated.
#[must_use]
pub fn upload_headers(store: &SessionStore) -> Vec<(&'static str, String)> {
    let Some(token) = store.token() else {
        return Vec::new();
    };

    let own_session =
        store.database() == Some(MY_DATABASE) || store.auth_database() == store.database();
    if own_session {
        vec![(AUTH_HEADER, token.to_string())]
    } else {
        vec![(DELEGATED_AUTH_HEADER, token.to_string())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ClientConfig {
        ClientConfig::default()
    }

    #[test]
    fn api_prefix_for_regular_hosts() {
        let url =
            build_url("https://app.example.com", Some("shop"), "dict", &config()).unwrap();
        assert_eq!(url, "https://app.example.com/api/shop/dict");
    }

    #[test]
    fn direct_path_for_ip_hosts() {
        let url = build_url("https://203.0.113.5", Some("shop"), "dict", &config()).unwrap();
        assert_eq!(url, "https://203.0.113.5/shop/dict");
    }

    #[test]
    fn direct_path_for_known_deployments() {
        let url =
            build_url("https://crm.dronedoc.ru", Some("shop"), "dict", &config()).unwrap();
        assert_eq!(url, "https://crm.dronedoc.ru/shop/dict");
    }

    #[test]
    fn direct_path_does_not_duplicate_database_segment() {
        let url =
            build_url("https://203.0.113.5/shop", Some("shop"), "dict", &config()).unwrap();
        assert_eq!(url, "https://203.0.113.5/shop/dict");

        let url =
            build_url("https://203.0.113.5", Some("shop"), "shop/dict", &config()).unwrap();
        assert_eq!(url, "https://203.0.113.5/shop/dict");
    }

    #[test]
    fn build_url_is_idempotent() {
        let config = config();
        let first = build_url("https://203.0.113.5/", Some("shop"), "dict", &config).unwrap();
        let second = build_url("https://203.0.113.5/", Some("shop"), "dict", &config).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn explicit_mode_overrides_inference() {
        let mut config = config();
        config.addressing = AddressingMode::ApiPrefix;
        let url = build_url("https://203.0.113.5", Some("shop"), "dict", &config).unwrap();
        assert_eq!(url, "https://203.0.113.5/api/shop/dict");

        config.addressing = AddressingMode::DirectPath;
        let url = build_url("https://app.example.com", Some("shop"), "dict", &config).unwrap();
        assert_eq!(url, "https://app.example.com/shop/dict");
    }

    #[test]
    fn missing_database_is_an_error() {
        let err = build_url("https://app.example.com", None, "dict", &config()).unwrap_err();
        assert!(matches!(err, ApiError::NoDatabaseSelected));
    }

    #[test]
    fn my_database_uses_direct_header() {
        let mut store = SessionStore::new("https://app.example.com");
        store.record_authentication(MY_DATABASE, "my-token", Some("x"), None, None, None);

        let headers = auth_headers(&store, Some(MY_DATABASE)).unwrap();
        assert_eq!(headers, vec![(AUTH_HEADER, "my-token".to_string())]);
    }

    #[test]
    fn other_database_delegates_through_my_token() {
        let mut store = SessionStore::new("https://app.example.com");
        store.record_authentication(MY_DATABASE, "my-token", Some("x"), None, None, None);
        store.set_owned_databases(MY_DATABASE, vec!["acme".to_string()]);
        store.switch_database("acme").unwrap();

        let headers = auth_headers(&store, Some("acme")).unwrap();
        assert_eq!(headers, vec![(DELEGATED_AUTH_HEADER, "my-token".to_string())]);
    }

    #[test]
    fn own_token_used_without_a_my_session() {
        let mut store = SessionStore::new("https://app.example.com");
        store.record_authentication("work", "work-token", Some("x"), None, None, None);

        let headers = auth_headers(&store, Some("work")).unwrap();
        assert_eq!(headers, vec![(AUTH_HEADER, "work-token".to_string())]);
    }

    #[test]
    fn no_database_anywhere_is_an_error() {
        let store = SessionStore::new("https://app.example.com");
        assert!(matches!(auth_headers(&store, None), Err(ApiError::NoDatabaseSelected)));
    }

    #[test]
    fn upload_uses_delegated_header_for_foreign_database() {
        let mut store = SessionStore::new("https://app.example.com");
        store.record_authentication(MY_DATABASE, "my-token", Some("x"), None, None, None);
        store.set_owned_databases(MY_DATABASE, vec!["acme".to_string()]);
        store.switch_database("acme").unwrap();

        assert_eq!(upload_headers(&store), vec![(DELEGATED_AUTH_HEADER, "my-token".to_string())]);
    }

    #[test]
    fn upload_uses_direct_header_for_own_session() {
        let mut store = SessionStore::new("https://app.example.com");
        store.record_authentication("work", "work-token", Some("x"), None, None, None);

        assert_eq!(upload_headers(&store), vec![(AUTH_HEADER, "work-token".to_string())]);
    }
}
