//! Authentication: login, session validation, registration, and password
//! reset.

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use integram_common::MY_DATABASE;

use super::client::IntegramClient;
use super::errors::ApiError;
use crate::request::{self, JSON_KV_FLAG};

/// Identifier of the account-profile type that lists a user's databases.
const OWNED_DATABASES_TYPE_ID: u32 = 271;

/// Valid database names: short identifiers, no punctuation.
static DATABASE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]{2,20}$").expect("pattern compiles"));

/// Result of a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOutcome {
    pub database: String,
    pub user_id: Option<String>,
    pub user_name: String,
    pub user_role: String,
    /// Populated only for the "my" database.
    pub owned_databases: Vec<String>,
}

impl IntegramClient {
    /// Log in to `database` and make it the active session.
    ///
    /// For the "my" database the owned-database list is fetched as part of
    /// the login; a failure there degrades to an empty list rather than
    /// failing the login.
    #[instrument(skip(self, password), fields(database = %database, login = %login))]
    pub async fn authenticate(
        &self,
        database: &str,
        login: &str,
        password: &str,
    ) -> Result<AuthOutcome, ApiError> {
        let url = {
            let store = self.session.read();
            request::build_url(store.server(), Some(database), "auth", &self.config)?
        };
        let form =
            vec![("login".to_string(), login.to_string()), ("pwd".to_string(), password.to_string())];
        let builder = self.http.request(Method::POST, &url).query(&[JSON_KV_FLAG]).form(&form);

        let value = self.execute(builder, false).await.map_err(|err| match err {
            // The backend answers a bad login with 401/403 on some versions.
            ApiError::SessionExpired | ApiError::Forbidden => {
                ApiError::AuthenticationFailed("credentials rejected".to_string())
            }
            other => other,
        })?;

        if rejected(&value) {
            return Err(ApiError::AuthenticationFailed("credentials rejected".to_string()));
        }
        let token = value.get("token").and_then(Value::as_str).unwrap_or_default();
        if token.is_empty() {
            return Err(ApiError::AuthenticationFailed(
                "response carried no session token".to_string(),
            ));
        }
        // Some backend versions echo the password back instead of minting a
        // token when the account does not exist.
        if token == password {
            return Err(ApiError::AuthenticationFailed("credentials rejected".to_string()));
        }

        let xsrf = value.get("_xsrf").and_then(Value::as_str);
        let user_id = value.get("id").and_then(value_to_id);
        // The login is the display name; the backend sends no separate one.
        let user_name = login.to_string();
        let user_role =
            value.get("role").and_then(Value::as_str).unwrap_or("user").to_string();

        self.session.write().record_authentication(
            database,
            token,
            xsrf,
            user_id.clone(),
            Some(user_name.clone()),
            Some(user_role.clone()),
        );

        let mut owned = Vec::new();
        if database == MY_DATABASE {
            if let Some(id) = user_id.as_deref() {
                match self.owned_databases(id).await {
                    Ok(list) => {
                        self.session.write().set_owned_databases(MY_DATABASE, list.clone());
                        owned = list;
                    }
                    Err(err) => {
                        warn!(error = %err, "owned-database lookup failed; continuing without");
                    }
                }
            }
        }
        self.save_session();
        debug!(database, "authenticated");

        Ok(AuthOutcome {
            database: database.to_string(),
            user_id,
            user_name,
            user_role,
            owned_databases: owned,
        })
    }

    /// Databases owned by the user with account id `user_id`.
    ///
    /// Reads the account-profile object list on the "my" database and keeps
    /// only well-formed database names, deduplicated and sorted.
    pub async fn owned_databases(&self, user_id: &str) -> Result<Vec<String>, ApiError> {
        let endpoint = format!("object/{OWNED_DATABASES_TYPE_ID}");
        let params = vec![("F_U".to_string(), user_id.to_string())];
        let value = self.get(&endpoint, &params).await?;
        Ok(collect_database_names(&value))
    }

    /// Probe the active session, refreshing its credentials from the
    /// response.
    ///
    /// Returns `true` when the session is valid. Never fails: every error is
    /// a "not valid" answer.
    pub async fn validate_session(&self) -> bool {
        let value = match self.get("xsrf", &[]).await {
            Ok(value) => value,
            Err(err) => {
                debug!(error = %err, "session validation failed");
                return false;
            }
        };

        let token = value.get("token").and_then(Value::as_str);
        let xsrf = value.get("_xsrf").and_then(Value::as_str);
        let user_id = value.get("id").and_then(value_to_id);
        let user_name = value.get("user").and_then(Value::as_str).map(str::to_string);
        let user_role = value.get("role").and_then(Value::as_str).map(str::to_string);

        self.session.write().refresh_active(token, xsrf, user_id, user_name, user_role);
        self.save_session();
        true
    }

    /// Create an account on the "my" database.
    pub async fn register(&self, email: &str, password: &str) -> Result<(), ApiError> {
        let form = vec![
            ("register".to_string(), "1".to_string()),
            ("email".to_string(), email.to_string()),
            ("pwd".to_string(), password.to_string()),
        ];
        let value = self.auth_form(MY_DATABASE, form).await?;
        if let Some(error) = value.get("error").and_then(Value::as_str) {
            return Err(ApiError::AuthenticationFailed(error.to_string()));
        }
        Ok(())
    }

    /// Request a password reset for `login`, against `database` (the "my"
    /// database when not given).
    pub async fn reset_password(
        &self,
        login: &str,
        database: Option<&str>,
    ) -> Result<(), ApiError> {
        let form = vec![
            ("reset".to_string(), "1".to_string()),
            ("login".to_string(), login.to_string()),
        ];
        let value = self.auth_form(database.unwrap_or(MY_DATABASE), form).await?;
        if let Some(error) = value.get("error").and_then(Value::as_str) {
            return Err(ApiError::AuthenticationFailed(error.to_string()));
        }
        Ok(())
    }

    /// POST an unauthenticated form to a database's `auth` endpoint.
    ///
    /// Account management always targets `{server}/{database}/auth` directly,
    /// regardless of the addressing mode.
    async fn auth_form(
        &self,
        database: &str,
        form: Vec<(String, String)>,
    ) -> Result<Value, ApiError> {
        let url = format!("{}/{database}/auth", self.server());
        let builder = self.http.request(Method::POST, &url).query(&[JSON_KV_FLAG]).form(&form);
        self.execute(builder, false).await
    }
}

/// True when the backend flagged the login as rejected.
///
/// Older backend versions answer with `{"failed": ...}`, newer ones with the
/// bare string `"failed"`.
fn rejected(value: &Value) -> bool {
    if value.as_str() == Some("failed") {
        return true;
    }
    match value.get("failed") {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(_) => true,
    }
}

/// Normalize an identifier that may arrive as a JSON string or number.
fn value_to_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Extract well-formed database names from an object-list response.
///
/// The backend returns either `{"object": [{"val": name}, ...]}` or a bare
/// array; both shapes are accepted.
fn collect_database_names(value: &Value) -> Vec<String> {
    let rows = value
        .get("object")
        .and_then(Value::as_array)
        .or_else(|| value.as_array())
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut names: Vec<String> = rows
        .iter()
        .filter_map(|row| {
            row.get("val")
                .and_then(Value::as_str)
                .or_else(|| row.as_str())
        })
        .map(str::trim)
        .filter(|name| DATABASE_NAME.is_match(name))
        .map(str::to_string)
        .collect();
    names.sort();
    names.dedup();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ids_normalize_from_strings_and_numbers() {
        assert_eq!(value_to_id(&json!("7")).as_deref(), Some("7"));
        assert_eq!(value_to_id(&json!(42)).as_deref(), Some("42"));
        assert_eq!(value_to_id(&json!("")), None);
        assert_eq!(value_to_id(&json!(null)), None);
    }

    #[test]
    fn database_names_are_filtered_and_sorted() {
        let value = json!({
            "object": [
                {"val": "work"},
                {"val": "acme"},
                {"val": "acme"},
                {"val": "x"},
                {"val": "has space"},
                {"val": "way_too_long_a_database_name"},
                {"other": "ignored"},
            ]
        });

        assert_eq!(collect_database_names(&value), vec!["acme".to_string(), "work".to_string()]);
    }

    #[test]
    fn bare_array_of_names_is_accepted() {
        let value = json!(["work", "acme", "?!"]);
        assert_eq!(collect_database_names(&value), vec!["acme".to_string(), "work".to_string()]);
    }

    #[test]
    fn rejection_shapes() {
        assert!(rejected(&json!("failed")));
        assert!(rejected(&json!({"failed": true})));
        assert!(rejected(&json!({"failed": "bad password"})));
        assert!(!rejected(&json!({"failed": false})));
        assert!(!rejected(&json!({"failed": null})));
        assert!(!rejected(&json!({"token": "t"})));
    }

    #[test]
    fn non_list_response_yields_nothing() {
        assert!(collect_database_names(&json!({"object": "nope"})).is_empty());
        assert!(collect_database_names(&json!(17)).is_empty());
    }
}
