//! Core client: session ownership, raw read/write calls, and error
//! classification with the single-shot 401 restore-retry.

use std::sync::Arc;

use parking_lot::RwLock;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use integram_common::session::{keys, restore};
use integram_common::{
    AuthInfo, FileStorage, MemoryStorage, SafeStorage, SessionStorage, SessionStore,
};

use super::errors::ApiError;
use crate::config::ClientConfig;
use crate::http::HttpClient;
use crate::request::{self, JSON_KV_FLAG, XSRF_FIELD};

/// Endpoint allowed without an authenticated session: it is the probe used
/// to validate and refresh credentials.
const SESSION_PROBE_ENDPOINT: &str = "xsrf";

/// Client for one Integram backend deployment.
///
/// Owns the session store and its persistence; construct one per process at
/// the composition root and share it by reference.
pub struct IntegramClient {
    pub(crate) config: ClientConfig,
    pub(crate) http: HttpClient,
    pub(crate) session: RwLock<SessionStore>,
    pub(crate) storage: SafeStorage,
}

impl IntegramClient {
    /// Create a client with the given configuration.
    ///
    /// Sessions persist to `config.session_file` when set, otherwise they
    /// live in memory. Previously persisted state (any supported
    /// generation) is loaded immediately.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        Self::builder().config(config).build()
    }

    /// Start building a client with explicit parts.
    pub fn builder() -> IntegramClientBuilder {
        IntegramClientBuilder::default()
    }

    // -- session surface -----------------------------------------------

    #[must_use]
    pub fn server(&self) -> String {
        self.session.read().server().to_string()
    }

    /// Replace the backend base URL, normalizing and persisting it.
    pub fn set_server(&self, url: &str) {
        let mut store = self.session.write();
        store.set_server(url);
        self.storage.set(keys::SERVER, store.server());
    }

    #[must_use]
    pub fn database(&self) -> Option<String> {
        self.session.read().database().map(str::to_string)
    }

    /// Point subsequent calls at `database` without touching credentials.
    pub fn set_database(&self, database: &str) {
        self.session.write().set_database(database);
    }

    #[must_use]
    pub fn current_database(&self) -> Option<String> {
        self.session.read().current_database().map(str::to_string)
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.session.read().is_authenticated()
    }

    #[must_use]
    pub fn auth_info(&self) -> AuthInfo {
        self.session.read().auth_info()
    }

    /// Record a credential pair directly (e.g. a token minted elsewhere).
    pub fn set_credentials(
        &self,
        database: &str,
        token: &str,
        xsrf: Option<&str>,
        auth_database: Option<&str>,
    ) {
        self.session.write().set_credentials(database, token, xsrf, auth_database);
    }

    /// Persist the current session state.
    pub fn save_session(&self) {
        restore::save(&self.session.read(), &self.storage);
    }

    /// Attempt to recover an authenticated session from persisted state.
    pub fn try_restore_session(&self) -> bool {
        restore::try_restore(&mut self.session.write(), &self.storage)
    }

    /// Activate the session for `database`, delegating through the "my"
    /// session for owned databases.
    pub fn switch_database(&self, database: &str) -> Result<(), ApiError> {
        self.session.write().switch_database(database)?;
        self.save_session();
        Ok(())
    }

    /// Clear all sessions, in memory and persisted.
    pub fn logout(&self) {
        self.session.write().logout();
        self.storage.remove(keys::SESSION);
        debug!("logged out; sessions cleared");
    }

    // -- raw calls ------------------------------------------------------

    /// Execute a read against the active database.
    ///
    /// On a 401 the client attempts to restore the session from persisted
    /// state and retries exactly once; a second 401 surfaces as
    /// [`ApiError::SessionExpired`].
    #[instrument(skip(self, params), fields(endpoint = %endpoint))]
    pub async fn get(&self, endpoint: &str, params: &[(String, String)]) -> Result<Value, ApiError> {
        if !self.is_authenticated() && endpoint != SESSION_PROBE_ENDPOINT {
            return Err(ApiError::SessionExpired);
        }

        let mut restored = false;
        loop {
            let (url, headers) = {
                let store = self.session.read();
                let database = store.database().map(str::to_string);
                let url = request::build_url(
                    store.server(),
                    database.as_deref(),
                    endpoint,
                    &self.config,
                )?;
                (url, request::auth_headers(&store, database.as_deref())?)
            };

            let mut builder =
                self.http.request(Method::GET, &url).query(&[JSON_KV_FLAG]).query(params);
            for (name, value) in &headers {
                builder = builder.header(*name, value);
            }

            match self.execute(builder, !restored).await {
                Err(ApiError::RetryableSessionRestored) if !restored => {
                    restored = true;
                    debug!(endpoint, "session restored; retrying the call once");
                }
                outcome => return outcome,
            }
        }
    }

    /// Execute a write against the active database.
    ///
    /// The active XSRF token is injected as the `_xsrf` form field; the 401
    /// restore-retry behaves as in [`Self::get`], rebuilding the form with
    /// the restored credentials.
    #[instrument(skip(self, fields), fields(endpoint = %endpoint))]
    pub async fn post(
        &self,
        endpoint: &str,
        fields: &[(String, String)],
    ) -> Result<Value, ApiError> {
        if !self.is_authenticated() {
            return Err(ApiError::SessionExpired);
        }

        let mut restored = false;
        loop {
            let (url, headers, xsrf) = {
                let store = self.session.read();
                let database = store.database().map(str::to_string);
                let url = request::build_url(
                    store.server(),
                    database.as_deref(),
                    endpoint,
                    &self.config,
                )?;
                let headers = request::auth_headers(&store, database.as_deref())?;
                (url, headers, store.xsrf_token().unwrap_or_default().to_string())
            };

            let mut form: Vec<(String, String)> = Vec::with_capacity(fields.len() + 1);
            form.push((XSRF_FIELD.to_string(), xsrf));
            form.extend(fields.iter().cloned());

            let mut builder =
                self.http.request(Method::POST, &url).query(&[JSON_KV_FLAG]).form(&form);
            for (name, value) in &headers {
                builder = builder.header(*name, value);
            }

            match self.execute(builder, !restored).await {
                Err(ApiError::RetryableSessionRestored) if !restored => {
                    restored = true;
                    debug!(endpoint, "session restored; retrying the call once");
                }
                outcome => return outcome,
            }
        }
    }

    // -- transport plumbing --------------------------------------------

    /// Send a prepared request and decode or classify the result.
    pub(crate) async fn execute(
        &self,
        builder: RequestBuilder,
        allow_restore: bool,
    ) -> Result<Value, ApiError> {
        let response = match self.http.send(builder).await {
            Ok(response) => response,
            Err(err) => return Err(self.classify_transport(err)),
        };

        let status = response.status();
        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|err| ApiError::InvalidResponse(err.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        Err(self.classify_status(status, &body, allow_restore))
    }

    fn classify_transport(&self, err: reqwest::Error) -> ApiError {
        if err.is_timeout() {
            ApiError::Timeout(self.config.timeout)
        } else if err.is_connect() {
            ApiError::NetworkUnreachable
        } else if err.is_request() || err.is_body() || err.is_decode() {
            ApiError::NoResponse
        } else {
            ApiError::Transport(err)
        }
    }

    /// Map a non-success status to a typed error.
    ///
    /// A 401 first attempts session restoration from persisted state; with
    /// `allow_restore` unset (the retry pass) it surfaces
    /// [`ApiError::SessionExpired`] directly, so restoration never loops.
    pub(crate) fn classify_status(
        &self,
        status: StatusCode,
        body: &str,
        allow_restore: bool,
    ) -> ApiError {
        let backend_message = extract_backend_message(body);

        match status {
            StatusCode::UNAUTHORIZED => {
                if allow_restore && self.try_restore_session() {
                    warn!("401 received; session restored from persisted state");
                    ApiError::RetryableSessionRestored
                } else {
                    ApiError::SessionExpired
                }
            }
            StatusCode::FORBIDDEN => ApiError::Forbidden,
            StatusCode::NOT_FOUND => ApiError::NotFound,
            StatusCode::INTERNAL_SERVER_ERROR => ApiError::ServerError(
                backend_message.unwrap_or_else(|| "internal server error".to_string()),
            ),
            _ => ApiError::Http {
                status: status.as_u16(),
                message: backend_message.unwrap_or_else(|| {
                    if body.is_empty() {
                        format!("HTTP {}", status.as_u16())
                    } else {
                        body.to_string()
                    }
                }),
            },
        }
    }
}

/// Pull the backend's `message` or `error` field out of a failure body.
fn extract_backend_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("message")
        .or_else(|| value.get("error"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Builder for [`IntegramClient`].
#[derive(Default)]
pub struct IntegramClientBuilder {
    config: Option<ClientConfig>,
    storage: Option<Arc<dyn SessionStorage>>,
}

impl IntegramClientBuilder {
    /// Set the client configuration.
    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Inject a storage backend, overriding `config.session_file`.
    #[must_use]
    pub fn storage(mut self, storage: Arc<dyn SessionStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Build the client and load any persisted session.
    pub fn build(self) -> Result<IntegramClient, ApiError> {
        let config = self.config.unwrap_or_default();

        let storage: Arc<dyn SessionStorage> = match self.storage {
            Some(storage) => storage,
            None => match &config.session_file {
                Some(path) => Arc::new(FileStorage::open(path)?),
                None => Arc::new(MemoryStorage::new()),
            },
        };
        let storage = SafeStorage::new(storage);

        let http = HttpClient::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| ApiError::Config(format!("failed to build HTTP transport: {err}")))?;

        // A previously persisted server URL wins over the configured one, and
        // an embedded database segment is stripped and persisted back once.
        let mut store = SessionStore::default();
        let server = storage.get(keys::SERVER).unwrap_or_else(|| config.server.clone());
        if store.set_server(&server) {
            storage.set(keys::SERVER, store.server());
        }
        restore::load(&mut store, &storage);

        Ok(IntegramClient { config, http, session: RwLock::new(store), storage })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> IntegramClient {
        IntegramClient::new(ClientConfig::default()).unwrap()
    }

    #[test]
    fn builder_defaults_to_memory_storage() {
        let client = client();
        assert!(!client.is_authenticated());
        assert_eq!(client.server(), "https://app.integram.io");
    }

    #[test]
    fn configured_server_with_database_segment_is_normalized() {
        let config = ClientConfig {
            server: "https://app.example.com/work/".to_string(),
            ..ClientConfig::default()
        };
        let client = IntegramClient::new(config).unwrap();

        assert_eq!(client.server(), "https://app.example.com");
        assert_eq!(
            client.storage.get(keys::SERVER).as_deref(),
            Some("https://app.example.com")
        );
    }

    #[test]
    fn set_credentials_then_logout() {
        let client = client();
        client.set_credentials("work", "tok", Some("x"), None);
        assert!(client.is_authenticated());

        client.logout();
        assert!(!client.is_authenticated());
        assert_eq!(client.auth_info(), AuthInfo::default());
    }

    #[test]
    fn save_and_restore_through_builder_storage() {
        let storage = Arc::new(MemoryStorage::new());

        {
            let client = IntegramClient::builder()
                .storage(Arc::clone(&storage) as Arc<dyn SessionStorage>)
                .build()
                .unwrap();
            client.session.write().record_authentication(
                "work",
                "tok",
                Some("x"),
                None,
                None,
                None,
            );
            client.save_session();
        }

        let revived = IntegramClient::builder()
            .storage(storage as Arc<dyn SessionStorage>)
            .build()
            .unwrap();
        assert!(revived.is_authenticated());
        assert_eq!(revived.current_database().as_deref(), Some("work"));
    }

    #[test]
    fn backend_message_extraction() {
        assert_eq!(
            extract_backend_message(r#"{"message":"broken"}"#).as_deref(),
            Some("broken")
        );
        assert_eq!(extract_backend_message(r#"{"error":"nope"}"#).as_deref(), Some("nope"));
        assert_eq!(extract_backend_message("not json"), None);
        assert_eq!(extract_backend_message(r#"{"other":"field"}"#), None);
    }
}
