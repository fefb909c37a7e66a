//! Client configuration.
//!
//! Defaults target the hosted deployment; everything can be overridden
//! programmatically or from the environment:
//!
//! - `INTEGRAM_SERVER`: backend base URL (scheme + host)
//! - `INTEGRAM_TIMEOUT_SECS`: per-request timeout in seconds
//! - `INTEGRAM_SESSION_FILE`: path of the persisted-session document; unset
//!   means sessions live only in memory
//! - `INTEGRAM_DIRECT_PATH_HOSTS`: comma-separated host fragments that use
//!   direct-path addressing

use std::path::PathBuf;
use std::time::Duration;

/// Default backend deployment.
pub const DEFAULT_SERVER: &str = "https://app.integram.io";

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Host fragments of deployments known to use direct-path addressing.
const DEFAULT_DIRECT_PATH_HOSTS: &[&str] = &["dronedoc.ru", "sakhwings.ru"];

/// How request URLs embed the database name.
///
/// `Auto` infers the scheme from the host (IP-literal hosts and the
/// configured host fragments use direct-path addressing); pin `DirectPath`
/// or `ApiPrefix` explicitly for deployments where inference is wrong.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AddressingMode {
    /// Infer from the host: direct-path for IP literals and configured host
    /// fragments, `/api/` otherwise.
    #[default]
    Auto,
    /// Always `scheme://host/{database}/{endpoint}`.
    DirectPath,
    /// Always `scheme://host/api/{database}/{endpoint}`.
    ApiPrefix,
}

/// Configuration for [`crate::IntegramClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend base URL (scheme + host, no trailing slash).
    pub server: String,
    /// Per-request timeout; expiry surfaces as `ApiError::Timeout`.
    pub timeout: Duration,
    /// URL addressing scheme selection.
    pub addressing: AddressingMode,
    /// Host fragments treated as direct-path deployments in `Auto` mode.
    pub direct_path_hosts: Vec<String>,
    /// Persisted-session document path; `None` keeps sessions in memory.
    pub session_file: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            timeout: DEFAULT_TIMEOUT,
            addressing: AddressingMode::default(),
            direct_path_hosts: DEFAULT_DIRECT_PATH_HOSTS.iter().map(|h| h.to_string()).collect(),
            session_file: None,
        }
    }
}

impl ClientConfig {
    /// Build a configuration from the environment, falling back to defaults
    /// for anything unset.
    #[must_use]
    pub fn from_env() -> Self {
        // A missing .env file is fine; the process environment still applies.
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Ok(server) = std::env::var("INTEGRAM_SERVER") {
            if !server.is_empty() {
                config.server = server;
            }
        }

        if let Some(secs) =
            std::env::var("INTEGRAM_TIMEOUT_SECS").ok().and_then(|raw| raw.parse::<u64>().ok())
        {
            config.timeout = Duration::from_secs(secs);
        }

        if let Ok(path) = std::env::var("INTEGRAM_SESSION_FILE") {
            if !path.is_empty() {
                config.session_file = Some(PathBuf::from(path));
            }
        }

        if let Ok(hosts) = std::env::var("INTEGRAM_DIRECT_PATH_HOSTS") {
            let hosts: Vec<String> = hosts
                .split(',')
                .map(str::trim)
                .filter(|h| !h.is_empty())
                .map(str::to_string)
                .collect();
            if !hosts.is_empty() {
                config.direct_path_hosts = hosts;
            }
        }

        config
    }
}
