//! # Integram client
//!
//! Async HTTP client for the Integram object-relational backend: a
//! multi-tenant API where each "database" is a named workspace with its own
//! object graph and credential pair.
//!
//! The client owns the full session lifecycle — multi-database credential
//! records persisted across restarts, migration of older persisted formats,
//! database switching with owned-database delegation — plus request
//! construction (two URL addressing schemes, asymmetric auth headers, XSRF
//! on every write) and a typed error taxonomy with a one-shot
//! retry-after-session-restore path on 401.
//!
//! ```no_run
//! use integram_client::{ClientConfig, IntegramClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = IntegramClient::new(ClientConfig::from_env())?;
//!
//!     let outcome = client.authenticate("my", "ann", "secret").await?;
//!     println!("databases owned: {:?}", outcome.owned_databases);
//!
//!     let dictionary = client.dictionary().await?;
//!     println!("{dictionary}");
//!     Ok(())
//! }
//! ```
//!
//! Construct one client per process at the composition root and pass it by
//! reference; there is no global instance.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod api;
pub mod config;
pub mod http;
pub mod request;

pub use api::auth::AuthOutcome;
pub use api::client::{IntegramClient, IntegramClientBuilder};
pub use api::errors::ApiError;
pub use config::{AddressingMode, ClientConfig};
pub use integram_common::{AuthInfo, RequisiteValue};
