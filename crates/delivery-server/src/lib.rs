//! Delivery Server - HTTP surface for the workflow and sync engines
//!
//! - `POST /api/workflow`: lifecycle transitions and sign-off decisions
//! - `POST /api/sync`: ticket push, bulk pull, repository linking
//! - `POST /api/webhooks/github`: signed tracker webhooks
//! - `GET /health`
//!
//! JSON endpoints answer with an [`Envelope`]. Identity arrives from the
//! upstream authentication layer as `x-user-id` / `x-user-role` headers.
//!
//! # Example
//!
//! ```rust,no_run
//! use delivery_model::InMemoryStore;
//! use delivery_server::{routes, AppState, ServerConfig};
//! use delivery_sync::GitHubClient;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ServerConfig::load(None)?.with_process_env()?;
//! config.validate()?;
//! let tracker = GitHubClient::new(config.github_config()?)?;
//! let state = AppState::new(
//!     Arc::new(InMemoryStore::new()),
//!     Arc::new(tracker),
//!     config.webhook_secret()?,
//! );
//! warp::serve(routes(state, &config.cors_origins)).run(config.bind).await;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod auth;
pub mod config;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod routes;
pub mod state;

pub use config::{ConfigError, ServerConfig};
pub use dispatch::{SyncRequest, WorkflowRequest};
pub use envelope::{Envelope, ErrorBody};
pub use error::ApiError;
pub use routes::{handle_rejection, routes};
pub use state::AppState;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
