//! Process-lifetime MongoDB session cache.
//!
//! The crate's entry point is [`SessionRegistry`]: a concurrent get-or-create
//! cache of established MongoDB session handles, keyed by a connection
//! identifier (either a `mongodb://` URL or the name of an environment
//! variable holding one). Each key is dialed at most once for the lifetime of
//! the registry, regardless of how many callers race on first use; every call
//! returns an independent [`Session`] copy sharing the pooled connection.
//!
//! Dialing supports three modes, selected in fixed precedence order:
//!
//! 1. Caller-supplied PEM trust material → TLS trusting only that pool
//! 2. `ssl=true` query flag in the connection string → TLS with system roots
//! 3. Plain TCP
//!
//! ```no_run
//! # async fn example() -> mongo_session::Result<()> {
//! use mongo_session::SessionRegistry;
//!
//! let registry = SessionRegistry::new();
//!
//! // Literal connection string
//! let session = registry.get("mongodb://localhost:27017/app", None).await?;
//! session.ping().await?;
//!
//! // Environment-variable key, resolved at first dial
//! let session = registry.get("APP_DB_URL", None).await?;
//! # Ok(())
//! # }
//! ```
//!
//! Any resolution, parse, or dial failure is unrecoverable at this layer: the
//! registry performs no retries and has no degraded mode. Errors are returned
//! as values so the owning application can choose its own failure policy
//! (typically: treat as a startup failure and exit).

pub mod auth;
pub mod connection;
pub mod dial;
pub mod protocol;
pub mod session;

mod error;
pub(crate) mod metrics;

pub use error::{Error, Result};
pub use session::{Consistency, Session, SessionRegistry, DEFAULT_OPERATION_TIMEOUT};
