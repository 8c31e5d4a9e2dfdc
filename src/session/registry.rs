//! Session registry

use super::handle::{Consistency, Session};
use crate::dial;
use crate::{metrics, Error, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::OnceCell;

/// Socket and sync timeout configured on every registry-created session
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(10);

/// A process-lifetime cache of established sessions, keyed by connection
/// identifier.
///
/// Each key is dialed at most once for the lifetime of the registry no matter
/// how many callers race on first use; concurrent misses on *different* keys
/// dial in parallel. Entries are never evicted. Construct one at the
/// application's composition root and pass it by reference to consumers.
///
/// Misconfiguration (bad key, unreachable store) is a startup-class failure:
/// the registry performs no retries, and `get` surfaces the error for the
/// owning application to act on.
pub struct SessionRegistry {
    entries: Mutex<HashMap<String, Arc<OnceCell<Session>>>>,
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Get the session for `key`, dialing it if this is the key's first use.
    ///
    /// `key` is either a `mongodb://` connection string used verbatim, or
    /// the name of an environment variable holding one, read at first dial.
    /// `trust`, if present, supplies PEM-encoded CA bytes that make the dial
    /// a TLS dial trusting only that pool; it is consumed at creation time
    /// and never cached.
    ///
    /// On a hit the cached session is refreshed before copying, so a handle
    /// whose server topology changed underneath it is repaired proactively.
    /// Every call returns an independent copy of the cached session.
    pub async fn get(&self, key: &str, trust: Option<&[u8]>) -> Result<Session> {
        if key.is_empty() {
            return Err(Error::Config("connection key is empty".to_string()));
        }

        let cell = {
            // The map lock covers only the cell lookup; dials run outside it,
            // so slow dials for one key never block other keys.
            let mut entries = match self.entries.lock() {
                Ok(guard) => guard,
                // Map mutations are plain inserts; a poisoned lock still
                // holds a coherent map.
                Err(poisoned) => poisoned.into_inner(),
            };
            Arc::clone(entries.entry(key.to_string()).or_default())
        };

        let hit = cell.get().is_some();
        if hit {
            metrics::counters::cache_hit();
            tracing::debug!(key, "session cache hit");
        }

        let session = cell
            .get_or_try_init(|| async {
                metrics::counters::cache_miss();
                tracing::info!(key, "establishing session");

                let connection_string = resolve_connection_string(key)?;
                let dialed = dial::establish(&connection_string, trust, None).await?;

                let mut session = Session::from_dialed(dialed);
                session.set_socket_timeout(DEFAULT_OPERATION_TIMEOUT);
                session.set_sync_timeout(DEFAULT_OPERATION_TIMEOUT);
                session.set_mode(Consistency::Monotonic, true);
                Ok::<_, Error>(session)
            })
            .await?;

        if hit {
            session.refresh().await?;
        }

        Ok(session.copy())
    }

    /// Number of cached entries (initialized or mid-dial)
    pub fn len(&self) -> usize {
        match self.entries.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Whether the registry holds no entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("entries", &self.len())
            .finish()
    }
}

/// Resolve a connection key to a connection string.
///
/// A key carrying the `mongodb://` scheme is a connection string already;
/// anything else names an environment variable.
fn resolve_connection_string(key: &str) -> Result<String> {
    if key.starts_with(dial::URL_SCHEME) {
        return Ok(key.to_string());
    }
    match std::env::var(key) {
        Ok(value) if !value.is_empty() => Ok(value),
        Ok(_) => Err(Error::Config(format!(
            "environment variable '{}' is empty",
            key
        ))),
        Err(_) => Err(Error::Config(format!(
            "environment variable '{}' is not set",
            key
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_err;

    #[test]
    fn test_resolve_literal_url_verbatim() {
        let cs = "mongodb://localhost:27017/test";
        assert_eq!(resolve_connection_string(cs).unwrap(), cs);
    }

    #[test]
    fn test_resolve_env_var() {
        std::env::set_var("MONGO_SESSION_TEST_RESOLVE", "mongodb://db.internal/app");
        assert_eq!(
            resolve_connection_string("MONGO_SESSION_TEST_RESOLVE").unwrap(),
            "mongodb://db.internal/app"
        );
        std::env::remove_var("MONGO_SESSION_TEST_RESOLVE");
    }

    #[test]
    fn test_resolve_unset_env_var_fails() {
        let err = resolve_connection_string("MONGO_SESSION_TEST_UNSET").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("MONGO_SESSION_TEST_UNSET"));
    }

    #[test]
    fn test_resolve_empty_env_var_fails() {
        std::env::set_var("MONGO_SESSION_TEST_EMPTY", "");
        let err = resolve_connection_string("MONGO_SESSION_TEST_EMPTY").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        std::env::remove_var("MONGO_SESSION_TEST_EMPTY");
    }

    #[test]
    fn test_get_rejects_empty_key() {
        let registry = SessionRegistry::new();
        let err = tokio_test::block_on(registry.get("", None)).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_failed_dial_leaves_cell_retryable() {
        let registry = SessionRegistry::new();
        // Unset variable: resolution fails, but the entry must not be
        // poisoned into permanent failure
        assert_err!(tokio_test::block_on(
            registry.get("MONGO_SESSION_TEST_RETRY", None)
        ));
        assert_eq!(registry.len(), 1);
        assert_err!(tokio_test::block_on(
            registry.get("MONGO_SESSION_TEST_RETRY", None)
        ));
    }

    #[test]
    fn test_registry_default_and_debug() {
        let registry = SessionRegistry::default();
        assert!(registry.is_empty());
        assert!(format!("{:?}", registry).contains("SessionRegistry"));
    }
}
