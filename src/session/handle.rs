//! Session handle

use crate::connection::{Connection, TlsConfig};
use crate::dial::{self, DialInfo, Dialed};
use crate::protocol::Document;
use crate::{metrics, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Read consistency mode
///
/// `Monotonic` prefers the most recently known-good member while tolerating
/// topology changes; it is what the registry configures on every cached
/// session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Consistency {
    /// Reads and writes always go to the primary
    #[default]
    Strong,
    /// Reads may go to a secondary until the first write
    Monotonic,
    /// Reads may go to any member
    Eventual,
}

impl std::fmt::Display for Consistency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Strong => write!(f, "strong"),
            Self::Monotonic => write!(f, "monotonic"),
            Self::Eventual => write!(f, "eventual"),
        }
    }
}

/// Connection shared by all copies of a session, plus the dial parameters
/// needed to repair it in place.
struct SharedConn {
    conn: Mutex<Connection>,
    info: DialInfo,
    tls: Option<TlsConfig>,
}

/// A handle to a pooled MongoDB connection.
///
/// `copy()` is cheap: it shares the underlying connection while giving the
/// caller independent timeout and consistency settings. All I/O serializes on
/// the shared connection; each copy is safe for use by its own caller.
#[derive(Clone)]
pub struct Session {
    shared: Arc<SharedConn>,
    socket_timeout: Option<Duration>,
    sync_timeout: Option<Duration>,
    consistency: Consistency,
    refresh_allowed: bool,
}

impl Session {
    /// Wrap a freshly dialed connection
    pub(crate) fn from_dialed(dialed: Dialed) -> Self {
        Self {
            shared: Arc::new(SharedConn {
                conn: Mutex::new(dialed.conn),
                info: dialed.info,
                tls: dialed.tls,
            }),
            socket_timeout: None,
            sync_timeout: None,
            consistency: Consistency::default(),
            refresh_allowed: false,
        }
    }

    /// Return an independent handle sharing the underlying connection.
    ///
    /// Settings (timeouts, consistency mode) are copied; changing them on
    /// the copy does not affect this handle.
    pub fn copy(&self) -> Session {
        self.clone()
    }

    /// Revalidate the session, repairing the connection in place if needed.
    ///
    /// Pings the server first (bounded by the socket timeout). If the ping
    /// fails, the connection is re-dialed with the session's original dial
    /// parameters (bounded by the sync timeout) and swapped in. An error is
    /// returned only if the repair dial also fails; the session remains
    /// usable for a later retry either way.
    pub async fn refresh(&self) -> Result<()> {
        let mut conn = self.shared.conn.lock().await;
        match conn.ping(self.socket_timeout).await {
            Ok(()) => Ok(()),
            Err(ping_err) => {
                tracing::warn!(error = %ping_err, "session ping failed, re-dialing");
                match dial::connect(
                    &self.shared.info,
                    self.shared.tls.as_ref(),
                    self.sync_timeout,
                )
                .await
                {
                    Ok(fresh) => {
                        *conn = fresh;
                        metrics::counters::refresh_repaired();
                        tracing::info!("session connection repaired");
                        Ok(())
                    }
                    Err(redial_err) => {
                        metrics::counters::refresh_failed();
                        Err(redial_err)
                    }
                }
            }
        }
    }

    /// Round-trip liveness check
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.shared.conn.lock().await;
        conn.ping(self.socket_timeout).await
    }

    /// Run a command against `db`, bounded by the socket timeout
    pub async fn command(&self, db: &str, command: Document) -> Result<Document> {
        let mut conn = self.shared.conn.lock().await;
        conn.run_command(db, command, self.socket_timeout).await
    }

    /// Set the per-operation socket timeout
    pub fn set_socket_timeout(&mut self, timeout: Duration) {
        self.socket_timeout = Some(timeout);
    }

    /// Set the sync timeout, bounding the handshake during refresh repair
    pub fn set_sync_timeout(&mut self, timeout: Duration) {
        self.sync_timeout = Some(timeout);
    }

    /// Set the consistency mode and whether refresh is allowed
    pub fn set_mode(&mut self, consistency: Consistency, refresh_allowed: bool) {
        self.consistency = consistency;
        self.refresh_allowed = refresh_allowed;
    }

    /// Current socket timeout
    pub fn socket_timeout(&self) -> Option<Duration> {
        self.socket_timeout
    }

    /// Current sync timeout
    pub fn sync_timeout(&self) -> Option<Duration> {
        self.sync_timeout
    }

    /// Current consistency mode
    pub fn consistency(&self) -> Consistency {
        self.consistency
    }

    /// Whether refresh is allowed for this handle
    pub fn refresh_allowed(&self) -> bool {
        self.refresh_allowed
    }

    /// Dial info this session was established with
    pub fn dial_info(&self) -> &DialInfo {
        &self.shared.info
    }

    /// Whether the session dials over TLS
    pub fn is_tls(&self) -> bool {
        self.shared.tls.is_some()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("hosts", &self.shared.info.hosts)
            .field("tls", &self.shared.tls.is_some())
            .field("socket_timeout", &self.socket_timeout)
            .field("sync_timeout", &self.sync_timeout)
            .field("consistency", &self.consistency)
            .field("refresh_allowed", &self.refresh_allowed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consistency_default_is_strong() {
        assert_eq!(Consistency::default(), Consistency::Strong);
    }

    #[test]
    fn test_consistency_display() {
        assert_eq!(Consistency::Strong.to_string(), "strong");
        assert_eq!(Consistency::Monotonic.to_string(), "monotonic");
        assert_eq!(Consistency::Eventual.to_string(), "eventual");
    }
}
