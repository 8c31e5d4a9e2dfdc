//! TLS configuration for secure connections to MongoDB.
//!
//! Trust anchors come from one of two places: PEM bytes supplied by the
//! caller at dial time (trusting only that pool), or the system root store
//! via `rustls-native-certs`. Caller-supplied PEM is consumed while building
//! the `ClientConfig` and is not retained.

use crate::{Error, Result};
use rustls::ClientConfig;
use rustls::RootCertStore;
use rustls_pemfile::Item;
use std::sync::Arc;

/// TLS configuration for a secure dial.
///
/// # Examples
///
/// ```ignore
/// // System root certificates
/// let tls = TlsConfig::builder().build()?;
///
/// // Trust only a caller-supplied CA pool
/// let tls = TlsConfig::builder()
///     .trust_anchor_pem(pem_bytes)
///     .build()?;
/// ```
#[derive(Clone)]
pub struct TlsConfig {
    /// Whether the trust anchors came from caller-supplied PEM
    custom_trust: bool,
    /// Compiled rustls ClientConfig
    client_config: Arc<ClientConfig>,
}

impl TlsConfig {
    /// Create a new TLS configuration builder.
    pub fn builder() -> TlsConfigBuilder {
        TlsConfigBuilder::default()
    }

    /// Get the rustls ClientConfig for this TLS configuration.
    pub fn client_config(&self) -> Arc<ClientConfig> {
        self.client_config.clone()
    }

    /// Whether this configuration trusts a caller-supplied pool instead of
    /// the system roots.
    pub fn has_custom_trust(&self) -> bool {
        self.custom_trust
    }
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("custom_trust", &self.custom_trust)
            .field("client_config", &"<ClientConfig>")
            .finish()
    }
}

/// Builder for TLS configuration.
#[derive(Default)]
pub struct TlsConfigBuilder {
    trust_anchor_pem: Option<Vec<u8>>,
}

impl TlsConfigBuilder {
    /// Supply PEM-encoded CA certificate bytes to trust exclusively.
    ///
    /// When set, the system root store is not consulted; the server must
    /// present a chain anchored in this pool.
    pub fn trust_anchor_pem(mut self, pem: impl Into<Vec<u8>>) -> Self {
        self.trust_anchor_pem = Some(pem.into());
        self
    }

    /// Build the TLS configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the supplied PEM contains no valid certificates,
    /// or if no system root certificates could be loaded.
    pub fn build(self) -> Result<TlsConfig> {
        let custom_trust = self.trust_anchor_pem.is_some();

        let root_store = if let Some(pem) = &self.trust_anchor_pem {
            load_pem_roots(pem)?
        } else {
            // System root certificates via rustls-native-certs
            let result = rustls_native_certs::load_native_certs();

            let mut store = RootCertStore::empty();
            for cert in result.certs {
                let _ = store.add_parsable_certificates(std::iter::once(cert));
            }

            if !result.errors.is_empty() && store.is_empty() {
                return Err(Error::Config(
                    "failed to load any system root certificates".to_string(),
                ));
            }

            store
        };

        let client_config = Arc::new(
            ClientConfig::builder()
                .with_root_certificates(root_store)
                .with_no_client_auth(),
        );

        Ok(TlsConfig {
            custom_trust,
            client_config,
        })
    }
}

/// Build a root store from PEM-encoded certificate bytes.
fn load_pem_roots(pem: &[u8]) -> Result<RootCertStore> {
    let mut reader = std::io::Cursor::new(pem);
    let mut root_store = RootCertStore::empty();
    let mut found_certs = 0;

    loop {
        match rustls_pemfile::read_one(&mut reader) {
            Ok(Some(Item::X509Certificate(cert))) => {
                let _ = root_store.add_parsable_certificates(std::iter::once(cert));
                found_certs += 1;
            }
            Ok(Some(_)) => {
                // Skip non-certificate items (private keys, etc.)
            }
            Ok(None) => break,
            Err(_) => {
                return Err(Error::Config(
                    "failed to parse trust material as PEM".to_string(),
                ));
            }
        }
    }

    if found_certs == 0 {
        return Err(Error::Config(
            "no valid certificates found in trust material".to_string(),
        ));
    }

    Ok(root_store)
}

/// Parse server name from hostname for TLS SNI (Server Name Indication).
///
/// # Errors
///
/// Returns an error if the hostname is invalid.
pub fn parse_server_name(hostname: &str) -> Result<String> {
    // Remove trailing dot if present
    let hostname = hostname.trim_end_matches('.');

    if hostname.is_empty() || hostname.len() > 253 {
        return Err(Error::Config(format!(
            "invalid hostname for TLS: '{}'",
            hostname
        )));
    }

    if !hostname
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '.')
    {
        return Err(Error::Config(format!(
            "invalid hostname for TLS: '{}'",
            hostname
        )));
    }

    Ok(hostname.to_string())
}
