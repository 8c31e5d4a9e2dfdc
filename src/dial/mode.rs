//! Dial mode classification
//!
//! A pure decision over the connection string and optional trust material,
//! separated from the connect logic so the precedence rule (explicit trust >
//! `ssl=true` flag > plain) is independently testable.

use crate::metrics::labels;

/// How a connection should be dialed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialMode {
    /// Plain TCP dial
    Plain,
    /// TLS dial trusting only the supplied PEM certificate pool
    TlsWithTrust(Vec<u8>),
    /// TLS dial with system trust roots, requested via the `ssl=true`
    /// connection-string flag
    TlsViaFlag,
}

impl DialMode {
    /// Classify a dial request.
    ///
    /// Explicit trust material always wins over the URL flag; the flag wins
    /// over plain. The connection string is not validated here — parse errors
    /// surface when the chosen mode dials.
    pub fn classify(connection_string: &str, trust: Option<&[u8]>) -> DialMode {
        if let Some(pem) = trust {
            return DialMode::TlsWithTrust(pem.to_vec());
        }
        if has_ssl_flag(connection_string) {
            return DialMode::TlsViaFlag;
        }
        DialMode::Plain
    }

    /// Label used for dial metrics
    pub fn metric_label(&self) -> &'static str {
        match self {
            DialMode::Plain => labels::MODE_PLAIN,
            DialMode::TlsWithTrust(_) => labels::MODE_TLS_TRUST,
            DialMode::TlsViaFlag => labels::MODE_TLS_FLAG,
        }
    }
}

impl std::fmt::Display for DialMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DialMode::Plain => write!(f, "plain"),
            DialMode::TlsWithTrust(_) => write!(f, "tls_with_trust"),
            DialMode::TlsViaFlag => write!(f, "tls_via_flag"),
        }
    }
}

fn has_ssl_flag(connection_string: &str) -> bool {
    connection_string.contains("?ssl=true") || connection_string.contains("&ssl=true")
}

/// Remove the `ssl=true` flag (leading `?` or trailing `&` position) from a
/// connection string before parsing.
pub fn strip_ssl_flag(connection_string: &str) -> String {
    connection_string
        .replace("&ssl=true", "")
        .replace("?ssl=true", "")
}
