//! Authentication
//!
//! SCRAM-SHA-256 over MongoDB's `saslStart`/`saslContinue` commands. The
//! conversation itself is driven by the connection; this module owns the
//! client-side SCRAM state machine and the credential type.

mod scram;

pub use scram::{ScramClient, ScramError, ScramState};

/// Credentials extracted from a connection string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Username
    pub username: String,
    /// Password
    pub password: String,
    /// Authentication database (`authSource` option, the URI database, or
    /// `admin`)
    pub source: String,
}

impl From<ScramError> for crate::Error {
    fn from(e: ScramError) -> Self {
        crate::Error::Authentication(e.to_string())
    }
}
