//! Connection management
//!
//! This module handles:
//! * Transport abstraction (plain TCP vs TLS)
//! * Connection lifecycle (handshake, auth, commands)
//! * State machine enforcement
//! * TLS configuration

mod conn;
mod state;
mod tls;
mod transport;

pub use conn::{Connection, ServerInfo};
pub use state::ConnectionState;
pub use tls::{parse_server_name, TlsConfig, TlsConfigBuilder};
pub use transport::Transport;
