//! Dial strategy
//!
//! Deciding how to establish a connection (plain, TLS with caller-supplied
//! trust, TLS via the `ssl=true` flag) and performing the dial. Mode
//! selection is a pure classification over the connection string and trust
//! material; the effectful connect logic dispatches on the result.

mod connect;
mod info;
mod mode;

pub use connect::{establish, Dialed};
pub use info::{DialInfo, DEFAULT_PORT, URL_SCHEME};
pub use mode::{strip_ssl_flag, DialMode};

pub(crate) use connect::connect;
