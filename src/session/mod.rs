//! Session cache
//!
//! The registry (get-or-create, exactly-once dialing per key) and the session
//! handle it stores (cheap copies over a shared connection, refresh repair).

mod handle;
mod registry;

pub use handle::{Consistency, Session};
pub use registry::{SessionRegistry, DEFAULT_OPERATION_TIMEOUT};
