//! Metric recording helpers
//!
//! Thin wrappers over the `metrics` facade so call sites stay one-liners and
//! metric names live in a single place. Whether anything is recorded depends
//! on the recorder installed by the owning application.

/// Metric label values
pub mod labels {
    /// Plain TCP dial
    pub const MODE_PLAIN: &str = "plain";

    /// TLS dial with caller-supplied trust material
    pub const MODE_TLS_TRUST: &str = "tls_trust";

    /// TLS dial triggered by the `ssl=true` connection-string flag
    pub const MODE_TLS_FLAG: &str = "tls_flag";
}

/// Counter metrics
pub mod counters {
    /// Registry served an existing entry
    pub fn cache_hit() {
        metrics::counter!("mongo_session_cache_hits_total").increment(1);
    }

    /// Registry had to dial a new session
    pub fn cache_miss() {
        metrics::counter!("mongo_session_cache_misses_total").increment(1);
    }

    /// Dial attempted, labeled by mode
    pub fn dial_attempted(mode: &'static str) {
        metrics::counter!("mongo_session_dials_total", "mode" => mode).increment(1);
    }

    /// Dial failed, labeled by mode
    pub fn dial_failed(mode: &'static str) {
        metrics::counter!("mongo_session_dial_failures_total", "mode" => mode).increment(1);
    }

    /// Refresh ping failed and the connection was re-dialed in place
    pub fn refresh_repaired() {
        metrics::counter!("mongo_session_refresh_repairs_total").increment(1);
    }

    /// Refresh failed and repair also failed
    pub fn refresh_failed() {
        metrics::counter!("mongo_session_refresh_failures_total").increment(1);
    }
}

/// Histogram metrics
pub mod histograms {
    use std::time::Duration;

    /// Time spent establishing a session (TCP + TLS + handshake + auth)
    pub fn dial_duration(duration: Duration) {
        metrics::histogram!("mongo_session_dial_duration_seconds").record(duration.as_secs_f64());
    }
}
