//! Establishing connections per dial mode

use super::info::DialInfo;
use super::mode::{strip_ssl_flag, DialMode};
use crate::connection::{Connection, TlsConfig, Transport};
use crate::{metrics, Error, Result};
use std::time::{Duration, Instant};

/// A freshly established connection plus the parameters needed to re-dial it
/// during refresh repair. Raw trust material is not retained; only the
/// compiled TLS configuration is.
#[derive(Debug)]
pub struct Dialed {
    /// The connected, handshaken connection
    pub conn: Connection,
    /// Parsed dial info
    pub info: DialInfo,
    /// TLS configuration used, if any
    pub tls: Option<TlsConfig>,
}

/// Classify and dial a connection string.
///
/// `timeout`, when set, bounds each handshake round trip (not the TCP
/// connect, which is governed by the OS).
pub async fn establish(
    connection_string: &str,
    trust: Option<&[u8]>,
    timeout: Option<Duration>,
) -> Result<Dialed> {
    let mode = DialMode::classify(connection_string, trust);
    let label = mode.metric_label();
    metrics::counters::dial_attempted(label);
    tracing::debug!(mode = %mode, "dialing");

    let started = Instant::now();
    match establish_mode(connection_string, mode, timeout).await {
        Ok(dialed) => {
            metrics::histograms::dial_duration(started.elapsed());
            Ok(dialed)
        }
        Err(e) => {
            metrics::counters::dial_failed(label);
            Err(e)
        }
    }
}

async fn establish_mode(
    connection_string: &str,
    mode: DialMode,
    timeout: Option<Duration>,
) -> Result<Dialed> {
    let (info, tls) = match mode {
        DialMode::Plain => (DialInfo::parse(connection_string)?, None),
        DialMode::TlsWithTrust(pem) => {
            let info = DialInfo::parse(connection_string)?;
            let tls = TlsConfig::builder().trust_anchor_pem(pem).build()?;
            (info, Some(tls))
        }
        DialMode::TlsViaFlag => {
            let stripped = strip_ssl_flag(connection_string);
            let info = DialInfo::parse(&stripped)?;
            (info, Some(TlsConfig::builder().build()?))
        }
    };

    let conn = connect(&info, tls.as_ref(), timeout).await?;
    Ok(Dialed { conn, info, tls })
}

/// Connect and handshake against the first reachable seed host.
pub(crate) async fn connect(
    info: &DialInfo,
    tls: Option<&TlsConfig>,
    timeout: Option<Duration>,
) -> Result<Connection> {
    let mut last_err = None;

    for (host, port) in &info.hosts {
        let attempt = async {
            let transport = match tls {
                Some(tls_config) => Transport::connect_tcp_tls(host, *port, tls_config).await?,
                None => Transport::connect_tcp(host, *port).await?,
            };
            let mut conn = Connection::new(transport);
            conn.handshake(info.credentials().as_ref(), timeout).await?;
            Ok::<_, Error>(conn)
        };

        match attempt.await {
            Ok(conn) => {
                tracing::info!(%host, port, tls = tls.is_some(), "session established");
                return Ok(conn);
            }
            Err(e) => {
                tracing::warn!(%host, port, error = %e, "seed host dial failed");
                last_err = Some(e);
            }
        }
    }

    Err(last_err
        .unwrap_or_else(|| Error::Config("connection string contains no hosts".to_string())))
}
