//! Core connection type

use super::state::ConnectionState;
use super::transport::Transport;
use crate::auth::{Credentials, ScramClient};
use crate::protocol::{decode_message, encode_message, Document};
use crate::{Error, Result};
use bytes::{Buf, BytesMut};
use std::time::Duration;

/// Server limits and capabilities reported by the `hello` handshake
#[derive(Debug, Clone, Copy)]
pub struct ServerInfo {
    /// Largest BSON document the server accepts
    pub max_bson_object_size: i32,
    /// Largest wire message the server accepts
    pub max_message_size_bytes: i32,
    /// Highest wire protocol version the server speaks
    pub max_wire_version: i32,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            max_bson_object_size: 16 * 1024 * 1024,
            max_message_size_bytes: 48 * 1024 * 1024,
            max_wire_version: 0,
        }
    }
}

/// MongoDB connection
///
/// Owns the transport and enforces the handshake-before-commands lifecycle
/// through [`ConnectionState`].
#[derive(Debug)]
pub struct Connection {
    transport: Transport,
    state: ConnectionState,
    read_buf: BytesMut,
    next_request_id: i32,
    server: Option<ServerInfo>,
}

impl Connection {
    /// Create connection from transport
    pub fn new(transport: Transport) -> Self {
        Self {
            transport,
            state: ConnectionState::Initial,
            read_buf: BytesMut::with_capacity(8192),
            next_request_id: 1,
            server: None,
        }
    }

    /// Get current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Server info from the handshake, if performed
    pub fn server_info(&self) -> Option<&ServerInfo> {
        self.server.as_ref()
    }

    /// Whether the underlying transport is TLS-encrypted
    pub fn is_tls(&self) -> bool {
        self.transport.is_tls()
    }

    /// Perform the `hello` handshake, then authenticate if credentials were
    /// supplied.
    ///
    /// The wire protocol requires `hello` as the first command on a
    /// connection; commands are rejected by the state machine until it has
    /// completed.
    pub async fn handshake(
        &mut self,
        credentials: Option<&Credentials>,
        timeout: Option<Duration>,
    ) -> Result<()> {
        self.state.transition(ConnectionState::Handshaking)?;

        let mut hello = Document::new()
            .with("hello", 1i32)
            .with("$db", "admin")
            .with(
                "client",
                Document::new().with(
                    "driver",
                    Document::new()
                        .with("name", "mongo-session")
                        .with("version", env!("CARGO_PKG_VERSION")),
                ),
            );
        if let Some(creds) = credentials {
            hello.push(
                "saslSupportedMechs",
                format!("{}.{}", creds.source, creds.username),
            );
        }

        let reply = self.exchange(&hello, timeout).await?;
        if !reply.is_ok() {
            let msg = reply.error_message().unwrap_or("hello rejected").to_string();
            self.state.transition(ConnectionState::Closed)?;
            return Err(Error::Server(msg));
        }

        let mut info = ServerInfo::default();
        if let Some(v) = reply.int32("maxBsonObjectSize") {
            info.max_bson_object_size = v;
        }
        if let Some(v) = reply.int32("maxMessageSizeBytes") {
            info.max_message_size_bytes = v;
        }
        if let Some(v) = reply.int32("maxWireVersion") {
            info.max_wire_version = v;
        }
        self.server = Some(info);
        tracing::debug!(
            max_wire_version = info.max_wire_version,
            tls = self.is_tls(),
            "handshake complete"
        );

        match credentials {
            Some(creds) => {
                self.state.transition(ConnectionState::Authenticating)?;
                self.authenticate(creds, timeout).await?;
                self.state.transition(ConnectionState::Idle)?;
                tracing::debug!(user = %creds.username, source = %creds.source, "authenticated");
            }
            None => {
                self.state.transition(ConnectionState::Idle)?;
            }
        }
        Ok(())
    }

    /// SCRAM-SHA-256 conversation over saslStart/saslContinue
    async fn authenticate(
        &mut self,
        creds: &Credentials,
        timeout: Option<Duration>,
    ) -> Result<()> {
        let mut scram = ScramClient::new(creds.username.clone(), creds.password.clone());

        let start = Document::new()
            .with("saslStart", 1i32)
            .with("mechanism", "SCRAM-SHA-256")
            .with("payload", scram.client_first().into_bytes())
            .with("options", Document::new().with("skipEmptyExchange", true))
            .with("$db", creds.source.as_str());
        let reply = self.exchange(&start, timeout).await?;
        let (conversation_id, server_first) = sasl_reply_parts(&reply)?;

        let server_first = std::str::from_utf8(server_first)
            .map_err(|_| Error::Authentication("server payload is not UTF-8".into()))?;
        let (client_final, scram_state) = scram.client_final(server_first)?;

        let cont = Document::new()
            .with("saslContinue", 1i32)
            .with("conversationId", conversation_id)
            .with("payload", client_final.into_bytes())
            .with("$db", creds.source.as_str());
        let reply = self.exchange(&cont, timeout).await?;
        let (_, server_final) = sasl_reply_parts(&reply)?;
        let server_final = std::str::from_utf8(server_final)
            .map_err(|_| Error::Authentication("server payload is not UTF-8".into()))?;
        scram.verify_server_final(server_final, &scram_state)?;

        // Without skipEmptyExchange support the server wants one empty round
        if !reply.boolean("done").unwrap_or(false) {
            let fin = Document::new()
                .with("saslContinue", 1i32)
                .with("conversationId", conversation_id)
                .with("payload", Vec::<u8>::new())
                .with("$db", creds.source.as_str());
            let reply = self.exchange(&fin, timeout).await?;
            if !reply.is_ok() || !reply.boolean("done").unwrap_or(false) {
                return Err(Error::Authentication(
                    "server did not complete the SASL conversation".into(),
                ));
            }
        }
        Ok(())
    }

    /// Run a command against `db` and return the reply document.
    ///
    /// # Errors
    ///
    /// `Error::Server` if the reply carries `ok != 1`; transport and protocol
    /// errors close the connection.
    pub async fn run_command(
        &mut self,
        db: &str,
        mut command: Document,
        timeout: Option<Duration>,
    ) -> Result<Document> {
        self.state.transition(ConnectionState::AwaitingReply)?;
        command.push("$db", db);

        match self.exchange(&command, timeout).await {
            Ok(reply) => {
                self.state.transition(ConnectionState::Idle)?;
                if !reply.is_ok() {
                    let msg = reply
                        .error_message()
                        .unwrap_or("command failed")
                        .to_string();
                    return Err(Error::Server(msg));
                }
                Ok(reply)
            }
            Err(e) => {
                // The reply stream is no longer trustworthy after a failed
                // round trip; poison the connection.
                self.state.transition(ConnectionState::Closed)?;
                Err(e)
            }
        }
    }

    /// Round-trip liveness check
    pub async fn ping(&mut self, timeout: Option<Duration>) -> Result<()> {
        self.run_command("admin", Document::new().with("ping", 1i32), timeout)
            .await?;
        Ok(())
    }

    /// Close the connection
    pub async fn close(&mut self) -> Result<()> {
        self.state.transition(ConnectionState::Closed)?;
        self.transport.shutdown().await
    }

    /// Send one command document and read its reply, optionally bounded by a
    /// deadline. Does not touch the state machine.
    async fn exchange(&mut self, body: &Document, timeout: Option<Duration>) -> Result<Document> {
        match timeout {
            Some(d) => tokio::time::timeout(d, self.exchange_inner(body))
                .await
                .map_err(|_| Error::Timeout(d))?,
            None => self.exchange_inner(body).await,
        }
    }

    async fn exchange_inner(&mut self, body: &Document) -> Result<Document> {
        let request_id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);

        let wire = encode_message(request_id, body)?;
        self.transport.write_all(&wire).await?;
        self.transport.flush().await?;

        loop {
            match decode_message(&mut self.read_buf) {
                Ok((msg, consumed)) => {
                    self.read_buf.advance(consumed);
                    if msg.response_to != request_id {
                        return Err(Error::Protocol(format!(
                            "reply responseTo {} does not match request id {}",
                            msg.response_to, request_id
                        )));
                    }
                    return Ok(msg.body);
                }
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    let n = self.transport.read_buf(&mut self.read_buf).await?;
                    if n == 0 {
                        return Err(Error::ConnectionClosed);
                    }
                }
                Err(e) => return Err(Error::Protocol(e.to_string())),
            }
        }
    }
}

fn sasl_reply_parts(reply: &Document) -> Result<(i32, &[u8])> {
    if !reply.is_ok() {
        return Err(Error::Authentication(
            reply
                .error_message()
                .unwrap_or("SASL step rejected")
                .to_string(),
        ));
    }
    let conversation_id = reply
        .int32("conversationId")
        .ok_or_else(|| Error::Protocol("SASL reply missing conversationId".into()))?;
    let payload = reply
        .binary("payload")
        .ok_or_else(|| Error::Protocol("SASL reply missing payload".into()))?;
    Ok((conversation_id, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connection_debug_shows_state() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let transport = Transport::connect_tcp("127.0.0.1", addr.port())
            .await
            .expect("connect");

        let conn = Connection::new(transport);
        let rendered = format!("{:?}", conn);
        assert!(rendered.contains("Initial"));
    }

    #[test]
    fn test_server_info_defaults() {
        let info = ServerInfo::default();
        assert_eq!(info.max_bson_object_size, 16 * 1024 * 1024);
        assert_eq!(info.max_message_size_bytes, 48 * 1024 * 1024);
        assert_eq!(info.max_wire_version, 0);
    }

    #[test]
    fn test_sasl_reply_parts_extracts_fields() {
        let reply = Document::new()
            .with("ok", 1.0f64)
            .with("conversationId", 1i32)
            .with("payload", b"r=abc,s=salt,i=4096".to_vec())
            .with("done", false);
        let (id, payload) = sasl_reply_parts(&reply).unwrap();
        assert_eq!(id, 1);
        assert_eq!(payload, b"r=abc,s=salt,i=4096");
    }

    #[test]
    fn test_sasl_reply_parts_rejects_failure() {
        let reply = Document::new()
            .with("ok", 0.0f64)
            .with("errmsg", "Authentication failed.");
        let err = sasl_reply_parts(&reply).unwrap_err();
        assert!(matches!(err, Error::Authentication(_)));
    }

    #[test]
    fn test_sasl_reply_parts_missing_payload_is_protocol_error() {
        let reply = Document::new().with("ok", 1.0f64).with("conversationId", 1i32);
        let err = sasl_reply_parts(&reply).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }
}
