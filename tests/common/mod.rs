//! In-process fake MongoDB server for integration tests
//!
//! Accepts TCP connections and answers every OP_MSG command with `ok: 1`,
//! which is all the handshake, ping, and refresh paths need. Counts accepted
//! connections so tests can assert on dial behavior.

use bytes::{Buf, BytesMut};
use mongo_session::protocol::{decode_message, encode_op_msg, Document};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

static TRACING: Once = Once::new();

/// Route crate logs through the test writer, honoring `RUST_LOG`
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub struct FakeMongod {
    addr: SocketAddr,
    connections: Arc<AtomicUsize>,
    commands: Arc<AtomicUsize>,
}

#[derive(Clone, Copy, Default)]
pub struct FakeOptions {
    /// Close each connection after serving this many commands
    pub close_after_commands: Option<usize>,
    /// Delay before answering each command (widens race windows)
    pub reply_delay: Option<Duration>,
}

impl FakeMongod {
    pub async fn spawn() -> Self {
        Self::spawn_with(FakeOptions::default()).await
    }

    pub async fn spawn_with(options: FakeOptions) -> Self {
        init_tracing();
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind fake server");
        let addr = listener.local_addr().expect("local addr");
        let connections = Arc::new(AtomicUsize::new(0));
        let commands = Arc::new(AtomicUsize::new(0));

        let conn_count = Arc::clone(&connections);
        let cmd_count = Arc::clone(&commands);
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                conn_count.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve(stream, options, Arc::clone(&cmd_count)));
            }
        });

        Self {
            addr,
            connections,
            commands,
        }
    }

    /// Connection string for this server
    pub fn url(&self, db: &str) -> String {
        format!("mongodb://127.0.0.1:{}/{}", self.addr.port(), db)
    }

    /// Number of TCP connections accepted so far
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Number of commands answered so far
    pub fn commands(&self) -> usize {
        self.commands.load(Ordering::SeqCst)
    }
}

async fn serve(mut stream: TcpStream, options: FakeOptions, commands: Arc<AtomicUsize>) {
    let mut buf = BytesMut::with_capacity(4096);
    let mut served = 0usize;

    loop {
        match decode_message(&mut buf) {
            Ok((msg, consumed)) => {
                buf.advance(consumed);
                if let Some(delay) = options.reply_delay {
                    tokio::time::sleep(delay).await;
                }
                commands.fetch_add(1, Ordering::SeqCst);

                let reply = Document::new()
                    .with("ok", 1.0f64)
                    .with("maxWireVersion", 17i32)
                    .with("maxBsonObjectSize", 16 * 1024 * 1024i32)
                    .with("maxMessageSizeBytes", 48 * 1024 * 1024i32);
                let wire = encode_op_msg(1, msg.request_id, &reply).expect("encode reply");
                if stream.write_all(&wire).await.is_err() {
                    return;
                }

                served += 1;
                if options.close_after_commands == Some(served) {
                    let _ = stream.shutdown().await;
                    return;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                match stream.read_buf(&mut buf).await {
                    Ok(0) | Err(_) => return,
                    Ok(_) => {}
                }
            }
            Err(_) => return,
        }
    }
}
