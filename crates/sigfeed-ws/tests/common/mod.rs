//! Mock WebSocket server for integration tests.
//!
//! Provides a simple WebSocket server that can:
//! - Accept connections and record the request path
//! - Record received text messages and close codes
//! - Push frames to every connected client
//! - Drop every connection without a close handshake

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

#[derive(Debug, Clone)]
enum ServerCommand {
    Push(Message),
    Drop,
}

#[derive(Default)]
struct Recorded {
    paths: Vec<String>,
    messages: Vec<String>,
    close_codes: Vec<u16>,
    connections: u32,
}

/// A mock WebSocket server for testing.
pub struct MockWsServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    commands: broadcast::Sender<ServerCommand>,
    recorded: Arc<Mutex<Recorded>>,
}

impl MockWsServer {
    /// Start a new mock WebSocket server on an available port.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let (commands, _) = broadcast::channel(64);
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let recorded_clone = recorded.clone();
        let commands_clone = commands.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Ok((stream, _)) = listener.accept() => {
                        let recorded = recorded_clone.clone();
                        let commands = commands_clone.subscribe();
                        tokio::spawn(handle_connection(stream, recorded, commands));
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            commands,
            recorded,
        }
    }

    /// Base WebSocket URL clients should be configured with.
    pub fn url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Get the number of completed handshakes.
    pub fn connection_count(&self) -> u32 {
        self.recorded.lock().connections
    }

    /// Request paths of every handshake, in order.
    pub fn paths(&self) -> Vec<String> {
        self.recorded.lock().paths.clone()
    }

    /// Get all received text messages.
    pub fn received_messages(&self) -> Vec<String> {
        self.recorded.lock().messages.clone()
    }

    /// Received messages parsed as JSON.
    pub fn received_json(&self) -> Vec<serde_json::Value> {
        self.received_messages()
            .iter()
            .filter_map(|m| serde_json::from_str(m).ok())
            .collect()
    }

    /// Close codes sent by clients.
    pub fn close_codes(&self) -> Vec<u16> {
        self.recorded.lock().close_codes.clone()
    }

    /// Send a text frame to every connected client.
    pub fn push_text(&self, text: impl Into<String>) {
        let _ = self
            .commands
            .send(ServerCommand::Push(Message::Text(text.into())));
    }

    /// Send a binary frame to every connected client.
    pub fn push_binary(&self, bytes: Vec<u8>) {
        let _ = self.commands.send(ServerCommand::Push(Message::Binary(bytes)));
    }

    /// Drop every connection without a close frame.
    pub fn drop_connections(&self) {
        let _ = self.commands.send(ServerCommand::Drop);
    }

    /// Shutdown the server.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

async fn handle_connection(
    stream: TcpStream,
    recorded: Arc<Mutex<Recorded>>,
    mut commands: broadcast::Receiver<ServerCommand>,
) {
    let path_log = recorded.clone();
    let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        path_log.lock().paths.push(req.uri().path().to_string());
        Ok(resp)
    };

    let ws_stream = match accept_hdr_async(stream, callback).await {
        Ok(ws) => ws,
        Err(e) => {
            eprintln!("WebSocket handshake failed: {}", e);
            return;
        }
    };
    recorded.lock().connections += 1;

    let (mut write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    recorded.lock().messages.push(text);
                }
                Some(Ok(Message::Ping(data))) => {
                    let _ = write.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(frame))) => {
                    if let Some(frame) = frame {
                        recorded.lock().close_codes.push(u16::from(frame.code));
                    }
                    break;
                }
                Some(Ok(_)) => {}
                Some(Err(_)) | None => break,
            },
            cmd = commands.recv() => match cmd {
                Ok(ServerCommand::Push(message)) => {
                    let _ = write.send(message).await;
                }
                Ok(ServerCommand::Drop) | Err(_) => break,
            },
        }
    }
}

/// Listener that accepts TCP connections but never answers the WebSocket
/// handshake.
pub struct StalledServer {
    addr: SocketAddr,
    accepted: Arc<Mutex<Vec<Instant>>>,
    task: tokio::task::JoinHandle<()>,
}

impl StalledServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(Mutex::new(Vec::new()));

        let log = accepted.clone();
        let task = tokio::spawn(async move {
            // Streams are held open so the client sees silence, not a reset
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                log.lock().push(Instant::now());
                held.push(stream);
            }
        });

        Self {
            addr,
            accepted,
            task,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Times at which TCP connections were accepted.
    pub fn accepted(&self) -> Vec<Instant> {
        self.accepted.lock().clone()
    }

    pub fn shutdown(self) {
        self.task.abort();
    }
}

/// Unused local address: connections to it are refused.
pub async fn dead_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("ws://{}/ws", addr)
}

/// Poll `check` every 20ms until it holds or `limit` elapses.
pub async fn wait_until<F>(limit: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    tokio::time::timeout(limit, async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .is_ok()
}

/// Await `fut` with a test-sized timeout.
pub async fn within<T>(fut: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), fut)
        .await
        .expect("operation timed out")
}
