//! WebSocket connection manager.
//!
//! Owns the single transport to the event server, its lifecycle, the
//! exponential backoff reconnection loop, and readiness-gated sends.
//! Inbound frames are handed to the [`DispatchTable`] in arrival order.
//!
//! Every connection attempt carries a generation number. Close events
//! from a transport that has been superseded (forced closed by
//! `reconnect()` or `close()`) are ignored, so they never schedule a retry.

use crate::config::ConnectionConfig;
use crate::dispatch::DispatchTable;
use crate::error::{WsError, WsResult};
use crate::lifecycle::{ConnectionState, DisconnectAction, Lifecycle};
use chrono::Utc;
use futures_util::future::{self, BoxFuture, FutureExt, Shared};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;
use sigfeed_core::{ClientId, OutboundMessage};
use sigfeed_telemetry::metrics::DROP_MALFORMED;
use sigfeed_telemetry::FeedMetrics;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Shared outcome of one in-flight connection attempt.
type ConnectOutcome = Shared<BoxFuture<'static, WsResult<()>>>;

/// Outbound queue depth per transport.
const OUTBOUND_CAPACITY: usize = 256;

/// Normal closure (RFC 6455).
const CLOSE_NORMAL: u16 = 1000;

/// Abnormal closure: no close frame was received.
const CLOSE_ABNORMAL: u16 = 1006;

/// Public connection status, as rendered for the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Closing,
    /// Lifecycle says connected but the session writer is already gone.
    Unknown,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Closing => "closing",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message to the session task that owns the socket writer.
#[derive(Debug)]
enum WsOutbound {
    /// Serialized outbound frame.
    Text(String),
    /// Close the socket with the given code and reason.
    Close { code: u16, reason: String },
}

/// Writer side of the live transport.
struct Transport {
    generation: u64,
    tx: mpsc::Sender<WsOutbound>,
}

impl Transport {
    fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    fn close(self, reason: &str) {
        // A full queue still closes: dropping the sender ends the session.
        let _ = self.tx.try_send(WsOutbound::Close {
            code: CLOSE_NORMAL,
            reason: reason.to_string(),
        });
    }
}

/// In-flight connection attempt.
struct PendingConnect {
    generation: u64,
    outcome: ConnectOutcome,
}

/// Reconnecting WebSocket client.
///
/// Cheap to clone; every clone shares the same transport, identity and
/// dispatch table. Construct one per application and pass it to whatever
/// needs to send or subscribe.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

struct Inner {
    config: ConnectionConfig,
    client_id: ClientId,
    lifecycle: Mutex<Lifecycle>,
    transport: Mutex<Option<Transport>>,
    /// Generation of the most recent attempt; bumped to supersede.
    generation: AtomicU64,
    pending: Mutex<Option<PendingConnect>>,
    /// Tripped by `close()` to cancel sleeping reconnect timers.
    retry_token: Mutex<CancellationToken>,
    dispatch: Arc<DispatchTable>,
}

impl ConnectionManager {
    /// Create a manager and start connecting immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: ConnectionConfig) -> Self {
        let client_id = ClientId::generate();
        let lifecycle = Lifecycle::new(config.reconnect_policy());
        info!(client_id = %client_id, url = %config.url, "Creating connection manager");

        let manager = Self {
            inner: Arc::new(Inner {
                config,
                client_id,
                lifecycle: Mutex::new(lifecycle),
                transport: Mutex::new(None),
                generation: AtomicU64::new(0),
                pending: Mutex::new(None),
                retry_token: Mutex::new(CancellationToken::new()),
                dispatch: Arc::new(DispatchTable::new()),
            }),
        };

        // The attempt runs on its own task; its outcome is only logged.
        drop(manager.inner.connect());
        manager
    }

    /// Identity appended to the endpoint and stamped on every message.
    pub fn client_id(&self) -> &ClientId {
        &self.inner.client_id
    }

    /// Full URL used for connection attempts.
    pub fn endpoint_url(&self) -> String {
        self.inner.config.endpoint_url(&self.inner.client_id)
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    /// Subscription registry for inbound events.
    pub fn dispatch(&self) -> &DispatchTable {
        &self.inner.dispatch
    }

    /// Connect, or join the attempt already in flight.
    ///
    /// Concurrent callers all observe the same outcome and at most one
    /// transport is created.
    pub async fn connect(&self) -> WsResult<()> {
        self.inner.connect().await
    }

    /// Send a message, waiting for a connection first if necessary.
    ///
    /// `clientId` and `timestamp` are stamped here. Fails with
    /// `ConnectionUnavailable` if the transport is still not open after the
    /// connect attempt settled.
    pub async fn send(&self, message: OutboundMessage) -> WsResult<()> {
        if !self.is_connected() {
            debug!(kind = message.kind(), "WebSocket not ready, waiting for connection");
            if let Err(e) = self.inner.connect().await {
                warn!(error = %e, "Connection attempt failed before send");
            }
        }

        self.inner.transmit(&message).map_err(|e| {
            warn!(kind = message.kind(), error = %e, "Cannot send message");
            e
        })
    }

    pub async fn ping(&self) -> WsResult<()> {
        self.send(OutboundMessage::ping()).await
    }

    pub async fn get_status(&self) -> WsResult<()> {
        self.send(OutboundMessage::get_status()).await
    }

    pub async fn create_task(&self, data: Value) -> WsResult<()> {
        self.send(OutboundMessage::create_task(data)).await
    }

    /// Close the connection and stop reconnecting. Idempotent.
    ///
    /// A later `connect()` or `send()` may open a new transport.
    pub fn close(&self) {
        self.inner.close();
    }

    /// Current status. Never blocks on I/O.
    pub fn connection_status(&self) -> ConnectionStatus {
        let state = self.inner.lifecycle.lock().state();
        let writer_open = self.inner.writer_open();
        match state {
            ConnectionState::Disconnected => ConnectionStatus::Disconnected,
            ConnectionState::Connecting => ConnectionStatus::Connecting,
            ConnectionState::Connected if writer_open => ConnectionStatus::Connected,
            ConnectionState::Connected => ConnectionStatus::Unknown,
            ConnectionState::Closing => ConnectionStatus::Closing,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection_status() == ConnectionStatus::Connected
    }

    /// Automatic reconnection attempts since the last successful open.
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.lifecycle.lock().attempts()
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("client_id", &self.inner.client_id)
            .field("url", &self.inner.config.url)
            .field("status", &self.connection_status())
            .finish()
    }
}

impl Inner {
    fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn writer_open(&self) -> bool {
        self.transport.lock().as_ref().is_some_and(Transport::is_open)
    }

    /// Start an attempt or join the one in flight.
    fn connect(self: &Arc<Self>) -> ConnectOutcome {
        if self.writer_open() {
            return future::ready(Ok(())).boxed().shared();
        }

        let mut pending = self.pending.lock();
        if let Some(in_flight) = pending.as_ref() {
            debug!(generation = in_flight.generation, "Joining in-flight connection attempt");
            return in_flight.outcome.clone();
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let task = tokio::spawn(Arc::clone(self).open_transport(generation));
        let outcome = async move {
            task.await.unwrap_or_else(|e| {
                Err(WsError::ConnectionFailed(format!("connect task failed: {e}")))
            })
        }
        .boxed()
        .shared();

        *pending = Some(PendingConnect {
            generation,
            outcome: outcome.clone(),
        });
        outcome
    }

    /// Clear the in-flight attempt if it is the given one.
    fn clear_pending(&self, generation: u64) {
        let mut pending = self.pending.lock();
        if pending.as_ref().is_some_and(|p| p.generation == generation) {
            *pending = None;
        }
    }

    fn open_transport(self: Arc<Self>, generation: u64) -> BoxFuture<'static, WsResult<()>> {
        async move {
            if self.current_generation() != generation {
                self.clear_pending(generation);
                return Err(WsError::Closed);
            }
            let url = self.config.endpoint_url(&self.client_id);
            self.lifecycle.lock().begin_connect();
            info!(url = %url, generation, "Attempting WebSocket connection");

            let timeout = self.config.connect_timeout();
            let stream = match tokio::time::timeout(timeout, connect_async(url.as_str())).await {
                Ok(Ok((stream, _response))) => stream,
                Ok(Err(e)) => {
                    error!(error = %e, "WebSocket connection failed");
                    self.on_transport_closed(generation, None);
                    return Err(e.into());
                }
                Err(_) => {
                    error!(timeout_ms = self.config.connect_timeout_ms, "WebSocket connection timeout");
                    self.on_transport_closed(generation, None);
                    return Err(WsError::ConnectTimeout(self.config.connect_timeout_ms));
                }
            };

            let (write, read) = stream.split();
            let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
            {
                let mut transport = self.transport.lock();
                if self.current_generation() != generation {
                    drop(transport);
                    info!(generation, "Connection closed before open completed, discarding");
                    self.clear_pending(generation);
                    return Err(WsError::Closed);
                }
                *transport = Some(Transport { generation, tx });
                self.lifecycle.lock().open();
            }
            self.clear_pending(generation);
            FeedMetrics::set_connected(true);
            info!(client_id = %self.client_id, "WebSocket connected");

            tokio::spawn(Arc::clone(&self).run_session(generation, write, read, rx));

            if let Err(e) = self.transmit(&OutboundMessage::ping()) {
                warn!(error = %e, "Failed to queue initial ping");
            }
            Ok(())
        }
        .boxed()
    }

    /// Pump one transport until it closes.
    ///
    /// Inbound frames are dispatched synchronously, preserving order.
    async fn run_session(
        self: Arc<Self>,
        generation: u64,
        mut write: WsSink,
        mut read: WsSource,
        mut rx: mpsc::Receiver<WsOutbound>,
    ) {
        let close = loop {
            tokio::select! {
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        self.dispatch.dispatch_frame(&text);
                    }
                    Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                        Ok(text) => {
                            self.dispatch.dispatch_frame(&text);
                        }
                        Err(e) => {
                            warn!(error = %e, "Dropping non UTF-8 binary frame");
                            FeedMetrics::record_dropped(DROP_MALFORMED);
                        }
                    },
                    Some(Ok(Message::Ping(data))) => {
                        debug!("Received ping, sending pong");
                        if let Err(e) = write.send(Message::Pong(data)).await {
                            error!(error = %e, "Failed to send pong");
                            break None;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = frame
                            .map(|f| (u16::from(f.code), f.reason.to_string()))
                            .unwrap_or((CLOSE_NORMAL, String::new()));
                        break Some((code, reason));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!(error = %e, "WebSocket read error");
                        break None;
                    }
                    None => {
                        warn!("WebSocket stream ended");
                        break None;
                    }
                },

                outbound = rx.recv() => match outbound {
                    Some(WsOutbound::Text(text)) => {
                        if let Err(e) = write.send(Message::Text(text)).await {
                            error!(error = %e, "WebSocket write error");
                            break None;
                        }
                    }
                    Some(WsOutbound::Close { code, reason }) => {
                        send_close(&mut write, code, &reason).await;
                        break Some((code, reason));
                    }
                    None => {
                        send_close(&mut write, CLOSE_NORMAL, "Client initiated close").await;
                        break Some((CLOSE_NORMAL, "Client initiated close".to_string()));
                    }
                },
            }
        };

        self.on_transport_closed(generation, close);
    }

    /// Handle the close of (or failure to open) the transport `generation`.
    fn on_transport_closed(self: &Arc<Self>, generation: u64, close: Option<(u16, String)>) {
        self.clear_pending(generation);

        {
            let mut transport = self.transport.lock();
            if self.current_generation() != generation {
                drop(transport);
                debug!(generation, "Superseded transport closed");
                self.lifecycle.lock().finish_closing();
                return;
            }
            if transport.as_ref().is_some_and(|t| t.generation == generation) {
                *transport = None;
            }
        }
        FeedMetrics::set_connected(false);

        let (code, reason) = close.unwrap_or((CLOSE_ABNORMAL, String::new()));
        info!(code, reason = %reason, "WebSocket disconnected");

        let (action, max_attempts) = {
            let mut lifecycle = self.lifecycle.lock();
            (lifecycle.on_disconnect(), lifecycle.policy().max_attempts())
        };

        match action {
            DisconnectAction::Stop => {
                debug!("Not reconnecting");
            }
            DisconnectAction::ScheduleRetry { attempt, delay } => {
                info!(
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    "Scheduling reconnection"
                );
                self.schedule_retry(generation, delay);
            }
            DisconnectAction::Exhausted => {
                error!(max_attempts, "Max reconnection attempts reached");
                self.dispatch.notify_connection_failed();
            }
        }
    }

    /// Reconnect after `delay` unless `close()` or a newer attempt
    /// intervenes.
    fn schedule_retry(self: &Arc<Self>, generation: u64, delay: Duration) {
        let token = self.retry_token.lock().clone();
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = token.cancelled() => {
                    debug!("Reconnect timer cancelled");
                    return;
                }
            }
            if inner.current_generation() != generation {
                debug!(generation, "Reconnect timer superseded");
                return;
            }
            inner.reconnect().await;
        });
    }

    /// Count the attempt, drop any live transport, and connect again.
    /// Failures are logged; the next retry is scheduled by the close path.
    fn reconnect(self: Arc<Self>) -> BoxFuture<'static, ()> {
        async move {
            let attempt = self.lifecycle.lock().begin_retry();
            FeedMetrics::record_reconnect();
            info!(attempt, "Attempting to reconnect");

            self.force_close_transport();
            match self.connect().await {
                Ok(()) => info!(attempt, "Reconnection successful"),
                Err(e) => warn!(attempt, error = %e, "Reconnection failed"),
            }
        }
        .boxed()
    }

    /// Close the live transport, if any, without triggering a retry.
    fn force_close_transport(&self) {
        let mut transport = self.transport.lock();
        if let Some(live) = transport.take() {
            self.generation.fetch_add(1, Ordering::SeqCst);
            live.close("Reconnecting");
        }
    }

    fn close(&self) {
        info!("Closing WebSocket connection");
        {
            let mut transport = self.transport.lock();
            self.generation.fetch_add(1, Ordering::SeqCst);
            let live = transport.take();
            self.lifecycle
                .lock()
                .close_intentionally(live.as_ref().is_some_and(Transport::is_open));
            if let Some(live) = live {
                live.close("Client initiated close");
            }
        }
        *self.pending.lock() = None;

        let mut token = self.retry_token.lock();
        token.cancel();
        *token = CancellationToken::new();
        FeedMetrics::set_connected(false);
    }

    /// Stamp and queue a message on the live transport.
    fn transmit(&self, message: &OutboundMessage) -> WsResult<()> {
        let transport = self.transport.lock();
        let live = transport
            .as_ref()
            .filter(|t| t.is_open())
            .ok_or(WsError::ConnectionUnavailable)?;
        if self.lifecycle.lock().state() != ConnectionState::Connected {
            return Err(WsError::ConnectionUnavailable);
        }

        let wire = message.stamp(&self.client_id, Utc::now());
        let text = serde_json::to_string(&wire)?;
        live.tx.try_send(WsOutbound::Text(text)).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                WsError::SendFailed("outbound queue full".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => WsError::ConnectionUnavailable,
        })?;
        debug!(kind = message.kind(), "Message queued");
        Ok(())
    }
}

async fn send_close(write: &mut WsSink, code: u16, reason: &str) {
    let frame = CloseFrame {
        code: CloseCode::from(code),
        reason: reason.to_string().into(),
    };
    if let Err(e) = write.send(Message::Close(Some(frame))).await {
        debug!(error = %e, "Failed to send close frame");
    }
}
