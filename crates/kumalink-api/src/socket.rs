//! Socket.IO client over WebSocket with auto-reconnect.
//!
//! Connects to the monitoring server's `/socket.io/` endpoint, performs
//! the Engine.IO and namespace handshakes, answers server pings, and
//! delivers [`ChannelEvent`]s through a single ordered [`mpsc`] queue.
//! Requests are correlated with replies through Socket.IO ack ids.
//! Reconnection uses exponential backoff + jitter.
//!
//! # Example
//!
//! ```rust,ignore
//! use kumalink_api::{ChannelEvent, ReconnectConfig, SocketHandle, Emitter};
//! use tokio_util::sync::CancellationToken;
//!
//! let server = url::Url::parse("http://localhost:3001")?;
//! let (handle, mut events) = SocketHandle::spawn(&server, ReconnectConfig::default(), CancellationToken::new())?;
//!
//! while let Some(event) = events.recv().await {
//!     if matches!(event, ChannelEvent::Connected) {
//!         let reply = handle.request("loginByToken", vec![token.into()], Duration::from_secs(30)).await?;
//!     }
//! }
//!
//! handle.shutdown();
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::{Sink, SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::emitter::Emitter;
use crate::error::Error;
use crate::event::PushEvent;
use crate::packet::{Packet, SocketPacket};

// ── Channel capacities ───────────────────────────────────────────────

const EVENT_CHANNEL_CAPACITY: usize = 1024;
const OUTBOUND_CHANNEL_CAPACITY: usize = 64;

/// How long the server gets to send the Engine.IO open packet.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(20);

// ── ChannelEvent ─────────────────────────────────────────────────────

/// What the socket task reports to its consumer, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// The namespace handshake completed (terminal "connect").
    Connected,
    /// A previously connected link dropped (terminal "disconnect").
    Disconnected,
    /// A server push.
    Push(PushEvent),
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 5s.
    pub max_delay: Duration,

    /// Maximum consecutive failed attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            max_retries: None,
        }
    }
}

// ── Endpoint ─────────────────────────────────────────────────────────

/// Derive the Engine.IO WebSocket endpoint from a server base URL.
///
/// `http://host:3001` becomes `ws://host:3001/socket.io/?EIO=4&transport=websocket`;
/// a base path (reverse proxy prefix) is preserved.
pub fn socket_url(server: &Url) -> Result<Url, Error> {
    let scheme = match server.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(Error::UnsupportedScheme {
                scheme: other.to_owned(),
            });
        }
    };

    let mut url = server.clone();
    url.set_scheme(scheme).map_err(|()| Error::UnsupportedScheme {
        scheme: server.scheme().to_owned(),
    })?;
    let path = format!("{}/socket.io/", url.path().trim_end_matches('/'));
    url.set_path(&path);
    url.set_query(Some("EIO=4&transport=websocket"));
    url.set_fragment(None);
    Ok(url)
}

// ── SocketHandle ─────────────────────────────────────────────────────

/// State shared between the handle and the background task.
struct Shared {
    connected: AtomicBool,
    next_id: AtomicU64,
    pending: DashMap<u64, oneshot::Sender<Vec<Value>>>,
    outbound: mpsc::Sender<String>,
}

/// Handle to a running socket.
///
/// Emits requests through the background task; the consumer side of the
/// event queue is returned separately by [`spawn`](Self::spawn).
pub struct SocketHandle {
    shared: Arc<Shared>,
    cancel: CancellationToken,
}

impl SocketHandle {
    /// Spawn the connection loop for `server` and return immediately.
    ///
    /// The first connection attempt happens asynchronously; watch the
    /// returned receiver for [`ChannelEvent::Connected`].
    pub fn spawn(
        server: &Url,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) -> Result<(Self, mpsc::Receiver<ChannelEvent>), Error> {
        let url = socket_url(server)?;
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CHANNEL_CAPACITY);

        let shared = Arc::new(Shared {
            connected: AtomicBool::new(false),
            next_id: AtomicU64::new(0),
            pending: DashMap::new(),
            outbound: outbound_tx,
        });

        let task_shared = Arc::clone(&shared);
        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            socket_loop(url, task_shared, outbound_rx, event_tx, reconnect, task_cancel).await;
        });

        Ok((Self { shared, cancel }, event_rx))
    }

    /// Number of requests still waiting for a reply.
    pub fn pending_requests(&self) -> usize {
        self.shared.pending.len()
    }

    /// Signal the background task to disconnect and stop.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

/// Removes a pending entry when the request future completes or is dropped.
struct PendingGuard<'a> {
    pending: &'a DashMap<u64, oneshot::Sender<Vec<Value>>>,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending.remove(&self.id);
    }
}

#[async_trait]
impl Emitter for SocketHandle {
    async fn request(
        &self,
        event: &str,
        args: Vec<Value>,
        timeout: Duration,
    ) -> Result<Vec<Value>, Error> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        if !self.is_connected() {
            return Err(Error::Disconnected);
        }

        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.shared.pending.insert(id, tx);
        let _guard = PendingGuard {
            pending: &self.shared.pending,
            id,
        };

        // The link may have dropped between the check above and the insert.
        if !self.is_connected() {
            return Err(Error::Disconnected);
        }

        let frame = Packet::event(Some(id), event, args).encode();
        self.shared
            .outbound
            .send(frame)
            .await
            .map_err(|_| Error::Cancelled)?;
        tracing::debug!(event, id, "request sent");

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Error::Cancelled),
            reply = tokio::time::timeout(timeout, rx) => match reply {
                Ok(Ok(args)) => Ok(args),
                // Sender dropped: the link went down before the ack.
                Ok(Err(_)) => Err(Error::Disconnected),
                Err(_) => {
                    tracing::warn!(
                        event,
                        id,
                        timeout_secs = timeout.as_secs(),
                        "request timed out"
                    );
                    Err(Error::Timeout {
                        timeout_secs: timeout.as_secs(),
                    })
                }
            },
        }
    }

    fn emit(&self, event: &str, args: Vec<Value>) -> Result<(), Error> {
        if !self.is_connected() {
            return Err(Error::Disconnected);
        }
        let frame = Packet::event(None, event, args).encode();
        self.shared.outbound.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                Error::Protocol("outbound queue is full".into())
            }
            mpsc::error::TrySendError::Closed(_) => Error::Cancelled,
        })
    }

    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: connect → run → on drop, backoff → reconnect.
async fn socket_loop(
    url: Url,
    shared: Arc<Shared>,
    mut outbound_rx: mpsc::Receiver<String>,
    event_tx: mpsc::Sender<ChannelEvent>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        let result = connect_and_run(&url, &shared, &mut outbound_rx, &event_tx, &cancel).await;

        if mark_disconnected(&shared, &mut outbound_rx) {
            // A link that got as far as "connected" resets the backoff.
            attempt = 0;
            if event_tx.send(ChannelEvent::Disconnected).await.is_err() {
                break;
            }
        }

        if cancel.is_cancelled() {
            break;
        }

        match result {
            Ok(()) => tracing::info!("Socket closed, reconnecting"),
            Err(e) => tracing::warn!(error = %e, attempt, "Socket error"),
        }

        if let Some(max) = reconnect.max_retries {
            if attempt >= max {
                tracing::error!(max_retries = max, "Reconnection limit reached, giving up");
                break;
            }
        }

        let delay = calculate_backoff(attempt, &reconnect);
        tracing::info!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            attempt,
            "Waiting before reconnect"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }

        attempt = attempt.saturating_add(1);
    }

    mark_disconnected(&shared, &mut outbound_rx);
    tracing::debug!("Socket loop exiting");
}

/// Flip to disconnected, fail outstanding requests and drop queued frames.
/// Returns whether the link had been connected.
fn mark_disconnected(shared: &Shared, outbound_rx: &mut mpsc::Receiver<String>) -> bool {
    let was_connected = shared.connected.swap(false, Ordering::AcqRel);
    // Dropping the senders resolves every waiter with `Disconnected`.
    shared.pending.clear();
    while outbound_rx.try_recv().is_ok() {}
    was_connected
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Establish one connection and service it until it drops.
async fn connect_and_run(
    url: &Url,
    shared: &Shared,
    outbound_rx: &mut mpsc::Receiver<String>,
    event_tx: &mpsc::Sender<ChannelEvent>,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    tracing::info!(url = %url, "Connecting to socket");

    let (ws_stream, _response) = tokio::select! {
        biased;
        () = cancel.cancelled() => return Ok(()),
        result = tokio_tungstenite::connect_async(url.as_str()) => {
            result.map_err(|e| Error::WebSocketConnect(e.to_string()))?
        }
    };

    tracing::debug!("WebSocket open, awaiting engine.io handshake");

    let (mut write, mut read) = ws_stream.split();
    let mut liveness = HANDSHAKE_TIMEOUT;
    let mut deadline = Instant::now() + liveness;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                // Best effort: tell the server we are leaving.
                let bye = Packet::Message(SocketPacket::Disconnect).encode();
                let _ = send_frame(&mut write, bye).await;
                let _ = write.close().await;
                return Ok(());
            }
            () = tokio::time::sleep_until(deadline) => {
                return Err(Error::Timeout { timeout_secs: liveness.as_secs() });
            }
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let packet = match Packet::decode(text.as_str()) {
                        Ok(packet) => packet,
                        Err(e) => {
                            tracing::debug!(error = %e, "Ignoring undecodable frame");
                            continue;
                        }
                    };

                    match packet {
                        Packet::Open(handshake) => {
                            liveness = handshake.liveness_window();
                            deadline = Instant::now() + liveness;
                            tracing::debug!(
                                sid = %handshake.sid,
                                ping_interval_ms = handshake.ping_interval,
                                "Engine.IO handshake"
                            );
                            let connect = Packet::Message(SocketPacket::Connect(None)).encode();
                            send_frame(&mut write, connect).await?;
                        }
                        Packet::Ping(data) => {
                            deadline = Instant::now() + liveness;
                            send_frame(&mut write, Packet::Pong(data).encode()).await?;
                        }
                        Packet::Close => {
                            tracing::info!("Server closed the engine.io session");
                            return Ok(());
                        }
                        Packet::Message(message) => {
                            if !dispatch_message(message, shared, event_tx).await? {
                                return Ok(());
                            }
                        }
                        Packet::Pong(_) | Packet::Upgrade | Packet::Noop => {}
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    let Some(cf) = frame else {
                        tracing::info!("WebSocket close frame received (no payload)");
                        return Ok(());
                    };
                    return Err(Error::WebSocketClosed {
                        code: u16::from(cf.code),
                        reason: cf.reason.as_str().to_owned(),
                    });
                }
                Some(Err(e)) => {
                    return Err(Error::WebSocketConnect(e.to_string()));
                }
                None => {
                    tracing::info!("WebSocket stream ended");
                    return Ok(());
                }
                Some(Ok(_)) => {
                    // Binary, Ping, Pong, Frame -- tungstenite answers pings itself
                }
            },
            Some(frame) = outbound_rx.recv() => {
                send_frame(&mut write, frame).await?;
            }
        }
    }
}

/// Act on one Socket.IO packet. Returns `false` when the server ended
/// the namespace session.
async fn dispatch_message(
    message: SocketPacket,
    shared: &Shared,
    event_tx: &mpsc::Sender<ChannelEvent>,
) -> Result<bool, Error> {
    match message {
        SocketPacket::Connect(_) => {
            shared.connected.store(true, Ordering::Release);
            tracing::info!("Socket connected");
            event_tx
                .send(ChannelEvent::Connected)
                .await
                .map_err(|_| Error::Cancelled)?;
        }
        SocketPacket::Disconnect => {
            tracing::info!("Server disconnected the socket");
            return Ok(false);
        }
        SocketPacket::ConnectError(data) => {
            let message = data
                .get("message")
                .and_then(Value::as_str)
                .map_or_else(|| data.to_string(), str::to_owned);
            return Err(Error::ConnectRefused { message });
        }
        SocketPacket::Event { name, args, .. } => match PushEvent::from_event(&name, args) {
            Ok(event) => {
                tracing::trace!(event = event.name(), "push event");
                event_tx
                    .send(ChannelEvent::Push(event))
                    .await
                    .map_err(|_| Error::Cancelled)?;
            }
            Err(e) => tracing::warn!(error = %e, "Dropping malformed push event"),
        },
        SocketPacket::Ack { id, args } => match shared.pending.remove(&id) {
            Some((_, tx)) => {
                // The requester may have given up already.
                let _ = tx.send(args);
            }
            None => tracing::debug!(id, "Ack for an unknown or expired request"),
        },
    }
    Ok(true)
}

async fn send_frame<S>(write: &mut S, frame: String) -> Result<(), Error>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    tracing::trace!(%frame, "sending frame");
    write
        .send(Message::Text(frame.into()))
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) + jitter`
///
/// Jitter is +-25% to spread out reconnection storms from many dashboards.
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic "jitter" seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────
