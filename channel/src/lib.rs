//! Correlated socket channel for the dashboard sync protocol.
//!
//! [`SyncChannel`] multiplexes one WebSocket connection into many logical
//! exchanges: persistent push subscriptions keyed by message tag, and
//! one-shot request/response pairs correlated by the same tag. A background
//! task owns the connection and reconnects with capped exponential backoff
//! until the channel is closed.
//!
//! ERROR HANDLING
//! ==============
//! Connection failures never escape the background task; they fail in-flight
//! requests, flip the status stream, and the reconnect loop recovers.
//! Undecodable inbound frames are logged at warn and dropped; a bad frame
//! never takes the connection down.

mod backoff;
mod router;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::{SinkExt, StreamExt};
use messages::{Message, decode_message, encode_message};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use crate::backoff::Backoff;
use crate::router::{Router, SubscriberId};

/// Error surfaced by [`SyncChannel`] operations.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The connection dropped before a reply arrived. In-flight requests
    /// fail fast rather than silently spanning a reconnect.
    #[error("connection closed before a reply arrived")]
    ConnectionClosed,
    /// The channel was explicitly closed.
    #[error("sync channel is closed")]
    Closed,
}

/// Connection state surfaced to consumers (e.g. a status badge).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    Disconnected,
}

/// Configuration for [`SyncChannel::open`].
#[derive(Clone, Debug)]
pub struct ChannelConfig {
    /// WebSocket endpoint, e.g. `ws://127.0.0.1:8000/sync`.
    pub endpoint: String,
}

impl ChannelConfig {
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

/// One owned, self-reconnecting connection to the dashboard sync endpoint.
///
/// Construct once at startup with [`SyncChannel::open`] and inject wherever
/// the connection is needed; tear down with [`SyncChannel::close`].
pub struct SyncChannel {
    outbound: mpsc::UnboundedSender<Message>,
    router: Arc<Mutex<Router>>,
    status_tx: Arc<watch::Sender<ConnectionStatus>>,
    status_rx: watch::Receiver<ConnectionStatus>,
    task: tokio::task::JoinHandle<()>,
}

impl SyncChannel {
    /// Open the channel and start its connection task.
    ///
    /// Returns immediately; use [`SyncChannel::wait_connected`] or
    /// [`SyncChannel::status`] to observe readiness. Messages sent before the
    /// link is up are queued and flushed once it is.
    #[must_use]
    pub fn open(config: ChannelConfig) -> Self {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let router = Arc::new(Mutex::new(Router::new()));
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Connecting);
        let status_tx = Arc::new(status_tx);

        let task = tokio::spawn(connection_loop(
            config,
            Arc::clone(&router),
            outbound_rx,
            Arc::clone(&status_tx),
        ));

        Self {
            outbound,
            router,
            status_tx,
            status_rx,
            task,
        }
    }

    /// Send `message` and resolve with the first subsequent inbound message
    /// carrying the same tag.
    ///
    /// Consumption is exclusive: the reply that resolves this request is not
    /// replayed to subscribers of the same tag. A reply whose payload encodes
    /// a server-side failure still resolves; interpreting it is the caller's
    /// business.
    ///
    /// # Errors
    ///
    /// [`ChannelError::ConnectionClosed`] when the connection drops before
    /// the reply arrives; [`ChannelError::Closed`] when the channel has been
    /// closed.
    pub async fn request(&self, message: Message) -> Result<Message, ChannelError> {
        let (waiter_tx, waiter_rx) = oneshot::channel();
        {
            let mut router = lock_router(&self.router);
            if router.is_closed() {
                return Err(ChannelError::Closed);
            }
            router.register_pending(message.action.clone(), waiter_tx);
        }

        if self.outbound.send(message).is_err() {
            return Err(ChannelError::Closed);
        }

        waiter_rx.await.map_err(|_| ChannelError::ConnectionClosed)
    }

    /// Register for every inbound message tagged `action`.
    ///
    /// Subscriptions survive reconnects without re-registration. Dropping the
    /// returned handle unregisters the subscriber.
    #[must_use]
    pub fn subscribe(&self, action: impl Into<String>) -> Subscription {
        let action = action.into();
        let (id, rx) = lock_router(&self.router).subscribe(action.clone());
        Subscription {
            action,
            id,
            rx,
            router: Arc::clone(&self.router),
        }
    }

    /// Watch the connection status.
    #[must_use]
    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_rx.clone()
    }

    /// Wait until the channel reports [`ConnectionStatus::Connected`].
    ///
    /// # Errors
    ///
    /// [`ChannelError::Closed`] when the channel is closed before (or while)
    /// waiting.
    pub async fn wait_connected(&self) -> Result<(), ChannelError> {
        let mut status = self.status_rx.clone();
        loop {
            if lock_router(&self.router).is_closed() {
                return Err(ChannelError::Closed);
            }
            if *status.borrow_and_update() == ConnectionStatus::Connected {
                return Ok(());
            }
            if status.changed().await.is_err() {
                return Err(ChannelError::Closed);
            }
        }
    }

    /// Close the channel: stop the connection task, fail in-flight requests,
    /// and end every subscription stream.
    pub fn close(&self) {
        self.task.abort();
        lock_router(&self.router).close();
        self.status_tx.send_replace(ConnectionStatus::Disconnected);
    }
}

impl Drop for SyncChannel {
    fn drop(&mut self) {
        self.close();
    }
}

/// Owned handle to a push subscription. Dropping it unregisters the
/// subscriber, so scoped acquisition is the idiomatic pattern for short-lived
/// consumers.
pub struct Subscription {
    action: String,
    id: SubscriberId,
    rx: mpsc::UnboundedReceiver<Message>,
    router: Arc<Mutex<Router>>,
}

impl Subscription {
    /// Tag this subscription is registered for.
    #[must_use]
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Receive the next matching message, in arrival order.
    ///
    /// Returns `None` once the channel is closed.
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        lock_router(&self.router).unsubscribe(&self.action, self.id);
    }
}

fn lock_router(router: &Arc<Mutex<Router>>) -> MutexGuard<'_, Router> {
    router.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// CONNECTION TASK
// =============================================================================

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Why [`drive`] returned.
enum DriveEnd {
    ServerClosed,
    TransportError,
    /// Every channel handle is gone; nothing can be sent anymore.
    OutboundClosed,
}

impl DriveEnd {
    fn as_str(&self) -> &'static str {
        match self {
            Self::ServerClosed => "server closed",
            Self::TransportError => "transport error",
            Self::OutboundClosed => "handle dropped",
        }
    }
}

async fn connection_loop(
    config: ChannelConfig,
    router: Arc<Mutex<Router>>,
    mut outbound_rx: mpsc::UnboundedReceiver<Message>,
    status: Arc<watch::Sender<ConnectionStatus>>,
) {
    let mut backoff = Backoff::new();

    loop {
        status.send_replace(ConnectionStatus::Connecting);

        let mut handle_gone = false;
        match connect_async(config.endpoint.as_str()).await {
            Ok((stream, _)) => {
                info!(endpoint = %config.endpoint, "sync socket connected");
                status.send_replace(ConnectionStatus::Connected);
                backoff.reset();

                let end = drive(stream, &router, &mut outbound_rx).await;
                info!(reason = end.as_str(), "sync socket disconnected");
                handle_gone = matches!(end, DriveEnd::OutboundClosed);
            }
            Err(error) => {
                warn!(error = %error, endpoint = %config.endpoint, "sync socket connect failed");
            }
        }

        status.send_replace(ConnectionStatus::Disconnected);
        // Only waiters pending at disconnect time fail; outbound messages
        // queued while the link is down flush after the next connect.
        lock_router(&router).fail_pending();

        if handle_gone {
            return;
        }
        tokio::time::sleep(backoff.next_delay()).await;
    }
}

/// Pump one live connection until it ends: forward queued outbound messages
/// to the socket and dispatch inbound frames through the router.
async fn drive(
    mut stream: WsStream,
    router: &Arc<Mutex<Router>>,
    outbound_rx: &mut mpsc::UnboundedReceiver<Message>,
) -> DriveEnd {
    loop {
        tokio::select! {
            outgoing = outbound_rx.recv() => {
                let Some(message) = outgoing else {
                    return DriveEnd::OutboundClosed;
                };
                let text = encode_message(&message);
                if let Err(error) = stream.send(WsMessage::text(text)).await {
                    warn!(error = %error, "sync socket send failed");
                    return DriveEnd::TransportError;
                }
            }
            incoming = stream.next() => {
                match incoming {
                    Some(Ok(WsMessage::Text(text))) => {
                        match decode_message(text.as_str()) {
                            Ok(message) => {
                                let delivery = lock_router(router).dispatch(message);
                                debug!(?delivery, "dispatched sync message");
                            }
                            Err(error) => {
                                warn!(error = %error, "dropping undecodable sync message");
                            }
                        }
                    }
                    Some(Ok(WsMessage::Close(_))) | None => {
                        return DriveEnd::ServerClosed;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        warn!(error = %error, "sync socket receive failed");
                        return DriveEnd::TransportError;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
