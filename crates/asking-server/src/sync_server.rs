//! Real-time sync server for Asking Card.
//!
//! This module hosts the WebSocket side: it accepts connections, checks
//! the browser origin, and runs one task per client. Each client task
//! forwards inbound events to the control loop and writes whatever the
//! registry queues for it back to the socket.

use crate::config::{OriginPolicy, SyncServerConfig};
use crate::control::{control_channel, ControlLoop, SyncServerHandle};
use crate::error::{Result, ServerError};
use crate::protocol::{CardRejectedPayload, ClientEvent, ErrorPayload, Frame, ServerEvent};
use asking_core::CardStore;
use asking_notify::{NoopNotifier, Notifier};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::{accept_hdr_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

// ─────────────────────────────────────────────────────────────────────────────
// SyncServer
// ─────────────────────────────────────────────────────────────────────────────

/// The card sync server.
///
/// This server:
/// - Owns the card store through a single control loop
/// - Hosts a WebSocket endpoint for client connections
/// - Sends each new client the current cards
/// - Broadcasts every create and delete to all clients
/// - Passes new cards to the notifier without waiting on it
pub struct SyncServer {
    config: SyncServerConfig,
    handle: SyncServerHandle,
    control: ControlLoop,
}

impl SyncServer {
    /// Creates a server with an empty store and no notifications.
    pub fn new(config: SyncServerConfig) -> Self {
        Self::with_store(config, CardStore::new(), Arc::new(NoopNotifier))
    }

    /// Creates a server around an existing store and notifier.
    pub fn with_store(
        config: SyncServerConfig,
        store: CardStore,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (handle, control) = control_channel(
            store,
            notifier,
            config.rules.clone(),
            config.command_capacity,
        );

        Self {
            config,
            handle,
            control,
        }
    }

    /// Returns a cloneable handle to the control loop.
    pub fn handle(&self) -> SyncServerHandle {
        self.handle.clone()
    }

    /// Starts only the control loop, without any network listener.
    pub fn spawn(self) -> SyncServerHandle {
        tokio::spawn(self.control.run());
        self.handle
    }

    /// Binds the configured address and serves forever.
    pub async fn run(self) -> Result<()> {
        let addr = self.config.addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        self.serve(listener).await
    }

    /// Serves WebSocket clients on an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let Self {
            config,
            handle,
            control,
        } = self;

        let local = listener.local_addr()?;
        info!("🌐 WebSocket server listening on ws://{}", local);
        match &config.origins {
            OriginPolicy::Any => info!("Accepting any origin"),
            OriginPolicy::AllowList(list) => info!("Allowed origins: {}", list.join(", ")),
        }

        tokio::spawn(control.run());

        let origins = Arc::new(config.origins);
        let capacity = config.outbound_capacity;

        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    debug!("🔌 New connection from {}", addr);
                    let handle = handle.clone();
                    let origins = origins.clone();

                    tokio::spawn(async move {
                        if let Err(e) = handle_client(stream, addr, handle, origins, capacity).await
                        {
                            warn!("Connection error from {}: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Client Connection Handler
// ─────────────────────────────────────────────────────────────────────────────

/// Handles a single WebSocket client connection.
async fn handle_client(
    stream: TcpStream,
    addr: SocketAddr,
    handle: SyncServerHandle,
    origins: Arc<OriginPolicy>,
    capacity: usize,
) -> Result<()> {
    let ws_stream = accept_hdr_async(stream, |req: &Request, resp: Response| {
        check_origin(&origins, req, resp)
    })
    .await?;
    let (mut write, mut read) = ws_stream.split();

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<Frame>(capacity);
    let conn = handle.connect(outbound_tx).await?;
    info!("✅ {} connected from {}", conn, addr);

    let result: Result<()> = async {
        loop {
            tokio::select! {
                // Incoming events from the client
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if let Some(reply) = process_message(&text, &handle).await? {
                                let json = serde_json::to_string(&reply)?;
                                write.send(Message::Text(json)).await?;
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(_))) => {
                            debug!("👋 {} disconnected gracefully", conn);
                            break;
                        }
                        Some(Err(e)) => {
                            warn!("⚠️  Error from {}: {}", conn, e);
                            break;
                        }
                        None => break,
                        _ => {}
                    }
                }

                // Frames queued by the control loop
                frame = outbound_rx.recv() => {
                    match frame {
                        Some(frame) => {
                            write.send(Message::Text(frame.to_string())).await?;
                        }
                        None => {
                            // Registry dropped us, usually for falling behind
                            warn!("{} dropped by the server", conn);
                            break;
                        }
                    }
                }
            }
        }
        Ok(())
    }
    .await;

    handle.disconnect(conn).await;
    info!("🔌 Connection closed: {} ({})", conn, addr);
    result
}

/// Handles one inbound text frame.
///
/// Returns the event to send back to this client only, if any. Successful
/// mutations produce no direct reply; the client hears about them through
/// the broadcast like everyone else.
async fn process_message(text: &str, handle: &SyncServerHandle) -> Result<Option<ServerEvent>> {
    let event = match ClientEvent::parse(text) {
        Ok(event) => event,
        Err(e) => {
            debug!("Unparseable frame: {}", e);
            return Ok(Some(ServerEvent::Error(ErrorPayload {
                message: format!("Invalid event: {}", e),
            })));
        }
    };

    match event {
        ClientEvent::CreateCard(request) => match handle.create_card(request).await {
            Ok(_) => Ok(None),
            Err(ServerError::Rejected(e)) => Ok(Some(ServerEvent::CardRejected(
                CardRejectedPayload::from(&e),
            ))),
            Err(e) => Err(e),
        },
        ClientEvent::DeleteCard(payload) => {
            handle.delete_card(payload.id).await?;
            Ok(None)
        }
    }
}

/// Handshake callback enforcing the origin policy.
#[allow(clippy::result_large_err)]
fn check_origin(
    origins: &OriginPolicy,
    req: &Request,
    resp: Response,
) -> std::result::Result<Response, ErrorResponse> {
    let origin = req
        .headers()
        .get("origin")
        .and_then(|value| value.to_str().ok());

    if origins.allows(origin) {
        return Ok(resp);
    }

    warn!("Rejected handshake from origin {:?}", origin);
    let mut denied = ErrorResponse::new(Some("Origin not allowed".to_string()));
    *denied.status_mut() = StatusCode::FORBIDDEN;
    Err(denied)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
