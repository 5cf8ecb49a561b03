//! WebSocket connection handler
//!
//! Handles individual connections: WebSocket handshake, command parsing,
//! and bidirectional communication with the SessionServer.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::client::outbound;
use crate::config::Config;
use crate::error::AppError;
use crate::message::{ClientMessage, SessionMessage};
use crate::server::{ServerCommand, SessionServer};
use crate::types::ConnectionId;

/// Start the SessionServer actor and accept connections forever
pub async fn serve(listener: TcpListener, config: Config) {
    let config = Arc::new(config);

    // Create SessionServer actor channel and start
    let (cmd_tx, cmd_rx) = mpsc::channel(config.command_buffer);
    tokio::spawn(SessionServer::new(cmd_rx).run());

    info!("SessionServer actor started");

    // Connection accept loop
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("New connection from {}", addr);
                let cmd_tx = cmd_tx.clone();
                let config = Arc::clone(&config);

                // Spawn handler task for each connection
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, cmd_tx, config).await {
                        error!("Connection handler error: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

/// Handle a new TCP connection
///
/// Performs the WebSocket handshake on the configured path, registers the
/// connection with the SessionServer, and runs its read and write loops.
/// The `Disconnect` sent when either loop ends is the connection's
/// terminal lifecycle event.
pub async fn handle_connection(
    stream: TcpStream,
    cmd_tx: mpsc::Sender<ServerCommand>,
    config: Arc<Config>,
) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    debug!("New TCP connection from {}", peer_addr);

    // WebSocket handshake, only on the endpoint path
    let ws_path = config.ws_path.clone();
    let check_path = move |req: &Request, resp: Response| {
        if req.uri().path() == ws_path {
            Ok(resp)
        } else {
            let mut refusal = ErrorResponse::new(Some("Not Found".to_string()));
            *refusal.status_mut() = StatusCode::NOT_FOUND;
            Err(refusal)
        }
    };
    let ws_stream = tokio_tungstenite::accept_hdr_async(stream, check_path).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let conn_id = ConnectionId::next();
    info!("Connection {} opened from {}", conn_id, peer_addr);

    // Create channel for server -> connection messages
    let (msg_tx, mut msg_rx) = outbound(config.outbound_buffer);

    // Register with SessionServer
    if cmd_tx
        .send(ServerCommand::Connect {
            conn_id,
            sender: msg_tx,
        })
        .await
        .is_err()
    {
        error!("Failed to register connection {} - server closed", conn_id);
        return Err(AppError::ChannelSend);
    }

    // Clone cmd_tx for read task
    let cmd_tx_read = cmd_tx.clone();

    // Spawn read task (WebSocket -> ServerCommand)
    let mut read_task = tokio::spawn(async move {
        while let Some(msg_result) = ws_receiver.next().await {
            let cmd = match msg_result {
                Ok(Message::Text(text)) => {
                    debug!("Text frame from {}", conn_id);
                    frame_to_command(conn_id, &text)
                }
                Ok(Message::Binary(_)) => ServerCommand::Reject {
                    conn_id,
                    error: AppError::UnableToRead,
                },
                Ok(Message::Close(_)) => {
                    debug!("Connection {} sent close frame", conn_id);
                    break;
                }
                Ok(_) => {
                    // Ping/Pong are answered by tungstenite
                    continue;
                }
                Err(e) => {
                    warn!("WebSocket error for {}: {}", conn_id, e);
                    break;
                }
            };
            if cmd_tx_read.send(cmd).await.is_err() {
                debug!("Server closed, ending read task for {}", conn_id);
                break;
            }
        }
        debug!("Read task ended for {}", conn_id);
    });

    // Spawn write task (ServerMessage -> WebSocket)
    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = msg_rx.recv().await {
            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if ws_sender.send(Message::Text(json.into())).await.is_err() {
                        debug!("WebSocket send failed, ending write task");
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to serialize message: {}", e);
                    // Continue - don't break on serialization errors
                }
            }
        }
        debug!("Write task ended for connection");

        // Send close frame when done
        let _ = ws_sender.close().await;
    });

    // Wait for either task to complete, then stop the other one
    tokio::select! {
        _ = &mut read_task => {
            debug!("Read task completed for {}", conn_id);
        }
        _ = &mut write_task => {
            debug!("Write task completed for {}", conn_id);
        }
    }
    read_task.abort();
    write_task.abort();

    // Send disconnect command
    let _ = cmd_tx.send(ServerCommand::Disconnect { conn_id }).await;

    info!("Connection {} closed", conn_id);

    Ok(())
}

/// Parse a text frame into the ServerCommand to run for it
///
/// Validation failures become a `Reject` so the actor reports them to
/// this connection alone.
fn frame_to_command(conn_id: ConnectionId, text: &str) -> ServerCommand {
    match SessionMessage::parse(text) {
        Ok(msg) => client_message_to_command(conn_id, msg),
        Err(error) => ServerCommand::Reject { conn_id, error },
    }
}

/// Convert a ClientMessage to a ServerCommand
fn client_message_to_command(conn_id: ConnectionId, msg: SessionMessage) -> ServerCommand {
    match msg {
        ClientMessage::Create { shared } => ServerCommand::Create { conn_id, shared },
        ClientMessage::Join { code, payload } => ServerCommand::Join {
            conn_id,
            code,
            player: payload,
        },
        ClientMessage::UpdatePlayer { code, payload } => ServerCommand::UpdatePlayer {
            conn_id,
            code,
            player: payload,
        },
        ClientMessage::UpdateRoom { code, shared } => ServerCommand::UpdateRoom {
            conn_id,
            code,
            shared,
        },
    }
}
