//! Message protocol definitions
//!
//! Every message in both directions is a JSON envelope of the form
//! `{"command": <string>, "data": {...}}`. Inbound envelopes are decoded
//! loosely and then validated field by field into a typed `ClientMessage`
//! before any room state is touched. Outbound messages use Serde's
//! adjacently tagged enum to produce the same envelope shape.

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::payload::{
    require_object, require_str, ClientState, DisasterMasterData, Fields, Goblin, SharedState,
};
use crate::room::SessionView;
use crate::types::{ConnectionId, RoomCode};

/// Message sent to clients when their room's host leaves
pub const ROOM_CLOSED_MESSAGE: &str = "Game closed";

/// Raw inbound envelope
#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub command: String,
    #[serde(default)]
    pub data: Fields,
}

/// Client → Server message, validated
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage<S, P> {
    /// Create a new room hosted by the sender
    Create { shared: S },
    /// Join an existing room by code
    Join { code: RoomCode, payload: P },
    /// Replace the sender's own payload in a room
    UpdatePlayer { code: RoomCode, payload: P },
    /// Replace a room's shared payload
    UpdateRoom { code: RoomCode, shared: S },
}

/// Client message carrying the bundled game's payloads
pub type SessionMessage = ClientMessage<DisasterMasterData, Goblin>;

impl<S: SharedState, P: ClientState> ClientMessage<S, P> {
    /// Decode and validate a text frame
    ///
    /// An undecodable envelope or unknown command yields `InvalidCommand`;
    /// the first absent or mistyped required field yields `MissingField`.
    pub fn parse(text: &str) -> Result<Self, AppError> {
        let envelope: Envelope =
            serde_json::from_str(text).map_err(|_| AppError::InvalidCommand)?;
        Self::from_envelope(envelope)
    }

    /// Validate an already decoded envelope
    pub fn from_envelope(envelope: Envelope) -> Result<Self, AppError> {
        let data = &envelope.data;
        match envelope.command.as_str() {
            "create" => Ok(Self::Create {
                shared: S::from_create(data)?,
            }),
            "join" => {
                let (code, payload) = code_and_payload(data)?;
                Ok(Self::Join { code, payload })
            }
            "updateplayer" => {
                let (code, payload) = code_and_payload(data)?;
                Ok(Self::UpdatePlayer { code, payload })
            }
            "updateroom" => {
                let code = RoomCode::from(require_str(data, "code")?);
                Ok(Self::UpdateRoom {
                    code,
                    shared: S::from_update(data)?,
                })
            }
            _ => Err(AppError::InvalidCommand),
        }
    }
}

fn code_and_payload<P: ClientState>(data: &Fields) -> Result<(RoomCode, P), AppError> {
    let code = RoomCode::from(require_str(data, "code")?);
    let payload = P::from_fields(require_object(data, P::KEY)?)?;
    Ok((code, payload))
}

/// Server → Client message
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "command", content = "data", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Current room state as seen by the recipient
    Update {
        #[serde(rename = "clientId")]
        client_id: ConnectionId,
        room: SessionView,
    },
    /// The room was closed by its host
    Quit { message: String },
    /// A command from this connection failed
    Error { message: String },
}

impl ServerMessage {
    /// Notice sent to remaining clients when the host leaves
    pub fn room_closed() -> Self {
        ServerMessage::Quit {
            message: ROOM_CLOSED_MESSAGE.to_string(),
        }
    }
}

/// Convert AppError to ServerMessage for client notification
impl From<AppError> for ServerMessage {
    fn from(err: AppError) -> Self {
        let message = match &err {
            AppError::WebSocket(_) | AppError::ChannelSend => "Internal error".to_string(),
            _ => err.to_string(),
        };
        ServerMessage::Error { message }
    }
}
