//! Error types for the session server
//!
//! Defines application-level errors and message send errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Application-level errors
///
/// Covers both fatal errors (connection termination) and
/// business errors (send error message to client).
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol error (fatal)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Channel send error (fatal - internal channel broken)
    #[error("Channel send error")]
    ChannelSend,

    /// Room not found with the given code
    #[error("Room not found: {0}")]
    RoomNotFound(String),

    /// Room code already taken. Reserved.
    #[error("Room already exists")]
    RoomAlreadyExists,

    /// Room capacity reached. Reserved, rooms are unbounded.
    #[error("Room is full")]
    RoomFull,

    /// Unknown command or undecodable envelope
    #[error("Invalid command")]
    InvalidCommand,

    /// A required field is absent or has the wrong type
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// Outbound message could not be delivered
    #[error("Unable to write")]
    UnableToWrite,

    /// Inbound frame could not be read as a command
    #[error("Unable to read")]
    UnableToRead,

    /// Connection is not a member of the addressed room
    #[error("Not a member of room {0}")]
    NotInRoom(String),

    /// Code generation kept colliding with live rooms
    #[error("No free room code available")]
    CodesExhausted,
}

/// Message send errors
///
/// Occurs when attempting to send messages through closed channels.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,

    /// The receiving end is not keeping up
    #[error("Channel full")]
    ChannelFull,
}
