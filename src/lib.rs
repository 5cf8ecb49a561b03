//! Realtime Room Synchronization Server Library
//!
//! A WebSocket server built with tokio-tungstenite that keeps every
//! participant of a shared room in sync with server-held state.
//!
//! # Features
//! - Room creation with 6-character alphanumeric codes
//! - Joining by code, with automatic departure from any previous room
//! - Per-client and room-wide state updates
//! - Broadcast of every change to the whole room (clients never see
//!   themselves in the member list, the host sees everyone)
//! - Room teardown when the host disconnects
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `SessionServer` is the central actor owning the `RoomRegistry`
//! - Each connection has a `handler` task communicating with the server
//! - No locks needed - all state access goes through message passing
//!
//! # Example
//! ```ignore
//! use tokio::net::TcpListener;
//! use room_sync::{serve, Config};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::default();
//!     let listener = TcpListener::bind(&config.addr).await.unwrap();
//!     serve(listener, config).await;
//! }
//! ```

pub mod broadcast;
pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod message;
pub mod payload;
pub mod registry;
pub mod room;
pub mod server;
pub mod types;

// Re-export main types for convenience
pub use client::{outbound, Client, Outbound, OutboundReceiver};
pub use config::Config;
pub use error::{AppError, SendError};
pub use handler::{handle_connection, serve};
pub use message::{ClientMessage, ServerMessage, SessionMessage};
pub use payload::{ClientState, DisasterMasterData, Goblin, SharedState};
pub use registry::{JoinOutcome, RoomRegistry};
pub use room::{Room, RoomView, SessionRoom};
pub use server::{ServerCommand, SessionServer};
pub use types::{ConnectionId, RoomCode};
