//! Basic type definitions for the session server
//!
//! Provides newtype wrappers for type safety:
//! - `ConnectionId`: server-assigned integer connection identifier
//! - `RoomCode`: 6-character alphanumeric room code

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Source of connection identifiers.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(0);

/// Length of a generated room code
pub const ROOM_CODE_LEN: usize = 6;

/// Unique connection identifier (newtype pattern)
///
/// Assigned once per accepted connection from a monotonic atomic counter,
/// so ids are never reused for the lifetime of the process.
/// Serializes as a plain integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ConnectionId(pub u64);

impl ConnectionId {
    /// Allocate the next connection ID
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Room code (6-character alphanumeric, case-sensitive)
///
/// Used to identify and join rooms. Generated randomly; not unique by
/// construction, the registry re-rolls on collision.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RoomCode(pub String);

impl RoomCode {
    /// Generate a new random 6-character room code
    ///
    /// Each character is drawn uniformly from `[a-zA-Z0-9]`.
    pub fn generate() -> Self {
        use rand::Rng;
        let code: String = rand::thread_rng()
            .sample_iter(&rand::distributions::Alphanumeric)
            .take(ROOM_CODE_LEN)
            .map(char::from)
            .collect();
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for RoomCode {
    fn from(code: String) -> Self {
        Self(code)
    }
}

impl From<&str> for RoomCode {
    fn from(code: &str) -> Self {
        Self(code.to_string())
    }
}

impl std::fmt::Display for RoomCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
