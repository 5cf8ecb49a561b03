//! Room struct definition
//!
//! Represents one live session: a host, zero or more clients in join
//! order, and the room-wide shared payload.

use serde::Serialize;

use crate::client::{Client, Outbound};
use crate::payload::{DisasterMasterData, Goblin};
use crate::types::{ConnectionId, RoomCode};

/// Room carrying the bundled game's payloads
pub type SessionRoom = Room<DisasterMasterData, Goblin>;

/// Room view carrying the bundled game's payloads
pub type SessionView = RoomView<DisasterMasterData, Goblin>;

/// Live session
///
/// The host is tracked through `host_id`/`host` only and never appears
/// in `clients`. Client ids are unique within `clients`.
#[derive(Debug)]
pub struct Room<S, P> {
    /// Room code for identification
    pub code: RoomCode,
    /// Connection that created the room
    pub host_id: ConnectionId,
    /// Host's outbound channel
    pub host: Outbound,
    /// Room-wide state
    pub shared: S,
    /// Members in join order
    pub clients: Vec<Client<P>>,
}

impl<S, P> Room<S, P> {
    /// Create a new room with the given code and host
    pub fn new(code: RoomCode, host_id: ConnectionId, host: Outbound, shared: S) -> Self {
        Self {
            code,
            host_id,
            host,
            shared,
            clients: Vec::new(),
        }
    }

    /// Check if a connection is a member (the host is not a member)
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.clients.iter().any(|c| c.id == id)
    }

    /// Append a member
    ///
    /// Returns false, leaving the room untouched, if the id is already
    /// present or is the host.
    pub fn add_client(&mut self, client: Client<P>) -> bool {
        if client.id == self.host_id || self.contains(client.id) {
            return false;
        }
        self.clients.push(client);
        true
    }

    /// Remove a member, preserving the order of the rest
    pub fn remove_client(&mut self, id: ConnectionId) -> Option<Client<P>> {
        let index = self.clients.iter().position(|c| c.id == id)?;
        Some(self.clients.remove(index))
    }

    /// Mutable access to a member
    pub fn client_mut(&mut self, id: ConnectionId) -> Option<&mut Client<P>> {
        self.clients.iter_mut().find(|c| c.id == id)
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }
}

impl<S: Clone, P: Clone> Room<S, P> {
    /// Snapshot with every member (what the host sees)
    pub fn view(&self) -> RoomView<S, P> {
        self.view_filtered(|_| true)
    }

    /// Snapshot as seen by a member: everyone except themselves
    pub fn view_for(&self, recipient: ConnectionId) -> RoomView<S, P> {
        self.view_filtered(|c| c.id != recipient)
    }

    fn view_filtered(&self, keep: impl Fn(&Client<P>) -> bool) -> RoomView<S, P> {
        RoomView {
            code: self.code.clone(),
            host_id: self.host_id,
            shared: self.shared.clone(),
            clients: self
                .clients
                .iter()
                .filter(|c| keep(*c))
                .map(|c| ClientView {
                    id: c.id,
                    payload: c.payload.clone(),
                })
                .collect(),
        }
    }
}

/// Serializable snapshot of a room
///
/// Channels are never part of a view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomView<S, P> {
    pub code: RoomCode,
    #[serde(rename = "hostId")]
    pub host_id: ConnectionId,
    #[serde(rename = "disasterMasterData")]
    pub shared: S,
    pub clients: Vec<ClientView<P>>,
}

/// Serializable snapshot of a member
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientView<P> {
    pub id: ConnectionId,
    #[serde(rename = "playerData")]
    pub payload: P,
}
