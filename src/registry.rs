//! Room registry
//!
//! Owns every live room, keyed by code, and enforces the membership
//! invariants:
//! - room codes are unique among live rooms
//! - a connection is a client of at most one room
//! - a host is never a client of its own room
//!
//! The registry itself is plain data. It is owned by the `SessionServer`
//! actor, which is what serializes access from concurrent connections.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::client::{Client, Outbound};
use crate::error::AppError;
use crate::room::Room;
use crate::types::{ConnectionId, RoomCode};

/// How many codes to try before giving up on room creation
pub const MAX_CODE_ATTEMPTS: usize = 64;

/// Result of a successful join
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Added to the room, after leaving `previous` if it was elsewhere
    Joined { previous: Option<RoomCode> },
    /// Already a participant; nothing changed
    Unchanged,
}

/// All live rooms
#[derive(Debug)]
pub struct RoomRegistry<S, P> {
    rooms: HashMap<RoomCode, Room<S, P>>,
}

impl<S, P> Default for RoomRegistry<S, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, P> RoomRegistry<S, P> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            rooms: HashMap::new(),
        }
    }

    /// Create a room under a fresh random code
    pub fn create_room(
        &mut self,
        host: Outbound,
        host_id: ConnectionId,
        shared: S,
    ) -> Result<&Room<S, P>, AppError> {
        self.create_room_with(RoomCode::generate, host, host_id, shared)
    }

    /// Create a room, drawing codes from `generate` until one is free
    pub fn create_room_with(
        &mut self,
        mut generate: impl FnMut() -> RoomCode,
        host: Outbound,
        host_id: ConnectionId,
        shared: S,
    ) -> Result<&Room<S, P>, AppError> {
        let code = (0..MAX_CODE_ATTEMPTS)
            .map(|_| generate())
            .find(|code| !self.rooms.contains_key(code))
            .ok_or(AppError::CodesExhausted)?;

        info!("Connection {} created room {}", host_id, code);
        let room = Room::new(code.clone(), host_id, host, shared);
        Ok(&*self.rooms.entry(code).or_insert(room))
    }

    /// Delete a room; no-op if it does not exist
    pub fn remove_room(&mut self, code: &RoomCode) -> Option<Room<S, P>> {
        let room = self.rooms.remove(code)?;
        info!("Room {} removed", code);
        Some(room)
    }

    /// Look up a live room
    pub fn get_room(&self, code: &RoomCode) -> Result<&Room<S, P>, AppError> {
        self.rooms
            .get(code)
            .ok_or_else(|| AppError::RoomNotFound(code.to_string()))
    }

    fn get_room_mut(&mut self, code: &RoomCode) -> Result<&mut Room<S, P>, AppError> {
        self.rooms
            .get_mut(code)
            .ok_or_else(|| AppError::RoomNotFound(code.to_string()))
    }

    /// Add a connection to a room as a client
    ///
    /// Joining a room the connection already participates in (as client
    /// or host) changes nothing. Otherwise the connection first leaves
    /// whatever room it was a client of.
    pub fn join_room(
        &mut self,
        code: &RoomCode,
        id: ConnectionId,
        sender: &Outbound,
        payload: P,
    ) -> Result<JoinOutcome, AppError> {
        let room = self.get_room(code)?;
        if room.host_id == id || room.contains(id) {
            return Ok(JoinOutcome::Unchanged);
        }

        let previous = self.remove_client(id);
        let room = self.get_room_mut(code)?;
        room.add_client(Client::new(id, sender, payload));
        info!("Connection {} joined room {}", id, code);

        Ok(JoinOutcome::Joined { previous })
    }

    /// Remove a connection from whichever room it is a client of
    ///
    /// Returns the code of the room it left.
    pub fn remove_client(&mut self, id: ConnectionId) -> Option<RoomCode> {
        let room = self.rooms.values_mut().find(|room| room.contains(id))?;
        room.remove_client(id);
        debug!("Connection {} left room {}", id, room.code);
        Some(room.code.clone())
    }

    /// Replace a room's shared payload
    pub fn update_room_payload(
        &mut self,
        code: &RoomCode,
        shared: S,
    ) -> Result<&Room<S, P>, AppError> {
        let room = self.get_room_mut(code)?;
        room.shared = shared;
        Ok(&*room)
    }

    /// Replace a client's own payload
    ///
    /// Fails with `NotInRoom` if `id` is not a client of the room.
    pub fn update_client_payload(
        &mut self,
        code: &RoomCode,
        id: ConnectionId,
        payload: P,
    ) -> Result<(), AppError> {
        let room = self.get_room_mut(code)?;
        let client = room
            .client_mut(id)
            .ok_or_else(|| AppError::NotInRoom(code.to_string()))?;
        client.payload = payload;
        Ok(())
    }

    /// The room a connection is currently a client of
    pub fn room_of(&self, id: ConnectionId) -> Option<&RoomCode> {
        self.rooms
            .values()
            .find(|room| room.contains(id))
            .map(|room| &room.code)
    }

    /// Codes of every room hosted by a connection
    pub fn rooms_hosted_by(&self, id: ConnectionId) -> Vec<RoomCode> {
        self.rooms
            .values()
            .filter(|room| room.host_id == id)
            .map(|room| room.code.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}
