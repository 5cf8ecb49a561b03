//! Room state fan-out
//!
//! Every client receives the room with themselves filtered out of
//! `clients`; the host receives the full member list. Updates to a slow
//! reader are coalesced by its outbound channel, so only a closed
//! connection misses one. A failed recipient is told about the failure on
//! its own connection (if that is still possible) and the rest still get
//! their update.

use tracing::{debug, warn};

use crate::client::Client;
use crate::error::{AppError, SendError};
use crate::message::ServerMessage;
use crate::payload::Goblin;
use crate::room::SessionRoom;

/// Push the current state of `room` to every participant
///
/// Returns the number of participants the update was delivered to.
pub fn broadcast(room: &SessionRoom) -> usize {
    let mut delivered = 0;

    for client in &room.clients {
        let msg = ServerMessage::Update {
            client_id: client.id,
            room: room.view_for(client.id),
        };
        match client.send(msg) {
            Ok(()) => delivered += 1,
            Err(e) => report_to_client(client, e),
        }
    }

    let msg = ServerMessage::Update {
        client_id: room.host_id,
        room: room.view(),
    };
    match room.host.deliver(msg) {
        Ok(()) => delivered += 1,
        Err(e) => {
            warn!(
                "Failed to update host {} of room {}: {}",
                room.host_id, room.code, e
            );
            if let Err(e) = room.host.deliver(AppError::UnableToWrite.into()) {
                debug!("Could not report write failure to {}: {}", room.host_id, e);
            }
        }
    }

    debug!(
        "Broadcast room {} to {}/{} participants",
        room.code,
        delivered,
        room.client_count() + 1
    );
    delivered
}

/// Tell every remaining client that their room is gone
///
/// The room must already be out of the registry. Returns the number of
/// clients notified.
pub fn close_room(room: &SessionRoom) -> usize {
    let mut notified = 0;
    for client in &room.clients {
        match client.send(ServerMessage::room_closed()) {
            Ok(()) => notified += 1,
            Err(e) => report_to_client(client, e),
        }
        client.forget(&room.code);
    }
    debug!("Room {} closed, {} clients notified", room.code, notified);
    notified
}

fn report_to_client(client: &Client<Goblin>, err: SendError) {
    warn!("Failed to write to connection {}: {}", client.id, err);
    if let Err(e) = client.send(AppError::UnableToWrite.into()) {
        debug!("Could not report write failure to {}: {}", client.id, e);
    }
}
