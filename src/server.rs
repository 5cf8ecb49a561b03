//! SessionServer Actor implementation
//!
//! The central actor that owns the room registry and every connection's
//! outbound channel. Commands from all connection handlers arrive on a
//! single mpsc channel and are processed one at a time, so every registry
//! operation, together with the broadcast that follows it, is atomic with
//! respect to every other connection.
//!
//! Outbound delivery never waits (see `Outbound::deliver`), so a stalled
//! peer cannot hold up the actor. Commands from a connection that has
//! already disconnected are dropped.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::broadcast::{broadcast, close_room};
use crate::client::Outbound;
use crate::error::AppError;
use crate::payload::{DisasterMasterData, Goblin};
use crate::registry::{JoinOutcome, RoomRegistry};
use crate::types::{ConnectionId, RoomCode};

/// Commands sent from handlers to the SessionServer actor
#[derive(Debug)]
pub enum ServerCommand {
    /// New connection opened
    Connect {
        conn_id: ConnectionId,
        sender: Outbound,
    },
    /// Connection closed (terminal)
    Disconnect { conn_id: ConnectionId },
    /// Create a room hosted by this connection
    Create {
        conn_id: ConnectionId,
        shared: DisasterMasterData,
    },
    /// Join a room as a client
    Join {
        conn_id: ConnectionId,
        code: RoomCode,
        player: Goblin,
    },
    /// Replace this connection's own player data
    UpdatePlayer {
        conn_id: ConnectionId,
        code: RoomCode,
        player: Goblin,
    },
    /// Replace a room's shared data
    UpdateRoom {
        conn_id: ConnectionId,
        code: RoomCode,
        shared: DisasterMasterData,
    },
    /// Inbound frame failed validation; report to the sender only
    Reject {
        conn_id: ConnectionId,
        error: AppError,
    },
}

/// The main SessionServer actor
pub struct SessionServer {
    /// All open connections: ConnectionId -> outbound channel
    connections: HashMap<ConnectionId, Outbound>,
    /// All live rooms
    registry: RoomRegistry<DisasterMasterData, Goblin>,
    /// Command receiver channel
    receiver: mpsc::Receiver<ServerCommand>,
}

impl SessionServer {
    /// Create a new SessionServer with the given command receiver
    pub fn new(receiver: mpsc::Receiver<ServerCommand>) -> Self {
        Self {
            connections: HashMap::new(),
            registry: RoomRegistry::new(),
            receiver,
        }
    }

    /// Run the SessionServer event loop
    ///
    /// Continuously receives and processes commands until all senders are dropped.
    pub async fn run(mut self) {
        info!("SessionServer started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!("SessionServer shutting down");
    }

    /// Process a single command
    fn handle_command(&mut self, cmd: ServerCommand) {
        match cmd {
            ServerCommand::Connect { conn_id, sender } => {
                self.handle_connect(conn_id, sender);
            }
            ServerCommand::Disconnect { conn_id } => {
                self.handle_disconnect(conn_id);
            }
            ServerCommand::Create { conn_id, shared } => {
                self.handle_create(conn_id, shared);
            }
            ServerCommand::Join { conn_id, code, player } => {
                self.handle_join(conn_id, code, player);
            }
            ServerCommand::UpdatePlayer { conn_id, code, player } => {
                self.handle_update_player(conn_id, code, player);
            }
            ServerCommand::UpdateRoom { conn_id, code, shared } => {
                self.handle_update_room(conn_id, code, shared);
            }
            ServerCommand::Reject { conn_id, error } => {
                self.report(conn_id, error);
            }
        }
    }

    fn handle_connect(&mut self, conn_id: ConnectionId, sender: Outbound) {
        info!("Connection {} opened", conn_id);
        self.connections.insert(conn_id, sender);
        debug!(
            "Total connections: {}, Total rooms: {}",
            self.connections.len(),
            self.registry.len()
        );
    }

    /// Run the close hooks for a connection
    ///
    /// Rooms it hosts are torn down and their clients told to quit; if it
    /// was a client somewhere, it leaves and that room is re-broadcast.
    fn handle_disconnect(&mut self, conn_id: ConnectionId) {
        info!("Connection {} closed", conn_id);
        self.connections.remove(&conn_id);

        for code in self.registry.rooms_hosted_by(conn_id) {
            if let Some(room) = self.registry.remove_room(&code) {
                close_room(&room);
            }
        }

        if let Some(code) = self.registry.remove_client(conn_id) {
            self.rebroadcast(&code);
        }

        debug!(
            "Total connections: {}, Total rooms: {}",
            self.connections.len(),
            self.registry.len()
        );
    }

    fn handle_create(&mut self, conn_id: ConnectionId, shared: DisasterMasterData) {
        let Some(sender) = self.connections.get(&conn_id).cloned() else {
            return;
        };

        let result = self.registry.create_room(sender, conn_id, shared).map(broadcast);
        if let Err(e) = result {
            self.report(conn_id, e);
        }
    }

    fn handle_join(&mut self, conn_id: ConnectionId, code: RoomCode, player: Goblin) {
        let Some(sender) = self.connections.get(&conn_id).cloned() else {
            return;
        };

        match self.registry.join_room(&code, conn_id, &sender, player) {
            Ok(JoinOutcome::Joined { previous }) => {
                if let Some(previous) = previous {
                    sender.forget(&previous);
                    self.rebroadcast(&previous);
                }
                self.rebroadcast(&code);
            }
            Ok(JoinOutcome::Unchanged) => {
                debug!("Connection {} already in room {}", conn_id, code);
                self.rebroadcast(&code);
            }
            Err(e) => self.report(conn_id, e),
        }
    }

    fn handle_update_player(&mut self, conn_id: ConnectionId, code: RoomCode, player: Goblin) {
        if !self.connections.contains_key(&conn_id) {
            debug!("Ignoring player update from closed connection {}", conn_id);
            return;
        }

        match self.registry.update_client_payload(&code, conn_id, player) {
            Ok(()) => self.rebroadcast(&code),
            Err(e) => self.report(conn_id, e),
        }
    }

    fn handle_update_room(
        &mut self,
        conn_id: ConnectionId,
        code: RoomCode,
        shared: DisasterMasterData,
    ) {
        if !self.connections.contains_key(&conn_id) {
            debug!("Ignoring room update from closed connection {}", conn_id);
            return;
        }

        debug!("Connection {} updating room {}", conn_id, code);
        let result = self.registry.update_room_payload(&code, shared).map(broadcast);
        if let Err(e) = result {
            self.report(conn_id, e);
        }
    }

    /// Helper: broadcast a room if it still exists
    fn rebroadcast(&self, code: &RoomCode) {
        if let Ok(room) = self.registry.get_room(code) {
            broadcast(room);
        }
    }

    /// Helper: send an error envelope back to the originating connection
    fn report(&self, conn_id: ConnectionId, err: AppError) {
        warn!("Connection {} error: {}", conn_id, err);
        let Some(sender) = self.connections.get(&conn_id) else {
            return;
        };
        if let Err(e) = sender.deliver(err.into()) {
            warn!("Failed to report error to connection {}: {}", conn_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{outbound, OutboundReceiver};
    use crate::message::ServerMessage;

    struct Peer {
        id: ConnectionId,
        rx: OutboundReceiver,
    }

    impl Peer {
        /// Next update: (recipient id, room code, member ids)
        fn update(&mut self) -> (ConnectionId, RoomCode, Vec<ConnectionId>) {
            match self.rx.try_recv() {
                Ok(ServerMessage::Update { client_id, room }) => {
                    (client_id, room.code, room.clients.iter().map(|c| c.id).collect())
                }
                other => panic!("expected update, got {:?}", other),
            }
        }

        fn error(&mut self) -> String {
            match self.rx.try_recv() {
                Ok(ServerMessage::Error { message }) => message,
                other => panic!("expected error, got {:?}", other),
            }
        }

        fn is_idle(&mut self) -> bool {
            self.rx.try_recv().is_err()
        }
    }

    fn server() -> SessionServer {
        let (_tx, rx) = mpsc::channel(1);
        SessionServer::new(rx)
    }

    fn connect(server: &mut SessionServer) -> Peer {
        connect_with_capacity(server, 16)
    }

    fn connect_with_capacity(server: &mut SessionServer, capacity: usize) -> Peer {
        let (tx, rx) = outbound(capacity);
        let id = ConnectionId::next();
        server.handle_command(ServerCommand::Connect { conn_id: id, sender: tx });
        Peer { id, rx }
    }

    fn goblin(name: &str) -> Goblin {
        Goblin {
            dice: vec![1, 2],
            name: name.to_string(),
            ass_size: 1,
            ass_origin: 1,
            class: 1,
            pocket_contents: String::new(),
            note: String::new(),
        }
    }

    fn create(server: &mut SessionServer, host: &mut Peer) -> RoomCode {
        server.handle_command(ServerCommand::Create {
            conn_id: host.id,
            shared: DisasterMasterData {
                scenario_code: "X".to_string(),
                chaos_clock: 0,
            },
        });
        let (id, code, members) = host.update();
        assert_eq!(id, host.id);
        assert!(members.is_empty());
        code
    }

    fn scenario(name: &str, clock: i64) -> DisasterMasterData {
        DisasterMasterData {
            scenario_code: name.to_string(),
            chaos_clock: clock,
        }
    }

    fn join(server: &mut SessionServer, peer: &Peer, code: &RoomCode) {
        server.handle_command(ServerCommand::Join {
            conn_id: peer.id,
            code: code.clone(),
            player: goblin("g"),
        });
    }

    #[test]
    fn test_join_broadcasts_to_everyone() {
        let mut server = server();
        let mut host = connect(&mut server);
        let mut c1 = connect(&mut server);
        let mut c2 = connect(&mut server);
        let code = create(&mut server, &mut host);

        join(&mut server, &c1, &code);
        assert_eq!(c1.update(), (c1.id, code.clone(), vec![]));
        assert_eq!(host.update(), (host.id, code.clone(), vec![c1.id]));

        join(&mut server, &c2, &code);
        assert_eq!(c1.update(), (c1.id, code.clone(), vec![c2.id]));
        assert_eq!(c2.update(), (c2.id, code.clone(), vec![c1.id]));
        assert_eq!(host.update(), (host.id, code.clone(), vec![c1.id, c2.id]));
    }

    #[test]
    fn test_join_unknown_room_reports_error() {
        let mut server = server();
        let mut peer = connect(&mut server);

        join(&mut server, &peer, &RoomCode::from("zzzzzz"));
        assert_eq!(peer.error(), "Room not found: zzzzzz");
        assert!(peer.is_idle());
    }

    #[test]
    fn test_host_disconnect_tears_down_room() {
        let mut server = server();
        let mut host = connect(&mut server);
        let mut client = connect(&mut server);
        let code = create(&mut server, &mut host);
        join(&mut server, &client, &code);
        client.update();

        server.handle_command(ServerCommand::Disconnect { conn_id: host.id });

        assert!(matches!(client.rx.try_recv(), Ok(ServerMessage::Quit { .. })));
        assert!(client.is_idle());
        assert!(matches!(server.registry.get_room(&code), Err(AppError::RoomNotFound(_))));
    }

    #[test]
    fn test_client_disconnect_rebroadcasts() {
        let mut server = server();
        let mut host = connect(&mut server);
        let client = connect(&mut server);
        let code = create(&mut server, &mut host);
        join(&mut server, &client, &code);
        host.update();

        server.handle_command(ServerCommand::Disconnect { conn_id: client.id });

        assert_eq!(host.update(), (host.id, code.clone(), vec![]));
        assert!(server.registry.get_room(&code).is_ok());
    }

    #[test]
    fn test_join_elsewhere_updates_both_rooms() {
        let mut server = server();
        let mut host_a = connect(&mut server);
        let mut host_b = connect(&mut server);
        let mut client = connect(&mut server);
        let a = create(&mut server, &mut host_a);
        let b = create(&mut server, &mut host_b);

        join(&mut server, &client, &a);
        client.update();
        host_a.update();

        join(&mut server, &client, &b);
        assert_eq!(host_a.update(), (host_a.id, a.clone(), vec![]));
        assert_eq!(client.update(), (client.id, b.clone(), vec![]));
        assert_eq!(host_b.update(), (host_b.id, b.clone(), vec![client.id]));
    }

    #[test]
    fn test_update_player_by_non_member() {
        let mut server = server();
        let mut host = connect(&mut server);
        let mut stranger = connect(&mut server);
        let code = create(&mut server, &mut host);

        server.handle_command(ServerCommand::UpdatePlayer {
            conn_id: stranger.id,
            code: code.clone(),
            player: goblin("intruder"),
        });

        assert!(stranger.error().starts_with("Not a member"));
        assert!(host.is_idle());
    }

    #[test]
    fn test_update_room_reaches_everyone() {
        let mut server = server();
        let mut host = connect(&mut server);
        let mut client = connect(&mut server);
        let code = create(&mut server, &mut host);
        join(&mut server, &client, &code);
        client.update();
        host.update();

        server.handle_command(ServerCommand::UpdateRoom {
            conn_id: client.id,
            code: code.clone(),
            shared: DisasterMasterData {
                scenario_code: "Y".to_string(),
                chaos_clock: 3,
            },
        });

        for peer in [&mut client, &mut host] {
            match peer.rx.try_recv() {
                Ok(ServerMessage::Update { room, .. }) => {
                    assert_eq!(room.shared.scenario_code, "Y");
                    assert_eq!(room.shared.chaos_clock, 3);
                }
                other => panic!("expected update, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_reject_goes_to_sender_only() {
        let mut server = server();
        let mut host = connect(&mut server);
        let mut client = connect(&mut server);
        let code = create(&mut server, &mut host);
        join(&mut server, &client, &code);
        client.update();
        host.update();

        server.handle_command(ServerCommand::Reject {
            conn_id: client.id,
            error: AppError::MissingField("name"),
        });

        assert_eq!(client.error(), "Missing field: name");
        assert!(host.is_idle());
    }

    #[test]
    fn test_slow_host_gets_latest_room_state() {
        let mut server = server();
        let mut host = connect_with_capacity(&mut server, 1);

        server.handle_command(ServerCommand::Create {
            conn_id: host.id,
            shared: scenario("X", 0),
        });
        let code = server.registry.rooms_hosted_by(host.id).remove(0);
        for (name, clock) in [("A", 1), ("B", 2)] {
            server.handle_command(ServerCommand::UpdateRoom {
                conn_id: host.id,
                code: code.clone(),
                shared: scenario(name, clock),
            });
        }

        match host.rx.try_recv() {
            Ok(ServerMessage::Update { room, .. }) => assert_eq!(room.shared, scenario("B", 2)),
            other => panic!("expected update, got {:?}", other),
        }
        assert!(host.is_idle());
    }

    #[test]
    fn test_updates_from_closed_connection_are_dropped() {
        let mut server = server();
        let mut host = connect(&mut server);
        let client = connect(&mut server);
        let code = create(&mut server, &mut host);
        join(&mut server, &client, &code);
        host.update();

        server.handle_command(ServerCommand::Disconnect { conn_id: client.id });
        host.update();

        server.handle_command(ServerCommand::UpdateRoom {
            conn_id: client.id,
            code: code.clone(),
            shared: scenario("Z", 9),
        });
        server.handle_command(ServerCommand::UpdatePlayer {
            conn_id: client.id,
            code: code.clone(),
            player: goblin("ghost"),
        });

        let room = server.registry.get_room(&code).unwrap();
        assert_eq!(room.shared, scenario("X", 0));
        assert!(host.is_idle());
    }
}
