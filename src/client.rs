//! Client struct definition and per-connection outbound channel
//!
//! Represents a non-host participant of a room: their connection id,
//! a back reference to their outbound channel, and their payload.
//!
//! Each connection's outbound side has two lanes:
//! - `update` messages go through a `watch` channel holding the latest
//!   snapshot per room, so a slow reader skips intermediate states but
//!   always ends up with the current one
//! - `quit` and `error` messages go through a bounded `mpsc` queue
//!
//! Pending snapshots are always handed out before queued events.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Weak};

use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tokio::sync::{mpsc, watch};

use crate::error::SendError;
use crate::message::ServerMessage;
use crate::types::{ConnectionId, RoomCode};

/// Latest unsent `update` per room, tagged with a per-connection sequence
#[derive(Debug, Default)]
pub struct Snapshots {
    seq: u64,
    rooms: HashMap<RoomCode, (u64, ServerMessage)>,
}

/// Create an outbound channel whose event queue holds `capacity` messages
pub fn outbound(capacity: usize) -> (Outbound, OutboundReceiver) {
    let (events_tx, events_rx) = mpsc::channel(capacity);
    let (snapshots_tx, snapshots_rx) = watch::channel(Snapshots::default());
    let sender = Outbound {
        events: events_tx,
        snapshots: Arc::new(snapshots_tx),
    };
    let receiver = OutboundReceiver {
        events: events_rx,
        snapshots: snapshots_rx,
        snapshots_open: true,
        sent: HashMap::new(),
        ready: VecDeque::new(),
    };
    (sender, receiver)
}

/// Server → connection message channel
#[derive(Debug, Clone)]
pub struct Outbound {
    events: mpsc::Sender<ServerMessage>,
    snapshots: Arc<watch::Sender<Snapshots>>,
}

impl Outbound {
    /// Push a message without waiting
    ///
    /// An `update` replaces any undelivered update for the same room and
    /// only fails once the connection is gone. Other messages fail when
    /// the event queue is full.
    pub fn deliver(&self, msg: ServerMessage) -> Result<(), SendError> {
        let code = match &msg {
            ServerMessage::Update { room, .. } => Some(room.code.clone()),
            _ => None,
        };
        let Some(code) = code else {
            return self.events.try_send(msg).map_err(|e| match e {
                TrySendError::Full(_) => SendError::ChannelFull,
                TrySendError::Closed(_) => SendError::ChannelClosed,
            });
        };

        if self.events.is_closed() {
            return Err(SendError::ChannelClosed);
        }
        self.snapshots.send_modify(|snapshots| {
            snapshots.seq += 1;
            let seq = snapshots.seq;
            snapshots.rooms.insert(code, (seq, msg));
        });
        Ok(())
    }

    /// Drop any undelivered update for a room the connection has left
    pub fn forget(&self, code: &RoomCode) {
        self.snapshots
            .send_if_modified(|snapshots| snapshots.rooms.remove(code).is_some());
    }

    pub fn downgrade(&self) -> WeakOutbound {
        WeakOutbound {
            events: self.events.downgrade(),
            snapshots: Arc::downgrade(&self.snapshots),
        }
    }
}

/// Non-owning handle to a connection's outbound channel
#[derive(Debug, Clone)]
pub struct WeakOutbound {
    events: mpsc::WeakSender<ServerMessage>,
    snapshots: Weak<watch::Sender<Snapshots>>,
}

impl WeakOutbound {
    pub fn upgrade(&self) -> Option<Outbound> {
        Some(Outbound {
            events: self.events.upgrade()?,
            snapshots: self.snapshots.upgrade()?,
        })
    }
}

/// Receiving end, drained by the connection's write task
#[derive(Debug)]
pub struct OutboundReceiver {
    events: mpsc::Receiver<ServerMessage>,
    snapshots: watch::Receiver<Snapshots>,
    snapshots_open: bool,
    sent: HashMap<RoomCode, u64>,
    ready: VecDeque<ServerMessage>,
}

impl OutboundReceiver {
    /// Wait for the next message
    ///
    /// Returns `None` once every `Outbound` is dropped and nothing is
    /// left to hand out.
    pub async fn recv(&mut self) -> Option<ServerMessage> {
        loop {
            if let Some(msg) = self.ready.pop_front() {
                return Some(msg);
            }

            let snapshots_open = self.snapshots_open;
            tokio::select! {
                biased;
                changed = self.snapshots.changed(), if snapshots_open => {
                    if changed.is_err() {
                        self.snapshots_open = false;
                    }
                    self.collect_snapshots();
                }
                msg = self.events.recv() => {
                    self.collect_snapshots();
                    match msg {
                        Some(msg) => self.ready.push_back(msg),
                        None if self.ready.is_empty() => return None,
                        None => {}
                    }
                }
            }
        }
    }

    /// Take the next message if one is available right now
    pub fn try_recv(&mut self) -> Result<ServerMessage, TryRecvError> {
        if self.ready.is_empty() {
            self.collect_snapshots();
        }
        match self.ready.pop_front() {
            Some(msg) => Ok(msg),
            None => self.events.try_recv(),
        }
    }

    /// Move unsent snapshots, oldest first, into the ready queue
    fn collect_snapshots(&mut self) {
        let snapshots = self.snapshots.borrow_and_update();
        let mut fresh: Vec<(u64, RoomCode, ServerMessage)> = snapshots
            .rooms
            .iter()
            .filter(|(code, (seq, _))| {
                self.sent.get(*code).map_or(true, |sent| sent < seq)
            })
            .map(|(code, (seq, msg))| (*seq, code.clone(), msg.clone()))
            .collect();
        drop(snapshots);

        fresh.sort_by_key(|(seq, _, _)| *seq);
        for (seq, code, msg) in fresh {
            self.sent.insert(code, seq);
            self.ready.push_back(msg);
        }
    }
}

/// Room member record
///
/// The outbound channel is owned by the connection; the room only keeps
/// a weak handle to it.
#[derive(Debug, Clone)]
pub struct Client<P> {
    /// Connection id of this member
    pub id: ConnectionId,
    /// Back reference to the connection's outbound channel
    pub sender: WeakOutbound,
    /// Member-owned state
    pub payload: P,
}

impl<P> Client<P> {
    /// Create a new member record for the given connection
    pub fn new(id: ConnectionId, sender: &Outbound, payload: P) -> Self {
        Self {
            id,
            sender: sender.downgrade(),
            payload,
        }
    }

    /// Send a message to this member
    ///
    /// Returns an error if the connection is gone or its event queue is full.
    pub fn send(&self, msg: ServerMessage) -> Result<(), SendError> {
        let sender = self.sender.upgrade().ok_or(SendError::ChannelClosed)?;
        sender.deliver(msg)
    }

    /// Drop any undelivered update this member has for `code`
    pub fn forget(&self, code: &RoomCode) {
        if let Some(sender) = self.sender.upgrade() {
            sender.forget(code);
        }
    }
}
