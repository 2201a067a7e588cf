//! The single command processor.
//!
//! Every session task funnels its requests into one bounded channel. The
//! processor drains that channel one request at a time, in arrival order, and
//! is the only code that mutates the room registry, room membership and
//! session state. Handler failures are reported to the issuer and never stop
//! the loop.

use std::collections::{BTreeMap, HashMap};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::command::{Command, CommandError, CommandKind};
use super::room::Room;
use super::session::{Member, Outbox, SessionId};
use crate::config::ChatConfig;
use crate::{ParlorError, Result};

/// A unit of work for the processor.
#[derive(Debug)]
pub enum Request {
    /// Register a new session before it issues commands.
    Connect {
        /// Session id.
        session: SessionId,
        /// Remote peer label.
        peer: String,
        /// Where replies for the session go.
        outbox: Outbox,
    },
    /// A parsed client command.
    Command(Command),
    /// The session's transport is gone; clean up as if it had quit.
    Disconnect {
        /// Session id.
        session: SessionId,
    },
    /// Report the current state.
    Snapshot(oneshot::Sender<ServerSnapshot>),
}

/// Summary of one room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSummary {
    /// Room name.
    pub name: String,
    /// Number of current members.
    pub members: usize,
    /// Number of messages held in history.
    pub history_len: usize,
}

/// Point-in-time view of the processor state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerSnapshot {
    /// All rooms, sorted by name.
    pub rooms: Vec<RoomSummary>,
    /// Number of registered sessions.
    pub sessions: usize,
    /// Commands processed so far, per kind.
    pub commands_processed: BTreeMap<CommandKind, u64>,
}

impl ServerSnapshot {
    /// Look up a room summary by name.
    pub fn room(&self, name: &str) -> Option<&RoomSummary> {
        self.rooms.iter().find(|room| room.name == name)
    }
}

/// Cloneable sender side of the processor's request channel.
#[derive(Debug, Clone)]
pub struct ProcessorHandle {
    requests: mpsc::Sender<Request>,
}

impl ProcessorHandle {
    /// Register a session.
    pub async fn connect(&self, session: SessionId, peer: String, outbox: Outbox) -> Result<()> {
        self.send(Request::Connect {
            session,
            peer,
            outbox,
        })
        .await
    }

    /// Enqueue a command, waiting while the queue is full.
    pub async fn submit(&self, command: Command) -> Result<()> {
        self.send(Request::Command(command)).await
    }

    /// Report that a session's transport has closed.
    pub async fn disconnect(&self, session: SessionId) -> Result<()> {
        self.send(Request::Disconnect { session }).await
    }

    /// Ask the processor for a snapshot of its state.
    pub async fn snapshot(&self) -> Result<ServerSnapshot> {
        let (reply, receiver) = oneshot::channel();
        self.send(Request::Snapshot(reply)).await?;
        receiver.await.map_err(|_| ParlorError::ProcessorClosed)
    }

    async fn send(&self, request: Request) -> Result<()> {
        self.requests
            .send(request)
            .await
            .map_err(|_| ParlorError::ProcessorClosed)
    }
}

/// Owner of all chat state.
#[derive(Debug)]
pub struct Processor {
    rooms: HashMap<String, Room>,
    sessions: HashMap<SessionId, Member>,
    history_size: usize,
    commands_processed: BTreeMap<CommandKind, u64>,
}

impl Processor {
    /// Create a processor with no rooms or sessions.
    pub fn new(history_size: usize) -> Self {
        Self {
            rooms: HashMap::new(),
            sessions: HashMap::new(),
            history_size,
            commands_processed: BTreeMap::new(),
        }
    }

    /// Spawn a processor task and return the handle feeding it.
    ///
    /// The task ends once every handle has been dropped.
    pub fn spawn(config: &ChatConfig) -> (ProcessorHandle, JoinHandle<()>) {
        let (requests, receiver) = mpsc::channel(config.command_queue.max(1));
        let processor = Self::new(config.history_size);
        let task = tokio::spawn(processor.run(receiver));
        (ProcessorHandle { requests }, task)
    }

    /// Process requests until the channel closes.
    pub async fn run(mut self, mut requests: mpsc::Receiver<Request>) {
        info!("Command processor started");
        while let Some(request) = requests.recv().await {
            self.handle(request);
        }
        info!(
            "Command processor stopped ({} rooms, {} sessions)",
            self.rooms.len(),
            self.sessions.len()
        );
    }

    /// Apply a single request.
    pub fn handle(&mut self, request: Request) {
        match request {
            Request::Connect {
                session,
                peer,
                outbox,
            } => {
                info!(session = %session, peer = %peer, "Session registered");
                self.sessions.insert(session, Member::new(outbox, peer));
            }
            Request::Command(command) => self.handle_command(command),
            Request::Disconnect { session } => {
                if self.sessions.contains_key(&session) {
                    self.leave_current_room(session);
                    if let Some(member) = self.sessions.remove(&session) {
                        info!(session = %session, peer = %member.peer, "Session disconnected");
                    }
                }
            }
            Request::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
        }
    }

    /// Current state summary.
    pub fn snapshot(&self) -> ServerSnapshot {
        let mut rooms: Vec<RoomSummary> = self
            .rooms
            .values()
            .map(|room| RoomSummary {
                name: room.name().to_string(),
                members: room.member_count(),
                history_len: room.history().len(),
            })
            .collect();
        rooms.sort_by(|a, b| a.name.cmp(&b.name));

        ServerSnapshot {
            rooms,
            sessions: self.sessions.len(),
            commands_processed: self.commands_processed.clone(),
        }
    }

    fn handle_command(&mut self, command: Command) {
        let session = command.session;
        let Some(outbox) = self.sessions.get(&session).map(|m| m.outbox.clone()) else {
            debug!(session = %session, command = %command.kind, "Dropping command from unknown session");
            return;
        };

        debug!(session = %session, command = %command.kind, "Processing command");
        *self.commands_processed.entry(command.kind).or_insert(0) += 1;

        let result = match command.kind {
            CommandKind::SetNickname => self.set_nickname(&command),
            CommandKind::ListRooms => self.list_rooms(&command),
            CommandKind::Join => self.join(&command),
            CommandKind::SendMessage => self.send_message(&command),
            CommandKind::Quit => self.quit(&command),
        };

        if let Err(e) = result {
            debug!(session = %session, command = %command.kind, error = %e, "Command rejected");
            outbox.send_error(&e);
        }
    }

    fn set_nickname(&mut self, command: &Command) -> std::result::Result<(), CommandError> {
        let nickname = command.arg(1).ok_or(CommandError::Usage {
            what: "nickname",
            usage: "/name NEW_NICKNAME",
        })?;

        if let Some(member) = self.sessions.get_mut(&command.session) {
            debug!(session = %command.session, from = %member.nickname, to = %nickname, "Nickname changed");
            member.nickname = nickname.to_string();
            member
                .outbox
                .send_line(format!("Nickname changed to: {nickname}"));
        }
        Ok(())
    }

    fn list_rooms(&mut self, command: &Command) -> std::result::Result<(), CommandError> {
        let mut names: Vec<&str> = self.rooms.keys().map(String::as_str).collect();
        names.sort_unstable();

        let list = if names.is_empty() {
            "no rooms available".to_string()
        } else {
            names.join(", ")
        };

        if let Some(member) = self.sessions.get(&command.session) {
            member.outbox.send_line(format!("Rooms: {list}"));
        }
        Ok(())
    }

    fn join(&mut self, command: &Command) -> std::result::Result<(), CommandError> {
        let room_name = command.arg(1).ok_or(CommandError::Usage {
            what: "room name",
            usage: "/join ROOM",
        })?;
        let session = command.session;

        let Some(member) = self.sessions.get(&session) else {
            return Ok(());
        };
        if member.room.as_deref() == Some(room_name) {
            member
                .outbox
                .send_line(format!("You are already in {room_name}"));
            return Ok(());
        }

        // Leave the old room before entering the new one
        self.leave_current_room(session);

        let history_size = self.history_size;
        let room = self.rooms.entry(room_name.to_string()).or_insert_with(|| {
            info!(room = %room_name, "Room created");
            Room::new(room_name, history_size)
        });
        let Some(member) = self.sessions.get_mut(&session) else {
            return Ok(());
        };

        room.add_member(session, member.outbox.clone());
        member.room = Some(room_name.to_string());

        for line in room.history().snapshot() {
            member.outbox.send_line(line);
        }
        member.outbox.send_line(format!("Welcome to {room_name}"));
        room.broadcast(session, &format!("{} joined the room", member.nickname));

        info!(session = %session, room = %room_name, members = room.member_count(), "Joined room");
        Ok(())
    }

    fn send_message(&mut self, command: &Command) -> std::result::Result<(), CommandError> {
        const USAGE: &str = "/msg ROOM MESSAGE";

        let room_name = command.arg(1).ok_or(CommandError::Usage {
            what: "room name",
            usage: USAGE,
        })?;
        let text = command.rest(2);
        if text.trim().is_empty() {
            return Err(CommandError::Usage {
                what: "message",
                usage: USAGE,
            });
        }

        let room = self
            .rooms
            .get(room_name)
            .ok_or_else(|| CommandError::RoomNotFound(room_name.to_string()))?;
        let Some(member) = self.sessions.get(&command.session) else {
            return Ok(());
        };

        let line = format!("{}: {}", member.nickname, text);
        room.history().add(line.clone());
        let delivered = room.broadcast(command.session, &line);

        debug!(session = %command.session, room = %room_name, delivered, "Message broadcast");
        Ok(())
    }

    fn quit(&mut self, command: &Command) -> std::result::Result<(), CommandError> {
        let session = command.session;
        self.leave_current_room(session);

        if let Some(member) = self.sessions.remove(&session) {
            member.outbox.send_line("Goodbye!");
            member.outbox.close();
            info!(session = %session, peer = %member.peer, "Session quit");
        }
        Ok(())
    }

    /// Remove a session from its room, if any, and tell the remaining members.
    fn leave_current_room(&mut self, session: SessionId) {
        let Some(member) = self.sessions.get_mut(&session) else {
            return;
        };
        let Some(room_name) = member.room.take() else {
            return;
        };

        if let Some(room) = self.rooms.get_mut(&room_name) {
            room.remove_member(session);
            room.broadcast(session, &format!("{} left the room", member.nickname));
            debug!(session = %session, room = %room_name, "Left room");
        } else {
            warn!(session = %session, room = %room_name, "Session pointed at a missing room");
        }
    }
}
