//! ChatServer implementation
//!
//! Shared state for every connection worker: the user registry, the room
//! registry, the membership index and the direct-message index, each behind
//! its own lock. Workers call into it directly; cross-session effects
//! (notices, chat fan-out) happen inside the call that causes them.
//!
//! Lock order: room registry → membership index → room member set.
//! The user registry is taken on its own, except that the direct-message
//! index may be taken while it is held. No lock is held while delivering.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::broadcast::{fan_out, Delivery};
use crate::config::ServerConfig;
use crate::direct::DirectIndex;
use crate::error::{AppError, SendError};
use crate::membership::MembershipIndex;
use crate::message::{Command, ServerMessage};
use crate::registry::UserRegistry;
use crate::room::{Room, RoomRegistry};
use crate::session::Session;
use crate::types::{bounded_name, SessionId};

/// What the connection worker should do after a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// The shared session/room core
pub struct ChatServer {
    config: ServerConfig,
    /// All connected sessions
    users: Mutex<UserRegistry>,
    /// All rooms, never removed
    rooms: Mutex<RoomRegistry>,
    /// Session → joined rooms
    memberships: Mutex<MembershipIndex>,
    /// Open direct conversations
    directs: Mutex<DirectIndex>,
}

impl ChatServer {
    /// Create a server with its lobby room
    pub fn new(config: ServerConfig) -> Self {
        let mut rooms = RoomRegistry::new();
        rooms.get_or_create(&config.lobby);

        Self {
            config,
            users: Mutex::new(UserRegistry::new()),
            rooms: Mutex::new(rooms),
            memberships: Mutex::new(MembershipIndex::new()),
            directs: Mutex::new(DirectIndex::new()),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    // ── Session lifecycle ───────────────────────────────────────────

    /// Create and register a session for a new connection
    ///
    /// Returns the session ID and the receiving end of its transmit endpoint.
    pub fn connect(&self) -> Result<(SessionId, mpsc::Receiver<ServerMessage>), AppError> {
        let (tx, rx) = mpsc::channel(self.config.outbound_buffer.max(1));
        let id = self.register(Session::new(SessionId::next(), tx))?;
        Ok((id, rx))
    }

    /// Register a session and place it in the lobby
    pub fn register(&self, session: Session) -> Result<SessionId, AppError> {
        let id = session.id;
        // Tracked first so a teardown racing with registration always owns
        // the membership entry. A duplicate ID is already tracked by its
        // live owner, so nothing is undone on failure.
        self.memberships.lock().track(id);
        self.users.lock().register(session)?;

        let lobby = self.rooms.lock().get_or_create(&self.config.lobby);
        self.join_room(id, &lobby)?;
        self.users.lock().get_mut(id)?.activate();

        info!(session = %id, "session registered");
        debug!(users = self.user_count(), "registry size");
        Ok(id)
    }

    /// Tear a session down: leave every room, unregister, release the
    /// transmit endpoint
    ///
    /// Safe to call from any path and any number of times. The call whose
    /// `leave_all` removed the membership entry sends the notices and
    /// returns true; every other call returns false.
    pub fn teardown(&self, id: SessionId) -> bool {
        let name = self.users.lock().get(id).map(|s| s.name.clone()).ok();
        let rooms = self.memberships.lock().leave_all(id);
        let session = self.users.lock().unregister(id).ok();
        let conversations = self.directs.lock().forget(id);
        let name = session.map(|s| s.name).or(name);

        let Some(rooms) = rooms else {
            debug!(session = %id, "teardown: already removed");
            return false;
        };

        if let Some(name) = &name {
            for room in &rooms {
                let notice = ServerMessage::Left {
                    name: name.clone(),
                    room: room.name.clone(),
                };
                self.announce(room, notice, None);
            }
        }

        info!(
            session = %id,
            name = name.as_deref().unwrap_or_default(),
            rooms = rooms.len(),
            conversations,
            "session torn down"
        );
        true
    }

    // ── Room operations ─────────────────────────────────────────────

    /// Set the display name and tell every joined room
    pub fn login(&self, id: SessionId, name: &str) -> Result<(), AppError> {
        let name = bounded_name(name);
        self.users.lock().rename(id, name.clone())?;
        info!(session = %id, %name, "logged in");

        for room_name in self.rooms_of(id) {
            if let Some(room) = self.find_room(&room_name) {
                let notice = ServerMessage::LoggedIn { name: name.clone() };
                self.announce(&room, notice, Some(id));
            }
        }
        Ok(())
    }

    /// Create the room if needed and join it
    pub fn create_room(&self, id: SessionId, name: &str) -> Result<(), AppError> {
        let room = self.rooms.lock().get_or_create(&bounded_name(name));
        self.join_room(id, &room)
    }

    /// Join an existing room
    pub fn join(&self, id: SessionId, name: &str) -> Result<(), AppError> {
        let name = bounded_name(name);
        let room = self
            .find_room(&name)
            .ok_or(AppError::RoomNotFound(name))?;
        self.join_room(id, &room)
    }

    fn join_room(&self, id: SessionId, room: &Arc<Room>) -> Result<(), AppError> {
        let added = self.memberships.lock().join(id, room)?;

        let name = {
            let mut users = self.users.lock();
            let session = users.get_mut(id)?;
            session.current_room = Some(room.name.clone());
            session.name.clone()
        };

        if added {
            debug!(session = %id, room = %room.name, "joined room");
            let notice = ServerMessage::Joined {
                name,
                room: room.name.clone(),
            };
            self.announce(room, notice, Some(id));
        }
        Ok(())
    }

    /// Leave a room
    ///
    /// Returns `Ok(false)` without side effects if the session was not a
    /// member.
    pub fn leave(&self, id: SessionId, name: &str) -> Result<bool, AppError> {
        let name = bounded_name(name);
        let room = self
            .find_room(&name)
            .ok_or(AppError::RoomNotFound(name))?;

        let remaining = {
            let mut memberships = self.memberships.lock();
            if !memberships.leave(id, &room) {
                return Ok(false);
            }
            memberships.rooms_of(id)
        };

        let name = {
            let mut users = self.users.lock();
            let session = users.get_mut(id)?;
            if session.current_room.as_deref() == Some(room.name.as_str()) {
                session.current_room = self.fallback_room(remaining);
            }
            session.name.clone()
        };

        debug!(session = %id, room = %room.name, "left room");
        let notice = ServerMessage::Left {
            name,
            room: room.name.clone(),
        };
        self.announce(&room, notice, Some(id));
        Ok(true)
    }

    /// Lobby if still joined, else the first remaining room
    fn fallback_room(&self, remaining: Vec<String>) -> Option<String> {
        if remaining.contains(&self.config.lobby) {
            return Some(self.config.lobby.clone());
        }
        remaining.into_iter().next()
    }

    /// Speak in another room the session has already joined
    pub fn switch(&self, id: SessionId, name: &str) -> Result<(), AppError> {
        let name = bounded_name(name);
        if !self.memberships.lock().is_member(id, &name) {
            return Err(AppError::NotInRoom(name));
        }
        self.users.lock().get_mut(id)?.current_room = Some(name);
        Ok(())
    }

    // ── Messaging ───────────────────────────────────────────────────

    /// Plain message to the session's current room
    pub fn say(&self, id: SessionId, content: &str) -> Result<Delivery, AppError> {
        let current = self
            .users
            .lock()
            .get(id)?
            .current_room
            .clone()
            .ok_or(AppError::NoCurrentRoom)?;
        let room = self.find_room(&current).ok_or(AppError::NoCurrentRoom)?;
        self.broadcast(&room, content, id)
    }

    /// Chat line to every member of `room` except `sender`
    pub fn broadcast(
        &self,
        room: &Room,
        content: &str,
        sender: SessionId,
    ) -> Result<Delivery, AppError> {
        let from = self.users.lock().get(sender)?.name.clone();
        let msg = ServerMessage::Chat {
            room: room.name.clone(),
            from,
            content: content.to_string(),
        };
        Ok(self.announce(room, msg, Some(sender)))
    }

    /// Deliver a line to the room's members, optionally excluding one
    ///
    /// Members are snapshotted and resolved under the locks; delivery runs
    /// after they are released. Recipients found unresponsive are torn down
    /// once the fan-out is done.
    pub fn announce(&self, room: &Room, msg: ServerMessage, exclude: Option<SessionId>) -> Delivery {
        let members = room.snapshot();
        let recipients = self.users.lock().outbounds(&members, exclude);

        let delivery = fan_out(&recipients, &msg, self.config.max_delivery_failures);
        drop(recipients);

        for id in &delivery.unresponsive {
            info!(session = %id, room = %room.name, "dropping unresponsive session");
            self.teardown(*id);
        }
        delivery
    }

    /// Direct message by display name, bypassing rooms
    pub fn send_direct(&self, sender: SessionId, to: &str, content: &str) -> Result<(), AppError> {
        let to = bounded_name(to);
        let (from, target, outbound) = {
            let users = self.users.lock();
            let from = users.get(sender)?.name.clone();
            let target = users
                .find_by_name(&to)
                .ok_or(AppError::RecipientNotFound(to))?;
            if target.id == sender {
                return Err(AppError::SelfMessage);
            }
            // Recorded under the user lock so teardown always sees it
            let messages = self.directs.lock().record(sender, target.id);
            debug!(from = %sender, to = %target.id, ?messages, "direct message");
            (from, target.id, target.outbound.clone())
        };

        let msg = ServerMessage::Direct {
            from,
            content: content.to_string(),
        };
        match outbound.deliver(msg) {
            Ok(()) => {}
            Err(SendError::ChannelFull)
                if outbound.failures() < self.config.max_delivery_failures =>
            {
                debug!(session = %target, "direct message dropped: queue full");
            }
            Err(e) => {
                info!(session = %target, error = %e, "dropping unresponsive session");
                self.teardown(target);
            }
        }
        Ok(())
    }

    /// Queue a line for one session; failures only logged
    pub fn notify(&self, id: SessionId, msg: ServerMessage) {
        let outbound = match self.users.lock().get(id) {
            Ok(session) => session.outbound.clone(),
            Err(_) => return,
        };
        if let Err(e) = outbound.deliver(msg) {
            debug!(session = %id, error = %e, "notice not delivered");
        }
    }

    // ── Dispatch ────────────────────────────────────────────────────

    /// Decode and run one input line for a session
    pub fn dispatch(&self, id: SessionId, line: &str) -> Flow {
        let command = match Command::parse(line) {
            Ok(Some(command)) => command,
            Ok(None) => return Flow::Continue,
            Err(e) => {
                self.notify(id, e.into());
                return Flow::Continue;
            }
        };

        debug!(session = %id, ?command, "dispatch");
        match self.execute(id, command) {
            Ok(flow) => flow,
            // Torn down under us (e.g. dropped as unresponsive)
            Err(AppError::SessionNotFound(_)) => Flow::Exit,
            Err(e) => {
                self.notify(id, e.into());
                Flow::Continue
            }
        }
    }

    /// Run one decoded command
    pub fn execute(&self, id: SessionId, command: Command) -> Result<Flow, AppError> {
        match command {
            Command::Login { name } => self.login(id, &name)?,
            Command::Create { room } => self.create_room(id, &room)?,
            Command::Join { room } => self.join(id, &room)?,
            Command::Leave { room } => {
                self.leave(id, &room)?;
            }
            Command::Switch { room } => self.switch(id, &room)?,
            Command::Direct { to, content } => self.send_direct(id, &to, &content)?,
            Command::Rooms => {
                let rooms = self.room_list();
                self.notify(id, ServerMessage::RoomList { rooms });
            }
            Command::Exit => return Ok(Flow::Exit),
            Command::Say { content } => {
                self.say(id, &content)?;
            }
        }
        Ok(Flow::Continue)
    }

    // ── Queries ─────────────────────────────────────────────────────

    pub fn find_room(&self, name: &str) -> Option<Arc<Room>> {
        self.rooms.lock().find(name)
    }

    /// Room names with member counts, in name order
    pub fn room_list(&self) -> Vec<(String, usize)> {
        let rooms = self.rooms.lock().all();
        rooms
            .iter()
            .map(|room| (room.name.clone(), room.member_count()))
            .collect()
    }

    pub fn rooms_of(&self, id: SessionId) -> Vec<String> {
        self.memberships.lock().rooms_of(id)
    }

    /// First session registered under this display name
    pub fn find_by_name(&self, name: &str) -> Option<SessionId> {
        self.users.lock().find_by_name(name).map(|s| s.id)
    }

    pub fn session_name(&self, id: SessionId) -> Option<String> {
        self.users.lock().get(id).map(|s| s.name.clone()).ok()
    }

    pub fn current_room(&self, id: SessionId) -> Option<String> {
        self.users
            .lock()
            .get(id)
            .ok()
            .and_then(|s| s.current_room.clone())
    }

    pub fn is_connected(&self, id: SessionId) -> bool {
        self.users.lock().contains(id)
    }

    pub fn user_count(&self) -> usize {
        self.users.lock().len()
    }

    pub fn has_conversation(&self, a: SessionId, b: SessionId) -> bool {
        self.directs.lock().contains(a, b)
    }

    /// Check the session/room relation in both directions
    pub fn is_consistent(&self) -> bool {
        let rooms = self.rooms.lock().all();
        self.memberships.lock().is_consistent(&rooms)
    }
}
