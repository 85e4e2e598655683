//! Session struct definition
//!
//! Represents one connected client: identity, display name, lifecycle state,
//! the room it is currently speaking in, and its transmit endpoint.
//! Joined rooms are tracked by the membership index, not here.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::SendError;
use crate::message::ServerMessage;
use crate::types::SessionId;

/// Per-session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Registered, not yet placed in the lobby
    Connecting,
    /// Accepting commands; `named` once `login` has succeeded
    Active { named: bool },
}

/// Transmit endpoint of a session
///
/// Cheap to clone: broadcast snapshots carry clones so that sends happen
/// after every registry lock is released. Deliveries never wait; a full
/// queue is a failed delivery.
#[derive(Debug, Clone)]
pub struct Outbound {
    sender: mpsc::Sender<ServerMessage>,
    failures: Arc<AtomicU32>,
}

impl Outbound {
    pub fn new(sender: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            sender,
            failures: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Queue a line for this session without waiting
    ///
    /// Success resets the consecutive failure count; a full queue bumps it.
    pub fn deliver(&self, msg: ServerMessage) -> Result<(), SendError> {
        match self.sender.try_send(msg) {
            Ok(()) => {
                self.failures.store(0, Ordering::Relaxed);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.failures.fetch_add(1, Ordering::Relaxed);
                Err(SendError::ChannelFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SendError::ChannelClosed),
        }
    }

    /// Consecutive failed deliveries since the last success
    pub fn failures(&self) -> u32 {
        self.failures.load(Ordering::Relaxed)
    }
}

/// Connected session information
#[derive(Debug)]
pub struct Session {
    /// Unique identifier for this session
    pub id: SessionId,
    /// Display name (`GUEST_<id>` until login)
    pub name: String,
    /// Lifecycle state
    pub state: SessionState,
    /// Room that plain messages go to
    pub current_room: Option<String>,
    /// Server → Client line channel
    pub outbound: Outbound,
}

impl Session {
    /// Create a new session with a guest name
    pub fn new(id: SessionId, sender: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            id,
            name: id.guest_name(),
            state: SessionState::Connecting,
            current_room: None,
            outbound: Outbound::new(sender),
        }
    }

    /// Set the display name and mark the session as named
    pub fn rename(&mut self, name: String) {
        self.name = name;
        self.state = SessionState::Active { named: true };
    }

    /// Move from `Connecting` to `Active`; no effect once active
    pub fn activate(&mut self) {
        if self.state == SessionState::Connecting {
            self.state = SessionState::Active { named: false };
        }
    }
}
