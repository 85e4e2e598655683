//! Error types for the chat server
//!
//! Defines application-level errors and transmit endpoint errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

use crate::types::SessionId;

/// Application-level errors
///
/// Covers startup errors (I/O, configuration), structural registry errors
/// (resolved locally, never shown to peers) and session-local errors
/// (reported back to the originating session as an `Error:` line).
#[derive(Debug, Error)]
pub enum AppError {
    /// IO error (fatal at startup, connection-ending otherwise)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("Configuration error: {0}")]
    Config(#[from] serde_json::Error),

    /// Session is not (or no longer) registered
    #[error("Session {0} not found")]
    SessionNotFound(SessionId),

    /// Session ID is already registered
    #[error("Session {0} is already registered")]
    AlreadyRegistered(SessionId),

    /// No room with the given name
    #[error("room {0} not found")]
    RoomNotFound(String),

    /// Session is not a member of the given room
    #[error("you are not in room {0}")]
    NotInRoom(String),

    /// Plain message sent while not a member of any room
    #[error("you are not in any room")]
    NoCurrentRoom,

    /// Direct message to an unknown display name
    #[error("user {0} not found")]
    RecipientNotFound(String),

    /// Direct message addressed to the sender
    #[error("you cannot message yourself")]
    SelfMessage,

    /// Known command without its argument; carries the usage text
    #[error("usage: {0}")]
    MissingArgument(&'static str),
}

/// Transmit endpoint errors
///
/// Occurs when a line cannot be queued for a session.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,

    /// The session's outbound queue is full
    #[error("Channel full")]
    ChannelFull,
}
