//! Multi-room Line Chat Server Library
//!
//! A line-oriented TCP chat server built on tokio. Clients pick a username,
//! join named rooms, and exchange room broadcasts or direct messages.
//!
//! # Features
//! - Newline-delimited text protocol (`login`, `create`, `join`, `leave`,
//!   `switch`, `msg`, `rooms`, `exit`/`logout`, plain chat)
//! - Auto-join to the `Lobby` room on connect
//! - Per-session "current room" for plain messages
//! - Direct messages by display name
//! - Slow or dead recipients isolated and dropped without stalling a room
//!
//! # Architecture
//! Each connection runs its own worker (`handle_connection`). Workers share
//! one `ChatServer`, which holds separately locked registries:
//! - `UserRegistry` owns the sessions
//! - `RoomRegistry` owns the rooms, each with its own member-set lock
//! - `MembershipIndex` keeps session ↔ room membership consistent
//! - `DirectIndex` tracks direct conversations
//!
//! Fan-out snapshots the recipients under the locks and delivers after
//! releasing them, so no lock is held during I/O.
//!
//! # Example
//! ```ignore
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//! use chat_rooms::{handle_connection, ChatServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ServerConfig::default();
//!     let listener = TcpListener::bind(&config.bind_addr).await.unwrap();
//!     let server = Arc::new(ChatServer::new(config));
//!
//!     while let Ok((stream, _)) = listener.accept().await {
//!         tokio::spawn(handle_connection(stream, Arc::clone(&server)));
//!     }
//! }
//! ```

pub mod broadcast;
pub mod codec;
pub mod config;
pub mod direct;
pub mod error;
pub mod handler;
pub mod membership;
pub mod message;
pub mod registry;
pub mod room;
pub mod server;
pub mod session;
pub mod types;

// Re-export main types for convenience
pub use broadcast::Delivery;
pub use codec::LineCodec;
pub use config::ServerConfig;
pub use error::{AppError, SendError};
pub use handler::handle_connection;
pub use message::{Command, ServerMessage};
pub use room::Room;
pub use server::{ChatServer, Flow};
pub use session::{Session, SessionState};
pub use types::SessionId;
