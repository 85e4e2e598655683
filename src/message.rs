//! Line protocol definitions
//!
//! Inbound: one text line decodes into at most one `Command`. The first
//! whitespace-delimited token names the command and the next token is its
//! argument. Anything that is not a command is a chat message.
//!
//! Outbound: `ServerMessage` renders to a single plain text line.

use std::fmt;

use crate::error::AppError;

/// Client → Server command, decoded from one input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Set the display name
    Login { name: String },
    /// Create a room (or reuse an existing one) and join it
    Create { room: String },
    /// Join an existing room
    Join { room: String },
    /// Leave a room
    Leave { room: String },
    /// Speak in another already-joined room
    Switch { room: String },
    /// Direct message to a display name
    Direct { to: String, content: String },
    /// List rooms with member counts
    Rooms,
    /// End the session
    Exit,
    /// Chat message for the current room
    Say { content: String },
}

impl Command {
    /// Decode one input line
    ///
    /// Returns `Ok(None)` for blank lines, which are ignored.
    pub fn parse(line: &str) -> Result<Option<Command>, AppError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (name, rest) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim_start()),
            None => (line, ""),
        };
        let arg = rest.split_whitespace().next();

        let command = match name {
            "login" => Command::Login {
                name: required(arg, "login <name>")?,
            },
            "create" => Command::Create {
                room: required(arg, "create <room>")?,
            },
            "join" => Command::Join {
                room: required(arg, "join <room>")?,
            },
            "leave" => Command::Leave {
                room: required(arg, "leave <room>")?,
            },
            "switch" => Command::Switch {
                room: required(arg, "switch <room>")?,
            },
            "msg" => {
                let to = required(arg, "msg <name> <text>")?;
                let content = rest[to.len()..].trim();
                if content.is_empty() {
                    return Err(AppError::MissingArgument("msg <name> <text>"));
                }
                Command::Direct {
                    to,
                    content: content.to_string(),
                }
            }
            "rooms" => Command::Rooms,
            "exit" | "logout" => Command::Exit,
            _ => Command::Say {
                content: line.to_string(),
            },
        };

        Ok(Some(command))
    }
}

fn required(arg: Option<&str>, usage: &'static str) -> Result<String, AppError> {
    arg.map(str::to_string)
        .ok_or(AppError::MissingArgument(usage))
}

/// Server → Client line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    /// Room chat: `[<room>] <from>: <content>`
    Chat {
        room: String,
        from: String,
        content: String,
    },
    /// Direct message: `[DM] <from>: <content>`
    Direct { from: String, content: String },
    /// `User <name> joined room <room>`
    Joined { name: String, room: String },
    /// `User <name> left room <room>`
    Left { name: String, room: String },
    /// `User <name> logged in`
    LoggedIn { name: String },
    /// Reply to `rooms`
    RoomList { rooms: Vec<(String, usize)> },
    /// Session-local error
    Error { message: String },
}

impl fmt::Display for ServerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerMessage::Chat {
                room,
                from,
                content,
            } => write!(f, "[{}] {}: {}", room, from, content),
            ServerMessage::Direct { from, content } => write!(f, "[DM] {}: {}", from, content),
            ServerMessage::Joined { name, room } => write!(f, "User {} joined room {}", name, room),
            ServerMessage::Left { name, room } => write!(f, "User {} left room {}", name, room),
            ServerMessage::LoggedIn { name } => write!(f, "User {} logged in", name),
            ServerMessage::RoomList { rooms } => {
                write!(f, "Rooms:")?;
                for (name, members) in rooms {
                    write!(f, " {}({})", name, members)?;
                }
                Ok(())
            }
            ServerMessage::Error { message } => write!(f, "Error: {}", message),
        }
    }
}

/// Convert AppError to ServerMessage for client notification
impl From<AppError> for ServerMessage {
    fn from(err: AppError) -> Self {
        let message = match &err {
            AppError::RoomNotFound(_)
            | AppError::NotInRoom(_)
            | AppError::NoCurrentRoom
            | AppError::RecipientNotFound(_)
            | AppError::SelfMessage
            | AppError::MissingArgument(_) => err.to_string(),
            // Structural errors are resolved locally, never shown verbatim
            _ => "internal error".to_string(),
        };
        ServerMessage::Error { message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            Command::parse("login alice").unwrap(),
            Some(Command::Login {
                name: "alice".to_string()
            })
        );
        assert_eq!(
            Command::parse("join music\r").unwrap(),
            Some(Command::Join {
                room: "music".to_string()
            })
        );
        assert_eq!(Command::parse("logout").unwrap(), Some(Command::Exit));
        assert_eq!(Command::parse("exit").unwrap(), Some(Command::Exit));
        assert_eq!(Command::parse("rooms").unwrap(), Some(Command::Rooms));
    }

    #[test]
    fn test_parse_single_argument_token() {
        // Extra tokens after the argument are dropped
        assert_eq!(
            Command::parse("create rock music").unwrap(),
            Some(Command::Create {
                room: "rock".to_string()
            })
        );
    }

    #[test]
    fn test_parse_plain_text_is_chat() {
        assert_eq!(
            Command::parse("joint venture anyone?").unwrap(),
            Some(Command::Say {
                content: "joint venture anyone?".to_string()
            })
        );
        assert_eq!(
            Command::parse("hello").unwrap(),
            Some(Command::Say {
                content: "hello".to_string()
            })
        );
    }

    #[test]
    fn test_parse_direct_message() {
        assert_eq!(
            Command::parse("msg bob  see you at noon").unwrap(),
            Some(Command::Direct {
                to: "bob".to_string(),
                content: "see you at noon".to_string()
            })
        );
        assert!(matches!(
            Command::parse("msg bob"),
            Err(AppError::MissingArgument(_))
        ));
    }

    #[test]
    fn test_parse_blank_and_missing_argument() {
        assert_eq!(Command::parse("   ").unwrap(), None);
        assert!(matches!(
            Command::parse("join"),
            Err(AppError::MissingArgument("join <room>"))
        ));
    }

    #[test]
    fn test_server_message_lines() {
        let chat = ServerMessage::Chat {
            room: "Lobby".to_string(),
            from: "GUEST_1".to_string(),
            content: "hello".to_string(),
        };
        assert_eq!(chat.to_string(), "[Lobby] GUEST_1: hello");

        let joined = ServerMessage::Joined {
            name: "bob".to_string(),
            room: "music".to_string(),
        };
        assert_eq!(joined.to_string(), "User bob joined room music");

        let list = ServerMessage::RoomList {
            rooms: vec![("Lobby".to_string(), 2), ("music".to_string(), 1)],
        };
        assert_eq!(list.to_string(), "Rooms: Lobby(2) music(1)");
    }

    #[test]
    fn test_error_conversion() {
        let msg: ServerMessage = AppError::RoomNotFound("jazz".to_string()).into();
        assert_eq!(msg.to_string(), "Error: room jazz not found");

        let msg: ServerMessage = AppError::SessionNotFound(crate::types::SessionId(3)).into();
        assert_eq!(msg.to_string(), "Error: internal error");
    }
}
