//! Connection handler
//!
//! Runs one connection: registers a session, reads newline-delimited lines
//! into the dispatcher, writes queued lines back, and tears the session down
//! when either direction ends.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info};

use crate::codec::LineCodec;
use crate::error::AppError;
use crate::server::{ChatServer, Flow};

/// Handle a new connection
///
/// Returns once the peer disconnects, sends `exit`/`logout`, or the
/// session is dropped by the server. End-of-stream is a normal return.
pub async fn handle_connection<S>(stream: S, server: Arc<ChatServer>) -> Result<(), AppError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let max_line = server.config().max_line_length;
    let (reader, writer) = tokio::io::split(stream);
    let mut lines = FramedRead::new(reader, LineCodec::new(max_line));
    let mut sink = FramedWrite::new(writer, LineCodec::new(max_line));

    let (session_id, mut msg_rx) = server.connect()?;
    info!("Session {} connected", session_id);

    // Read task (lines -> dispatcher)
    let read_server = Arc::clone(&server);
    let mut read_task = tokio::spawn(async move {
        while let Some(line) = lines.next().await {
            match line {
                Ok(line) => {
                    if read_server.dispatch(session_id, &line) == Flow::Exit {
                        debug!("Session {} requested exit", session_id);
                        break;
                    }
                }
                Err(e) => {
                    debug!("Read error for {}: {}", session_id, e);
                    break;
                }
            }
        }
        debug!("Read task ended for {}", session_id);
    });

    // Write task (queued lines -> socket); ends when the session's
    // transmit endpoint is released
    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = msg_rx.recv().await {
            if let Err(e) = sink.send(msg).await {
                debug!("Write failed, ending write task: {}", e);
                break;
            }
        }
        let _ = sink.close().await;
    });

    let write_finished = tokio::select! {
        _ = &mut read_task => false,
        _ = &mut write_task => true,
    };

    if write_finished {
        read_task.abort();
    }

    server.teardown(session_id);

    // Flush whatever was queued before teardown
    if !write_finished {
        let _ = write_task.await;
    }

    info!("Session {} disconnected", session_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    use crate::config::ServerConfig;

    #[tokio::test]
    async fn test_two_clients_chat_over_streams() {
        let server = Arc::new(ChatServer::new(ServerConfig::default()));

        let (client1, conn1) = tokio::io::duplex(1024);
        let (client2, conn2) = tokio::io::duplex(1024);
        let handler1 = tokio::spawn(handle_connection(conn1, Arc::clone(&server)));

        let (read1, mut write1) = tokio::io::split(client1);
        let mut read1 = BufReader::new(read1).lines();

        write1.write_all(b"login alice\n").await.unwrap();
        // Wait until the first session is named before the second arrives
        while server.find_by_name("alice").is_none() {
            tokio::task::yield_now().await;
        }

        let handler2 = tokio::spawn(handle_connection(conn2, Arc::clone(&server)));
        let (read2, mut write2) = tokio::io::split(client2);
        let mut read2 = BufReader::new(read2).lines();

        let joined = read1.next_line().await.unwrap().unwrap();
        assert!(joined.starts_with("User GUEST_"));
        assert!(joined.ends_with("joined room Lobby"));

        write1.write_all(b"hello there\n").await.unwrap();
        assert_eq!(
            read2.next_line().await.unwrap().unwrap(),
            "[Lobby] alice: hello there"
        );

        write2.write_all(b"logout\n").await.unwrap();
        handler2.await.unwrap().unwrap();
        assert_eq!(read2.next_line().await.unwrap(), None);

        let left = read1.next_line().await.unwrap().unwrap();
        assert!(left.ends_with("left room Lobby"));

        // Peer hang-up is a normal disconnect
        write1.shutdown().await.unwrap();
        handler1.await.unwrap().unwrap();
        assert_eq!(server.user_count(), 0);
        assert!(server.is_consistent());
    }

    #[tokio::test]
    async fn test_oversized_line_is_truncated() {
        let config = ServerConfig {
            max_line_length: 13,
            ..ServerConfig::default()
        };
        let server = Arc::new(ChatServer::new(config));

        let (client, conn) = tokio::io::duplex(1024);
        let handler = tokio::spawn(handle_connection(conn, Arc::clone(&server)));
        let (read, mut write) = tokio::io::split(client);
        let mut read = BufReader::new(read).lines();

        write.write_all(b"join jazzclub-extended\n").await.unwrap();
        assert_eq!(
            read.next_line().await.unwrap().unwrap(),
            "Error: room jazzclub not found"
        );

        write.write_all(b"exit\n").await.unwrap();
        handler.await.unwrap().unwrap();
    }
}
