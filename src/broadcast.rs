//! Broadcast engine
//!
//! Fans one line out to a recipient snapshot. The snapshot is resolved by
//! the caller under the registry locks; by the time `fan_out` runs no lock
//! is held. One recipient's failure never stops delivery to the rest.

use tracing::warn;

use crate::error::SendError;
use crate::message::ServerMessage;
use crate::session::Outbound;
use crate::types::SessionId;

/// Outcome of one fan-out
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Delivery {
    /// Recipients a send was attempted for
    pub attempted: usize,
    /// Recipients the line was queued for
    pub delivered: usize,
    /// Recipients that should be torn down (queue closed, or too many
    /// consecutive failures)
    pub unresponsive: Vec<SessionId>,
}

/// Deliver `msg` to every recipient
pub fn fan_out(
    recipients: &[(SessionId, Outbound)],
    msg: &ServerMessage,
    max_failures: u32,
) -> Delivery {
    let mut delivery = Delivery {
        attempted: recipients.len(),
        ..Delivery::default()
    };

    for (id, outbound) in recipients {
        match outbound.deliver(msg.clone()) {
            Ok(()) => delivery.delivered += 1,
            Err(SendError::ChannelClosed) => {
                warn!(session = %id, "delivery failed: channel closed");
                delivery.unresponsive.push(*id);
            }
            Err(SendError::ChannelFull) => {
                let failures = outbound.failures();
                warn!(session = %id, failures, "delivery failed: queue full");
                if failures >= max_failures {
                    delivery.unresponsive.push(*id);
                }
            }
        }
    }

    delivery
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn line() -> ServerMessage {
        ServerMessage::Chat {
            room: "Lobby".to_string(),
            from: "alice".to_string(),
            content: "hi".to_string(),
        }
    }

    #[tokio::test]
    async fn test_fan_out_reaches_everyone() {
        let (tx1, mut rx1) = mpsc::channel(4);
        let (tx2, mut rx2) = mpsc::channel(4);
        let recipients = vec![
            (SessionId::next(), Outbound::new(tx1)),
            (SessionId::next(), Outbound::new(tx2)),
        ];

        let delivery = fan_out(&recipients, &line(), 3);
        assert_eq!(delivery.attempted, 2);
        assert_eq!(delivery.delivered, 2);
        assert!(delivery.unresponsive.is_empty());

        assert_eq!(rx1.recv().await, Some(line()));
        assert_eq!(rx2.recv().await, Some(line()));
    }

    #[tokio::test]
    async fn test_failed_recipient_does_not_stop_others() {
        let (closed_tx, closed_rx) = mpsc::channel(4);
        drop(closed_rx);
        let (full_tx, _full_rx) = mpsc::channel(1);
        let (ok_tx, mut ok_rx) = mpsc::channel(4);

        let closed_id = SessionId::next();
        let full_id = SessionId::next();
        let full = Outbound::new(full_tx);
        full.deliver(line()).unwrap();

        let recipients = vec![
            (closed_id, Outbound::new(closed_tx)),
            (full_id, full),
            (SessionId::next(), Outbound::new(ok_tx)),
        ];

        let delivery = fan_out(&recipients, &line(), 2);
        assert_eq!(delivery.attempted, 3);
        assert_eq!(delivery.delivered, 1);
        // One full-queue failure is below the threshold
        assert_eq!(delivery.unresponsive, vec![closed_id]);
        assert_eq!(ok_rx.recv().await, Some(line()));

        let delivery = fan_out(&recipients[1..2], &line(), 2);
        assert_eq!(delivery.unresponsive, vec![full_id]);
    }
}
