use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::order::OrderStatus;

/// Domain events emitted by the checkout and settlement services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: OrderStatus,
        new_status: OrderStatus,
    },
    SweepCompleted {
        examined: usize,
        marked_paid: usize,
        marked_canceled: usize,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event, failing if the channel is closed or full.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event; a delivery failure is logged, never propagated.
    /// Event delivery is best-effort and must not fail the operation that
    /// produced it.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!(error = %e, "Dropped domain event");
        }
    }
}

/// Consumes the event channel. Currently events only feed the log; the
/// channel is the seam where outbound integrations would attach.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderCreated(order_id) => {
                info!(order_id = %order_id, "event: order created");
            }
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(
                    order_id = %order_id,
                    old_status = ?old_status,
                    new_status = ?new_status,
                    "event: order status changed"
                );
            }
            Event::SweepCompleted {
                examined,
                marked_paid,
                marked_canceled,
            } => {
                info!(
                    examined,
                    marked_paid, marked_canceled, "event: settlement sweep completed"
                );
            }
        }
    }
    info!("Event channel closed; processor exiting");
}
