//! Settlement reconciliation: a periodic sweep over pending orders that
//! re-polls the acquiring provider and applies status transitions.
//!
//! Orders are processed independently; one order's gateway or persistence
//! failure never aborts the batch. Expiry of stale unpaid orders applies
//! even when the gateway is unreachable.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::entities::order;
use crate::entities::order::OrderStatus;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::gateway::{PaymentGateway, PaymentStatus};
use crate::services::orders::OrderService;

/// Tally of one reconciliation pass.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SweepSummary {
    pub examined: usize,
    pub marked_paid: usize,
    pub marked_canceled: usize,
    /// Canceled by the age cutoff rather than a provider verdict
    pub expired: usize,
    /// Left untouched: still pending, raced, or gateway failure
    pub skipped: usize,
}

enum Reconciliation {
    Paid,
    Canceled,
    Expired,
    StillPending,
}

#[derive(Clone)]
pub struct SettlementService {
    gateway: Arc<dyn PaymentGateway>,
    orders: OrderService,
    event_sender: EventSender,
    expiry_days: i64,
}

impl SettlementService {
    pub fn new(
        gateway: Arc<dyn PaymentGateway>,
        orders: OrderService,
        event_sender: EventSender,
        expiry_days: i64,
    ) -> Self {
        Self {
            gateway,
            orders,
            event_sender,
            expiry_days,
        }
    }

    /// One pass over all orders still in `New`.
    #[instrument(skip(self))]
    pub async fn run_sweep(&self) -> Result<SweepSummary, ServiceError> {
        let pending = self.orders.list_pending().await?;
        let mut summary = SweepSummary::default();

        for order in pending {
            summary.examined += 1;
            match self.reconcile_order(&order).await {
                Ok(Reconciliation::Paid) => summary.marked_paid += 1,
                Ok(Reconciliation::Canceled) => summary.marked_canceled += 1,
                Ok(Reconciliation::Expired) => {
                    summary.marked_canceled += 1;
                    summary.expired += 1;
                }
                Ok(Reconciliation::StillPending) => summary.skipped += 1,
                Err(e) => {
                    // Per-order fault isolation: log and move on.
                    warn!(order_id = %order.id, error = %e, "Failed to reconcile order");
                    summary.skipped += 1;
                }
            }
        }

        info!(
            examined = summary.examined,
            marked_paid = summary.marked_paid,
            marked_canceled = summary.marked_canceled,
            expired = summary.expired,
            skipped = summary.skipped,
            "Settlement sweep finished"
        );
        self.event_sender
            .send_or_log(Event::SweepCompleted {
                examined: summary.examined,
                marked_paid: summary.marked_paid,
                marked_canceled: summary.marked_canceled,
            })
            .await;
        Ok(summary)
    }

    async fn reconcile_order(&self, order: &order::Model) -> Result<Reconciliation, ServiceError> {
        let verdict = match self.gateway.poll_payment_status(&order.operation_id).await {
            Ok(status) => transition_for(&status),
            Err(e) => {
                // Leave the order untouched; the next sweep retries. The
                // age cutoff below still applies.
                warn!(
                    order_id = %order.id,
                    operation_id = %order.operation_id,
                    error = %e,
                    "Payment status poll failed"
                );
                None
            }
        };

        if let Some(target) = verdict {
            let applied = self.orders.transition_from_new(order.id, target).await?;
            if !applied {
                return Ok(Reconciliation::StillPending);
            }
            return Ok(match target {
                OrderStatus::Paid => Reconciliation::Paid,
                _ => Reconciliation::Canceled,
            });
        }

        if is_expired(order.created_at, Utc::now(), self.expiry_days) {
            info!(order_id = %order.id, "Order exceeded the payment window; canceling");
            let applied = self
                .orders
                .transition_from_new(order.id, OrderStatus::Canceled)
                .await?;
            return Ok(if applied {
                Reconciliation::Expired
            } else {
                Reconciliation::StillPending
            });
        }

        Ok(Reconciliation::StillPending)
    }
}

/// Maps a provider verdict onto an order transition. `CREATED` keeps the
/// order pending; anything that is neither `CREATED` nor `APPROVED` is a
/// terminal non-success state.
fn transition_for(status: &PaymentStatus) -> Option<OrderStatus> {
    match status {
        PaymentStatus::Approved => Some(OrderStatus::Paid),
        PaymentStatus::Created => None,
        PaymentStatus::Other(_) => Some(OrderStatus::Canceled),
    }
}

fn is_expired(created_at: DateTime<Utc>, now: DateTime<Utc>, expiry_days: i64) -> bool {
    now - created_at > Duration::days(expiry_days)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approved_becomes_paid() {
        assert_eq!(
            transition_for(&PaymentStatus::Approved),
            Some(OrderStatus::Paid)
        );
    }

    #[test]
    fn created_stays_pending() {
        assert_eq!(transition_for(&PaymentStatus::Created), None);
    }

    #[test]
    fn any_other_verdict_cancels() {
        for raw in ["DECLINED", "EXPIRED", "REFUNDED", "garbage"] {
            assert_eq!(
                transition_for(&PaymentStatus::Other(raw.to_string())),
                Some(OrderStatus::Canceled),
                "provider status {raw} must cancel"
            );
        }
    }

    #[test]
    fn expiry_cutoff_is_strict() {
        let now = Utc::now();
        assert!(!is_expired(now - Duration::days(7), now, 7));
        assert!(is_expired(now - Duration::days(7) - Duration::seconds(1), now, 7));
        assert!(is_expired(now - Duration::days(30), now, 7));
    }
}
