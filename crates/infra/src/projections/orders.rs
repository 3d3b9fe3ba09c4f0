use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use storefront_core::{AggregateId, Money, UserId};
use storefront_events::EventEnvelope;
use storefront_orders::{OrderEvent, OrderId, OrderLine, OrderStatus, ShippingAddress};

use crate::projections::ProjectionError;
use crate::read_model::ReadModelStore;

/// Order as served by `GET /orders` and `GET /orders/:id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderReadModel {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub lines: Vec<OrderLine>,
    pub total: Money,
    pub shipping_address: Option<ShippingAddress>,
    pub placed_at: DateTime<Utc>,
}

/// Folds order events into [`OrderReadModel`]s.
#[derive(Debug)]
pub struct OrdersProjection<S>
where
    S: ReadModelStore<OrderId, OrderReadModel>,
{
    store: S,
    cursors: RwLock<HashMap<AggregateId, u64>>,
}

impl<S> OrdersProjection<S>
where
    S: ReadModelStore<OrderId, OrderReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: RwLock::new(HashMap::new()),
        }
    }

    fn cursor(&self, aggregate_id: AggregateId) -> u64 {
        match self.cursors.read() {
            Ok(cursors) => *cursors.get(&aggregate_id).unwrap_or(&0),
            Err(_) => 0,
        }
    }

    fn update_cursor(&self, aggregate_id: AggregateId, seq: u64) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.insert(aggregate_id, seq);
        }
    }

    pub fn get(&self, order_id: &OrderId) -> Option<OrderReadModel> {
        self.store.get(order_id)
    }

    pub fn list_by_user(&self, user_id: UserId) -> Vec<OrderReadModel> {
        let mut orders: Vec<_> = self
            .store
            .list()
            .into_iter()
            .filter(|o| o.user_id == user_id)
            .collect();
        orders.sort_by_key(|o| o.placed_at);
        orders
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != "order" {
            return Ok(());
        }

        let aggregate_id = envelope.aggregate_id();
        let seq = envelope.sequence_number();

        let last = self.cursor(aggregate_id);
        if seq == 0 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }
        if seq <= last {
            // Duplicate delivery; already folded in.
            return Ok(());
        }
        // Streams start at 1 and have no gaps; a fresh stream seen first at
        // any later sequence is a gap too.
        if seq != last + 1 {
            return Err(ProjectionError::NonMonotonicSequence { last, found: seq });
        }

        let ev: OrderEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let order_id = match &ev {
            OrderEvent::OrderPlaced(e) => e.order_id,
            OrderEvent::OrderPaymentReceived(e) => e.order_id,
            OrderEvent::OrderCanceled(e) => e.order_id,
            OrderEvent::OrderReturned(e) => e.order_id,
        };
        if order_id.0 != aggregate_id {
            return Err(ProjectionError::StreamMismatch(
                "event order_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match ev {
            OrderEvent::OrderPlaced(e) => {
                self.store.upsert(
                    e.order_id,
                    OrderReadModel {
                        order_id: e.order_id,
                        user_id: e.user_id,
                        status: OrderStatus::Pending,
                        lines: e.lines,
                        total: e.total,
                        shipping_address: None,
                        placed_at: e.occurred_at,
                    },
                );
            }
            OrderEvent::OrderPaymentReceived(e) => {
                if let Some(mut rm) = self.store.get(&e.order_id) {
                    rm.status = OrderStatus::PaymentReceived;
                    if e.shipping_address.is_some() {
                        rm.shipping_address = e.shipping_address;
                    }
                    self.store.upsert(e.order_id, rm);
                }
            }
            OrderEvent::OrderCanceled(e) => {
                if let Some(mut rm) = self.store.get(&e.order_id) {
                    rm.status = OrderStatus::Canceled;
                    self.store.upsert(e.order_id, rm);
                }
            }
            OrderEvent::OrderReturned(e) => {
                if let Some(mut rm) = self.store.get(&e.order_id) {
                    rm.status = OrderStatus::Returned;
                    self.store.upsert(e.order_id, rm);
                }
            }
        }

        self.update_cursor(aggregate_id, seq);
        Ok(())
    }
}
