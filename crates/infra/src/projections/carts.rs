use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::Value as JsonValue;

use storefront_cart::{CartEvent, CartId, CartLine};
use storefront_core::{AggregateId, UserId};
use storefront_events::EventEnvelope;

use crate::projections::ProjectionError;
use crate::read_model::ReadModelStore;

/// Current cart contents as served by `GET /cart`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartReadModel {
    pub cart_id: CartId,
    pub user_id: UserId,
    pub lines: Vec<CartLine>,
}

/// Folds cart events into [`CartReadModel`]s.
#[derive(Debug)]
pub struct CartsProjection<S>
where
    S: ReadModelStore<CartId, CartReadModel>,
{
    store: S,
    cursors: RwLock<HashMap<AggregateId, u64>>,
}

impl<S> CartsProjection<S>
where
    S: ReadModelStore<CartId, CartReadModel>,
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

    pub fn get(&self, cart_id: &CartId) -> Option<CartReadModel> {
        self.store.get(cart_id)
    }

    pub fn get_by_user(&self, user_id: UserId) -> Option<CartReadModel> {
        self.store.get(&CartId::for_user(user_id))
    }

    pub fn apply_envelope(
        &self,
        envelope: &EventEnvelope<JsonValue>,
    ) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != "cart" {
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

        let ev: CartEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let cart_id = match &ev {
            CartEvent::CartOpened(e) => e.cart_id,
            CartEvent::LinesUpserted(e) => e.cart_id,
            CartEvent::LineRemoved(e) => e.cart_id,
            CartEvent::CartCleared(e) => e.cart_id,
        };
        if cart_id.0 != aggregate_id {
            return Err(ProjectionError::StreamMismatch(
                "event cart_id does not match envelope aggregate_id".to_string(),
            ));
        }

        match ev {
            CartEvent::CartOpened(e) => {
                self.store.upsert(
                    e.cart_id,
                    CartReadModel {
                        cart_id: e.cart_id,
                        user_id: e.user_id,
                        lines: vec![],
                    },
                );
            }
            CartEvent::LinesUpserted(e) => {
                let mut rm = self.store.get(&e.cart_id).unwrap_or(CartReadModel {
                    cart_id: e.cart_id,
                    user_id: e.user_id,
                    lines: vec![],
                });
                // Event lines carry absolute resulting quantities.
                for line in e.lines {
                    match rm.lines.iter_mut().find(|l| l.product_id == line.product_id) {
                        Some(existing) => existing.quantity = line.quantity,
                        None => rm.lines.push(line),
                    }
                }
                self.store.upsert(e.cart_id, rm);
            }
            CartEvent::LineRemoved(e) => {
                if let Some(mut rm) = self.store.get(&e.cart_id) {
                    rm.lines.retain(|l| l.product_id != e.product_id);
                    self.store.upsert(e.cart_id, rm);
                }
            }
            CartEvent::CartCleared(e) => {
                if let Some(mut rm) = self.store.get(&e.cart_id) {
                    rm.lines.clear();
                    self.store.upsert(e.cart_id, rm);
                }
            }
        }

        self.update_cursor(aggregate_id, seq);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use storefront_cart::{CartCleared, CartOpened, LinesUpserted};
    use storefront_catalog::ProductId;
    use storefront_events::Event;
    use uuid::Uuid;

    use crate::read_model::InMemoryReadStore;

    fn envelope(cart_id: CartId, seq: u64, ev: &CartEvent) -> EventEnvelope<JsonValue> {
        EventEnvelope::new(
            Uuid::now_v7(),
            cart_id.0,
            "cart",
            seq,
            serde_json::to_value(ev).unwrap(),
        )
    }

    fn projection() -> CartsProjection<InMemoryReadStore<CartId, CartReadModel>> {
        CartsProjection::new(InMemoryReadStore::new())
    }

    #[test]
    fn folds_open_upsert_clear() {
        let projection = projection();
        let user_id = UserId::new();
        let cart_id = CartId::for_user(user_id);
        let product = ProductId::new(AggregateId::new());

        let opened = CartEvent::CartOpened(CartOpened {
            cart_id,
            user_id,
            occurred_at: Utc::now(),
        });
        let upserted = CartEvent::LinesUpserted(LinesUpserted {
            cart_id,
            user_id,
            lines: vec![CartLine { product_id: product, quantity: 3 }],
            occurred_at: Utc::now(),
        });
        let cleared = CartEvent::CartCleared(CartCleared {
            cart_id,
            user_id,
            occurred_at: Utc::now(),
        });
        assert_eq!(opened.event_type(), "cart.opened");

        projection.apply_envelope(&envelope(cart_id, 1, &opened)).unwrap();
        projection.apply_envelope(&envelope(cart_id, 2, &upserted)).unwrap();
        assert_eq!(
            projection.get_by_user(user_id).unwrap().lines,
            vec![CartLine { product_id: product, quantity: 3 }]
        );

        projection.apply_envelope(&envelope(cart_id, 3, &cleared)).unwrap();
        assert!(projection.get_by_user(user_id).unwrap().lines.is_empty());
    }

    #[test]
    fn duplicate_envelope_is_skipped() {
        let projection = projection();
        let user_id = UserId::new();
        let cart_id = CartId::for_user(user_id);
        let product = ProductId::new(AggregateId::new());

        projection
            .apply_envelope(&envelope(
                cart_id,
                1,
                &CartEvent::CartOpened(CartOpened { cart_id, user_id, occurred_at: Utc::now() }),
            ))
            .unwrap();
        let upserted = CartEvent::LinesUpserted(LinesUpserted {
            cart_id,
            user_id,
            lines: vec![CartLine { product_id: product, quantity: 2 }],
            occurred_at: Utc::now(),
        });
        projection.apply_envelope(&envelope(cart_id, 2, &upserted)).unwrap();
        // Redelivery of the same sequence number changes nothing.
        projection.apply_envelope(&envelope(cart_id, 2, &upserted)).unwrap();

        assert_eq!(projection.get_by_user(user_id).unwrap().lines.len(), 1);
        assert_eq!(projection.get_by_user(user_id).unwrap().lines[0].quantity, 2);
    }

    #[test]
    fn sequence_gap_is_an_error() {
        let projection = projection();
        let user_id = UserId::new();
        let cart_id = CartId::for_user(user_id);

        projection
            .apply_envelope(&envelope(
                cart_id,
                1,
                &CartEvent::CartOpened(CartOpened { cart_id, user_id, occurred_at: Utc::now() }),
            ))
            .unwrap();

        let err = projection
            .apply_envelope(&envelope(
                cart_id,
                3,
                &CartEvent::CartCleared(CartCleared { cart_id, user_id, occurred_at: Utc::now() }),
            ))
            .unwrap_err();
        assert!(matches!(
            err,
            ProjectionError::NonMonotonicSequence { last: 1, found: 3 }
        ));
    }

    #[test]
    fn fresh_stream_must_start_at_sequence_one() {
        let projection = projection();
        let user_id = UserId::new();
        let cart_id = CartId::for_user(user_id);
        let product = ProductId::new(AggregateId::new());

        let upserted = CartEvent::LinesUpserted(LinesUpserted {
            cart_id,
            user_id,
            lines: vec![CartLine { product_id: product, quantity: 1 }],
            occurred_at: Utc::now(),
        });
        let err = projection.apply_envelope(&envelope(cart_id, 2, &upserted)).unwrap_err();
        assert!(matches!(
            err,
            ProjectionError::NonMonotonicSequence { last: 0, found: 2 }
        ));

        // The cursor did not advance, so the real seq-1 event still applies.
        projection
            .apply_envelope(&envelope(
                cart_id,
                1,
                &CartEvent::CartOpened(CartOpened { cart_id, user_id, occurred_at: Utc::now() }),
            ))
            .unwrap();
        projection.apply_envelope(&envelope(cart_id, 2, &upserted)).unwrap();
        assert_eq!(projection.get_by_user(user_id).unwrap().lines.len(), 1);
    }

    #[test]
    fn foreign_aggregate_types_are_ignored() {
        let projection = projection();
        let envelope = EventEnvelope::new(
            Uuid::now_v7(),
            AggregateId::new(),
            "order",
            1,
            serde_json::json!({}),
        );
        projection.apply_envelope(&envelope).unwrap();
        assert!(projection.store.list().is_empty());
    }
}
