//! Fulfillment reconciliation.
//!
//! Turns a verified payment webhook into local state: settle the order,
//! update the customer's address, clear the cart, send the confirmation.
//! The order settlement is the pivot. Everything after it is best-effort
//! and only logged on failure; everything up to and including it is fatal
//! so the provider's redelivery can retry the whole flow.
//!
//! Replays are absorbed at the settlement step: a second delivery for an
//! already-settled order commits zero events, the remaining steps are
//! skipped, and the webhook still reports success.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{info, warn};

use storefront_cart::{Cart, CartCommand, CartId, ClearCart};
use storefront_checkout::{
    Notifier, OrderConfirmation, PAYMENT_COMPLETED, PaymentEvent, ProfileStore,
};
use storefront_events::{EventBus, EventEnvelope};
use storefront_orders::{MarkPaymentReceived, Order, OrderCommand, OrderId};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::EventStore;
use crate::projections::{CartReadModel, CartsProjection, OrderReadModel, OrdersProjection};
use crate::read_model::ReadModelStore;

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("payment settlement failed: {0:?}")]
    Dispatch(DispatchError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The order transitioned to `payment_received` in this delivery.
    Settled,
    /// Replay of an already-settled order; nothing changed.
    AlreadySettled,
    /// Event type we do not act on.
    Ignored,
}

/// Orchestrates the post-payment flow against the domain.
pub struct FulfillmentReconciler<S, B, CS, OS>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
    CS: ReadModelStore<CartId, CartReadModel>,
    OS: ReadModelStore<OrderId, OrderReadModel>,
{
    dispatcher: Arc<CommandDispatcher<S, B>>,
    carts: Arc<CartsProjection<CS>>,
    orders: Arc<OrdersProjection<OS>>,
    profiles: Arc<dyn ProfileStore>,
    notifier: Arc<dyn Notifier>,
}

impl<S, B, CS, OS> FulfillmentReconciler<S, B, CS, OS>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
    CS: ReadModelStore<CartId, CartReadModel>,
    OS: ReadModelStore<OrderId, OrderReadModel>,
{
    pub fn new(
        dispatcher: Arc<CommandDispatcher<S, B>>,
        carts: Arc<CartsProjection<CS>>,
        orders: Arc<OrdersProjection<OS>>,
        profiles: Arc<dyn ProfileStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            dispatcher,
            carts,
            orders,
            profiles,
            notifier,
        }
    }

    /// Process a verified payment event.
    pub fn reconcile(&self, event: &PaymentEvent) -> Result<ReconcileOutcome, ReconcileError> {
        if event.kind != PAYMENT_COMPLETED {
            info!(kind = %event.kind, "ignoring payment event type");
            return Ok(ReconcileOutcome::Ignored);
        }

        let order_id = event.data.order_id;
        let user_id = event.data.user_id;

        // Settle the order. Zero committed events means the order was
        // already payment_received; the delivery is a replay.
        let committed = self
            .dispatcher
            .dispatch::<Order>(
                order_id.0,
                "order",
                OrderCommand::MarkPaymentReceived(MarkPaymentReceived {
                    order_id,
                    shipping_address: event.data.shipping_address.clone(),
                    occurred_at: Utc::now(),
                }),
                |id| Order::empty(OrderId::new(id)),
            )
            .map_err(ReconcileError::Dispatch)?;

        if committed.is_empty() {
            info!(order_id = %order_id, "webhook replay for settled order, skipping fulfillment");
            return Ok(ReconcileOutcome::AlreadySettled);
        }

        for stored in &committed {
            if let Err(e) = self.orders.apply_envelope(&stored.to_envelope()) {
                warn!(order_id = %order_id, error = %e, "order projection lagging behind settlement");
            }
        }

        if let Some(address) = &event.data.shipping_address {
            if let Err(e) = self.profiles.update_address(&user_id, address) {
                warn!(user_id = %user_id, error = %e, "profile address update failed");
            }
        }

        self.clear_cart(user_id, order_id);
        self.send_confirmation(user_id, order_id);

        info!(order_id = %order_id, "order settled");
        Ok(ReconcileOutcome::Settled)
    }

    fn clear_cart(&self, user_id: storefront_core::UserId, order_id: OrderId) {
        let cart_id = CartId::for_user(user_id);
        let cleared = self.dispatcher.dispatch::<Cart>(
            cart_id.0,
            "cart",
            CartCommand::ClearCart(ClearCart {
                cart_id,
                user_id,
                occurred_at: Utc::now(),
            }),
            |id| Cart::empty(CartId::new(id)),
        );
        match cleared {
            Ok(committed) => {
                for stored in &committed {
                    if let Err(e) = self.carts.apply_envelope(&stored.to_envelope()) {
                        warn!(user_id = %user_id, error = %e, "cart projection lagging behind clear");
                    }
                }
            }
            Err(e) => {
                warn!(order_id = %order_id, user_id = %user_id, error = ?e, "cart clear failed after settlement");
            }
        }
    }

    fn send_confirmation(&self, user_id: storefront_core::UserId, order_id: OrderId) {
        let Some(email) = self.profiles.email(&user_id) else {
            info!(user_id = %user_id, "no email on profile, skipping order confirmation");
            return;
        };
        let Some(order) = self.orders.get(&order_id) else {
            warn!(order_id = %order_id, "settled order missing from read model, skipping confirmation");
            return;
        };

        let confirmation = OrderConfirmation {
            order_id,
            lines: order.lines,
            total: order.total,
        };
        if let Err(e) = self.notifier.send_order_confirmation(&email, &confirmation) {
            warn!(order_id = %order_id, error = %e, "order confirmation delivery failed");
        }
    }
}
