use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_catalog::ProductId;
use storefront_core::{Aggregate, AggregateId, AggregateRoot, DomainError, Money, UserId};
use storefront_events::Event;

/// Order identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub AggregateId);

impl OrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for OrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Order status lifecycle.
///
/// `pending` is the only initial state. There is no way back from
/// `payment_received`; `returned` is modeled as a direct edge from `pending`
/// (the full post-fulfillment return flow lives outside this pipeline).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    PaymentReceived,
    Canceled,
    Returned,
}

/// Order line with price and name snapshotted at purchase time.
///
/// Later catalog edits never alter these: they are what the customer agreed
/// to pay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
    pub product_name: String,
}

impl OrderLine {
    /// Line total in minor units; `None` on overflow.
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price.checked_mul(self.quantity)
    }
}

/// Shipping address as delivered by the payment provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

/// Aggregate root: Order.
///
/// Immutable once placed, aside from status transitions and the shipping
/// address attached when payment settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    user_id: Option<UserId>,
    status: OrderStatus,
    lines: Vec<OrderLine>,
    total: Money,
    shipping_address: Option<ShippingAddress>,
    version: u64,
    placed: bool,
}

impl Order {
    /// Create an empty, not-yet-placed aggregate instance for rehydration.
    pub fn empty(id: OrderId) -> Self {
        Self {
            id,
            user_id: None,
            status: OrderStatus::Pending,
            lines: Vec::new(),
            total: Money::ZERO,
            shipping_address: None,
            version: 0,
            placed: false,
        }
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn lines(&self) -> &[OrderLine] {
        &self.lines
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn shipping_address(&self) -> Option<&ShippingAddress> {
        self.shipping_address.as_ref()
    }

    pub fn is_settled(&self) -> bool {
        matches!(self.status, OrderStatus::PaymentReceived)
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: PlaceOrder.
///
/// `total` is what the compiler computed; the aggregate re-derives it from
/// the lines and rejects any drift before the order is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceOrder {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub lines: Vec<OrderLine>,
    pub total: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkPaymentReceived.
///
/// Idempotent: an order already settled produces no events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkPaymentReceived {
    pub order_id: OrderId,
    pub shipping_address: Option<ShippingAddress>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: CancelOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOrder {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkReturned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkReturned {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderCommand {
    PlaceOrder(PlaceOrder),
    MarkPaymentReceived(MarkPaymentReceived),
    CancelOrder(CancelOrder),
    MarkReturned(MarkReturned),
}

/// Event: OrderPlaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPlaced {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub lines: Vec<OrderLine>,
    pub total: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderPaymentReceived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPaymentReceived {
    pub order_id: OrderId,
    pub shipping_address: Option<ShippingAddress>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderCanceled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCanceled {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: OrderReturned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderReturned {
    pub order_id: OrderId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEvent {
    OrderPlaced(OrderPlaced),
    OrderPaymentReceived(OrderPaymentReceived),
    OrderCanceled(OrderCanceled),
    OrderReturned(OrderReturned),
}

impl Event for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderPlaced(_) => "orders.order.placed",
            OrderEvent::OrderPaymentReceived(_) => "orders.order.payment_received",
            OrderEvent::OrderCanceled(_) => "orders.order.canceled",
            OrderEvent::OrderReturned(_) => "orders.order.returned",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderPlaced(e) => e.occurred_at,
            OrderEvent::OrderPaymentReceived(e) => e.occurred_at,
            OrderEvent::OrderCanceled(e) => e.occurred_at,
            OrderEvent::OrderReturned(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Order {
    type Command = OrderCommand;
    type Event = OrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::OrderPlaced(e) => {
                self.id = e.order_id;
                self.user_id = Some(e.user_id);
                self.status = OrderStatus::Pending;
                self.lines = e.lines.clone();
                self.total = e.total;
                self.shipping_address = None;
                self.placed = true;
            }
            OrderEvent::OrderPaymentReceived(e) => {
                self.status = OrderStatus::PaymentReceived;
                if e.shipping_address.is_some() {
                    self.shipping_address = e.shipping_address.clone();
                }
            }
            OrderEvent::OrderCanceled(_) => {
                self.status = OrderStatus::Canceled;
            }
            OrderEvent::OrderReturned(_) => {
                self.status = OrderStatus::Returned;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::PlaceOrder(cmd) => self.handle_place(cmd),
            OrderCommand::MarkPaymentReceived(cmd) => self.handle_mark_payment_received(cmd),
            OrderCommand::CancelOrder(cmd) => self.handle_cancel(cmd),
            OrderCommand::MarkReturned(cmd) => self.handle_mark_returned(cmd),
        }
    }
}

impl Order {
    fn ensure_order_id(&self, order_id: OrderId) -> Result<(), DomainError> {
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn handle_place(&self, cmd: &PlaceOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if self.placed {
            return Err(DomainError::conflict("order already exists"));
        }
        self.ensure_order_id(cmd.order_id)?;

        if cmd.lines.is_empty() {
            return Err(DomainError::validation("order must contain at least one line"));
        }

        let mut derived = Money::ZERO;
        for line in &cmd.lines {
            if line.quantity == 0 {
                return Err(DomainError::validation("quantity must be positive"));
            }
            let line_total = line
                .line_total()
                .ok_or_else(|| DomainError::validation("order total out of range"))?;
            derived = derived
                .checked_add(line_total)
                .ok_or_else(|| DomainError::validation("order total out of range"))?;
        }

        // Write-time invariant: the stored total always equals the sum of its
        // line snapshots.
        if derived != cmd.total {
            return Err(DomainError::invariant(format!(
                "order total {} does not match its lines ({})",
                cmd.total, derived
            )));
        }

        Ok(vec![OrderEvent::OrderPlaced(OrderPlaced {
            order_id: cmd.order_id,
            user_id: cmd.user_id,
            lines: cmd.lines.clone(),
            total: cmd.total,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_payment_received(
        &self,
        cmd: &MarkPaymentReceived,
    ) -> Result<Vec<OrderEvent>, DomainError> {
        if !self.placed {
            return Err(DomainError::not_found());
        }
        self.ensure_order_id(cmd.order_id)?;

        match self.status {
            // Replay of an already-settled order: nothing new happened.
            OrderStatus::PaymentReceived => Ok(vec![]),
            OrderStatus::Canceled | OrderStatus::Returned => Err(DomainError::invariant(
                "cannot record payment for a canceled or returned order",
            )),
            OrderStatus::Pending => Ok(vec![OrderEvent::OrderPaymentReceived(
                OrderPaymentReceived {
                    order_id: cmd.order_id,
                    shipping_address: cmd.shipping_address.clone(),
                    occurred_at: cmd.occurred_at,
                },
            )]),
        }
    }

    fn handle_cancel(&self, cmd: &CancelOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if !self.placed {
            return Err(DomainError::not_found());
        }
        self.ensure_order_id(cmd.order_id)?;

        if self.status != OrderStatus::Pending {
            return Err(DomainError::invariant("only pending orders can be canceled"));
        }

        Ok(vec![OrderEvent::OrderCanceled(OrderCanceled {
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_returned(&self, cmd: &MarkReturned) -> Result<Vec<OrderEvent>, DomainError> {
        if !self.placed {
            return Err(DomainError::not_found());
        }
        self.ensure_order_id(cmd.order_id)?;

        if self.status != OrderStatus::Pending {
            return Err(DomainError::invariant("only pending orders can be returned"));
        }

        Ok(vec![OrderEvent::OrderReturned(OrderReturned {
            order_id: cmd.order_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_order_id() -> OrderId {
        OrderId::new(AggregateId::new())
    }

    fn test_product_id() -> ProductId {
        ProductId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn line(unit_minor: u64, quantity: u32) -> OrderLine {
        OrderLine {
            product_id: test_product_id(),
            quantity,
            unit_price: Money::from_minor(unit_minor),
            product_name: "widget".to_string(),
        }
    }

    fn place(order_id: OrderId, lines: Vec<OrderLine>, total: Money) -> OrderCommand {
        OrderCommand::PlaceOrder(PlaceOrder {
            order_id,
            user_id: UserId::new(),
            lines,
            total,
            occurred_at: test_time(),
        })
    }

    fn placed_order(lines: Vec<OrderLine>, total: Money) -> Order {
        let order_id = test_order_id();
        let mut order = Order::empty(order_id);
        let events = order.handle(&place(order_id, lines, total)).unwrap();
        for e in &events {
            order.apply(e);
        }
        order
    }

    #[test]
    fn place_order_snapshots_lines_and_total() {
        // 12.50 x 2 -> 25.00
        let order = placed_order(vec![line(1250, 2)], Money::from_minor(2500));

        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.total(), Money::from_minor(2500));
        assert_eq!(order.lines()[0].unit_price, Money::from_minor(1250));
        assert!(order.shipping_address().is_none());
    }

    #[test]
    fn mismatched_total_is_rejected() {
        let order_id = test_order_id();
        let order = Order::empty(order_id);

        let err = order
            .handle(&place(order_id, vec![line(1250, 2)], Money::from_minor(2499)))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn empty_line_set_is_rejected() {
        let order_id = test_order_id();
        let order = Order::empty(order_id);

        let err = order
            .handle(&place(order_id, vec![], Money::ZERO))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn zero_quantity_line_is_rejected() {
        let order_id = test_order_id();
        let order = Order::empty(order_id);

        let err = order
            .handle(&place(order_id, vec![line(1250, 0)], Money::ZERO))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn payment_received_attaches_address_and_settles() {
        let mut order = placed_order(vec![line(1000, 1)], Money::from_minor(1000));
        let address = ShippingAddress {
            line1: "1 Main St".to_string(),
            line2: None,
            city: "Springfield".to_string(),
            postal_code: "12345".to_string(),
            country: "US".to_string(),
        };

        let events = order
            .handle(&OrderCommand::MarkPaymentReceived(MarkPaymentReceived {
                order_id: order.id_typed(),
                shipping_address: Some(address.clone()),
                occurred_at: test_time(),
            }))
            .unwrap();
        assert_eq!(events.len(), 1);
        for e in &events {
            order.apply(e);
        }

        assert_eq!(order.status(), OrderStatus::PaymentReceived);
        assert_eq!(order.shipping_address(), Some(&address));
    }

    #[test]
    fn payment_received_is_idempotent() {
        let mut order = placed_order(vec![line(1000, 1)], Money::from_minor(1000));
        let cmd = OrderCommand::MarkPaymentReceived(MarkPaymentReceived {
            order_id: order.id_typed(),
            shipping_address: None,
            occurred_at: test_time(),
        });

        let events = order.handle(&cmd).unwrap();
        for e in &events {
            order.apply(e);
        }
        let version_after_first = order.version();

        // Replay: no events, no state change.
        let events = order.handle(&cmd).unwrap();
        assert!(events.is_empty());
        assert_eq!(order.version(), version_after_first);
        assert_eq!(order.status(), OrderStatus::PaymentReceived);
    }

    #[test]
    fn canceled_order_cannot_receive_payment() {
        let mut order = placed_order(vec![line(1000, 1)], Money::from_minor(1000));
        let events = order
            .handle(&OrderCommand::CancelOrder(CancelOrder {
                order_id: order.id_typed(),
                occurred_at: test_time(),
            }))
            .unwrap();
        for e in &events {
            order.apply(e);
        }

        let err = order
            .handle(&OrderCommand::MarkPaymentReceived(MarkPaymentReceived {
                order_id: order.id_typed(),
                shipping_address: None,
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));
    }

    #[test]
    fn settled_order_cannot_be_canceled_or_returned() {
        let mut order = placed_order(vec![line(1000, 1)], Money::from_minor(1000));
        let events = order
            .handle(&OrderCommand::MarkPaymentReceived(MarkPaymentReceived {
                order_id: order.id_typed(),
                shipping_address: None,
                occurred_at: test_time(),
            }))
            .unwrap();
        for e in &events {
            order.apply(e);
        }

        assert!(order
            .handle(&OrderCommand::CancelOrder(CancelOrder {
                order_id: order.id_typed(),
                occurred_at: test_time(),
            }))
            .is_err());
        assert!(order
            .handle(&OrderCommand::MarkReturned(MarkReturned {
                order_id: order.id_typed(),
                occurred_at: test_time(),
            }))
            .is_err());
    }

    #[test]
    fn placing_twice_conflicts() {
        let order = placed_order(vec![line(1000, 1)], Money::from_minor(1000));
        let err = order
            .handle(&place(
                order.id_typed(),
                vec![line(1000, 1)],
                Money::from_minor(1000),
            ))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }
}
