use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_catalog::ProductId;
use storefront_core::{Aggregate, AggregateId, AggregateRoot, DomainError, UserId};
use storefront_events::Event;

/// Cart identifier.
///
/// Carts are 1:1 with users, so the cart stream id is derived from the user
/// id rather than allocated: every request for a user addresses the same
/// stream, and the cart can be "created lazily" without a lookup table.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartId(pub AggregateId);

impl CartId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    /// The cart stream for a user.
    pub fn for_user(user_id: UserId) -> Self {
        Self(AggregateId::from_uuid(*user_id.as_uuid()))
    }
}

impl core::fmt::Display for CartId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// A cart line: product and quantity. Unique by product within a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// One requested line change, paired with the stock observed for its product
/// at command-build time.
///
/// The stock rides in the command so the aggregate's decision stays pure.
/// It is a point-in-time check, not a reservation: stock can change between
/// the read and the append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockedEntry {
    pub product_id: ProductId,
    pub quantity: u32,
    pub available_stock: u32,
}

/// Aggregate root: Cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cart {
    id: CartId,
    user_id: Option<UserId>,
    lines: Vec<CartLine>,
    version: u64,
    opened: bool,
}

impl Cart {
    /// Create an empty, not-yet-opened aggregate instance for rehydration.
    pub fn empty(id: CartId) -> Self {
        Self {
            id,
            user_id: None,
            lines: Vec::new(),
            version: 0,
            opened: false,
        }
    }

    pub fn id_typed(&self) -> CartId {
        self.id
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_opened(&self) -> bool {
        self.opened
    }

    pub fn quantity_of(&self, product_id: ProductId) -> u32 {
        self.lines
            .iter()
            .find(|l| l.product_id == product_id)
            .map(|l| l.quantity)
            .unwrap_or(0)
    }
}

impl AggregateRoot for Cart {
    type Id = CartId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: UpsertLines.
///
/// `replace == false` merges additively into existing quantities;
/// `replace == true` sets the requested quantities absolutely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpsertLines {
    pub cart_id: CartId,
    pub user_id: UserId,
    pub entries: Vec<StockedEntry>,
    pub replace: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RemoveLine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveLine {
    pub cart_id: CartId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ClearCart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClearCart {
    pub cart_id: CartId,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CartCommand {
    UpsertLines(UpsertLines),
    RemoveLine(RemoveLine),
    ClearCart(ClearCart),
}

/// Event: CartOpened (first add for a user).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartOpened {
    pub cart_id: CartId,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LinesUpserted.
///
/// `lines` carry the absolute resulting quantities, so replaying the event
/// never re-applies a merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinesUpserted {
    pub cart_id: CartId,
    pub user_id: UserId,
    pub lines: Vec<CartLine>,
    pub occurred_at: DateTime<Utc>,
}

/// Event: LineRemoved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRemoved {
    pub cart_id: CartId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: CartCleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartCleared {
    pub cart_id: CartId,
    pub user_id: UserId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CartEvent {
    CartOpened(CartOpened),
    LinesUpserted(LinesUpserted),
    LineRemoved(LineRemoved),
    CartCleared(CartCleared),
}

impl Event for CartEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CartEvent::CartOpened(_) => "cart.opened",
            CartEvent::LinesUpserted(_) => "cart.lines_upserted",
            CartEvent::LineRemoved(_) => "cart.line_removed",
            CartEvent::CartCleared(_) => "cart.cleared",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CartEvent::CartOpened(e) => e.occurred_at,
            CartEvent::LinesUpserted(e) => e.occurred_at,
            CartEvent::LineRemoved(e) => e.occurred_at,
            CartEvent::CartCleared(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Cart {
    type Command = CartCommand;
    type Event = CartEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CartEvent::CartOpened(e) => {
                self.id = e.cart_id;
                self.user_id = Some(e.user_id);
                self.lines.clear();
                self.opened = true;
            }
            CartEvent::LinesUpserted(e) => {
                for line in &e.lines {
                    match self
                        .lines
                        .iter_mut()
                        .find(|l| l.product_id == line.product_id)
                    {
                        Some(existing) => existing.quantity = line.quantity,
                        None => self.lines.push(*line),
                    }
                }
            }
            CartEvent::LineRemoved(e) => {
                self.lines.retain(|l| l.product_id != e.product_id);
            }
            CartEvent::CartCleared(_) => {
                self.lines.clear();
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CartCommand::UpsertLines(cmd) => self.handle_upsert(cmd),
            CartCommand::RemoveLine(cmd) => self.handle_remove(cmd),
            CartCommand::ClearCart(cmd) => self.handle_clear(cmd),
        }
    }
}

impl Cart {
    fn ensure_user(&self, user_id: UserId) -> Result<(), DomainError> {
        if !self.opened {
            return Ok(());
        }
        if self.user_id != Some(user_id) {
            return Err(DomainError::invariant("user mismatch"));
        }
        Ok(())
    }

    fn ensure_cart_id(&self, cart_id: CartId) -> Result<(), DomainError> {
        if self.id != cart_id {
            return Err(DomainError::invariant("cart_id mismatch"));
        }
        Ok(())
    }

    fn handle_upsert(&self, cmd: &UpsertLines) -> Result<Vec<CartEvent>, DomainError> {
        self.ensure_user(cmd.user_id)?;
        self.ensure_cart_id(cmd.cart_id)?;

        if cmd.entries.is_empty() {
            return Err(DomainError::validation("no lines supplied"));
        }

        // Validate every entry before emitting anything: the whole batch is
        // applied or the whole batch is rejected.
        let mut resulting: Vec<CartLine> = Vec::with_capacity(cmd.entries.len());
        for entry in &cmd.entries {
            if entry.quantity == 0 {
                return Err(DomainError::validation("quantity must be positive"));
            }
            if resulting.iter().any(|l| l.product_id == entry.product_id) {
                return Err(DomainError::validation(format!(
                    "duplicate product in request: {}",
                    entry.product_id
                )));
            }

            let quantity = if cmd.replace {
                entry.quantity
            } else {
                self.quantity_of(entry.product_id)
                    .checked_add(entry.quantity)
                    .ok_or_else(|| DomainError::validation("quantity out of range"))?
            };

            if quantity > entry.available_stock {
                return Err(DomainError::insufficient_stock(format!(
                    "product {}: requested {}, available {}",
                    entry.product_id, quantity, entry.available_stock
                )));
            }

            resulting.push(CartLine {
                product_id: entry.product_id,
                quantity,
            });
        }

        let mut events = Vec::with_capacity(2);
        if !self.opened {
            events.push(CartEvent::CartOpened(CartOpened {
                cart_id: cmd.cart_id,
                user_id: cmd.user_id,
                occurred_at: cmd.occurred_at,
            }));
        }
        events.push(CartEvent::LinesUpserted(LinesUpserted {
            cart_id: cmd.cart_id,
            user_id: cmd.user_id,
            lines: resulting,
            occurred_at: cmd.occurred_at,
        }));

        Ok(events)
    }

    fn handle_remove(&self, cmd: &RemoveLine) -> Result<Vec<CartEvent>, DomainError> {
        if !self.opened {
            return Err(DomainError::not_found());
        }
        self.ensure_user(cmd.user_id)?;
        self.ensure_cart_id(cmd.cart_id)?;

        if self.quantity_of(cmd.product_id) == 0 {
            return Err(DomainError::not_found());
        }

        Ok(vec![CartEvent::LineRemoved(LineRemoved {
            cart_id: cmd.cart_id,
            user_id: cmd.user_id,
            product_id: cmd.product_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_clear(&self, cmd: &ClearCart) -> Result<Vec<CartEvent>, DomainError> {
        self.ensure_user(cmd.user_id)?;
        self.ensure_cart_id(cmd.cart_id)?;

        // Idempotent: a cart that was never opened or holds no lines clears
        // to itself with no new facts.
        if !self.opened || self.lines.is_empty() {
            return Ok(vec![]);
        }

        Ok(vec![CartEvent::CartCleared(CartCleared {
            cart_id: cmd.cart_id,
            user_id: cmd.user_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}
