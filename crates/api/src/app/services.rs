use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{info, warn};

use storefront_cart::{Cart, CartCommand, CartId, RemoveLine, StockedEntry, UpsertLines};
use storefront_catalog::{CatalogReader, InMemoryCatalog, ProductId, ProductSnapshot};
use storefront_checkout::{
    CheckoutSession, InMemoryProfileStore, NotifyError, Notifier, OrderConfirmation,
    PaymentEvent, PaymentProvider, ProfileStore, ProviderError, StubPaymentProvider,
    WebhookError, WebhookVerifier, build_session_request,
};
use storefront_core::{AggregateId, DomainError, Money, UserId};
use storefront_events::{EventEnvelope, InMemoryEventBus};
use storefront_infra::{
    command_dispatcher::{CommandDispatcher, DispatchError},
    event_store::{InMemoryEventStore, StoredEvent},
    projections::{CartReadModel, CartsProjection, OrderReadModel, OrdersProjection},
    read_model::InMemoryReadStore,
    reconciler::{FulfillmentReconciler, ReconcileError, ReconcileOutcome},
};
use storefront_orders::{Order, OrderCommand, OrderId, OrderStatus, PlaceOrder, price_lines};

use crate::config::Config;

type InMemoryBus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
type InMemoryDispatcher = CommandDispatcher<Arc<InMemoryEventStore>, InMemoryBus>;
type CartStore = Arc<InMemoryReadStore<CartId, CartReadModel>>;
type OrderStore = Arc<InMemoryReadStore<OrderId, OrderReadModel>>;
type Reconciler =
    FulfillmentReconciler<Arc<InMemoryEventStore>, InMemoryBus, CartStore, OrderStore>;

#[derive(Debug, Error)]
pub enum ServiceError {
    // No #[from]: DispatchError carries no std::error::Error impl to chain.
    #[error("command dispatch failed: {0:?}")]
    Dispatch(DispatchError),
    #[error("payment provider error: {0}")]
    Provider(#[from] ProviderError),
}

impl From<DispatchError> for ServiceError {
    fn from(value: DispatchError) -> Self {
        Self::Dispatch(value)
    }
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        Self::Dispatch(value.into())
    }
}

/// Notifier that writes confirmations to the log.
///
/// Stand-in delivery channel for dev; swap for a mail sender without
/// touching the reconciler.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send_order_confirmation(
        &self,
        email: &str,
        confirmation: &OrderConfirmation,
    ) -> Result<(), NotifyError> {
        info!(
            email = %email,
            order_id = %confirmation.order_id,
            total = %confirmation.total,
            "order confirmation sent"
        );
        Ok(())
    }
}

/// Application services shared by all handlers.
pub struct AppServices {
    dispatcher: Arc<InMemoryDispatcher>,
    carts: Arc<CartsProjection<CartStore>>,
    orders: Arc<OrdersProjection<OrderStore>>,
    catalog: Arc<InMemoryCatalog>,
    provider: Arc<dyn PaymentProvider>,
    profiles: Arc<InMemoryProfileStore>,
    verifier: WebhookVerifier,
    reconciler: Reconciler,
    config: Config,
}

pub fn build_services(config: Config) -> AppServices {
    // In-memory infra wiring (dev/test): store + bus + projections.
    let store = Arc::new(InMemoryEventStore::new());
    let bus: InMemoryBus = Arc::new(InMemoryEventBus::new());
    let dispatcher = Arc::new(CommandDispatcher::new(store, bus));

    let cart_store: CartStore = Arc::new(InMemoryReadStore::new());
    let carts = Arc::new(CartsProjection::new(cart_store));
    let order_store: OrderStore = Arc::new(InMemoryReadStore::new());
    let orders = Arc::new(OrdersProjection::new(order_store));

    let catalog = Arc::new(InMemoryCatalog::new());
    let provider: Arc<dyn PaymentProvider> = Arc::new(StubPaymentProvider::new());
    let profiles = Arc::new(InMemoryProfileStore::new());
    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);

    let verifier = WebhookVerifier::new(config.webhook_secret.clone());
    let reconciler = FulfillmentReconciler::new(
        dispatcher.clone(),
        carts.clone(),
        orders.clone(),
        profiles.clone() as Arc<dyn ProfileStore>,
        notifier,
    );

    AppServices {
        dispatcher,
        carts,
        orders,
        catalog,
        provider,
        profiles,
        verifier,
        reconciler,
        config,
    }
}

impl AppServices {
    /// Fold freshly committed events into the read models.
    ///
    /// Projections are applied synchronously after dispatch so a handler's
    /// response (and any immediately following GET) reads its own write.
    fn project(&self, committed: &[StoredEvent]) {
        for stored in committed {
            let envelope = stored.to_envelope();
            if let Err(e) = self.carts.apply_envelope(&envelope) {
                warn!(error = %e, "cart projection failed to apply committed event");
            }
            if let Err(e) = self.orders.apply_envelope(&envelope) {
                warn!(error = %e, "order projection failed to apply committed event");
            }
        }
    }

    fn resolve_entry(
        &self,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<StockedEntry, ServiceError> {
        let product = self
            .catalog
            .find_product(&product_id)
            .ok_or_else(|| DomainError::product_not_found(product_id.to_string()))?;
        Ok(StockedEntry {
            product_id,
            quantity,
            available_stock: product.stock,
        })
    }

    /// The user's cart as currently projected. `None` until the first add
    /// opens the cart; a cleared cart still exists, with no lines.
    pub fn cart_view(&self, user_id: UserId) -> Option<CartReadModel> {
        self.carts.get_by_user(user_id)
    }

    pub fn upsert_cart(
        &self,
        user_id: UserId,
        items: Vec<(ProductId, u32)>,
        replace: bool,
    ) -> Result<CartReadModel, ServiceError> {
        let entries = items
            .into_iter()
            .map(|(product_id, quantity)| self.resolve_entry(product_id, quantity))
            .collect::<Result<Vec<_>, _>>()?;

        let cart_id = CartId::for_user(user_id);
        let committed = self.dispatcher.dispatch::<Cart>(
            cart_id.0,
            "cart",
            CartCommand::UpsertLines(UpsertLines {
                cart_id,
                user_id,
                entries,
                replace,
                occurred_at: Utc::now(),
            }),
            |id| Cart::empty(CartId::new(id)),
        )?;
        self.project(&committed);

        self.cart_view(user_id)
            .ok_or(ServiceError::Dispatch(DispatchError::NotFound))
    }

    pub fn remove_cart_line(
        &self,
        user_id: UserId,
        product_id: ProductId,
    ) -> Result<CartReadModel, ServiceError> {
        let cart_id = CartId::for_user(user_id);
        let committed = self.dispatcher.dispatch::<Cart>(
            cart_id.0,
            "cart",
            CartCommand::RemoveLine(RemoveLine {
                cart_id,
                user_id,
                product_id,
                occurred_at: Utc::now(),
            }),
            |id| Cart::empty(CartId::new(id)),
        )?;
        self.project(&committed);

        self.cart_view(user_id)
            .ok_or(ServiceError::Dispatch(DispatchError::NotFound))
    }

    /// Compile the user's cart into a pending order.
    pub fn place_order(&self, user_id: UserId) -> Result<OrderReadModel, ServiceError> {
        let cart = match self.cart_view(user_id) {
            Some(cart) if !cart.lines.is_empty() => cart,
            _ => return Err(DomainError::validation("cart is empty").into()),
        };

        let mut snapshots = HashMap::new();
        for line in &cart.lines {
            let product = self
                .catalog
                .find_product(&line.product_id)
                .ok_or_else(|| DomainError::product_not_found(line.product_id.to_string()))?;
            snapshots.insert(line.product_id, product);
        }
        let priced = price_lines(&cart.lines, &snapshots)?;

        let order_id = OrderId::new(AggregateId::new());
        let committed = self.dispatcher.dispatch::<Order>(
            order_id.0,
            "order",
            OrderCommand::PlaceOrder(PlaceOrder {
                order_id,
                user_id,
                lines: priced.lines,
                total: priced.total,
                occurred_at: Utc::now(),
            }),
            |id| Order::empty(OrderId::new(id)),
        )?;
        self.project(&committed);

        self.orders
            .get(&order_id)
            .ok_or(ServiceError::Dispatch(DispatchError::NotFound))
    }

    pub fn list_orders(&self, user_id: UserId) -> Vec<OrderReadModel> {
        self.orders.list_by_user(user_id)
    }

    pub fn get_order(&self, user_id: UserId, order_id: OrderId) -> Option<OrderReadModel> {
        self.orders
            .get(&order_id)
            .filter(|order| order.user_id == user_id)
    }

    /// Create a hosted payment session for a pending order.
    ///
    /// Nothing is persisted locally; a failed provider call leaves the order
    /// pending and the endpoint can be retried.
    pub fn create_session(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<CheckoutSession, ServiceError> {
        let order = self
            .get_order(user_id, order_id)
            .ok_or(ServiceError::Dispatch(DispatchError::NotFound))?;
        if order.status != OrderStatus::Pending {
            return Err(DomainError::conflict("order is not pending payment").into());
        }

        let request = build_session_request(
            order_id,
            user_id,
            &order.lines,
            self.profiles.email(&user_id),
            self.config.success_url.clone(),
            self.config.cancel_url.clone(),
        );

        Ok(self.provider.create_checkout_session(request)?)
    }

    pub fn verify_webhook(&self, payload: &[u8], signature_header: &str) -> Result<(), WebhookError> {
        self.verifier.verify(payload, signature_header, Utc::now())
    }

    pub fn reconcile_payment(
        &self,
        event: &PaymentEvent,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        self.reconciler.reconcile(event)
    }

    pub fn list_products(&self) -> Vec<ProductSnapshot> {
        let mut products = self.catalog.list();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        products
    }

    /// Seed a product into the catalog.
    pub fn create_product(
        &self,
        name: String,
        price: f64,
        stock: u32,
        kind: Option<String>,
        thumbnail: Option<String>,
    ) -> Result<ProductSnapshot, ServiceError> {
        if name.trim().is_empty() {
            return Err(DomainError::validation("product name must not be empty").into());
        }
        let unit_price = Money::from_major(price)?;

        let product = ProductSnapshot {
            id: ProductId::new(AggregateId::new()),
            name,
            unit_price,
            stock,
            kind,
            thumbnail,
        };
        self.catalog.upsert(product.clone());
        Ok(product)
    }

    pub fn find_product(&self, product_id: &ProductId) -> Option<ProductSnapshot> {
        self.catalog.find_product(product_id)
    }

    pub fn user_email(&self, user_id: UserId) -> Option<String> {
        self.profiles.email(&user_id)
    }
}
