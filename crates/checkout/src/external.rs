//! Side interfaces of the fulfillment flow. Both are best-effort from the
//! reconciler's point of view: failures are logged and never roll back the
//! settled order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use thiserror::Error;

use storefront_core::{Money, UserId};
use storefront_orders::{OrderId, OrderLine, ShippingAddress};

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("profile store unavailable: {0}")]
    Unavailable(String),
}

/// Customer profile lookup and update.
pub trait ProfileStore: Send + Sync {
    fn email(&self, user_id: &UserId) -> Option<String>;
    fn update_address(
        &self,
        user_id: &UserId,
        address: &ShippingAddress,
    ) -> Result<(), ProfileError>;
}

impl<P> ProfileStore for Arc<P>
where
    P: ProfileStore + ?Sized,
{
    fn email(&self, user_id: &UserId) -> Option<String> {
        (**self).email(user_id)
    }

    fn update_address(
        &self,
        user_id: &UserId,
        address: &ShippingAddress,
    ) -> Result<(), ProfileError> {
        (**self).update_address(user_id, address)
    }
}

#[derive(Debug, Clone, Default)]
struct Profile {
    email: Option<String>,
    address: Option<ShippingAddress>,
}

/// In-memory profile store for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    inner: RwLock<HashMap<UserId, Profile>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_email(&self, user_id: UserId, email: impl Into<String>) {
        if let Ok(mut map) = self.inner.write() {
            map.entry(user_id).or_default().email = Some(email.into());
        }
    }

    pub fn address(&self, user_id: &UserId) -> Option<ShippingAddress> {
        let map = self.inner.read().ok()?;
        map.get(user_id)?.address.clone()
    }
}

impl ProfileStore for InMemoryProfileStore {
    fn email(&self, user_id: &UserId) -> Option<String> {
        let map = self.inner.read().ok()?;
        map.get(user_id)?.email.clone()
    }

    fn update_address(
        &self,
        user_id: &UserId,
        address: &ShippingAddress,
    ) -> Result<(), ProfileError> {
        let mut map = self
            .inner
            .write()
            .map_err(|_| ProfileError::Unavailable("profile lock poisoned".to_string()))?;
        map.entry(*user_id).or_default().address = Some(address.clone());
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

/// What the confirmation message carries about the settled order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderConfirmation {
    pub order_id: OrderId,
    pub lines: Vec<OrderLine>,
    pub total: Money,
}

/// Outbound customer notifications.
pub trait Notifier: Send + Sync {
    fn send_order_confirmation(
        &self,
        email: &str,
        confirmation: &OrderConfirmation,
    ) -> Result<(), NotifyError>;
}

impl<N> Notifier for Arc<N>
where
    N: Notifier + ?Sized,
{
    fn send_order_confirmation(
        &self,
        email: &str,
        confirmation: &OrderConfirmation,
    ) -> Result<(), NotifyError> {
        (**self).send_order_confirmation(email, confirmation)
    }
}

/// Notifier double that records sends and can be flipped into a failing
/// mode.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, OrderConfirmation)>>,
    fail: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_calls(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<(String, OrderConfirmation)> {
        match self.sent.lock() {
            Ok(sent) => sent.clone(),
            Err(_) => vec![],
        }
    }
}

impl Notifier for RecordingNotifier {
    fn send_order_confirmation(
        &self,
        email: &str,
        confirmation: &OrderConfirmation,
    ) -> Result<(), NotifyError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::Delivery("notifier set to fail".to_string()));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push((email.to_string(), confirmation.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_core::AggregateId;

    fn address() -> ShippingAddress {
        ShippingAddress {
            line1: "1 Main St".to_string(),
            line2: None,
            city: "Springfield".to_string(),
            postal_code: "12345".to_string(),
            country: "US".to_string(),
        }
    }

    #[test]
    fn address_update_creates_profile_when_missing() {
        let store = InMemoryProfileStore::new();
        let user = UserId::new();

        store.update_address(&user, &address()).unwrap();

        assert_eq!(store.address(&user), Some(address()));
        assert_eq!(store.email(&user), None);
    }

    #[test]
    fn recording_notifier_captures_confirmations() {
        let notifier = RecordingNotifier::new();
        let confirmation = OrderConfirmation {
            order_id: OrderId::new(AggregateId::new()),
            lines: vec![],
            total: Money::from_minor(2500),
        };

        notifier
            .send_order_confirmation("a@example.com", &confirmation)
            .unwrap();

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "a@example.com");
        assert_eq!(sent[0].1.total, Money::from_minor(2500));
    }

    #[test]
    fn failing_notifier_returns_delivery_error() {
        let notifier = RecordingNotifier::new();
        notifier.fail_next_calls(true);

        let confirmation = OrderConfirmation {
            order_id: OrderId::new(AggregateId::new()),
            lines: vec![],
            total: Money::ZERO,
        };
        let err = notifier
            .send_order_confirmation("a@example.com", &confirmation)
            .unwrap_err();
        assert!(matches!(err, NotifyError::Delivery(_)));
        assert!(notifier.sent().is_empty());
    }
}
