use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use storefront_core::{Money, UserId};
use storefront_orders::OrderId;

/// One displayable line on the hosted payment page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionLineItem {
    pub name: String,
    /// Unit amount in minor units, exactly as snapshotted on the order line.
    pub unit_amount: Money,
    pub quantity: u32,
}

/// Correlation metadata carried opaquely through the provider and echoed
/// back on the webhook. This is the only link between a payment session and
/// our order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub order_id: OrderId,
    pub user_id: UserId,
}

/// Everything the provider needs to host a checkout page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRequest {
    pub line_items: Vec<SessionLineItem>,
    pub success_url: String,
    pub cancel_url: String,
    pub customer_email: Option<String>,
    pub metadata: SessionMetadata,
}

/// A created session: the id the provider knows it by and the URL to
/// redirect the customer to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub session_id: String,
    pub url: String,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("payment provider rejected the session request: {0}")]
    Rejected(String),
    #[error("payment provider unavailable: {0}")]
    Unavailable(String),
}

/// Outbound port to the external payment provider.
///
/// Implementations must not mutate any local state; on error the caller's
/// order stays pending and a new session can be requested later.
pub trait PaymentProvider: Send + Sync {
    fn create_checkout_session(
        &self,
        request: SessionRequest,
    ) -> Result<CheckoutSession, ProviderError>;
}

impl<P> PaymentProvider for std::sync::Arc<P>
where
    P: PaymentProvider + ?Sized,
{
    fn create_checkout_session(
        &self,
        request: SessionRequest,
    ) -> Result<CheckoutSession, ProviderError> {
        (**self).create_checkout_session(request)
    }
}

/// Provider double for tests and local dev. Records every request and can be
/// flipped into a failing mode.
#[derive(Debug, Default)]
pub struct StubPaymentProvider {
    requests: Mutex<Vec<SessionRequest>>,
    fail: AtomicBool,
}

impl StubPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_calls(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<SessionRequest> {
        match self.requests.lock() {
            Ok(reqs) => reqs.clone(),
            Err(_) => vec![],
        }
    }
}

impl PaymentProvider for StubPaymentProvider {
    fn create_checkout_session(
        &self,
        request: SessionRequest,
    ) -> Result<CheckoutSession, ProviderError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProviderError::Unavailable("stub set to fail".to_string()));
        }
        if let Ok(mut reqs) = self.requests.lock() {
            reqs.push(request);
        }
        let session_id = format!("cs_{}", Uuid::now_v7().simple());
        let url = format!("https://checkout.example.com/pay/{session_id}");
        Ok(CheckoutSession { session_id, url })
    }
}
