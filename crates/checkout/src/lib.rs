//! Checkout session bridge: hosted-payment session creation against an
//! external provider, signed webhook verification, and the side interfaces
//! the fulfillment flow talks to (profiles, notifications).

pub mod external;
pub mod provider;
pub mod session;
pub mod webhook;

pub use external::{
    InMemoryProfileStore, NotifyError, Notifier, OrderConfirmation, ProfileError, ProfileStore,
    RecordingNotifier,
};
pub use provider::{
    CheckoutSession, PaymentProvider, ProviderError, SessionLineItem, SessionMetadata,
    SessionRequest, StubPaymentProvider,
};
pub use session::build_session_request;
pub use webhook::{
    PAYMENT_COMPLETED, PaymentEvent, PaymentEventData, WebhookError, WebhookVerifier, parse_event,
    sign_payload,
};
