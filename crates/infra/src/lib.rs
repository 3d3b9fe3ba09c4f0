//! Infrastructure for the checkout pipeline: command dispatch, the
//! append-only event store, read-model projections, and the fulfillment
//! reconciler that ties webhook deliveries back into the domain.

pub mod command_dispatcher;
pub mod event_store;
pub mod projections;
pub mod read_model;
pub mod reconciler;


pub use command_dispatcher::{CommandDispatcher, DispatchError};
pub use event_store::{EventStore, EventStoreError, InMemoryEventStore, StoredEvent, UncommittedEvent};
pub use reconciler::{FulfillmentReconciler, ReconcileError, ReconcileOutcome};
