//! Read-model projections.
//!
//! Each projection folds event envelopes into a disposable read model,
//! guarded by a per-stream cursor: duplicates are silently skipped (the bus
//! is at-least-once) and gaps are reported as errors rather than applied
//! out of order.

mod carts;
mod orders;

pub use carts::{CartReadModel, CartsProjection};
pub use orders::{OrdersProjection, OrderReadModel};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize event: {0}")]
    Deserialize(String),
    #[error("stream mismatch: {0}")]
    StreamMismatch(String),
    #[error("non-monotonic sequence number (last={last}, found={found})")]
    NonMonotonicSequence { last: u64, found: u64 },
}
