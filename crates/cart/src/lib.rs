//! Cart Engine: the mutable per-user working set of product/quantity lines.
//!
//! All mutation decisions are pure: stock snapshots travel inside the command
//! and validation is all-or-nothing — either every requested line fits within
//! stock and the whole batch is applied, or nothing is.

pub mod cart;

pub use cart::{
    Cart, CartCleared, CartCommand, CartEvent, CartId, CartLine, CartOpened, ClearCart,
    LineRemoved, LinesUpserted, RemoveLine, StockedEntry, UpsertLines,
};
