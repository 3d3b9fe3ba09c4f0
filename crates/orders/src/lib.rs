//! Orders: compilation of cart lines into immutable priced orders, and the
//! order status machine driven by payment reconciliation.

pub mod compile;
pub mod order;

pub use compile::{PricedLines, price_lines};
pub use order::{
    CancelOrder, MarkPaymentReceived, MarkReturned, Order, OrderCanceled, OrderCommand,
    OrderEvent, OrderId, OrderLine, OrderPaymentReceived, OrderPlaced, OrderReturned,
    OrderStatus, PlaceOrder, ShippingAddress,
};
