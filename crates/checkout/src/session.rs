use storefront_core::UserId;
use storefront_orders::{OrderId, OrderLine};

use crate::provider::{SessionLineItem, SessionMetadata, SessionRequest};

/// Build a provider session request from a placed order.
///
/// One line item per order line, priced at the snapshot amount. The order
/// and user ids ride as metadata so the webhook can be correlated back; no
/// session state is kept locally.
pub fn build_session_request(
    order_id: OrderId,
    user_id: UserId,
    lines: &[OrderLine],
    customer_email: Option<String>,
    success_url: String,
    cancel_url: String,
) -> SessionRequest {
    let line_items = lines
        .iter()
        .map(|line| SessionLineItem {
            name: line.product_name.clone(),
            unit_amount: line.unit_price,
            quantity: line.quantity,
        })
        .collect();

    SessionRequest {
        line_items,
        success_url,
        cancel_url,
        customer_email,
        metadata: SessionMetadata { order_id, user_id },
    }
}
