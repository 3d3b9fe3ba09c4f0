//! Environment-driven configuration, read once at startup.

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    /// Shared secret the payment provider signs webhook deliveries with.
    pub webhook_secret: String,
    /// Where the provider sends the customer after a completed payment.
    pub success_url: String,
    /// Where the provider sends the customer after an abandoned payment.
    pub cancel_url: String,
}

impl Config {
    pub fn from_env() -> Self {
        let bind_addr =
            std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        let webhook_secret = std::env::var("WEBHOOK_SECRET").unwrap_or_else(|_| {
            tracing::warn!("WEBHOOK_SECRET not set; using insecure dev default");
            "whsec_dev".to_string()
        });

        let success_url = std::env::var("CHECKOUT_SUCCESS_URL")
            .unwrap_or_else(|_| "http://localhost:3000/checkout/success".to_string());
        let cancel_url = std::env::var("CHECKOUT_CANCEL_URL")
            .unwrap_or_else(|_| "http://localhost:3000/checkout/cancel".to_string());

        Self {
            bind_addr,
            webhook_secret,
            success_url,
            cancel_url,
        }
    }
}
