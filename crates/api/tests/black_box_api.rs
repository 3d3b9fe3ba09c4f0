use chrono::Utc;
use reqwest::StatusCode;
use serde_json::json;

use storefront_api::config::Config;
use storefront_checkout::sign_payload;
use storefront_core::UserId;

const WEBHOOK_SECRET: &str = "whsec_blackbox";

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Build app (same router as prod), but bind to an ephemeral port.
        let config = Config {
            bind_addr: "127.0.0.1:0".to_string(),
            webhook_secret: WEBHOOK_SECRET.to_string(),
            success_url: "http://localhost:3000/checkout/success".to_string(),
            cancel_url: "http://localhost:3000/checkout/cancel".to_string(),
        };
        let app = storefront_api::app::build_app(config);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn create_product(
    client: &reqwest::Client,
    base_url: &str,
    user: &str,
    name: &str,
    price: f64,
    stock: u32,
) -> String {
    let res = client
        .post(format!("{}/products", base_url))
        .header("x-user-id", user)
        .json(&json!({ "name": name, "price": price, "stock": stock }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let created: serde_json::Value = res.json().await.unwrap();
    created["id"].as_str().unwrap().to_string()
}

async fn add_to_cart(
    client: &reqwest::Client,
    base_url: &str,
    user: &str,
    product_id: &str,
    quantity: u32,
) {
    let res = client
        .post(format!("{}/cart", base_url))
        .header("x-user-id", user)
        .json(&json!({ "items": [{ "product_id": product_id, "quantity": quantity }] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

async fn get_cart(client: &reqwest::Client, base_url: &str, user: &str) -> serde_json::Value {
    let res = client
        .get(format!("{}/cart", base_url))
        .header("x-user-id", user)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    res.json().await.unwrap()
}

async fn place_order(client: &reqwest::Client, base_url: &str, user: &str) -> String {
    let res = client
        .post(format!("{}/orders", base_url))
        .header("x-user-id", user)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let order: serde_json::Value = res.json().await.unwrap();
    order["id"].as_str().unwrap().to_string()
}

async fn get_order(
    client: &reqwest::Client,
    base_url: &str,
    user: &str,
    order_id: &str,
) -> serde_json::Value {
    let res = client
        .get(format!("{}/orders/{}", base_url, order_id))
        .header("x-user-id", user)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    res.json().await.unwrap()
}

fn webhook_body(order_id: &str, user: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "type": "checkout.session.completed",
        "data": {
            "order_id": order_id,
            "user_id": user,
            "shipping_address": {
                "line1": "1 Main St",
                "line2": null,
                "city": "Springfield",
                "postal_code": "12345",
                "country": "US"
            }
        }
    }))
    .unwrap()
}

async fn post_webhook(
    client: &reqwest::Client,
    base_url: &str,
    body: Vec<u8>,
    signature: Option<&str>,
) -> reqwest::Response {
    let mut req = client
        .post(format!("{}/webhooks/payment", base_url))
        .body(body);
    if let Some(signature) = signature {
        req = req.header("stripe-signature", signature);
    }
    req.send().await.unwrap()
}

#[tokio::test]
async fn user_context_required_for_cart_routes() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .get(format!("{}/cart", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(format!("{}/cart", srv.base_url))
        .header("x-user-id", "not-a-uuid")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn cart_add_then_get_round_trip() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let user = UserId::new().to_string();

    // No cart until the first add.
    let res = client
        .get(format!("{}/cart", srv.base_url))
        .header("x-user-id", &user)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let product_id = create_product(&client, &srv.base_url, &user, "Widget", 12.50, 10).await;
    add_to_cart(&client, &srv.base_url, &user, &product_id, 2).await;

    // Projections are applied on dispatch, so the read needs no polling.
    let cart = get_cart(&client, &srv.base_url, &user).await;
    let items = cart["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["product_id"], product_id.as_str());
    assert_eq!(items[0]["quantity"], 2);
    assert_eq!(items[0]["name"], "Widget");
    assert_eq!(items[0]["unit_price"], 1250);

    // PUT sets the quantity absolutely.
    let res = client
        .put(format!("{}/cart/{}", srv.base_url, product_id))
        .header("x-user-id", &user)
        .json(&json!({ "quantity": 5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let cart = get_cart(&client, &srv.base_url, &user).await;
    assert_eq!(cart["items"][0]["quantity"], 5);

    // DELETE removes the line; the cart itself persists.
    let res = client
        .delete(format!("{}/cart/{}", srv.base_url, product_id))
        .header("x-user-id", &user)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let cart = get_cart(&client, &srv.base_url, &user).await;
    assert!(cart["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn insufficient_stock_is_a_conflict_and_leaves_cart_untouched() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let user = UserId::new().to_string();

    let product_id = create_product(&client, &srv.base_url, &user, "Widget", 9.99, 3).await;
    add_to_cart(&client, &srv.base_url, &user, &product_id, 2).await;

    // 2 in cart + 2 requested > 3 in stock.
    let res = client
        .post(format!("{}/cart", srv.base_url))
        .header("x-user-id", &user)
        .json(&json!({ "items": [{ "product_id": product_id, "quantity": 2 }] }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["error"], "insufficient_stock");

    let cart = get_cart(&client, &srv.base_url, &user).await;
    assert_eq!(cart["items"][0]["quantity"], 2);
}

#[tokio::test]
async fn unverified_webhook_is_rejected_without_state_change() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let user = UserId::new().to_string();

    let product_id = create_product(&client, &srv.base_url, &user, "Widget", 12.50, 10).await;
    add_to_cart(&client, &srv.base_url, &user, &product_id, 2).await;
    let order_id = place_order(&client, &srv.base_url, &user).await;

    let body = webhook_body(&order_id, &user);

    // Missing signature header.
    let res = post_webhook(&client, &srv.base_url, body.clone(), None).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    // Signed with the wrong secret.
    let forged = sign_payload(&body, "wrong_secret", Utc::now().timestamp());
    let res = post_webhook(&client, &srv.base_url, body.clone(), Some(&forged)).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let rejected: serde_json::Value = res.json().await.unwrap();
    assert_eq!(rejected["error"], "unverified_event");

    // Order still pending, cart still full.
    let order = get_order(&client, &srv.base_url, &user, &order_id).await;
    assert_eq!(order["status"], "pending");
    let cart = get_cart(&client, &srv.base_url, &user).await;
    assert_eq!(cart["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn signed_webhook_settles_and_replay_is_a_success_noop() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let user = UserId::new().to_string();

    let product_id = create_product(&client, &srv.base_url, &user, "Widget", 12.50, 10).await;
    add_to_cart(&client, &srv.base_url, &user, &product_id, 2).await;
    let order_id = place_order(&client, &srv.base_url, &user).await;

    let body = webhook_body(&order_id, &user);
    let signature = sign_payload(&body, WEBHOOK_SECRET, Utc::now().timestamp());

    let res = post_webhook(&client, &srv.base_url, body.clone(), Some(&signature)).await;
    assert_eq!(res.status(), StatusCode::OK);
    let outcome: serde_json::Value = res.json().await.unwrap();
    assert_eq!(outcome["status"], "settled");

    let order = get_order(&client, &srv.base_url, &user, &order_id).await;
    assert_eq!(order["status"], "payment_received");
    assert_eq!(order["shipping_address"]["city"], "Springfield");
    assert_eq!(order["total"], 2500);

    let cart = get_cart(&client, &srv.base_url, &user).await;
    assert!(cart["items"].as_array().unwrap().is_empty());

    // Refill the cart so a buggy replay would visibly clear it again.
    add_to_cart(&client, &srv.base_url, &user, &product_id, 1).await;

    let res = post_webhook(&client, &srv.base_url, body, Some(&signature)).await;
    assert_eq!(res.status(), StatusCode::OK);
    let outcome: serde_json::Value = res.json().await.unwrap();
    assert_eq!(outcome["status"], "already_settled");

    let order = get_order(&client, &srv.base_url, &user, &order_id).await;
    assert_eq!(order["status"], "payment_received");
    let cart = get_cart(&client, &srv.base_url, &user).await;
    assert_eq!(cart["items"].as_array().unwrap().len(), 1);
}
