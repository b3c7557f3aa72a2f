use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use lapesqueria_cart::domain::aggregates::{CheckoutSnapshot, DiscountCode, DiscountKind, DiscountQuote, CART_STORAGE_KEY};
use lapesqueria_cart::http::{router, AppState, CreatedCart};
use lapesqueria_cart::{CartState, DiscountBook, Money, PricingPolicy};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

fn state(dir: &TempDir) -> AppState {
    let mut minimum = DiscountCode::new("BIGCATCH", DiscountKind::Percentage, Decimal::from(20));
    minimum.min_purchase_amount = Some(Money::from_cents(10000));
    let book = DiscountBook::from_codes([
        DiscountCode::new("TAKE25", DiscountKind::FixedAmount, Decimal::from(25)),
        DiscountCode::new("SHIPFREE", DiscountKind::FreeShipping, Decimal::ZERO),
        minimum,
    ]);
    AppState::new(dir.path().to_path_buf(), PricingPolicy::default(), book, None)
}

fn app(dir: &TempDir) -> Router { router(state(dir)) }

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder.header("content-type", "application/json").body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, value)
}

async fn new_session(app: &Router) -> String {
    let (status, body) = send(app, "POST", "/api/v1/carts", None).await;
    assert_eq!(status, StatusCode::CREATED);
    let created: CreatedCart = serde_json::from_value(body).unwrap();
    assert!(created.cart.items.is_empty());
    created.session.to_string()
}

fn rod() -> Value {
    json!({"id": "7", "name": "Inshore Spinning Rod", "sku": "ROD-7", "basePrice": "49.99", "inStock": true})
}

fn cart(body: Value) -> CartState { serde_json::from_value(body).unwrap() }

#[tokio::test]
async fn health() {
    let dir = TempDir::new().unwrap();
    let (status, body) = send(&app(&dir), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn add_items_and_apply_fixed_discount() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);
    let session = new_session(&app).await;

    let (status, body) = send(&app, "POST", &format!("/api/v1/carts/{session}/items"), Some(json!({"product": rod(), "quantity": 2}))).await;
    assert_eq!(status, StatusCode::OK);
    let state = cart(body);
    assert_eq!(state.totals.subtotal, Money::from_cents(9998));
    assert_eq!(state.totals.shipping, Money::ZERO);

    let (status, body) = send(&app, "POST", &format!("/api/v1/carts/{session}/discount"), Some(json!({"code": "take25"}))).await;
    assert_eq!(status, StatusCode::OK);
    let state = cart(body);
    assert_eq!(state.discount.as_ref().unwrap().amount, Money::from_cents(2500));
    assert_eq!(state.totals.total.rounded(), Money::new(Decimal::new(811659, 4)));

    let (status, body) = send(&app, "GET", &format!("/api/v1/carts/{session}/checkout"), None).await;
    assert_eq!(status, StatusCode::OK);
    let snapshot: CheckoutSnapshot = serde_json::from_value(body).unwrap();
    assert_eq!(snapshot.lines.len(), 1);
    assert_eq!(snapshot.discount_code.as_deref(), Some("TAKE25"));
}

#[tokio::test]
async fn rejected_discount_codes() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);
    let session = new_session(&app).await;
    send(&app, "POST", &format!("/api/v1/carts/{session}/items"), Some(json!({"product": rod()}))).await;

    let (status, body) = send(&app, "POST", &format!("/api/v1/carts/{session}/discount"), Some(json!({"code": "NOPE"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Invalid discount code");

    let (status, body) = send(&app, "POST", &format!("/api/v1/carts/{session}/discount"), Some(json!({"code": "BIGCATCH"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Minimum purchase of $100.00 required for this discount");

    let (_, body) = send(&app, "GET", &format!("/api/v1/carts/{session}"), None).await;
    assert!(cart(body).discount.is_none());
}

#[tokio::test]
async fn validate_discount_endpoint() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);

    let (status, body) = send(&app, "POST", "/api/v1/discounts/validate", Some(json!({"code": "TAKE25", "subtotal": "10.00"}))).await;
    assert_eq!(status, StatusCode::OK);
    let quote: DiscountQuote = serde_json::from_value(body).unwrap();
    assert_eq!(quote.discount_amount, Money::from_cents(1000));
    assert_eq!(quote.description, "$25.00 off");

    let (status, _) = send(&app, "POST", "/api/v1/discounts/validate", Some(json!({"code": ""}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn quantity_controls_and_clear() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);
    let session = new_session(&app).await;
    let variant = json!({"id": "tee-12-m", "variantName": "Medium", "sku": "TEE-12-M", "price": "20.00", "stock": 2});
    let product = json!({"id": "12", "name": "Redfish Tee", "sku": "TEE-12", "basePrice": "30.00"});
    send(&app, "POST", &format!("/api/v1/carts/{session}/items"), Some(json!({"product": product, "variant": variant}))).await;

    let (_, body) = send(&app, "POST", &format!("/api/v1/carts/{session}/items/tee-12-m/increment"), None).await;
    assert_eq!(cart(body).items[0].quantity, 2);
    let (_, body) = send(&app, "POST", &format!("/api/v1/carts/{session}/items/tee-12-m/increment"), None).await;
    assert_eq!(cart(body).items[0].quantity, 2);

    let (_, body) = send(&app, "PUT", &format!("/api/v1/carts/{session}/items/tee-12-m"), Some(json!({"quantity": -1}))).await;
    let state = cart(body);
    assert!(state.items.is_empty());
    assert_eq!(state.totals.shipping, Money::from_cents(595));

    send(&app, "POST", &format!("/api/v1/carts/{session}/items"), Some(json!({"product": rod()}))).await;
    let saved = dir.path().join(&session).join(format!("{CART_STORAGE_KEY}.json"));
    assert!(saved.exists());

    let (status, body) = send(&app, "DELETE", &format!("/api/v1/carts/{session}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(cart(body).items.is_empty());
    assert!(!saved.exists());
}

#[tokio::test]
async fn invalid_requests_are_rejected() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);
    let session = new_session(&app).await;

    let (status, _) = send(&app, "POST", &format!("/api/v1/carts/{session}/items"), Some(json!({"product": rod(), "quantity": 0}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(&app, "PUT", &format!("/api/v1/carts/{session}/guest"), Some(json!({"email": "not-an-email"}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, body) = send(&app, "PUT", &format!("/api/v1/carts/{session}/guest"), Some(json!({"email": "angler@example.com"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart(body).guest_email.as_deref(), Some("angler@example.com"));
}

#[tokio::test]
async fn carts_survive_a_restart() {
    let dir = TempDir::new().unwrap();
    let session = {
        let app = app(&dir);
        let session = new_session(&app).await;
        send(&app, "POST", &format!("/api/v1/carts/{session}/items"), Some(json!({"product": rod(), "quantity": 3}))).await;
        let (_, body) = send(&app, "POST", &format!("/api/v1/carts/{session}/toggle"), None).await;
        assert!(cart(body).is_open);
        session
    };

    let app = app(&dir);
    let (status, body) = send(&app, "GET", &format!("/api/v1/carts/{session}"), None).await;
    assert_eq!(status, StatusCode::OK);
    let state = cart(body);
    assert_eq!(state.items[0].quantity, 3);
    assert_eq!(state.totals.subtotal, Money::from_cents(14997));
    assert!(!state.is_open, "toggling is not persisted");
}

#[tokio::test]
async fn unknown_sessions_leave_no_trace() {
    let dir = TempDir::new().unwrap();
    let state = state(&dir);
    let app = router(state.clone());
    new_session(&app).await;
    for _ in 0..20 {
        let session = Uuid::now_v7();
        let (status, body) = send(&app, "GET", &format!("/api/v1/carts/{session}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cart(body), CartState::default());
        let (status, body) = send(&app, "GET", &format!("/api/v1/carts/{session}/checkout"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(serde_json::from_value::<CheckoutSnapshot>(body).unwrap().is_empty());
    }
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    assert_eq!(state.live_sessions(), 0);
}

#[tokio::test]
async fn blank_carts_are_released() {
    let dir = TempDir::new().unwrap();
    let state = state(&dir);
    let app = router(state.clone());
    let session = new_session(&app).await;

    send(&app, "POST", &format!("/api/v1/carts/{session}/items"), Some(json!({"product": rod()}))).await;
    assert_eq!(state.live_sessions(), 1);
    send(&app, "DELETE", &format!("/api/v1/carts/{session}/items/product-7"), None).await;
    assert_eq!(state.live_sessions(), 0);

    send(&app, "POST", &format!("/api/v1/carts/{session}/toggle"), None).await;
    assert_eq!(state.live_sessions(), 1);
    let (_, body) = send(&app, "GET", &format!("/api/v1/carts/{session}"), None).await;
    assert!(cart(body).is_open);
    send(&app, "POST", &format!("/api/v1/carts/{session}/toggle"), None).await;
    assert_eq!(state.live_sessions(), 0);

    send(&app, "POST", &format!("/api/v1/carts/{session}/items"), Some(json!({"product": rod(), "quantity": 3}))).await;
    send(&app, "DELETE", &format!("/api/v1/carts/{session}"), None).await;
    assert_eq!(state.live_sessions(), 0);
    let (_, body) = send(&app, "GET", &format!("/api/v1/carts/{session}"), None).await;
    assert!(cart(body).items.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_adds_are_not_lost() {
    let dir = TempDir::new().unwrap();
    let app = app(&dir);
    let sessions = [new_session(&app).await, new_session(&app).await];

    let mut handles = vec![];
    for session in &sessions {
        for _ in 0..10 {
            let app = app.clone();
            let uri = format!("/api/v1/carts/{session}/items");
            handles.push(tokio::spawn(async move { send(&app, "POST", &uri, Some(json!({"product": rod()}))).await.0 }));
        }
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), StatusCode::OK);
    }

    for session in &sessions {
        let (_, body) = send(&app, "GET", &format!("/api/v1/carts/{session}"), None).await;
        let state = cart(body);
        assert_eq!(state.items.len(), 1);
        assert_eq!(state.items[0].quantity, 10);
        assert_eq!(state.totals.subtotal, Money::from_cents(49990));
    }
}
