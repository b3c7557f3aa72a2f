//! HTTP surface: one isolated cart per browsing session.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::{extract::{Path, State}, http::StatusCode, response::{IntoResponse, Response}, routing::{get, post, put}, Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error, warn};
use uuid::Uuid;
use validator::Validate;

use crate::config::PricingPolicy;
use crate::domain::aggregates::{CartState, CartStore, CheckoutSnapshot, DiscountBook, DiscountQuote, DiscountRejection, Product, ProductVariant};
use crate::domain::events::CartEvent;
use crate::domain::value_objects::Money;
use crate::storage::FileStorage;
use crate::{Result, StorefrontError};

type SessionStore = CartStore<FileStorage>;
type SharedCart = Arc<Mutex<SessionStore>>;

/// Live carts are each behind their own lock. The map lock is only held to
/// look up, insert or evict an entry, never across storage I/O.
#[derive(Clone)]
pub struct AppState {
    carts: Arc<Mutex<HashMap<Uuid, SharedCart>>>,
    discounts: Arc<DiscountBook>,
    nats: Option<async_nats::Client>,
    storage_dir: Arc<PathBuf>,
    pricing: PricingPolicy,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> { mutex.lock().unwrap_or_else(PoisonError::into_inner) }

impl AppState {
    pub fn new(storage_dir: PathBuf, pricing: PricingPolicy, discounts: DiscountBook, nats: Option<async_nats::Client>) -> Self {
        Self {
            carts: Arc::new(Mutex::new(HashMap::new())),
            discounts: Arc::new(discounts),
            nats,
            storage_dir: Arc::new(storage_dir),
            pricing,
        }
    }

    /// Number of carts currently held in memory.
    pub fn live_sessions(&self) -> usize { lock(&self.carts).len() }

    fn restore(&self, session: Uuid) -> SessionStore {
        CartStore::open(FileStorage::new(self.storage_dir.join(session.to_string())), self.pricing.clone())
    }

    fn session_cart(&self, session: Uuid) -> SharedCart {
        if let Some(cart) = lock(&self.carts).get(&session) {
            return cart.clone();
        }
        let restored = Arc::new(Mutex::new(self.restore(session)));
        lock(&self.carts).entry(session).or_insert(restored).clone()
    }

    /// Drops a blank cart from memory once no other request holds it.
    fn evict_if_blank(&self, session: Uuid, cart: &SharedCart) {
        let mut carts = lock(&self.carts);
        let idle = carts.get(&session).is_some_and(|c| Arc::ptr_eq(c, cart) && Arc::strong_count(c) == 2);
        if idle && lock(cart).is_blank() {
            carts.remove(&session);
            debug!(%session, "evicted blank cart");
        }
    }

    fn run_on_cart<R>(&self, session: Uuid, f: impl FnOnce(&mut SessionStore) -> R) -> (R, Vec<CartEvent>) {
        let cart = self.session_cart(session);
        let out = {
            let mut store = lock(&cart);
            let out = f(&mut *store);
            (out, store.take_events())
        };
        self.evict_if_blank(session, &cart);
        out
    }

    /// Runs `f` against the session's cart on the blocking pool, restoring
    /// it from disk on first use.
    async fn with_cart<R, F>(&self, session: Uuid, f: F) -> Result<(R, Vec<CartEvent>)>
    where
        R: Send + 'static,
        F: FnOnce(&mut SessionStore) -> R + Send + 'static,
    {
        let state = self.clone();
        Ok(tokio::task::spawn_blocking(move || state.run_on_cart(session, f)).await?)
    }

    /// Reads a session without keeping it. Sessions with no live cart are
    /// read from disk, and nothing is created when there is no saved state.
    async fn read_cart<R, F>(&self, session: Uuid, f: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&SessionStore) -> R + Send + 'static,
    {
        let state = self.clone();
        let read = move || {
            let live = lock(&state.carts).get(&session).cloned();
            match live {
                Some(cart) => {
                    let store = lock(&cart);
                    f(&*store)
                }
                None => f(&state.restore(session)),
            }
        };
        Ok(tokio::task::spawn_blocking(read).await?)
    }

    async fn mutate<F>(&self, session: Uuid, f: F) -> Result<Json<CartState>>
    where
        F: FnOnce(&mut SessionStore) + Send + 'static,
    {
        let (cart, events) = self.with_cart(session, |cart| {
            f(&mut *cart);
            cart.state().clone()
        }).await?;
        self.publish(events).await;
        Ok(Json(cart))
    }

    async fn publish(&self, events: Vec<CartEvent>) {
        let Some(client) = &self.nats else { return };
        for event in events {
            let subject = format!("storefront.cart.{}", event.name());
            let payload = match serde_json::to_vec(&event) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(%subject, error = %e, "failed to encode cart event");
                    continue;
                }
            };
            if let Err(e) = client.publish(subject.clone(), payload.into()).await {
                warn!(%subject, error = %e, "failed to publish cart event");
            }
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "lapesqueria-cart"})) }))
        .route("/api/v1/carts", post(create_cart))
        .route("/api/v1/carts/:session", get(get_cart).delete(clear_cart))
        .route("/api/v1/carts/:session/items", post(add_item))
        .route("/api/v1/carts/:session/items/:item", put(update_quantity).delete(remove_item))
        .route("/api/v1/carts/:session/items/:item/increment", post(increment_item))
        .route("/api/v1/carts/:session/items/:item/decrement", post(decrement_item))
        .route("/api/v1/carts/:session/toggle", post(toggle_cart))
        .route("/api/v1/carts/:session/guest", put(set_guest_info))
        .route("/api/v1/carts/:session/discount", post(apply_discount).delete(remove_discount))
        .route("/api/v1/carts/:session/checkout", get(checkout))
        .route("/api/v1/discounts/validate", post(validate_discount))
        .layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()).with_state(state)
}

impl IntoResponse for StorefrontError {
    fn into_response(self) -> Response {
        let status = match &self {
            StorefrontError::Discount(DiscountRejection::InvalidCode) => StatusCode::NOT_FOUND,
            StorefrontError::Discount(_) => StatusCode::BAD_REQUEST,
            StorefrontError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            StorefrontError::Worker(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        (status, Json(serde_json::json!({"error": self.to_string()}))).into_response()
    }
}

#[derive(Debug, Serialize, Deserialize)] pub struct CreatedCart { pub session: Uuid, pub cart: CartState }

#[derive(Debug, Deserialize, Validate)]
pub struct AddItemRequest {
    pub product: Product,
    #[serde(default)]
    pub variant: Option<ProductVariant>,
    #[serde(default = "one")]
    #[validate(range(min = 1, max = 999))]
    pub quantity: u32,
}

fn one() -> u32 { 1 }

#[derive(Debug, Deserialize)] pub struct UpdateQuantityRequest { pub quantity: i64 }

#[derive(Debug, Deserialize, Validate)]
pub struct GuestInfoRequest {
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 120))]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)] pub struct DiscountCodeRequest { #[serde(default)] pub code: String }
#[derive(Debug, Deserialize)] pub struct ValidateDiscountRequest { #[serde(default)] pub code: String, #[serde(default)] pub subtotal: Money }

async fn create_cart(State(s): State<AppState>) -> Result<(StatusCode, Json<CreatedCart>)> {
    let session = Uuid::now_v7();
    let cart = s.read_cart(session, |cart| cart.state().clone()).await?;
    Ok((StatusCode::CREATED, Json(CreatedCart { session, cart })))
}

async fn get_cart(State(s): State<AppState>, Path(session): Path<Uuid>) -> Result<Json<CartState>> {
    Ok(Json(s.read_cart(session, |cart| cart.state().clone()).await?))
}

async fn clear_cart(State(s): State<AppState>, Path(session): Path<Uuid>) -> Result<Json<CartState>> {
    s.mutate(session, |cart| cart.clear_cart()).await
}

async fn add_item(State(s): State<AppState>, Path(session): Path<Uuid>, Json(r): Json<AddItemRequest>) -> Result<Json<CartState>> {
    r.validate()?;
    s.mutate(session, move |cart| cart.add_item(&r.product, r.variant.as_ref(), r.quantity)).await
}

async fn update_quantity(State(s): State<AppState>, Path((session, item)): Path<(Uuid, String)>, Json(r): Json<UpdateQuantityRequest>) -> Result<Json<CartState>> {
    s.mutate(session, move |cart| cart.update_quantity(&item, r.quantity)).await
}

async fn remove_item(State(s): State<AppState>, Path((session, item)): Path<(Uuid, String)>) -> Result<Json<CartState>> {
    s.mutate(session, move |cart| cart.remove_item(&item)).await
}

async fn increment_item(State(s): State<AppState>, Path((session, item)): Path<(Uuid, String)>) -> Result<Json<CartState>> {
    s.mutate(session, move |cart| { cart.increment_item(&item); }).await
}

async fn decrement_item(State(s): State<AppState>, Path((session, item)): Path<(Uuid, String)>) -> Result<Json<CartState>> {
    s.mutate(session, move |cart| { cart.decrement_item(&item); }).await
}

async fn toggle_cart(State(s): State<AppState>, Path(session): Path<Uuid>) -> Result<Json<CartState>> {
    s.mutate(session, |cart| cart.toggle_cart()).await
}

async fn set_guest_info(State(s): State<AppState>, Path(session): Path<Uuid>, Json(r): Json<GuestInfoRequest>) -> Result<Json<CartState>> {
    r.validate()?;
    s.mutate(session, move |cart| cart.set_guest_info(r.email.as_deref(), r.name.as_deref())).await
}

async fn apply_discount(State(s): State<AppState>, Path(session): Path<Uuid>, Json(r): Json<DiscountCodeRequest>) -> Result<Json<CartState>> {
    let now = Utc::now();
    let discounts = s.discounts.clone();
    let (cart, events) = s.with_cart(session, move |cart| {
        let quote = discounts.validate(&r.code, cart.totals().subtotal, now)?;
        cart.apply_quote(&quote);
        Ok::<_, DiscountRejection>(cart.state().clone())
    }).await?;
    s.publish(events).await;
    Ok(Json(cart?))
}

async fn remove_discount(State(s): State<AppState>, Path(session): Path<Uuid>) -> Result<Json<CartState>> {
    s.mutate(session, |cart| cart.remove_discount()).await
}

async fn checkout(State(s): State<AppState>, Path(session): Path<Uuid>) -> Result<Json<CheckoutSnapshot>> {
    Ok(Json(s.read_cart(session, |cart| cart.checkout_snapshot()).await?))
}

async fn validate_discount(State(s): State<AppState>, Json(r): Json<ValidateDiscountRequest>) -> Result<Json<DiscountQuote>> {
    Ok(Json(s.discounts.validate(&r.code, r.subtotal, Utc::now())?))
}
