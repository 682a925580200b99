use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::arbiter::accept_assignment;
use crate::engine::delivery::{cancel_shop_order, request_handover_code, verify_handover_code};
use crate::engine::queue::{BroadcastRequest, enqueue_broadcast};
use crate::error::AppError;
use crate::geo::normalize_sample;
use crate::models::assignment::Assignment;
use crate::models::order::{DeliveryAddress, LineItem, Order, ShopOrder, ShopOrderStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/:id", get(get_order))
        .route("/assignments", get(list_assignments))
        .route("/assignments/:id/accept", post(accept))
        .route(
            "/orders/:order_id/shop-orders/:shop_order_id/broadcast",
            post(rebroadcast),
        )
        .route(
            "/orders/:order_id/shop-orders/:shop_order_id/handover",
            post(handover),
        )
        .route(
            "/orders/:order_id/shop-orders/:shop_order_id/verify",
            post(verify),
        )
        .route(
            "/orders/:order_id/shop-orders/:shop_order_id/cancel",
            post(cancel),
        )
}

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub customer_id: Uuid,
    pub delivery_address: DeliveryAddressRequest,
    pub items: Vec<LineItemRequest>,
}

#[derive(Deserialize)]
pub struct DeliveryAddressRequest {
    pub text: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Deserialize)]
pub struct LineItemRequest {
    pub shop_id: Uuid,
    pub name: String,
    pub price: i64,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct AcceptRequest {
    pub agent_id: Uuid,
}

#[derive(Deserialize)]
pub struct HandoverRequest {
    pub agent_id: Uuid,
}

#[derive(Deserialize)]
pub struct VerifyRequest {
    pub agent_id: Uuid,
    pub code: String,
}

#[derive(Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub status: ShopOrderStatus,
}

impl From<Order> for OrderView {
    fn from(order: Order) -> Self {
        let status = order.status();
        Self { order, status }
    }
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<Json<OrderView>, AppError> {
    state.store.get_user(payload.customer_id)?;

    if payload.items.is_empty() {
        return Err(AppError::BadRequest(
            "order must contain at least one item".to_string(),
        ));
    }
    if payload.delivery_address.text.trim().is_empty() {
        return Err(AppError::BadRequest(
            "delivery address cannot be empty".to_string(),
        ));
    }
    normalize_sample(
        payload.delivery_address.latitude,
        payload.delivery_address.longitude,
    )?;

    let mut items = Vec::with_capacity(payload.items.len());
    for item in payload.items {
        if item.name.trim().is_empty() {
            return Err(AppError::BadRequest("item name cannot be empty".to_string()));
        }
        if item.price < 0 {
            return Err(AppError::BadRequest(format!(
                "item {} has a negative price",
                item.name
            )));
        }
        if item.quantity == 0 {
            return Err(AppError::BadRequest(format!(
                "item {} has zero quantity",
                item.name
            )));
        }
        state.store.get_shop(item.shop_id)?;

        items.push(LineItem {
            shop_id: item.shop_id,
            name: item.name,
            price: item.price,
            quantity: item.quantity,
        });
    }

    let order = Order::place(
        payload.customer_id,
        DeliveryAddress {
            text: payload.delivery_address.text,
            latitude: payload.delivery_address.latitude,
            longitude: payload.delivery_address.longitude,
        },
        items,
    )?;
    state.store.insert_order(order.clone());

    for shop_order in &order.shop_orders {
        enqueue_broadcast(
            &state,
            BroadcastRequest {
                order_id: order.id,
                shop_order_id: shop_order.id,
            },
        )
        .await?;
    }

    Ok(Json(OrderView::from(order)))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderView>, AppError> {
    let order = state.store.get_order(id)?;
    Ok(Json(OrderView::from(order)))
}

async fn list_assignments(State(state): State<Arc<AppState>>) -> Json<Vec<Assignment>> {
    Json(state.store.assignments())
}

async fn accept(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AcceptRequest>,
) -> Result<Json<Assignment>, AppError> {
    let assignment = accept_assignment(&state, id, payload.agent_id)?;
    Ok(Json(assignment))
}

async fn rebroadcast(
    State(state): State<Arc<AppState>>,
    Path((order_id, shop_order_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ShopOrder>, AppError> {
    let order = state.store.get_order(order_id)?;
    let shop_order = order
        .shop_order(shop_order_id)
        .ok_or_else(|| AppError::NotFound(format!("shop order {shop_order_id} not found")))?
        .clone();

    enqueue_broadcast(
        &state,
        BroadcastRequest {
            order_id,
            shop_order_id,
        },
    )
    .await?;

    Ok(Json(shop_order))
}

async fn handover(
    State(state): State<Arc<AppState>>,
    Path((order_id, shop_order_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<HandoverRequest>,
) -> Result<Json<ShopOrder>, AppError> {
    let shop_order =
        request_handover_code(&state, order_id, shop_order_id, payload.agent_id).await?;
    Ok(Json(shop_order))
}

async fn verify(
    State(state): State<Arc<AppState>>,
    Path((order_id, shop_order_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<VerifyRequest>,
) -> Result<Json<ShopOrder>, AppError> {
    let shop_order = verify_handover_code(
        &state,
        order_id,
        shop_order_id,
        payload.agent_id,
        &payload.code,
    )?;
    Ok(Json(shop_order))
}

async fn cancel(
    State(state): State<Arc<AppState>>,
    Path((order_id, shop_order_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ShopOrder>, AppError> {
    let shop_order = cancel_shop_order(&state, order_id, shop_order_id)?;
    Ok(Json(shop_order))
}
