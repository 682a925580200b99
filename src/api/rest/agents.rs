use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::earnings::{self, HourlyEarnings};
use crate::error::AppError;
use crate::geo::{ingest_agent_location, normalize_sample};
use crate::models::agent::Agent;
use crate::models::assignment::Assignment;
use crate::models::order::{Order, ShopOrder};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/agents", post(create_agent).get(list_agents))
        .route("/agents/:id/availability", patch(update_availability))
        .route("/agents/:id/location", patch(update_location))
        .route("/agents/:id/assignments", get(list_open_offers))
        .route("/agents/:id/active-order", get(active_order))
        .route("/agents/:id/earnings/today", get(earnings_today))
}

#[derive(Deserialize)]
pub struct CreateAgentRequest {
    pub name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Deserialize)]
pub struct UpdateAvailabilityRequest {
    pub available: bool,
}

#[derive(Deserialize)]
pub struct UpdateLocationRequest {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Serialize)]
pub struct ActiveOrderResponse {
    pub order: Order,
    pub shop_order: ShopOrder,
}

#[derive(Serialize)]
pub struct OpenOfferView {
    #[serde(flatten)]
    pub assignment: Assignment,
    pub shop_name: String,
    pub delivery_address: String,
    pub item_count: usize,
    pub subtotal: i64,
}

async fn create_agent(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateAgentRequest>,
) -> Result<Json<Agent>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }

    let location = match (payload.latitude, payload.longitude) {
        (Some(lat), Some(lng)) => Some(normalize_sample(lat, lng)?),
        (None, None) => None,
        _ => {
            return Err(AppError::BadRequest(
                "latitude and longitude must be given together".to_string(),
            ));
        }
    };

    let agent = Agent::register(payload.name, location);
    state.store.insert_agent(agent.clone());
    Ok(Json(agent))
}

async fn list_agents(State(state): State<Arc<AppState>>) -> Json<Vec<Agent>> {
    Json(state.store.agents())
}

async fn update_availability(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAvailabilityRequest>,
) -> Result<Json<Agent>, AppError> {
    let agent = state.store.set_agent_availability(id, payload.available)?;
    Ok(Json(agent))
}

async fn update_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLocationRequest>,
) -> Result<Json<Agent>, AppError> {
    let agent = ingest_agent_location(&state, id, payload.latitude, payload.longitude)?;
    Ok(Json(agent))
}

async fn list_open_offers(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<OpenOfferView>>, AppError> {
    state.store.get_agent(id)?;

    let mut offers = Vec::new();
    for assignment in state.store.pending_offers_for_agent(id) {
        let order = state.store.get_order(assignment.order_id)?;
        let Some(shop_order) = order.shop_order(assignment.shop_order_id) else {
            continue;
        };
        let shop = state.store.get_shop(shop_order.shop_id)?;

        offers.push(OpenOfferView {
            shop_name: shop.name,
            delivery_address: order.delivery_address.text.clone(),
            item_count: shop_order.items.len(),
            subtotal: shop_order.subtotal,
            assignment,
        });
    }

    Ok(Json(offers))
}

async fn active_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ActiveOrderResponse>, AppError> {
    state.store.get_agent(id)?;
    let (order, shop_order) = state
        .store
        .active_delivery_for_agent(id)
        .ok_or_else(|| AppError::NotFound(format!("agent {id} has no active delivery")))?;

    Ok(Json(ActiveOrderResponse { order, shop_order }))
}

async fn earnings_today(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<HourlyEarnings>>, AppError> {
    state.store.get_agent(id)?;
    let buckets = earnings::agent_earnings_today(
        &state.store,
        id,
        state.config.delivery_rate,
        Utc::now(),
    );
    Ok(Json(buckets))
}
