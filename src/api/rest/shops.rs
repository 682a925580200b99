use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::engine::earnings::{self, DailyEarnings};
use crate::error::AppError;
use crate::geo::normalize_sample;
use crate::models::shop::Shop;
use crate::notify::{Audience, FanoutReport, notify_shop_availability};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/shops", post(create_shop).get(list_shops))
        .route("/shops/:id/earnings", get(shop_earnings))
        .route("/shops/:id/notify", post(notify))
}

#[derive(Deserialize)]
pub struct CreateShopRequest {
    pub name: String,
    pub city: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Deserialize)]
pub struct EarningsQuery {
    pub days: Option<u32>,
}

#[derive(Deserialize)]
pub struct NotifyRequest {
    pub city: Option<String>,
}

async fn create_shop(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateShopRequest>,
) -> Result<Json<Shop>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }
    if payload.city.trim().is_empty() {
        return Err(AppError::BadRequest("city cannot be empty".to_string()));
    }

    let location = normalize_sample(payload.latitude, payload.longitude)?;
    let shop = Shop::register(payload.name, payload.city, location);
    state.store.insert_shop(shop.clone());
    Ok(Json(shop))
}

async fn list_shops(State(state): State<Arc<AppState>>) -> Json<Vec<Shop>> {
    Json(state.store.shops())
}

async fn shop_earnings(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<EarningsQuery>,
) -> Result<Json<Vec<DailyEarnings>>, AppError> {
    state.store.get_shop(id)?;

    let days = query.days.unwrap_or(7);
    if !(1..=90).contains(&days) {
        return Err(AppError::BadRequest(
            "days must be between 1 and 90".to_string(),
        ));
    }

    let window = earnings::shop_earnings(&state.store, id, days, Utc::now());
    Ok(Json(window))
}

async fn notify(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<NotifyRequest>,
) -> Result<Json<FanoutReport>, AppError> {
    let shop = state.store.get_shop(id)?;

    let audience = match payload.city {
        Some(city) if !city.trim().is_empty() => Audience::City(city),
        Some(_) => {
            return Err(AppError::BadRequest("city cannot be empty".to_string()));
        }
        None => Audience::All,
    };

    let report =
        notify_shop_availability(&state.store, state.mailer.as_ref(), &shop, audience).await;

    let failed = report.total - report.sent.len();
    state
        .metrics
        .notifications_total
        .with_label_values(&["sent"])
        .inc_by(report.sent.len() as u64);
    state
        .metrics
        .notifications_total
        .with_label_values(&["failed"])
        .inc_by(failed as u64);

    Ok(Json(report))
}
