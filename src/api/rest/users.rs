use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::routing::post;
use serde::Deserialize;

use crate::error::AppError;
use crate::models::user::{User, UserRole};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/users", post(create_user).get(list_users))
}

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: Option<String>,
    pub city: Option<String>,
    #[serde(default)]
    pub role: UserRole,
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<Json<User>, AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("name cannot be empty".to_string()));
    }
    if let Some(email) = &payload.email {
        if !email.contains('@') {
            return Err(AppError::BadRequest(format!("invalid email {email}")));
        }
    }

    let user = User::register(payload.name, payload.email, payload.city, payload.role);
    state.store.insert_user(user.clone());
    Ok(Json(user))
}

async fn list_users(State(state): State<Arc<AppState>>) -> Json<Vec<User>> {
    Json(state.store.users())
}
