use uuid::Uuid;

use crate::error::AppError;
use crate::live::LiveEvent;
use crate::models::agent::{Agent, GeoPoint};
use crate::state::AppState;

const EARTH_RADIUS_KM: f64 = 6_371.0;

pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

pub fn normalize_sample(latitude: f64, longitude: f64) -> Result<GeoPoint, AppError> {
    if !latitude.is_finite() || !longitude.is_finite() {
        return Err(AppError::BadRequest(
            "coordinates must be finite numbers".to_string(),
        ));
    }

    if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
        return Err(AppError::BadRequest(format!(
            "coordinates out of range: ({latitude}, {longitude})"
        )));
    }

    Ok(GeoPoint {
        lat: latitude,
        lng: longitude,
    })
}

pub fn ingest_agent_location(
    state: &AppState,
    agent_id: Uuid,
    latitude: f64,
    longitude: f64,
) -> Result<Agent, AppError> {
    let point = normalize_sample(latitude, longitude)?;
    let agent = state.store.set_agent_location(agent_id, point)?;
    state.metrics.location_updates_total.inc();

    if let Some((order, _)) = state.store.active_delivery_for_agent(agent_id) {
        state.registry.send_to(
            order.customer_id,
            LiveEvent::AgentLocation {
                agent_id,
                location: point,
                recorded_at: agent.updated_at,
            },
        );
    }

    Ok(agent)
}
