use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum AgentRole {
    Delivery,
    Support,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: Uuid,
    pub name: String,
    pub location: Option<GeoPoint>,
    pub available: bool,
    pub role: AgentRole,
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    pub fn register(name: String, location: Option<GeoPoint>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            location,
            available: true,
            role: AgentRole::Delivery,
            updated_at: Utc::now(),
        }
    }
}
