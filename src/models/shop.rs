use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::agent::GeoPoint;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Shop {
    pub id: Uuid,
    pub name: String,
    pub city: String,
    pub location: GeoPoint,
}

impl Shop {
    pub fn register(name: String, city: String, location: GeoPoint) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            city,
            location,
        }
    }
}
