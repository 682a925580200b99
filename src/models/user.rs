use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub enum UserRole {
    #[default]
    Customer,
    Owner,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub city: Option<String>,
    pub role: UserRole,
}

impl User {
    pub fn register(name: String, email: Option<String>, city: Option<String>, role: UserRole) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            email,
            city,
            role,
        }
    }
}
