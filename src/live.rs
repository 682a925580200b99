use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::models::agent::GeoPoint;
use crate::models::order::ShopOrderStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentOffer {
    pub assignment_id: Uuid,
    pub order_id: Uuid,
    pub shop_order_id: Uuid,
    pub shop_name: String,
    pub delivery_address: String,
    pub item_count: usize,
    pub subtotal: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum LiveEvent {
    AssignmentOffer(AssignmentOffer),
    AssignmentWithdrawn {
        assignment_id: Uuid,
    },
    AgentLocation {
        agent_id: Uuid,
        location: GeoPoint,
        recorded_at: DateTime<Utc>,
    },
    ShopOrderStatus {
        order_id: Uuid,
        shop_order_id: Uuid,
        status: ShopOrderStatus,
    },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    UpdateLocation { latitude: f64, longitude: f64 },
}

pub struct ChannelRegistry {
    capacity: usize,
    channels: DashMap<Uuid, mpsc::Sender<LiveEvent>>,
}

impl ChannelRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            channels: DashMap::new(),
        }
    }

    pub fn register(&self, subject_id: Uuid) -> (mpsc::Sender<LiveEvent>, mpsc::Receiver<LiveEvent>) {
        let (tx, rx) = mpsc::channel(self.capacity);
        self.channels.insert(subject_id, tx.clone());
        (tx, rx)
    }

    // Only the connection that owns the current entry may remove it.
    pub fn deregister(&self, subject_id: Uuid, tx: &mpsc::Sender<LiveEvent>) {
        self.channels
            .remove_if(&subject_id, |_, current| current.same_channel(tx));
    }

    pub fn send_to(&self, subject_id: Uuid, event: LiveEvent) -> bool {
        match self.channels.get(&subject_id) {
            Some(tx) => tx.try_send(event).is_ok(),
            None => false,
        }
    }

    pub fn broadcast_to<'a>(
        &self,
        subjects: impl IntoIterator<Item = &'a Uuid>,
        event: &LiveEvent,
    ) -> usize {
        subjects
            .into_iter()
            .filter(|subject| self.send_to(**subject, event.clone()))
            .count()
    }

    pub fn connections(&self) -> usize {
        self.channels.len()
    }
}
