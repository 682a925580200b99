use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum AssignmentOutcome {
    Pending,
    Accepted { agent_id: Uuid },
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assignment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub shop_order_id: Uuid,
    pub candidates: Vec<Uuid>,
    pub outcome: AssignmentOutcome,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Assignment {
    pub fn broadcast(order_id: Uuid, shop_order_id: Uuid, candidates: Vec<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            shop_order_id,
            candidates,
            outcome: AssignmentOutcome::Pending,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.outcome == AssignmentOutcome::Pending
    }
}
