use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Clone, Copy)]
pub struct BroadcastRequest {
    pub order_id: Uuid,
    pub shop_order_id: Uuid,
}

pub async fn enqueue_broadcast(state: &AppState, request: BroadcastRequest) -> Result<(), AppError> {
    state
        .broadcast_tx
        .send(request)
        .await
        .map_err(|err| AppError::Internal(format!("broadcast queue send failed: {err}")))?;

    state.metrics.shop_orders_in_queue.inc();
    Ok(())
}
