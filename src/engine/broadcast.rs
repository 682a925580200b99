use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tokio::time::{Duration, sleep};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::engine::queue::{BroadcastRequest, enqueue_broadcast};
use crate::error::AppError;
use crate::geo::haversine_km;
use crate::live::{AssignmentOffer, LiveEvent};
use crate::models::agent::AgentRole;
use crate::models::assignment::Assignment;
use crate::models::order::{Order, ShopOrder, ShopOrderStatus};
use crate::state::AppState;

pub enum BroadcastOutcome {
    Offered,
    Requeued,
    Skipped,
}

impl BroadcastOutcome {
    fn label(&self) -> &'static str {
        match self {
            BroadcastOutcome::Offered => "offered",
            BroadcastOutcome::Requeued => "requeued",
            BroadcastOutcome::Skipped => "skipped",
        }
    }
}

pub async fn run_broadcast_engine(
    state: Arc<AppState>,
    mut broadcast_rx: mpsc::Receiver<BroadcastRequest>,
) {
    info!("broadcast engine started");

    while let Some(request) = broadcast_rx.recv().await {
        state.metrics.shop_orders_in_queue.dec();

        let start = Instant::now();
        match broadcast_shop_order(state.clone(), request).await {
            Ok(outcome) => {
                let elapsed = start.elapsed().as_secs_f64();
                state
                    .metrics
                    .broadcast_latency_seconds
                    .with_label_values(&[outcome.label()])
                    .observe(elapsed);
                state
                    .metrics
                    .broadcasts_total
                    .with_label_values(&[outcome.label()])
                    .inc();
            }
            Err(err) => {
                let elapsed = start.elapsed().as_secs_f64();
                state
                    .metrics
                    .broadcast_latency_seconds
                    .with_label_values(&["error"])
                    .observe(elapsed);
                state
                    .metrics
                    .broadcasts_total
                    .with_label_values(&["error"])
                    .inc();
                error!(error = %err, "failed to broadcast shop order");
            }
        }
    }

    warn!("broadcast engine stopped: queue channel closed");
}

async fn broadcast_shop_order(
    state: Arc<AppState>,
    request: BroadcastRequest,
) -> Result<BroadcastOutcome, AppError> {
    let order = state.store.get_order(request.order_id)?;
    let shop_order = order
        .shop_orders
        .iter()
        .find(|so| so.id == request.shop_order_id)
        .ok_or_else(|| {
            AppError::NotFound(format!("shop order {} not found", request.shop_order_id))
        })?;

    if shop_order.status != ShopOrderStatus::Placed {
        info!(
            shop_order_id = %shop_order.id,
            "shop order already moved on; skipping broadcast"
        );
        return Ok(BroadcastOutcome::Skipped);
    }

    let shop = state.store.get_shop(shop_order.shop_id)?;

    // An open offer is re-sent rather than minting a second assignment.
    if let Some(open) = state.store.pending_assignment_for_shop_order(shop_order.id) {
        let offer = build_offer(&open, &order, shop_order, &shop.name);
        let delivered = state.registry.broadcast_to(&open.candidates, &offer);
        info!(
            assignment_id = %open.id,
            shop_order_id = %shop_order.id,
            delivered,
            "re-sent open assignment offer"
        );
        return Ok(BroadcastOutcome::Offered);
    }

    let candidates: Vec<Uuid> = state
        .store
        .agents()
        .into_iter()
        .filter(|agent| {
            agent.role == AgentRole::Delivery
                && agent.available
                && agent.location.is_none_or(|at| {
                    haversine_km(&at, &shop.location) <= state.config.assignment_radius_km
                })
        })
        .map(|agent| agent.id)
        .collect();

    if candidates.is_empty() {
        warn!(shop_order_id = %shop_order.id, "no eligible agents; re-queueing shop order");
        sleep(Duration::from_millis(state.config.rebroadcast_delay_ms)).await;
        enqueue_broadcast(&state, request).await?;
        return Ok(BroadcastOutcome::Requeued);
    }

    let assignment = Assignment::broadcast(order.id, shop_order.id, candidates);
    state.store.insert_assignment(assignment.clone());

    let offer = build_offer(&assignment, &order, shop_order, &shop.name);
    let delivered = state.registry.broadcast_to(&assignment.candidates, &offer);

    info!(
        assignment_id = %assignment.id,
        shop_order_id = %shop_order.id,
        candidates = assignment.candidates.len(),
        delivered,
        "assignment offered"
    );

    Ok(BroadcastOutcome::Offered)
}

fn build_offer(
    assignment: &Assignment,
    order: &Order,
    shop_order: &ShopOrder,
    shop_name: &str,
) -> LiveEvent {
    LiveEvent::AssignmentOffer(AssignmentOffer {
        assignment_id: assignment.id,
        order_id: order.id,
        shop_order_id: shop_order.id,
        shop_name: shop_name.to_string(),
        delivery_address: order.delivery_address.text.clone(),
        item_count: shop_order.items.len(),
        subtotal: shop_order.subtotal,
    })
}
