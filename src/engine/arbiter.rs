use tracing::{info, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::live::LiveEvent;
use crate::models::assignment::Assignment;
use crate::models::order::ShopOrderStatus;
use crate::state::AppState;
use crate::store::AcceptOutcome;

pub fn accept_assignment(
    state: &AppState,
    assignment_id: Uuid,
    agent_id: Uuid,
) -> Result<Assignment, AppError> {
    let outcome = match state.store.resolve_assignment(assignment_id, agent_id) {
        Ok(outcome) => outcome,
        Err(err) => {
            state
                .metrics
                .accepts_total
                .with_label_values(&["rejected"])
                .inc();
            return Err(err);
        }
    };

    let assignment = match outcome {
        AcceptOutcome::Repeat(assignment) => {
            state
                .metrics
                .accepts_total
                .with_label_values(&["repeat"])
                .inc();
            info!(%assignment_id, %agent_id, "accept replayed by winner");
            return Ok(assignment);
        }
        AcceptOutcome::Won(assignment) => assignment,
    };

    let transition = state
        .store
        .update_shop_order(assignment.order_id, assignment.shop_order_id, |so| {
            if so.status != ShopOrderStatus::Placed {
                return Err(AppError::InvalidState(format!(
                    "shop order {} is no longer open for assignment",
                    so.id
                )));
            }
            so.status = ShopOrderStatus::Assigned;
            so.assigned_agent = Some(agent_id);
            Ok(())
        });

    if let Err(err) = transition {
        // The shop order was cancelled under the winner; retire the assignment.
        state.store.revoke_acceptance(assignment.id, agent_id);
        state
            .metrics
            .accepts_total
            .with_label_values(&["rejected"])
            .inc();
        return Err(err);
    }

    if !state
        .store
        .hold_agent_if_assigned(assignment.order_id, assignment.shop_order_id, agent_id)
    {
        warn!(%agent_id, "winner not held; shop order moved on before the hold");
    }

    let withdrawal = LiveEvent::AssignmentWithdrawn {
        assignment_id: assignment.id,
    };
    let losers = assignment.candidates.iter().filter(|id| **id != agent_id);
    state.registry.broadcast_to(losers, &withdrawal);

    if let Ok(order) = state.store.get_order(assignment.order_id) {
        state.registry.send_to(
            order.customer_id,
            LiveEvent::ShopOrderStatus {
                order_id: order.id,
                shop_order_id: assignment.shop_order_id,
                status: ShopOrderStatus::Assigned,
            },
        );
    }

    state
        .metrics
        .accepts_total
        .with_label_values(&["won"])
        .inc();
    info!(
        %assignment_id,
        shop_order_id = %assignment.shop_order_id,
        %agent_id,
        "assignment accepted"
    );

    Ok(assignment)
}
