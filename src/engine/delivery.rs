use chrono::{Duration, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::earnings;
use crate::error::AppError;
use crate::live::LiveEvent;
use crate::models::order::{ShopOrder, ShopOrderStatus};
use crate::otp;
use crate::state::AppState;

pub async fn request_handover_code(
    state: &AppState,
    order_id: Uuid,
    shop_order_id: Uuid,
    agent_id: Uuid,
) -> Result<ShopOrder, AppError> {
    let shop_order = state
        .store
        .update_shop_order(order_id, shop_order_id, |so| {
            if so.assigned_agent != Some(agent_id) {
                return Err(AppError::BadRequest(format!(
                    "agent {agent_id} is not assigned to shop order {shop_order_id}"
                )));
            }
            match so.status {
                ShopOrderStatus::Assigned | ShopOrderStatus::OtpSent => {
                    so.status = ShopOrderStatus::OtpSent;
                    Ok(so.clone())
                }
                _ => Err(AppError::InvalidState(format!(
                    "shop order {shop_order_id} is not out for delivery"
                ))),
            }
        })?;

    let record = otp::issue(
        &state.store,
        order_id,
        shop_order_id,
        Duration::minutes(state.config.otp_ttl_minutes),
    );

    let order = state.store.get_order(order_id)?;
    match state.store.get_user(order.customer_id) {
        Ok(customer) => match customer.email {
            Some(email) => {
                let body = format!(
                    "Your OTP for delivery is {}. It expires in {} minutes.",
                    record.code, state.config.otp_ttl_minutes
                );
                if let Err(error) = state.mailer.send(&email, "Delivery OTP", &body).await {
                    warn!(%order_id, %error, "delivery code mail failed");
                }
            }
            None => warn!(%order_id, "customer has no email for delivery code"),
        },
        Err(error) => warn!(%order_id, %error, "customer lookup failed for delivery code"),
    }

    state.registry.send_to(
        order.customer_id,
        LiveEvent::ShopOrderStatus {
            order_id,
            shop_order_id,
            status: ShopOrderStatus::OtpSent,
        },
    );

    info!(%order_id, %shop_order_id, %agent_id, "delivery code issued");
    Ok(shop_order)
}

pub fn verify_handover_code(
    state: &AppState,
    order_id: Uuid,
    shop_order_id: Uuid,
    agent_id: Uuid,
    code: &str,
) -> Result<ShopOrder, AppError> {
    let snapshot = state
        .store
        .update_shop_order(order_id, shop_order_id, |so| {
            if so.assigned_agent != Some(agent_id) {
                return Err(AppError::BadRequest(format!(
                    "agent {agent_id} is not assigned to shop order {shop_order_id}"
                )));
            }
            Ok(so.clone())
        })?;

    match snapshot.status {
        ShopOrderStatus::Delivered => return Ok(snapshot),
        ShopOrderStatus::OtpSent => {}
        _ => {
            return Err(AppError::InvalidState(format!(
                "shop order {shop_order_id} has no delivery code outstanding"
            )));
        }
    }

    if let Err(error) = otp::verify(&state.store, order_id, shop_order_id, code, Utc::now()) {
        let result = match &error {
            AppError::OtpMismatch => "mismatch",
            AppError::OtpExpired => "expired",
            _ => "missing",
        };
        state
            .metrics
            .otp_verifications_total
            .with_label_values(&[result])
            .inc();

        // A concurrent confirmation may have consumed the code first.
        if matches!(error, AppError::NotFound(_)) {
            let current = state
                .store
                .update_shop_order(order_id, shop_order_id, |so| Ok(so.clone()))?;
            if current.status == ShopOrderStatus::Delivered {
                return Ok(current);
            }
        }
        return Err(error);
    }

    state
        .metrics
        .otp_verifications_total
        .with_label_values(&["ok"])
        .inc();

    let delivered_at = Utc::now();
    let shop_order = state
        .store
        .update_shop_order(order_id, shop_order_id, |so| {
            so.status = ShopOrderStatus::Delivered;
            so.delivered_at = Some(delivered_at);
            Ok(so.clone())
        })?;

    if let Err(error) = state.store.set_agent_availability(agent_id, true) {
        warn!(%agent_id, %error, "could not release agent after delivery");
    }

    earnings::record_delivery(&state.store, &shop_order, agent_id, delivered_at);

    if let Ok(order) = state.store.get_order(order_id) {
        state.registry.send_to(
            order.customer_id,
            LiveEvent::ShopOrderStatus {
                order_id,
                shop_order_id,
                status: ShopOrderStatus::Delivered,
            },
        );
    }

    info!(%order_id, %shop_order_id, %agent_id, "delivery confirmed");
    Ok(shop_order)
}

pub fn cancel_shop_order(
    state: &AppState,
    order_id: Uuid,
    shop_order_id: Uuid,
) -> Result<ShopOrder, AppError> {
    let (shop_order, released_agent) =
        state
            .store
            .update_shop_order(order_id, shop_order_id, |so| match so.status {
                ShopOrderStatus::Cancelled => Ok((so.clone(), None)),
                ShopOrderStatus::Placed | ShopOrderStatus::Assigned => {
                    let agent = so.assigned_agent;
                    so.status = ShopOrderStatus::Cancelled;
                    Ok((so.clone(), agent))
                }
                _ => Err(AppError::InvalidState(format!(
                    "shop order {shop_order_id} is already in handover"
                ))),
            })?;

    if let Some(agent_id) = released_agent {
        if let Err(error) = state.store.set_agent_availability(agent_id, true) {
            warn!(%agent_id, %error, "could not release agent after cancellation");
        }
    }

    if let Some(open) = state.store.pending_assignment_for_shop_order(shop_order_id) {
        if state.store.expire_assignment(open.id).is_some() {
            let withdrawal = LiveEvent::AssignmentWithdrawn {
                assignment_id: open.id,
            };
            state.registry.broadcast_to(&open.candidates, &withdrawal);
        }
    }

    if let Ok(order) = state.store.get_order(order_id) {
        state.registry.send_to(
            order.customer_id,
            LiveEvent::ShopOrderStatus {
                order_id,
                shop_order_id,
                status: ShopOrderStatus::Cancelled,
            },
        );
    }

    info!(%order_id, %shop_order_id, "shop order cancelled");
    Ok(shop_order)
}
