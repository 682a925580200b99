use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryAddress {
    pub text: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub shop_id: Uuid,
    pub name: String,
    pub price: i64,
    pub quantity: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum ShopOrderStatus {
    Placed,
    Assigned,
    OtpSent,
    Delivered,
    Cancelled,
}

impl ShopOrderStatus {
    fn stage(self) -> u8 {
        match self {
            ShopOrderStatus::Placed => 0,
            ShopOrderStatus::Assigned => 1,
            ShopOrderStatus::OtpSent => 2,
            ShopOrderStatus::Delivered => 3,
            ShopOrderStatus::Cancelled => 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopOrder {
    pub id: Uuid,
    pub shop_id: Uuid,
    pub items: Vec<LineItem>,
    pub subtotal: i64,
    pub status: ShopOrderStatus,
    pub assigned_agent: Option<Uuid>,
    pub delivered_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub delivery_address: DeliveryAddress,
    pub ordered_at: DateTime<Utc>,
    pub shop_orders: Vec<ShopOrder>,
}

impl Order {
    pub fn place(
        customer_id: Uuid,
        delivery_address: DeliveryAddress,
        items: Vec<LineItem>,
    ) -> Result<Self, AppError> {
        let mut shop_orders: Vec<ShopOrder> = Vec::new();
        for item in items {
            let line_total = item
                .price
                .checked_mul(i64::from(item.quantity))
                .ok_or_else(|| {
                    AppError::BadRequest(format!("item {} total is out of range", item.name))
                })?;
            match shop_orders.iter_mut().find(|so| so.shop_id == item.shop_id) {
                Some(so) => {
                    so.subtotal = so.subtotal.checked_add(line_total).ok_or_else(|| {
                        AppError::BadRequest(format!(
                            "subtotal for shop {} is out of range",
                            item.shop_id
                        ))
                    })?;
                    so.items.push(item);
                }
                None => shop_orders.push(ShopOrder {
                    id: Uuid::new_v4(),
                    shop_id: item.shop_id,
                    items: vec![item],
                    subtotal: line_total,
                    status: ShopOrderStatus::Placed,
                    assigned_agent: None,
                    delivered_at: None,
                }),
            }
        }

        Ok(Self {
            id: Uuid::new_v4(),
            customer_id,
            delivery_address,
            ordered_at: Utc::now(),
            shop_orders,
        })
    }

    pub fn shop_order(&self, shop_order_id: Uuid) -> Option<&ShopOrder> {
        self.shop_orders.iter().find(|so| so.id == shop_order_id)
    }

    pub fn status(&self) -> ShopOrderStatus {
        self.shop_orders
            .iter()
            .map(|so| so.status)
            .filter(|s| *s != ShopOrderStatus::Cancelled)
            .min_by_key(|s| s.stage())
            .unwrap_or(ShopOrderStatus::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(shop_id: Uuid, price: i64, quantity: u32) -> LineItem {
        LineItem {
            shop_id,
            name: "test-item".to_string(),
            price,
            quantity,
        }
    }

    fn address() -> DeliveryAddress {
        DeliveryAddress {
            text: "12 Harbor Lane".to_string(),
            latitude: 53.5511,
            longitude: 9.9937,
        }
    }

    #[test]
    fn place_groups_items_by_shop() {
        let shop_a = Uuid::from_u128(1);
        let shop_b = Uuid::from_u128(2);
        let order = Order::place(
            Uuid::new_v4(),
            address(),
            vec![
                item(shop_a, 100, 2),
                item(shop_b, 250, 1),
                item(shop_a, 50, 3),
            ],
        )
        .unwrap();

        assert_eq!(order.shop_orders.len(), 2);
        assert_eq!(order.shop_orders[0].shop_id, shop_a);
        assert_eq!(order.shop_orders[0].items.len(), 2);
        assert_eq!(order.shop_orders[0].subtotal, 350);
        assert_eq!(order.shop_orders[1].shop_id, shop_b);
        assert_eq!(order.shop_orders[1].subtotal, 250);
    }

    #[test]
    fn new_shop_orders_start_placed_and_unassigned() {
        let order = Order::place(Uuid::new_v4(), address(), vec![item(Uuid::from_u128(1), 500, 1)])
            .unwrap();
        let so = &order.shop_orders[0];
        assert_eq!(so.status, ShopOrderStatus::Placed);
        assert!(so.assigned_agent.is_none());
        assert!(so.delivered_at.is_none());
    }

    #[test]
    fn order_status_is_least_advanced_non_cancelled() {
        let mut order = Order::place(
            Uuid::new_v4(),
            address(),
            vec![item(Uuid::from_u128(1), 100, 1), item(Uuid::from_u128(2), 100, 1)],
        )
        .unwrap();
        order.shop_orders[0].status = ShopOrderStatus::Delivered;
        order.shop_orders[1].status = ShopOrderStatus::Assigned;
        assert_eq!(order.status(), ShopOrderStatus::Assigned);

        order.shop_orders[1].status = ShopOrderStatus::Cancelled;
        assert_eq!(order.status(), ShopOrderStatus::Delivered);
    }

    #[test]
    fn order_status_all_cancelled() {
        let mut order = Order::place(Uuid::new_v4(), address(), vec![item(Uuid::from_u128(1), 100, 1)])
            .unwrap();
        order.shop_orders[0].status = ShopOrderStatus::Cancelled;
        assert_eq!(order.status(), ShopOrderStatus::Cancelled);
    }

    #[test]
    fn place_rejects_out_of_range_totals() {
        let line = Order::place(
            Uuid::new_v4(),
            address(),
            vec![item(Uuid::from_u128(1), i64::MAX, 2)],
        );
        assert!(matches!(line, Err(AppError::BadRequest(_))));

        let accumulated = Order::place(
            Uuid::new_v4(),
            address(),
            vec![
                item(Uuid::from_u128(1), i64::MAX / 2 + 1, 1),
                item(Uuid::from_u128(1), i64::MAX / 2 + 1, 1),
            ],
        );
        assert!(matches!(accumulated, Err(AppError::BadRequest(_))));
    }
}
