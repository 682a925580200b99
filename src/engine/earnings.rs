use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::order::ShopOrder;
use crate::store::MemoryStore;

#[derive(Debug, Serialize, PartialEq)]
pub struct HourlyEarnings {
    pub hour: u32,
    pub deliveries: u64,
    pub amount: i64,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct DailyEarnings {
    pub date: NaiveDate,
    pub deliveries: u64,
    pub revenue: i64,
}

pub fn record_delivery(
    store: &MemoryStore,
    shop_order: &ShopOrder,
    agent_id: Uuid,
    delivered_at: DateTime<Utc>,
) {
    let date = delivered_at.date_naive();
    store.bump_agent_hour(agent_id, date, delivered_at.hour());
    store.bump_shop_day(shop_order.shop_id, date, shop_order.subtotal);
}

pub fn agent_earnings_today(
    store: &MemoryStore,
    agent_id: Uuid,
    rate: i64,
    now: DateTime<Utc>,
) -> Vec<HourlyEarnings> {
    let date = now.date_naive();
    (0..24)
        .map(|hour| {
            let deliveries = store.agent_hour_count(agent_id, date, hour);
            HourlyEarnings {
                hour,
                deliveries,
                amount: deliveries as i64 * rate,
            }
        })
        .collect()
}

pub fn shop_earnings(
    store: &MemoryStore,
    shop_id: Uuid,
    days: u32,
    now: DateTime<Utc>,
) -> Vec<DailyEarnings> {
    let today = now.date_naive();
    (0..days)
        .rev()
        .map(|back| {
            let date = today - Duration::days(i64::from(back));
            let (deliveries, revenue) = store.shop_day_tally(shop_id, date);
            DailyEarnings {
                date,
                deliveries,
                revenue,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 30, 0).unwrap()
    }

    fn delivered_shop_order(shop_id: Uuid, subtotal: i64) -> ShopOrder {
        ShopOrder {
            id: Uuid::new_v4(),
            shop_id,
            items: Vec::new(),
            subtotal,
            status: crate::models::order::ShopOrderStatus::Delivered,
            assigned_agent: None,
            delivered_at: None,
        }
    }

    #[test]
    fn agent_day_is_always_twenty_four_buckets() {
        let store = MemoryStore::new();
        let agent = Uuid::from_u128(1);
        let now = at(2024, 5, 4, 18);

        let idle = agent_earnings_today(&store, agent, 50, now);
        assert_eq!(idle.len(), 24);
        assert!(idle.iter().all(|b| b.deliveries == 0 && b.amount == 0));
        assert_eq!(idle[0].hour, 0);
        assert_eq!(idle[23].hour, 23);
    }

    #[test]
    fn hourly_amounts_follow_the_delivery_rate() {
        let store = MemoryStore::new();
        let agent = Uuid::from_u128(1);
        let shop = Uuid::from_u128(2);
        let now = at(2024, 5, 4, 18);

        record_delivery(&store, &delivered_shop_order(shop, 300), agent, at(2024, 5, 4, 9));
        record_delivery(&store, &delivered_shop_order(shop, 450), agent, at(2024, 5, 4, 9));
        record_delivery(&store, &delivered_shop_order(shop, 120), agent, at(2024, 5, 4, 17));

        let day = agent_earnings_today(&store, agent, 50, now);
        assert_eq!(day[9].deliveries, 2);
        assert_eq!(day[9].amount, 100);
        assert_eq!(day[17].deliveries, 1);
        assert_eq!(day[17].amount, 50);
        assert_eq!(day.iter().map(|b| b.deliveries).sum::<u64>(), 3);
    }

    #[test]
    fn yesterdays_deliveries_do_not_leak_into_today() {
        let store = MemoryStore::new();
        let agent = Uuid::from_u128(1);
        let shop = Uuid::from_u128(2);

        record_delivery(&store, &delivered_shop_order(shop, 300), agent, at(2024, 5, 3, 23));

        let day = agent_earnings_today(&store, agent, 50, at(2024, 5, 4, 1));
        assert!(day.iter().all(|b| b.deliveries == 0));
    }

    #[test]
    fn shop_window_is_dense_and_ends_today() {
        let store = MemoryStore::new();
        let agent = Uuid::from_u128(1);
        let shop = Uuid::from_u128(2);
        let now = at(2024, 5, 10, 12);

        record_delivery(&store, &delivered_shop_order(shop, 500), agent, at(2024, 5, 8, 13));
        record_delivery(&store, &delivered_shop_order(shop, 250), agent, at(2024, 5, 8, 19));
        record_delivery(&store, &delivered_shop_order(shop, 100), agent, at(2024, 5, 10, 9));

        let window = shop_earnings(&store, shop, 7, now);
        assert_eq!(window.len(), 7);
        assert_eq!(window[0].date, NaiveDate::from_ymd_opt(2024, 5, 4).unwrap());
        assert_eq!(window[6].date, NaiveDate::from_ymd_opt(2024, 5, 10).unwrap());

        assert_eq!(window[4].deliveries, 2);
        assert_eq!(window[4].revenue, 750);
        assert_eq!(window[6].deliveries, 1);
        assert_eq!(window[6].revenue, 100);
        assert_eq!(window[5].deliveries, 0);
        assert_eq!(window[5].revenue, 0);
    }

    #[test]
    fn other_shops_do_not_contribute() {
        let store = MemoryStore::new();
        let agent = Uuid::from_u128(1);
        let shop = Uuid::from_u128(2);
        let other = Uuid::from_u128(3);
        let now = at(2024, 5, 10, 12);

        record_delivery(&store, &delivered_shop_order(other, 999), agent, at(2024, 5, 10, 9));

        let window = shop_earnings(&store, shop, 1, now);
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].deliveries, 0);
        assert_eq!(window[0].revenue, 0);
    }
}
