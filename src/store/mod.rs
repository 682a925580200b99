use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::agent::{Agent, GeoPoint};
use crate::models::assignment::{Assignment, AssignmentOutcome};
use crate::models::order::{Order, ShopOrder, ShopOrderStatus};
use crate::models::shop::Shop;
use crate::models::user::{User, UserRole};
use crate::otp::{OtpRecord, OtpSubject};

#[derive(Debug)]
pub enum AcceptOutcome {
    Won(Assignment),
    Repeat(Assignment),
}

// Every method touches a single document under its entry lock, which is what
// makes `resolve_assignment` and `consume_otp_if` atomic conditional updates.
#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<Uuid, User>,
    agents: DashMap<Uuid, Agent>,
    shops: DashMap<Uuid, Shop>,
    orders: DashMap<Uuid, Order>,
    assignments: DashMap<Uuid, Assignment>,
    otp_records: DashMap<OtpSubject, OtpRecord>,
    agent_hours: DashMap<(Uuid, NaiveDate, u32), u64>,
    shop_days: DashMap<(Uuid, NaiveDate), (u64, i64)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, user: User) {
        self.users.insert(user.id, user);
    }

    pub fn get_user(&self, id: Uuid) -> Result<User, AppError> {
        self.users
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("user {id} not found")))
    }

    pub fn users(&self) -> Vec<User> {
        self.users.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn customers_with_email(&self, city: Option<&str>) -> Vec<User> {
        self.users
            .iter()
            .filter_map(|entry| {
                let user = entry.value();
                let eligible = user.role == UserRole::Customer
                    && user.email.is_some()
                    && city.is_none_or(|wanted| {
                        user.city
                            .as_deref()
                            .is_some_and(|have| have.eq_ignore_ascii_case(wanted))
                    });
                eligible.then(|| user.clone())
            })
            .collect()
    }

    pub fn insert_agent(&self, agent: Agent) {
        self.agents.insert(agent.id, agent);
    }

    pub fn get_agent(&self, id: Uuid) -> Result<Agent, AppError> {
        self.agents
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("agent {id} not found")))
    }

    pub fn agents(&self) -> Vec<Agent> {
        self.agents.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn agent_count(&self) -> usize {
        self.agents.len()
    }

    pub fn set_agent_location(&self, id: Uuid, location: GeoPoint) -> Result<Agent, AppError> {
        let mut agent = self
            .agents
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("agent {id} not found")))?;
        agent.location = Some(location);
        agent.updated_at = Utc::now();
        Ok(agent.clone())
    }

    pub fn set_agent_availability(&self, id: Uuid, available: bool) -> Result<Agent, AppError> {
        let mut agent = self
            .agents
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("agent {id} not found")))?;
        agent.available = available;
        agent.updated_at = Utc::now();
        Ok(agent.clone())
    }

    // Holds the order lock across the availability write so a concurrent
    // cancellation's release cannot be overwritten afterwards.
    pub fn hold_agent_if_assigned(
        &self,
        order_id: Uuid,
        shop_order_id: Uuid,
        agent_id: Uuid,
    ) -> bool {
        let Some(order) = self.orders.get(&order_id) else {
            return false;
        };
        let still_assigned = order.shop_orders.iter().any(|so| {
            so.id == shop_order_id
                && so.status == ShopOrderStatus::Assigned
                && so.assigned_agent == Some(agent_id)
        });
        if !still_assigned {
            return false;
        }
        match self.agents.get_mut(&agent_id) {
            Some(mut agent) => {
                agent.available = false;
                agent.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    pub fn insert_shop(&self, shop: Shop) {
        self.shops.insert(shop.id, shop);
    }

    pub fn get_shop(&self, id: Uuid) -> Result<Shop, AppError> {
        self.shops
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("shop {id} not found")))
    }

    pub fn shops(&self) -> Vec<Shop> {
        self.shops.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn insert_order(&self, order: Order) {
        self.orders.insert(order.id, order);
    }

    pub fn get_order(&self, id: Uuid) -> Result<Order, AppError> {
        self.orders
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))
    }

    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    pub fn update_shop_order<T>(
        &self,
        order_id: Uuid,
        shop_order_id: Uuid,
        mutate: impl FnOnce(&mut ShopOrder) -> Result<T, AppError>,
    ) -> Result<T, AppError> {
        let mut order = self
            .orders
            .get_mut(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;
        let shop_order = order
            .shop_orders
            .iter_mut()
            .find(|so| so.id == shop_order_id)
            .ok_or_else(|| AppError::NotFound(format!("shop order {shop_order_id} not found")))?;
        mutate(shop_order)
    }

    pub fn active_delivery_for_agent(&self, agent_id: Uuid) -> Option<(Order, ShopOrder)> {
        self.orders.iter().find_map(|entry| {
            let order = entry.value();
            order
                .shop_orders
                .iter()
                .find(|so| {
                    so.assigned_agent == Some(agent_id)
                        && matches!(so.status, ShopOrderStatus::Assigned | ShopOrderStatus::OtpSent)
                })
                .map(|so| (order.clone(), so.clone()))
        })
    }

    pub fn insert_assignment(&self, assignment: Assignment) {
        self.assignments.insert(assignment.id, assignment);
    }

    pub fn get_assignment(&self, id: Uuid) -> Result<Assignment, AppError> {
        self.assignments
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::NotFound(format!("assignment {id} not found")))
    }

    pub fn assignments(&self) -> Vec<Assignment> {
        self.assignments
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn assignment_count(&self) -> usize {
        self.assignments.len()
    }

    pub fn pending_offers_for_agent(&self, agent_id: Uuid) -> Vec<Assignment> {
        self.assignments
            .iter()
            .filter_map(|entry| {
                let assignment = entry.value();
                (assignment.is_pending() && assignment.candidates.contains(&agent_id))
                    .then(|| assignment.clone())
            })
            .collect()
    }

    pub fn pending_assignment_for_shop_order(&self, shop_order_id: Uuid) -> Option<Assignment> {
        self.assignments.iter().find_map(|entry| {
            let assignment = entry.value();
            (assignment.is_pending() && assignment.shop_order_id == shop_order_id)
                .then(|| assignment.clone())
        })
    }

    // The first caller to find Pending wins; everyone after observes a
    // terminal outcome. A winner's repeat call is reported as such.
    pub fn resolve_assignment(
        &self,
        assignment_id: Uuid,
        agent_id: Uuid,
    ) -> Result<AcceptOutcome, AppError> {
        match self.assignments.entry(assignment_id) {
            Entry::Vacant(_) => Err(AppError::NotFound(format!(
                "assignment {assignment_id} not found"
            ))),
            Entry::Occupied(mut entry) => {
                let assignment = entry.get_mut();
                if !assignment.candidates.contains(&agent_id) {
                    return Err(AppError::NotFound(format!(
                        "assignment {assignment_id} was not offered to agent {agent_id}"
                    )));
                }

                match assignment.outcome {
                    AssignmentOutcome::Pending => {
                        assignment.outcome = AssignmentOutcome::Accepted { agent_id };
                        assignment.resolved_at = Some(Utc::now());
                        Ok(AcceptOutcome::Won(assignment.clone()))
                    }
                    AssignmentOutcome::Accepted { agent_id: winner } if winner == agent_id => {
                        Ok(AcceptOutcome::Repeat(assignment.clone()))
                    }
                    _ => Err(AppError::AlreadyResolved),
                }
            }
        }
    }

    pub fn expire_assignment(&self, assignment_id: Uuid) -> Option<Assignment> {
        let mut assignment = self.assignments.get_mut(&assignment_id)?;
        if !assignment.is_pending() {
            return None;
        }
        assignment.outcome = AssignmentOutcome::Expired;
        assignment.resolved_at = Some(Utc::now());
        Some(assignment.clone())
    }

    // Rolls a won acceptance back to Expired; only the recorded winner can.
    pub fn revoke_acceptance(&self, assignment_id: Uuid, agent_id: Uuid) -> Option<Assignment> {
        let mut assignment = self.assignments.get_mut(&assignment_id)?;
        match assignment.outcome {
            AssignmentOutcome::Accepted { agent_id: winner } if winner == agent_id => {
                assignment.outcome = AssignmentOutcome::Expired;
                assignment.resolved_at = Some(Utc::now());
                Some(assignment.clone())
            }
            _ => None,
        }
    }

    pub fn put_otp(&self, record: OtpRecord) {
        self.otp_records
            .insert((record.order_id, record.shop_order_id), record);
    }

    pub fn get_otp(&self, subject: OtpSubject) -> Option<OtpRecord> {
        self.otp_records
            .get(&subject)
            .map(|entry| entry.value().clone())
    }

    // Removes the record only if the predicate holds, under the record's
    // shard lock; at most one concurrent caller can take it.
    pub fn consume_otp_if(
        &self,
        subject: OtpSubject,
        predicate: impl FnOnce(&OtpRecord) -> bool,
    ) -> bool {
        self.otp_records
            .remove_if(&subject, |_, record| predicate(record))
            .is_some()
    }

    pub fn bump_agent_hour(&self, agent_id: Uuid, date: NaiveDate, hour: u32) {
        *self.agent_hours.entry((agent_id, date, hour)).or_insert(0) += 1;
    }

    pub fn agent_hour_count(&self, agent_id: Uuid, date: NaiveDate, hour: u32) -> u64 {
        self.agent_hours
            .get(&(agent_id, date, hour))
            .map(|entry| *entry.value())
            .unwrap_or(0)
    }

    pub fn bump_shop_day(&self, shop_id: Uuid, date: NaiveDate, revenue: i64) {
        let mut tally = self.shop_days.entry((shop_id, date)).or_insert((0, 0));
        tally.0 += 1;
        tally.1 += revenue;
    }

    pub fn shop_day_tally(&self, shop_id: Uuid, date: NaiveDate) -> (u64, i64) {
        self.shop_days
            .get(&(shop_id, date))
            .map(|entry| *entry.value())
            .unwrap_or((0, 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::order::{DeliveryAddress, LineItem};

    fn seeded_assignment(store: &MemoryStore, candidates: Vec<Uuid>) -> Assignment {
        let assignment = Assignment::broadcast(Uuid::new_v4(), Uuid::new_v4(), candidates);
        store.insert_assignment(assignment.clone());
        assignment
    }

    fn seeded_order(store: &MemoryStore) -> Order {
        let order = Order::place(
            Uuid::new_v4(),
            DeliveryAddress {
                text: "1 Pier Road".to_string(),
                latitude: 52.52,
                longitude: 13.405,
            },
            vec![LineItem {
                shop_id: Uuid::new_v4(),
                name: "soup".to_string(),
                price: 120,
                quantity: 1,
            }],
        )
        .unwrap();
        store.insert_order(order.clone());
        order
    }

    #[test]
    fn resolve_assignment_first_caller_wins() {
        let store = MemoryStore::new();
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        let assignment = seeded_assignment(&store, vec![a, b]);

        let first = store.resolve_assignment(assignment.id, a).unwrap();
        assert!(matches!(first, AcceptOutcome::Won(_)));

        let second = store.resolve_assignment(assignment.id, b);
        assert!(matches!(second, Err(AppError::AlreadyResolved)));

        let stored = store.get_assignment(assignment.id).unwrap();
        assert_eq!(stored.outcome, AssignmentOutcome::Accepted { agent_id: a });
        assert!(stored.resolved_at.is_some());
    }

    #[test]
    fn winner_retry_is_reported_as_repeat() {
        let store = MemoryStore::new();
        let a = Uuid::from_u128(1);
        let assignment = seeded_assignment(&store, vec![a]);

        assert!(matches!(
            store.resolve_assignment(assignment.id, a).unwrap(),
            AcceptOutcome::Won(_)
        ));
        assert!(matches!(
            store.resolve_assignment(assignment.id, a).unwrap(),
            AcceptOutcome::Repeat(_)
        ));
    }

    #[test]
    fn non_candidate_cannot_accept() {
        let store = MemoryStore::new();
        let candidate = Uuid::from_u128(1);
        let outsider = Uuid::from_u128(9);
        let assignment = seeded_assignment(&store, vec![candidate]);

        let result = store.resolve_assignment(assignment.id, outsider);
        assert!(matches!(result, Err(AppError::NotFound(_))));

        assert!(matches!(
            store.resolve_assignment(assignment.id, candidate).unwrap(),
            AcceptOutcome::Won(_)
        ));
    }

    #[test]
    fn expire_is_terminal_for_later_accepts() {
        let store = MemoryStore::new();
        let a = Uuid::from_u128(1);
        let assignment = seeded_assignment(&store, vec![a]);

        assert!(store.expire_assignment(assignment.id).is_some());
        assert!(store.expire_assignment(assignment.id).is_none());

        let late = store.resolve_assignment(assignment.id, a);
        assert!(matches!(late, Err(AppError::AlreadyResolved)));
    }

    #[test]
    fn expire_does_not_touch_accepted_assignments() {
        let store = MemoryStore::new();
        let a = Uuid::from_u128(1);
        let assignment = seeded_assignment(&store, vec![a]);

        store.resolve_assignment(assignment.id, a).unwrap();
        assert!(store.expire_assignment(assignment.id).is_none());
        assert_eq!(
            store.get_assignment(assignment.id).unwrap().outcome,
            AssignmentOutcome::Accepted { agent_id: a }
        );
    }

    #[test]
    fn only_the_winner_can_revoke_an_acceptance() {
        let store = MemoryStore::new();
        let winner = Uuid::from_u128(1);
        let other = Uuid::from_u128(2);
        let assignment = seeded_assignment(&store, vec![winner, other]);

        assert!(store.revoke_acceptance(assignment.id, winner).is_none());

        store.resolve_assignment(assignment.id, winner).unwrap();
        assert!(store.revoke_acceptance(assignment.id, other).is_none());

        let revoked = store.revoke_acceptance(assignment.id, winner).unwrap();
        assert_eq!(revoked.outcome, AssignmentOutcome::Expired);

        let late = store.resolve_assignment(assignment.id, other);
        assert!(matches!(late, Err(AppError::AlreadyResolved)));
    }

    #[test]
    fn update_shop_order_unknown_ids_are_not_found() {
        let store = MemoryStore::new();
        let missing = store.update_shop_order(Uuid::new_v4(), Uuid::new_v4(), |_| Ok(()));
        assert!(matches!(missing, Err(AppError::NotFound(_))));

        let order = seeded_order(&store);
        let missing_shop_order = store.update_shop_order(order.id, Uuid::new_v4(), |_| Ok(()));
        assert!(matches!(missing_shop_order, Err(AppError::NotFound(_))));
    }

    #[test]
    fn hold_applies_only_while_the_shop_order_stays_assigned() {
        let store = MemoryStore::new();
        let agent = Agent::register("Nadia".to_string(), None);
        store.insert_agent(agent.clone());

        let order = seeded_order(&store);
        let shop_order_id = order.shop_orders[0].id;

        assert!(!store.hold_agent_if_assigned(order.id, shop_order_id, agent.id));
        assert!(store.get_agent(agent.id).unwrap().available);

        store
            .update_shop_order(order.id, shop_order_id, |so| {
                so.status = ShopOrderStatus::Assigned;
                so.assigned_agent = Some(agent.id);
                Ok(())
            })
            .unwrap();
        assert!(store.hold_agent_if_assigned(order.id, shop_order_id, agent.id));
        assert!(!store.get_agent(agent.id).unwrap().available);

        store
            .update_shop_order(order.id, shop_order_id, |so| {
                so.status = ShopOrderStatus::Cancelled;
                Ok(())
            })
            .unwrap();
        store.set_agent_availability(agent.id, true).unwrap();

        assert!(!store.hold_agent_if_assigned(order.id, shop_order_id, agent.id));
        assert!(store.get_agent(agent.id).unwrap().available);
    }

    #[test]
    fn customers_with_email_filters_role_email_and_city() {
        let store = MemoryStore::new();
        store.insert_user(User::register(
            "Amira".to_string(),
            Some("amira@example.com".to_string()),
            Some("Hamburg".to_string()),
            UserRole::Customer,
        ));
        store.insert_user(User::register(
            "Ben".to_string(),
            None,
            Some("Hamburg".to_string()),
            UserRole::Customer,
        ));
        store.insert_user(User::register(
            "Cleo".to_string(),
            Some("cleo@example.com".to_string()),
            Some("Berlin".to_string()),
            UserRole::Customer,
        ));
        store.insert_user(User::register(
            "Omar".to_string(),
            Some("omar@example.com".to_string()),
            Some("Hamburg".to_string()),
            UserRole::Owner,
        ));

        let all = store.customers_with_email(None);
        assert_eq!(all.len(), 2);

        let hamburg = store.customers_with_email(Some("hAMBURG"));
        assert_eq!(hamburg.len(), 1);
        assert_eq!(hamburg[0].name, "Amira");
    }

    #[test]
    fn earnings_buckets_accumulate() {
        let store = MemoryStore::new();
        let agent = Uuid::from_u128(1);
        let shop = Uuid::from_u128(2);
        let date = NaiveDate::from_ymd_opt(2024, 5, 4).unwrap();

        store.bump_agent_hour(agent, date, 13);
        store.bump_agent_hour(agent, date, 13);
        store.bump_shop_day(shop, date, 500);
        store.bump_shop_day(shop, date, 250);

        assert_eq!(store.agent_hour_count(agent, date, 13), 2);
        assert_eq!(store.agent_hour_count(agent, date, 14), 0);
        assert_eq!(store.shop_day_tally(shop, date), (2, 750));
    }
}
