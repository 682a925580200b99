use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::shop::Shop;
use crate::store::MemoryStore;

#[derive(Debug, Error)]
#[error("mail delivery failed: {0}")]
pub struct MailError(pub String);

#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError>;
}

pub struct LogMailer;

#[async_trait]
impl MailSender for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        info!(to, subject, body, "mail dispatched");
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub enum Audience {
    City(String),
    All,
}

#[derive(Debug, Serialize)]
pub struct FanoutReport {
    pub total: usize,
    pub sent: Vec<String>,
}

pub async fn notify_shop_availability(
    store: &MemoryStore,
    mailer: &dyn MailSender,
    shop: &Shop,
    audience: Audience,
) -> FanoutReport {
    let (recipients, subject, body) = match &audience {
        Audience::City(city) => (
            store.customers_with_email(Some(city)),
            "Ample Food Available at Nearby Restaurant",
            format!(
                "Ample food is available at {} in your city {city}. Visit now to claim your food!",
                shop.name
            ),
        ),
        Audience::All => (
            store.customers_with_email(None),
            "Ample Food Available at Restaurant",
            format!(
                "Ample food is available at {}. Visit now to claim your food!",
                shop.name
            ),
        ),
    };

    let total = recipients.len();
    info!(shop = %shop.id, total, "notifying customers of availability");

    let mut sent = Vec::with_capacity(total);
    for user in recipients {
        let Some(email) = user.email else {
            continue;
        };
        match mailer.send(&email, subject, &body).await {
            Ok(()) => sent.push(email),
            Err(error) => warn!(to = %email, %error, "availability mail failed"),
        }
    }

    FanoutReport { total, sent }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::agent::GeoPoint;
    use crate::models::user::{User, UserRole};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RecordingMailer {
        outbox: Mutex<Vec<(String, String)>>,
    }

    impl RecordingMailer {
        fn new() -> Self {
            Self {
                outbox: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl MailSender for RecordingMailer {
        async fn send(&self, to: &str, subject: &str, _body: &str) -> Result<(), MailError> {
            self.outbox
                .lock()
                .unwrap()
                .push((to.to_string(), subject.to_string()));
            Ok(())
        }
    }

    // Rejects the n-th delivery attempt (1-based) and accepts the rest.
    struct FlakyMailer {
        fail_on: usize,
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl MailSender for FlakyMailer {
        async fn send(&self, to: &str, _subject: &str, _body: &str) -> Result<(), MailError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt == self.fail_on {
                return Err(MailError(format!("relay refused {to}")));
            }
            Ok(())
        }
    }

    fn shop() -> Shop {
        Shop::register(
            "Pier 7".to_string(),
            "Hamburg".to_string(),
            GeoPoint { lat: 53.54, lng: 9.98 },
        )
    }

    fn customer(store: &MemoryStore, name: &str, city: &str) {
        store.insert_user(User::register(
            name.to_string(),
            Some(format!("{}@example.com", name.to_lowercase())),
            Some(city.to_string()),
            UserRole::Customer,
        ));
    }

    #[tokio::test]
    async fn city_audience_matches_case_insensitively() {
        let store = MemoryStore::new();
        customer(&store, "Amira", "hamburg");
        customer(&store, "Ben", "HAMBURG");
        customer(&store, "Cleo", "Berlin");

        let mailer = RecordingMailer::new();
        let report = notify_shop_availability(
            &store,
            &mailer,
            &shop(),
            Audience::City("Hamburg".to_string()),
        )
        .await;

        assert_eq!(report.total, 2);
        assert_eq!(report.sent.len(), 2);
        let outbox = mailer.outbox.lock().unwrap();
        assert!(
            outbox
                .iter()
                .all(|(_, subject)| subject == "Ample Food Available at Nearby Restaurant")
        );
    }

    #[tokio::test]
    async fn one_failure_does_not_stop_the_fanout() {
        let store = MemoryStore::new();
        for name in ["A", "B", "C", "D", "E"] {
            customer(&store, name, "Hamburg");
        }

        let mailer = FlakyMailer {
            fail_on: 3,
            attempts: AtomicUsize::new(0),
        };
        let report = notify_shop_availability(&store, &mailer, &shop(), Audience::All).await;

        assert_eq!(report.total, 5);
        assert_eq!(report.sent.len(), 4);
    }

    #[tokio::test]
    async fn customers_without_email_are_not_counted() {
        let store = MemoryStore::new();
        customer(&store, "Amira", "Hamburg");
        store.insert_user(User::register(
            "Ben".to_string(),
            None,
            Some("Hamburg".to_string()),
            UserRole::Customer,
        ));

        let mailer = RecordingMailer::new();
        let report = notify_shop_availability(&store, &mailer, &shop(), Audience::All).await;

        assert_eq!(report.total, 1);
        assert_eq!(report.sent, vec!["amira@example.com".to_string()]);
    }
}
