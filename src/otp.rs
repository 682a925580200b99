use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::store::MemoryStore;

pub type OtpSubject = (Uuid, Uuid);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpRecord {
    pub order_id: Uuid,
    pub shop_order_id: Uuid,
    pub code: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

pub fn generate_code() -> String {
    rand::thread_rng().gen_range(1000..=9999).to_string()
}

pub fn issue(store: &MemoryStore, order_id: Uuid, shop_order_id: Uuid, ttl: Duration) -> OtpRecord {
    let issued_at = Utc::now();
    let record = OtpRecord {
        order_id,
        shop_order_id,
        code: generate_code(),
        issued_at,
        expires_at: issued_at + ttl,
    };
    store.put_otp(record.clone());
    record
}

pub fn verify(
    store: &MemoryStore,
    order_id: Uuid,
    shop_order_id: Uuid,
    code: &str,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let subject = (order_id, shop_order_id);

    // The matching record is consumed atomically; concurrent submissions
    // of the same code cannot both pass.
    if store.consume_otp_if(subject, |record| record.code == code && now <= record.expires_at) {
        return Ok(());
    }

    // Expiry consumes conditionally too, so a reissue landing in between
    // is never deleted by mistake.
    if store.consume_otp_if(subject, |record| now > record.expires_at) {
        return Err(AppError::OtpExpired);
    }

    match store.get_otp(subject) {
        None => Err(AppError::NotFound(
            "no active delivery code; request a new one".to_string(),
        )),
        Some(_) => Err(AppError::OtpMismatch),
    }
}
