use std::env;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub broadcast_queue_size: usize,
    pub live_channel_capacity: usize,
    pub assignment_radius_km: f64,
    pub otp_ttl_minutes: i64,
    pub delivery_rate: i64,
    pub rebroadcast_delay_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            broadcast_queue_size: parse_or_default("BROADCAST_QUEUE_SIZE", 1024)?,
            live_channel_capacity: parse_or_default("LIVE_CHANNEL_CAPACITY", 64)?,
            assignment_radius_km: parse_or_default("ASSIGNMENT_RADIUS_KM", 10.0)?,
            otp_ttl_minutes: parse_or_default("OTP_TTL_MINUTES", 5)?,
            delivery_rate: parse_or_default("DELIVERY_RATE", 50)?,
            rebroadcast_delay_ms: parse_or_default("REBROADCAST_DELAY_MS", 250)?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            broadcast_queue_size: 1024,
            live_channel_capacity: 64,
            assignment_radius_km: 10.0,
            otp_ttl_minutes: 5,
            delivery_rate: 50,
            rebroadcast_delay_ms: 250,
        }
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
