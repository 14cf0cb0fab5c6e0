//! Protocol configuration shared by all handlers.

use domain::outbox::DEFAULT_MAX_RETRIES;

/// Reads:
/// - `MAX_RETRIES` — publish-attempt budget stamped on new outbox events
///   (default 3).
/// - `PAYMENT_FAILURE_RATE` — synthetic decline probability for the
///   simulated payment gateway (default 0.1).
#[derive(Debug, Clone, Copy)]
pub struct ProtocolConfig {
    pub max_publish_retries: u32,
    pub payment_failure_rate: f64,
}

impl ProtocolConfig {
    pub fn from_env() -> Self {
        Self {
            max_publish_retries: env_parse("MAX_RETRIES", DEFAULT_MAX_RETRIES),
            payment_failure_rate: env_parse::<f64>("PAYMENT_FAILURE_RATE", 0.1).clamp(0.0, 1.0),
        }
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            max_publish_retries: DEFAULT_MAX_RETRIES,
            payment_failure_rate: 0.1,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
