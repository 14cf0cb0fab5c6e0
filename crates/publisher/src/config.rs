//! Publisher configuration loaded from environment variables.

use std::time::Duration;

use domain::TargetService;

/// Base URLs of the four participant services.
///
/// Reads `ORDER_SERVICE_URL`, `PAYMENT_SERVICE_URL`, `INVENTORY_SERVICE_URL`,
/// `SHIPPING_SERVICE_URL`; defaults to `http://localhost:3001..3004`.
#[derive(Debug, Clone)]
pub struct ServiceUrls {
    pub order: String,
    pub payment: String,
    pub inventory: String,
    pub shipping: String,
}

impl ServiceUrls {
    pub fn from_env() -> Self {
        Self {
            order: env_or("ORDER_SERVICE_URL", "http://localhost:3001"),
            payment: env_or("PAYMENT_SERVICE_URL", "http://localhost:3002"),
            inventory: env_or("INVENTORY_SERVICE_URL", "http://localhost:3003"),
            shipping: env_or("SHIPPING_SERVICE_URL", "http://localhost:3004"),
        }
    }

    /// Base URL for a target service, without a trailing slash.
    pub fn base(&self, service: TargetService) -> &str {
        let url = match service {
            TargetService::Order => &self.order,
            TargetService::Payment => &self.payment,
            TargetService::Inventory => &self.inventory,
            TargetService::Shipping => &self.shipping,
        };
        url.trim_end_matches('/')
    }
}

impl Default for ServiceUrls {
    fn default() -> Self {
        Self {
            order: "http://localhost:3001".to_string(),
            payment: "http://localhost:3002".to_string(),
            inventory: "http://localhost:3003".to_string(),
            shipping: "http://localhost:3004".to_string(),
        }
    }
}

/// Poll-loop configuration.
///
/// | Variable | Default |
/// |---|---|
/// | `BATCH_SIZE` | 10 |
/// | `POLL_INTERVAL_MS` | 1000 |
/// | `REQUEST_TIMEOUT_MS` | 5000 |
#[derive(Debug, Clone)]
pub struct PublisherConfig {
    pub batch_size: usize,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub urls: ServiceUrls,
}

impl PublisherConfig {
    pub fn from_env() -> Self {
        Self {
            batch_size: env_parse("BATCH_SIZE", 10),
            poll_interval: Duration::from_millis(env_parse("POLL_INTERVAL_MS", 1000)),
            request_timeout: Duration::from_millis(env_parse("REQUEST_TIMEOUT_MS", 5000)),
            urls: ServiceUrls::from_env(),
        }
    }
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            poll_interval: Duration::from_millis(1000),
            request_timeout: Duration::from_millis(5000),
            urls: ServiceUrls::default(),
        }
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
