//! Service configuration loaded from environment variables.

/// Which participant this process runs as.
///
/// One binary serves all four roles; `SERVICE` selects the role and the
/// default port follows the `http://localhost:300{1..4}` layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Order,
    Payment,
    Inventory,
    Shipping,
}

impl ServiceKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "order" => Some(ServiceKind::Order),
            "payment" => Some(ServiceKind::Payment),
            "inventory" => Some(ServiceKind::Inventory),
            "shipping" => Some(ServiceKind::Shipping),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Order => "order",
            ServiceKind::Payment => "payment",
            ServiceKind::Inventory => "inventory",
            ServiceKind::Shipping => "shipping",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            ServiceKind::Order => 3001,
            ServiceKind::Payment => 3002,
            ServiceKind::Inventory => 3003,
            ServiceKind::Shipping => 3004,
        }
    }

}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Process configuration.
///
/// - `SERVICE` — role (default `order`)
/// - `HOST` — bind address (default `0.0.0.0`)
/// - `PORT` — listen port (default per role)
/// - `DATABASE_URL` — Postgres connection string; absent means in-memory
///   demo storage
/// - `RUST_LOG` — tracing filter (default `info`)
#[derive(Debug, Clone)]
pub struct Config {
    pub service: ServiceKind,
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Self {
        let service = std::env::var("SERVICE")
            .ok()
            .and_then(|s| ServiceKind::parse(&s))
            .unwrap_or(ServiceKind::Order);
        Self {
            service,
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or_else(|| service.default_port()),
            database_url: std::env::var("DATABASE_URL").ok(),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceKind::Order,
            host: "0.0.0.0".to_string(),
            port: ServiceKind::Order.default_port(),
            database_url: None,
            log_level: "info".to_string(),
        }
    }
}
