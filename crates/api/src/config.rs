//! Application configuration loaded from environment variables.

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `PRINTLING_WEBHOOK_TOKEN` / `NORDICA_WEBHOOK_TOKEN` /
///   `DROPSHIP_WEBHOOK_TOKEN` — per-supplier shared secrets checked on the
///   webhook endpoints
/// - `EUR_USD_RATE_MICROS` — conversion rate for Nordica quotes
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub printling_webhook_token: String,
    pub nordica_webhook_token: String,
    pub dropship_webhook_token: String,
    pub eur_usd_rate_micros: i64,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            printling_webhook_token: std::env::var("PRINTLING_WEBHOOK_TOKEN")
                .unwrap_or_else(|_| "dev-printling-token".to_string()),
            nordica_webhook_token: std::env::var("NORDICA_WEBHOOK_TOKEN")
                .unwrap_or_else(|_| "dev-nordica-token".to_string()),
            dropship_webhook_token: std::env::var("DROPSHIP_WEBHOOK_TOKEN")
                .unwrap_or_else(|_| "dev-dropship-token".to_string()),
            eur_usd_rate_micros: std::env::var("EUR_USD_RATE_MICROS")
                .ok()
                .and_then(|r| r.parse().ok())
                .unwrap_or(connectors::nordica::DEFAULT_EUR_USD_RATE_MICROS),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Returns the expected webhook token for a supplier endpoint.
    pub fn webhook_token(&self, supplier: &str) -> Option<&str> {
        match supplier {
            "printling" => Some(&self.printling_webhook_token),
            "nordica" => Some(&self.nordica_webhook_token),
            "dropship" => Some(&self.dropship_webhook_token),
            _ => None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            printling_webhook_token: "dev-printling-token".to_string(),
            nordica_webhook_token: "dev-nordica-token".to_string(),
            dropship_webhook_token: "dev-dropship-token".to_string(),
            eur_usd_rate_micros: connectors::nordica::DEFAULT_EUR_USD_RATE_MICROS,
        }
    }
}
