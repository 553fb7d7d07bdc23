use std::env;
use url::Url;

const DEFAULT_PORT: u16 = 4108;
const DEFAULT_DB_PATH: &str = "./gated-notes.db";
const DEFAULT_RATE_LIMIT_RPM: u32 = 60;
const DEFAULT_INVOICE_MEMO: &str = "Unlock gated note";

#[derive(Clone)]
pub struct GateConfig {
    /// Public base URL; gated notes must carry exactly this `endpoint` tag
    pub endpoint: String,
    /// SQLite database path
    pub db_path: String,
    /// Server port
    pub port: u16,
    /// CORS allowed origins
    pub allowed_origins: Vec<String>,
    /// Rate limit requests per minute
    pub rate_limit_rpm: u32,
    /// Bearer token required for /metrics endpoint (None = public)
    pub metrics_token: Option<String>,
    /// Comment attached to minted invoices
    pub invoice_memo: String,
    /// Relaxes production-only checks such as wildcard CORS
    pub dev_mode: bool,
}

impl std::fmt::Debug for GateConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateConfig")
            .field("endpoint", &self.endpoint)
            .field("db_path", &self.db_path)
            .field("port", &self.port)
            .field("allowed_origins", &self.allowed_origins)
            .field("rate_limit_rpm", &self.rate_limit_rpm)
            .field(
                "metrics_token",
                &self.metrics_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("invoice_memo", &self.invoice_memo)
            .field("dev_mode", &self.dev_mode)
            .finish()
    }
}

impl GateConfig {
    /// Defaults for everything except the endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            db_path: DEFAULT_DB_PATH.to_string(),
            port: DEFAULT_PORT,
            allowed_origins: default_origins(),
            rate_limit_rpm: DEFAULT_RATE_LIMIT_RPM,
            metrics_token: None,
            invoice_memo: DEFAULT_INVOICE_MEMO.to_string(),
            dev_mode: false,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let endpoint = var("GATE_ENDPOINT")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingRequired("GATE_ENDPOINT"))?;
        let endpoint = validate_endpoint(&endpoint)?;

        let dev_mode = var("GATE_DEV_MODE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let port = match var("PORT") {
            Some(s) => s
                .parse::<u16>()
                .map_err(|_| ConfigError::InvalidNumber("PORT", s.clone()))?,
            None => DEFAULT_PORT,
        };

        let rate_limit_rpm = match var("RATE_LIMIT_RPM") {
            Some(s) => s
                .parse::<u32>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::InvalidNumber("RATE_LIMIT_RPM", s))?,
            None => DEFAULT_RATE_LIMIT_RPM,
        };

        let db_path = var("DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string());

        let allowed_origins: Vec<String> = var("ALLOWED_ORIGINS")
            .map(|s| {
                s.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_else(default_origins);

        let metrics_token = var("METRICS_TOKEN").filter(|s| !s.is_empty());

        let invoice_memo = var("INVOICE_MEMO").unwrap_or_else(|| DEFAULT_INVOICE_MEMO.to_string());

        if allowed_origins.iter().any(|o| o == "*") && !dev_mode {
            tracing::error!(
                "Wildcard CORS origin '*' is not allowed in production. \
                 Specify explicit origins in ALLOWED_ORIGINS, or set GATE_DEV_MODE=true for dev."
            );
            return Err(ConfigError::WildcardOrigin);
        }

        if metrics_token.is_none() {
            tracing::warn!("METRICS_TOKEN not set, /metrics endpoint is publicly accessible");
        }

        Ok(Self {
            endpoint,
            db_path,
            port,
            allowed_origins,
            rate_limit_rpm,
            metrics_token,
            invoice_memo,
            dev_mode,
        })
    }
}

fn default_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
    ]
}

/// The endpoint is compared byte for byte against `endpoint` tags, so it is
/// kept as given apart from a trailing slash.
fn validate_endpoint(raw: &str) -> Result<String, ConfigError> {
    let parsed = Url::parse(raw).map_err(|_| ConfigError::InvalidUrl(raw.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host().is_none() {
        return Err(ConfigError::InvalidUrl(raw.to_string()));
    }
    Ok(raw.trim_end_matches('/').to_string())
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingRequired(&'static str),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("invalid number for {0}: {1}")]
    InvalidNumber(&'static str, String),

    #[error("wildcard CORS origin '*' is not allowed outside dev mode")]
    WildcardOrigin,
}
