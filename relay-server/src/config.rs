use anyhow::{Context, Result};
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tracing::{info, warn};

const DEFAULT_API_BASE: &str = "https://openrouter.ai/api/v1";
const DEFAULT_MODEL: &str = "mistral-7b-instruct";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_REFERER: &str = "https://github.com/Kausan18/role-wise-finance-buddy";
const DEFAULT_TITLE: &str = "Finance Buddy AI Service";
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 120;

/// Process configuration, read once at startup and never mutated.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub host: IpAddr,
    pub port: u16,
    /// Sent upstream as `HTTP-Referer`.
    pub referer: String,
    /// Sent upstream as `X-Title`.
    pub title: String,
    /// `None` leaves the upstream call unbounded.
    pub upstream_timeout: Option<Duration>,
}

impl RelayConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        let config = Self::from_lookup(|key| std::env::var(key).ok())?;

        if config.api_key.is_empty() {
            warn!("OPENROUTER_API_KEY not set; upstream calls will be rejected");
        } else {
            info!("OpenRouter API key loaded");
        }
        info!("Using model: {}", config.model);

        Ok(config)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let host = var("RELAY_HOST", DEFAULT_HOST)
            .parse::<IpAddr>()
            .context("RELAY_HOST must be an IP address")?;

        let port = match lookup("RELAY_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .with_context(|| format!("RELAY_PORT must be a port number, got {raw:?}"))?,
            None => DEFAULT_PORT,
        };

        let timeout_secs = match lookup("RELAY_UPSTREAM_TIMEOUT_SECS") {
            Some(raw) => raw.parse::<u64>().with_context(|| {
                format!("RELAY_UPSTREAM_TIMEOUT_SECS must be whole seconds, got {raw:?}")
            })?,
            None => DEFAULT_UPSTREAM_TIMEOUT_SECS,
        };

        Ok(Self {
            api_base: var("OPENROUTER_BASE_URL", DEFAULT_API_BASE),
            api_key: var("OPENROUTER_API_KEY", ""),
            model: var("OPENROUTER_MODEL", DEFAULT_MODEL),
            host,
            port,
            referer: var("RELAY_REFERER", DEFAULT_REFERER),
            title: var("RELAY_TITLE", DEFAULT_TITLE),
            upstream_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
        })
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}
