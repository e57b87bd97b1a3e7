//! Environment-driven configuration

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::payment::PaymentConfig;
use crate::warmup::{WarmUpPolicy, KEEP_ALIVE_INTERVAL};

pub const DEV_API_URL: &str = "http://localhost:5000/api";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set in production")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Environment { #[default] Development, Production }

#[derive(Clone, Debug)]
pub struct StorefrontConfig {
    pub environment: Environment,
    pub api_base_url: String,
    pub api_token: Option<String>,
    pub storage_dir: PathBuf,
    pub keep_alive_interval: Duration,
    pub warm_up: WarmUpPolicy,
    pub payment: PaymentConfig,
}

impl StorefrontConfig {
    pub fn from_env() -> Result<Self, ConfigError> { Self::from_lookup(|name| std::env::var(name).ok()) }

    /// Build from any variable source; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let environment = match lookup("VIBE_BITES_ENV").as_deref() {
            None | Some("development") | Some("dev") => Environment::Development,
            Some("production") | Some("prod") => Environment::Production,
            Some(other) => return Err(ConfigError::Invalid { name: "VIBE_BITES_ENV", value: other.to_string() }),
        };
        let api_base_url = match (lookup("VIBE_BITES_API_URL"), environment) {
            (Some(url), _) => url.trim_end_matches('/').to_string(),
            (None, Environment::Development) => DEV_API_URL.to_string(),
            (None, Environment::Production) => return Err(ConfigError::Missing("VIBE_BITES_API_URL")),
        };
        let keep_alive_interval = match lookup("VIBE_BITES_KEEP_ALIVE_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => return Err(ConfigError::Invalid { name: "VIBE_BITES_KEEP_ALIVE_SECS", value: raw }),
            },
            None => KEEP_ALIVE_INTERVAL,
        };
        let mut payment = PaymentConfig::default();
        if let Some(color) = lookup("VIBE_BITES_THEME_COLOR") { payment.theme_color = color; }

        Ok(Self {
            environment,
            api_base_url,
            api_token: lookup("VIBE_BITES_API_TOKEN").filter(|t| !t.is_empty()),
            storage_dir: lookup("VIBE_BITES_STORAGE_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from(".vibe-bites")),
            keep_alive_interval,
            warm_up: WarmUpPolicy::default(),
            payment,
        })
    }
}
