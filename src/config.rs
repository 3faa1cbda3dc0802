// Runtime configuration
//
// Values come from the process environment, optionally seeded from a
// `.env` file by `main`.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_MAX_TOKENS: u32 = 2048;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value:?} ({reason})")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Settings for the generation service client
#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub image_model: Option<String>,
    pub max_tokens: u32,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub llm: LlmConfig,
    /// Upper bound on how long one batch may run before stragglers fail
    pub batch_deadline: Option<Duration>,
    pub bind_addr: SocketAddr,
}

impl AppConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = get("GROQ_API_KEY")
            .or_else(|| get("LLM_API_KEY"))
            .ok_or(ConfigError::Missing("GROQ_API_KEY"))?;

        let max_tokens = match get("LLM_MAX_TOKENS") {
            Some(raw) => parse_positive::<u32>("LLM_MAX_TOKENS", &raw)?,
            None => DEFAULT_MAX_TOKENS,
        };

        let timeout_secs = match get("LLM_TIMEOUT_SECS") {
            Some(raw) => parse_positive::<u64>("LLM_TIMEOUT_SECS", &raw)?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        let batch_deadline = get("BATCH_DEADLINE_SECS")
            .map(|raw| parse_positive::<u64>("BATCH_DEADLINE_SECS", &raw).map(Duration::from_secs))
            .transpose()?;

        let bind_raw = get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
            key: "BIND_ADDR",
            value: bind_raw.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            llm: LlmConfig {
                api_key,
                base_url: get("LLM_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
                model: get("LLM_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                image_model: get("LLM_IMAGE_MODEL"),
                max_tokens,
                timeout: Duration::from_secs(timeout_secs),
            },
            batch_deadline,
            bind_addr,
        })
    }
}

fn parse_positive<T>(key: &'static str, raw: &str) -> ConfigResult<T>
where
    T: std::str::FromStr + PartialOrd + Default,
{
    let invalid = |reason: &str| ConfigError::Invalid {
        key,
        value: raw.to_string(),
        reason: reason.to_string(),
    };

    let value: T = raw.trim().parse().map_err(|_| invalid("not an unsigned integer"))?;
    if value <= T::default() {
        return Err(invalid("must be greater than zero"));
    }
    Ok(value)
}
