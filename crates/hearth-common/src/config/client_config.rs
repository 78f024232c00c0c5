//! Client configuration
//!
//! Loads configuration from environment variables (and a `.env` file when present).

use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::auth::{Token, TokenError};

/// Main client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub app: AppSettings,
    pub token: Token,
    pub gateway: GatewayConfig,
    pub rest: RestConfig,
}

/// General application settings
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub name: String,
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "production" => Some(Self::Production),
            "staging" => Some(Self::Staging),
            "development" => Some(Self::Development),
            _ => None,
        }
    }
}

/// Gateway session and sharding settings
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Skip `GET /gateway/bot` and connect here
    pub url: Option<String>,
    /// Fixed shard count; `None` uses the recommendation from `GET /gateway/bot`
    pub shard_count: Option<u32>,
    /// Raw intents bitfield sent in IDENTIFY
    pub intents: u64,
    /// Member count above which a guild's member list is sent lazily
    pub large_threshold: u32,
    /// Bound on opening the socket (TCP, TLS and the websocket upgrade)
    pub connect_timeout: Duration,
    /// Bound on the wait for HELLO after the socket opens
    pub hello_timeout: Duration,
    /// Consecutive failed handshakes before a shard is marked failed
    pub max_handshake_failures: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    /// Minimum spacing between IDENTIFY sends across all shards
    pub identify_spacing: Duration,
    /// Bound on the initial guild burst after READY
    pub guild_ready_timeout: Duration,
    /// Delay before a failed shard is relaunched
    pub shard_restart_delay: Duration,
}

/// REST client settings
#[derive(Debug, Clone)]
pub struct RestConfig {
    pub api_base: String,
    /// Aggregate requests per second across every bucket
    pub global_per_second: u32,
    pub request_timeout: Duration,
    pub user_agent: String,
}

// Default value functions
fn default_app_name() -> String {
    "hearth".to_string()
}

fn default_intents() -> u64 {
    // GUILDS | GUILD_MEMBERS | GUILD_VOICE_STATES | GUILD_PRESENCES
    // | GUILD_MESSAGES | GUILD_MESSAGE_TYPING | DIRECT_MESSAGES
    7043
}

fn default_large_threshold() -> u32 {
    250
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_hello_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_max_handshake_failures() -> u32 {
    5
}

fn default_backoff_base() -> Duration {
    Duration::from_secs(1)
}

fn default_backoff_max() -> Duration {
    Duration::from_secs(60)
}

fn default_identify_spacing() -> Duration {
    Duration::from_millis(5500)
}

fn default_guild_ready_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_shard_restart_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_api_base() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_global_per_second() -> u32 {
    50
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    format!("DiscordBot (hearth, {})", env!("CARGO_PKG_VERSION"))
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: None,
            shard_count: None,
            intents: default_intents(),
            large_threshold: default_large_threshold(),
            connect_timeout: default_connect_timeout(),
            hello_timeout: default_hello_timeout(),
            max_handshake_failures: default_max_handshake_failures(),
            backoff_base: default_backoff_base(),
            backoff_max: default_backoff_max(),
            identify_spacing: default_identify_spacing(),
            guild_ready_timeout: default_guild_ready_timeout(),
            shard_restart_delay: default_shard_restart_delay(),
        }
    }
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            global_per_second: default_global_per_second(),
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

impl ClientConfig {
    /// Configuration with every setting at its default
    pub fn new(token: Token) -> Self {
        Self {
            app: AppSettings {
                name: default_app_name(),
                env: Environment::default(),
            },
            token,
            gateway: GatewayConfig::default(),
            rest: RestConfig::default(),
        }
    }

    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if `HEARTH_TOKEN` is missing or malformed, or a set
    /// variable cannot be parsed.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let raw_token =
            env::var("HEARTH_TOKEN").map_err(|_| ConfigError::MissingVar("HEARTH_TOKEN"))?;
        let token = Token::parse(&raw_token)?;

        Ok(Self {
            app: AppSettings {
                name: env::var("HEARTH_APP_NAME").unwrap_or_else(|_| default_app_name()),
                env: env::var("HEARTH_APP_ENV")
                    .ok()
                    .and_then(|s| Environment::parse(&s))
                    .unwrap_or_default(),
            },
            token,
            gateway: GatewayConfig {
                url: env::var("HEARTH_GATEWAY_URL").ok(),
                shard_count: parse_var("HEARTH_SHARD_COUNT")?,
                intents: parse_var("HEARTH_INTENTS")?.unwrap_or_else(default_intents),
                large_threshold: parse_var("HEARTH_LARGE_THRESHOLD")?
                    .unwrap_or_else(default_large_threshold),
                connect_timeout: millis_var("HEARTH_CONNECT_TIMEOUT_MS")?
                    .unwrap_or_else(default_connect_timeout),
                hello_timeout: millis_var("HEARTH_HELLO_TIMEOUT_MS")?
                    .unwrap_or_else(default_hello_timeout),
                max_handshake_failures: parse_var("HEARTH_MAX_HANDSHAKE_FAILURES")?
                    .unwrap_or_else(default_max_handshake_failures),
                backoff_base: millis_var("HEARTH_BACKOFF_BASE_MS")?
                    .unwrap_or_else(default_backoff_base),
                backoff_max: millis_var("HEARTH_BACKOFF_MAX_MS")?
                    .unwrap_or_else(default_backoff_max),
                identify_spacing: millis_var("HEARTH_IDENTIFY_SPACING_MS")?
                    .unwrap_or_else(default_identify_spacing),
                guild_ready_timeout: millis_var("HEARTH_GUILD_READY_TIMEOUT_MS")?
                    .unwrap_or_else(default_guild_ready_timeout),
                shard_restart_delay: millis_var("HEARTH_SHARD_RESTART_DELAY_MS")?
                    .unwrap_or_else(default_shard_restart_delay),
            },
            rest: RestConfig {
                api_base: env::var("HEARTH_API_BASE").unwrap_or_else(|_| default_api_base()),
                global_per_second: parse_var("HEARTH_REST_GLOBAL_PER_SECOND")?
                    .unwrap_or_else(default_global_per_second),
                request_timeout: millis_var("HEARTH_REST_TIMEOUT_MS")?
                    .unwrap_or_else(default_request_timeout),
                user_agent: default_user_agent(),
            },
        })
    }
}

/// Parse an optional variable; set-but-invalid is an error
fn parse_var<T: FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(name, value)),
        Err(_) => Ok(None),
    }
}

fn millis_var(name: &'static str) -> Result<Option<Duration>, ConfigError> {
    Ok(parse_var::<u64>(name)?.map(Duration::from_millis))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),

    #[error("Invalid token: {0}")]
    InvalidToken(#[from] TokenError),
}
