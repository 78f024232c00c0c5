//! # hearth-common
//!
//! Shared utilities including configuration, credentials, and telemetry.

pub mod auth;
pub mod config;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use auth::{Token, TokenError};
pub use config::{AppSettings, ClientConfig, ConfigError, Environment, GatewayConfig, RestConfig};
pub use telemetry::{
    init_tracing, init_tracing_with_config, try_init_tracing, try_init_tracing_with_config,
    TracingConfig, TracingError,
};
