//! # hearth
//!
//! Chat service client. A [`Client`] ties together the gateway shards, the
//! rate-limited REST queue, the entity cache and event delivery.
//!
//! ```no_run
//! use hearth::{Client, EventKind};
//! use hearth_common::ClientConfig;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let client = Client::new(ClientConfig::from_env()?)?;
//! client.on(EventKind::MessageCreate, |event| {
//!     tracing::info!(?event, "Message");
//!     Ok(())
//! });
//! client.login().await?;
//! client.connect().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;

pub use client::Client;
pub use error::{ClientError, ClientResult};

pub use hearth_cache::EntityCache;
pub use hearth_core::{DomainEvent, EventKind, Snowflake};
pub use hearth_gateway::{EventDispatcher, EventListener, ShardManager};
pub use hearth_rest::RestClient;
