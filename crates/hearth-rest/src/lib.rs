//! # hearth-rest
//!
//! REST control plane for the chat service.
//!
//! ## Layers
//!
//! - **Routing**: [`Route`] knows the method, the path and the rate-limit bucket of every call
//! - **Rate limiting**: [`RateLimitBucket`] per bucket plus a process-wide [`GlobalLimiter`]
//! - **Queue**: [`RestQueue`] serializes requests per bucket, retries 429s and merges
//!   successful responses into the [`hearth_cache::EntityCache`]
//! - **Actions**: [`RestClient`] wraps the queue in typed calls
//!
//! ## Example
//!
//! ```ignore
//! use hearth_rest::{RestClient, RestQueue, ReqwestTransport};
//!
//! let transport = ReqwestTransport::new(&config.rest)?;
//! let queue = RestQueue::with_cache(&config.rest, &config.token, Arc::new(transport), cache);
//! let client = RestClient::new(queue);
//!
//! let message = client.create_message(channel_id, &CreateMessage::text("hello")).await?;
//! ```

pub mod client;
pub mod error;
pub mod queue;
pub mod ratelimit;
pub mod routing;

pub use client::{
    CreateChannel, CreateMessage, CreateRole, EditMessage, GatewayBotInfo, ModifyChannel,
    ModifyCurrentUser, ModifyGuild, ModifyMember, RestClient, SessionStartLimit,
};
pub use error::{RestError, RestResult};
pub use queue::{
    HttpRequest, HttpTransport, ReqwestTransport, ResponseMerge, RestQueue, RestRequest,
    RestResponse,
};
pub use ratelimit::{GlobalLimiter, RateLimitBucket, RateLimitHeaders};
pub use routing::{BucketKey, Method, Route};
