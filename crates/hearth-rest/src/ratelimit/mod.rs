//! Rate-limit state
//!
//! Two layers gate every request: the process-wide [`GlobalLimiter`] and the
//! [`RateLimitBucket`] of the request's route. The global layer is checked first.

mod bucket;
mod global;
pub(crate) mod headers;

pub use bucket::RateLimitBucket;
pub use global::GlobalLimiter;
pub use headers::{RateLimitHeaders, MAX_RATE_LIMIT_WAIT};
