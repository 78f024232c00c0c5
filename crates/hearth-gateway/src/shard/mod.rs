//! Sharding: shard identity, IDENTIFY spacing, per-shard handles and the
//! manager that launches and supervises every session

mod handle;
mod id;
mod manager;
mod throttle;

pub use handle::ShardHandle;
pub use id::ShardId;
pub use manager::ShardManager;
pub use throttle::IdentifyThrottle;
