//! # hearth-cache
//!
//! Authoritative in-memory mirror of remote entities, built from an unordered
//! stream of partial updates (gateway dispatches and REST responses).
//!
//! The cache emits no events; callers receive the previous and merged values
//! from each write and decide what to announce.

pub mod chunk;
pub mod session;
pub mod store;

pub use chunk::{ChunkProgress, ChunkSummary, MemberChunk};
pub use session::{ResumeInfo, SessionStore};
pub use store::{CacheKey, CacheStats, Entity, EntityCache, GuildCreateOutcome, GuildState, Patch};
