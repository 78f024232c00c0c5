//! Gateway session bookkeeping
//!
//! Resume information outlives a single websocket connection: a session that
//! drops with a resumable close code picks up where it left off.

mod resume_store;

pub use resume_store::{ResumeInfo, SessionStore};
