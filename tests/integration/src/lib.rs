//! Integration test utilities for the hearth client
//!
//! This crate provides a scripted gateway server and a scripted HTTP
//! transport so the client can be driven end to end without the real service.

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;
