//! Endpoint routing and rate-limit bucket keys

mod route;

pub use route::{BucketKey, Method, Route};
