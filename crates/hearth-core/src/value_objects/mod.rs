//! Value objects - immutable types that represent domain concepts

mod field;
mod permissions;
mod snowflake;

pub use field::Field;
pub use permissions::Permissions;
pub use snowflake::{Snowflake, SnowflakeParseError};
