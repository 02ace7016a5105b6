//! Configuration: `entitle.toml` schema, parsing and default locations.

pub mod parser;
pub mod paths;
pub mod schema;

pub use parser::{parse_config, parse_config_str};
pub use schema::{ApiConfig, EntitleConfig, LockConfig};
