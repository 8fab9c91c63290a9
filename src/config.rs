//! Client configuration: defaults, TOML files and environment overrides.

#[path = "config/error.rs"]
mod error;

#[path = "config/types.rs"]
mod types;

#[path = "config/load.rs"]
mod load;

pub use error::ConfigError;
pub use load::default_config_path;
pub use types::{ClientConfig, ContinuationConfig, RetryConfig};
