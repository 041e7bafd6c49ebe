//! Configuration loading for patchbot.
//!
//! Uses figment to layer built-in defaults, a YAML file, and `PATCHBOT_`
//! environment variables.

pub mod schema;

pub use schema::{Config, LogConfig, LogFormat, PlatformConfig, RefreshConfig};
