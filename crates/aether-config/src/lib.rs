//! Configuration system for the Aether atmosphere renderer.
//!
//! Provides the physical atmosphere settings, lookup-table shapes and sample
//! counts, and debug switches. Settings persist to disk as RON files and
//! support hot-reload detection and forward/backward compatible
//! serialization.

mod config;
mod error;

pub use config::{
    AtmosphereSettings, CONFIG_FILE_NAME, Config, DebugConfig, LutSettings, default_config_dir,
};
pub use error::ConfigError;
