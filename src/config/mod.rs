//! Configuration loading and management

mod settings;

pub use settings::*;

pub use ::config::ConfigError;
