//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: Core config struct definitions (Config, HomeserverConfig)
//! - [`limits`]: Fan-out and pagination limits (LimitsConfig)
//! - [`validation`]: Startup validation of a loaded config
//! - [`defaults`]: Serde default value functions

mod defaults;
mod limits;
mod types;
mod validation;

pub use limits::LimitsConfig;
pub use types::{Config, ConfigError, HomeserverConfig};
pub use validation::{validate, ValidationError};
