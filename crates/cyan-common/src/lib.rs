//! # cyan-common
//!
//! Shared utilities for the Cyan bot gateway: configuration and telemetry.

pub mod config;
pub mod telemetry;

// Re-export commonly used types at crate root
pub use config::{AppConfig, AppSettings, BotConfig, ConfigError, Environment, GatewaySettings};
pub use telemetry::{
    init_tracing, init_tracing_with_config, try_init_tracing, try_init_tracing_with_config,
    TracingConfig, TracingError,
};
