//! Infrastructure layer module
//!
//! - Configuration management (figment)
//! - Logging infrastructure (tracing)
//! - Project setup

pub mod config;
pub mod logging;
pub mod setup;
