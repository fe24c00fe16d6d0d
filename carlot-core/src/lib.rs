//! Carlot Core - shared infrastructure for the carlot workspace
//!
//! Error types with context, logging bootstrap and layered configuration.

pub mod config;
pub mod error;
pub mod logging;

pub use config::*;
pub use error::*;
pub use logging::*;

// Re-export commonly used external types
pub use tracing;
