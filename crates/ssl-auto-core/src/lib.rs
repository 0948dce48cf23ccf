//! Core utilities and types shared across all nginx-ssl-auto crates

pub mod config;
pub mod runner;
pub mod validation;

// Re-export commonly used types
pub use config::*;
pub use runner::*;
pub use validation::*;

// Re-export external dependencies
pub use async_trait;
pub use tracing;
