//! Shared building blocks: error type, configuration loading, dropout,
//! activations and resource management.

pub(crate) mod activations;
pub mod config;
pub(crate) mod dropout;
pub mod error;
pub mod resources;

pub use activations::Activation;
pub use config::Config;
pub use error::RustMmtError;
