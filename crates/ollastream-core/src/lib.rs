//! Ollastream Core - Caller-facing types, provider configuration, and errors

pub mod config;
pub mod error;
pub mod types;

pub use config::ProviderConfig;
pub use error::{Error, Result};
pub use types::*;
