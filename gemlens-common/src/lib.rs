//! # GemLens Common Library
//!
//! Shared code for GemLens crates including:
//! - Error types
//! - TOML bootstrap configuration and config file resolution
//! - Analysis event types and the broadcast event bus

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
