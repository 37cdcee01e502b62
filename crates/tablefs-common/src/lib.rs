//! TableFS Common - Shared types and utilities
//!
//! This crate provides the file and chunk record types, the open mode
//! parser, error definitions and configuration used across all TableFS
//! components.

pub mod config;
pub mod error;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use types::*;
