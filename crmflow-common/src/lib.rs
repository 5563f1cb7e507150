//! # crmflow Common Library
//!
//! Shared code for crmflow workflow actions including:
//! - Error types
//! - TOML configuration loading and secret resolution
//! - Logging initialization
//! - Workflow event / action response envelopes

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
