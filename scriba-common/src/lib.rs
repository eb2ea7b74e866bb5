//! # Scriba Common Library
//!
//! Shared code for the Scriba transcription service:
//! - Database pool initialization and the `projects` table queries
//! - Configuration loading
//! - Common error types

pub mod config;
pub mod db;
pub mod error;

pub use config::AppConfig;
pub use error::{Error, Result};
