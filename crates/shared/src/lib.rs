//! Shared types, errors, and configuration for Tollgate.
//!
//! This crate provides common types used across all other crates:
//! - Typed IDs for accounts and billing sessions
//! - Application-wide error types
//! - Configuration management

pub mod config;
pub mod error;
pub mod types;

pub use config::AppConfig;
pub use error::AppError;
