//! Shared configuration and errors for Autodocs.
//!
//! This crate provides common types used across all other crates:
//! - Application configuration loaded from files and environment
//! - Application-wide error types

pub mod config;
pub mod error;

pub use config::{
    AppConfig, DatabaseConfig, ProviderKind, RetentionSettings, ScheduleSettings, StorageSettings,
};
pub use error::{AppError, AppResult};
