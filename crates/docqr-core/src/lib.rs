//! DOCQR Core Library
//!
//! This crate provides core domain models, error types and configuration
//! that are shared across all DOCQR components.

pub mod config;
pub mod error;
pub mod models;
pub mod storage_types;

// Re-export commonly used types
pub use config::{BaseConfig, Config, DocqrConfig, QrErrorCorrection};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use storage_types::StorageBackend;
