//! # Tasknest Core
//!
//! Core types, configuration, and storage for Tasknest.
//!
//! This crate provides:
//! - Configuration loading and validation (JSON5 format)
//! - Subject, label and task types with filter and notification queries
//! - A sled-backed task store with per-user key scoping
//! - Input validation and sanitization

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod store;
pub mod types;
pub mod validation;

pub use config::{AuthConfig, Config, ConfigError, HasherConfig};
pub use store::{StoreError, TaskStore, open_db};
pub use types::{Label, RecordId, Subject, Task, TaskFilter, TaskStatus};
pub use validation::ValidationError;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::store::TaskStore;
    pub use crate::types::*;
    pub use crate::validation::sanitize_text;
}
