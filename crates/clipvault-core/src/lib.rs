//! clipvault-core: shared types, IDs, errors, configuration and path rules.
//!
//! This crate is the foundational dependency for all other clipvault crates,
//! providing type-safe identifiers, a unified error type, application
//! configuration, and the mapping between stored media paths and the
//! filesystem.

pub mod config;
pub mod error;
pub mod ids;
pub mod paths;

// Re-export the most commonly used items at the crate root.
pub use config::{Config, ServerConfig, StorageConfig, ToolsConfig};
pub use error::{Error, Result};
pub use ids::*;
