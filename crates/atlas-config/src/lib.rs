//! Atlas NFI Configuration
//!
//! Provides configuration for the native interop bridge:
//! - Signature caching (`[signatures]`)
//! - Library loading behavior (`[loader]`)
//! - Configuration precedence and merging
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded and merged in the following order (later overrides earlier):
//! 1. Built-in defaults
//! 2. Global config (~/.atlas/nfi.toml)
//! 3. Project config (./nfi.toml, searched upwards)
//! 4. Environment variables (ATLAS_NFI_*)
//!
//! The bridge reads the merged result once, when its context is constructed.
//!
//! # Example
//!
//! ```no_run
//! use atlas_config::ConfigLoader;
//! use std::path::Path;
//!
//! let mut loader = ConfigLoader::new();
//! let config = loader.load_from_directory(Path::new(".")).unwrap();
//! assert!(config.nfi.cache_signatures());
//! ```

pub mod loader;
pub mod nfi;

use std::path::PathBuf;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Home directory not found")]
    HomeNotFound,
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

// Re-export main types
pub use loader::{Config, ConfigLoader};
pub use nfi::{LoaderConfig, NfiConfig, SignaturesConfig};
