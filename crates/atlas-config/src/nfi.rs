//! Bridge Configuration (nfi.toml)
//!
//! Settings consumed by the native interop bridge. Every field is optional so
//! that partial files from different sources can be merged.

use crate::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Signature caching is on unless a source turns it off
pub const DEFAULT_CACHE_SIGNATURES: bool = true;

/// Libraries are opened with lazy symbol binding by default
pub const DEFAULT_LAZY_BINDING: bool = true;

/// Bridge configuration from nfi.toml
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct NfiConfig {
    /// Signature cache settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signatures: Option<SignaturesConfig>,

    /// Library loader settings
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loader: Option<LoaderConfig>,
}

/// Signature cache settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct SignaturesConfig {
    /// Share one compiled signature between structurally equal signatures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<bool>,
}

/// Library loader settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(deny_unknown_fields)]
pub struct LoaderConfig {
    /// Extra directories searched before the platform defaults
    #[serde(default)]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub search_paths: Vec<PathBuf>,

    /// Load every library into its own symbol namespace
    #[serde(skip_serializing_if = "Option::is_none")]
    pub isolate: Option<bool>,

    /// Resolve symbols on first use instead of at load time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lazy_binding: Option<bool>,
}

impl NfiConfig {
    /// Load bridge configuration from a file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        let config = Self::parse(&content).map_err(|e| ConfigError::TomlParseError {
            file: path.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from TOML text without validating it
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Validate the bridge configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(loader) = &self.loader {
            if loader
                .search_paths
                .iter()
                .any(|p| p.as_os_str().is_empty())
            {
                return Err(ConfigError::InvalidValue {
                    field: "loader.search_paths".to_string(),
                    reason: "search path entries must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Merge another configuration into this one (other takes precedence)
    ///
    /// Search paths from `other` are placed in front of the existing ones so
    /// the more specific source is searched first.
    pub fn merge(&mut self, other: &NfiConfig) {
        if let Some(other_sigs) = &other.signatures {
            let sigs = self.signatures.get_or_insert_with(Default::default);
            if other_sigs.cache.is_some() {
                sigs.cache = other_sigs.cache;
            }
        }

        if let Some(other_loader) = &other.loader {
            let loader = self.loader.get_or_insert_with(Default::default);
            if !other_loader.search_paths.is_empty() {
                let mut paths = other_loader.search_paths.clone();
                paths.extend(loader.search_paths.drain(..));
                loader.search_paths = paths;
            }
            if other_loader.isolate.is_some() {
                loader.isolate = other_loader.isolate;
            }
            if other_loader.lazy_binding.is_some() {
                loader.lazy_binding = other_loader.lazy_binding;
            }
        }
    }

    /// Whether equal signatures share one compiled representation
    pub fn cache_signatures(&self) -> bool {
        self.signatures
            .as_ref()
            .and_then(|s| s.cache)
            .unwrap_or(DEFAULT_CACHE_SIGNATURES)
    }

    /// Whether each library should get an isolated symbol namespace
    pub fn isolate_libraries(&self) -> bool {
        self.loader
            .as_ref()
            .and_then(|l| l.isolate)
            .unwrap_or(false)
    }

    /// Whether symbols are bound lazily
    pub fn lazy_binding(&self) -> bool {
        self.loader
            .as_ref()
            .and_then(|l| l.lazy_binding)
            .unwrap_or(DEFAULT_LAZY_BINDING)
    }

    /// Configured library search paths, highest priority first
    pub fn search_paths(&self) -> &[PathBuf] {
        self.loader
            .as_ref()
            .map(|l| l.search_paths.as_slice())
            .unwrap_or(&[])
    }
}
