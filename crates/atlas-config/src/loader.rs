//! Configuration Loader
//!
//! Handles loading and merging configuration from multiple sources with proper precedence.

use crate::nfi::{LoaderConfig, NfiConfig};
use crate::{ConfigError, ConfigResult};
use std::env;
use std::path::{Path, PathBuf};

/// Project-level configuration file name
pub const CONFIG_FILE_NAME: &str = "nfi.toml";

/// Environment variable toggling signature caching
pub const ENV_CACHE_SIGNATURES: &str = "ATLAS_NFI_CACHE_SIGNATURES";
/// Environment variable toggling per-library namespace isolation
pub const ENV_ISOLATE: &str = "ATLAS_NFI_ISOLATE";
/// Environment variable toggling lazy symbol binding
pub const ENV_LAZY_BINDING: &str = "ATLAS_NFI_LAZY_BINDING";
/// Environment variable with extra library search paths (platform path list)
pub const ENV_LIBRARY_PATH: &str = "ATLAS_NFI_LIBRARY_PATH";

/// Configuration loader
///
/// Loads configuration from multiple sources and merges them with proper precedence:
/// 1. Global config (~/.atlas/nfi.toml) - lowest priority
/// 2. Project config (./nfi.toml) - overrides global
/// 3. Environment variables (ATLAS_NFI_*) - overrides project
pub struct ConfigLoader {
    /// Cached global config path
    global_config_path: Option<PathBuf>,
}

/// Merged configuration result
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Effective bridge configuration
    pub nfi: NfiConfig,

    /// Directory where nfi.toml was found
    pub project_root: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self {
            global_config_path: None,
        }
    }

    /// Create a loader that reads the global config from a fixed path
    pub fn with_global_config_path(path: PathBuf) -> Self {
        Self {
            global_config_path: Some(path),
        }
    }

    /// Load configuration starting from the given directory
    ///
    /// Walks up the directory tree to find nfi.toml, merges it over the
    /// global config, then applies environment overrides.
    pub fn load_from_directory(&mut self, start_dir: &Path) -> ConfigResult<Config> {
        let (project_root, project_config) = self.find_project_config(start_dir)?;

        let mut nfi = self.load_global_config()?;
        nfi.merge(&project_config);
        let nfi = self.apply_env_overrides(nfi)?;

        Ok(Config { nfi, project_root })
    }

    /// Load configuration from a specific project config file
    pub fn load_from_file(&mut self, config_path: &Path) -> ConfigResult<Config> {
        let project_config = NfiConfig::load_from_file(config_path)?;

        let mut nfi = self.load_global_config()?;
        nfi.merge(&project_config);
        let nfi = self.apply_env_overrides(nfi)?;

        let project_root = config_path.parent().map(|p| p.to_path_buf());

        Ok(Config { nfi, project_root })
    }

    /// Find project configuration by walking up directory tree
    fn find_project_config(
        &self,
        start_dir: &Path,
    ) -> ConfigResult<(Option<PathBuf>, NfiConfig)> {
        let mut current = start_dir.to_path_buf();

        loop {
            let config_path = current.join(CONFIG_FILE_NAME);

            if config_path.exists() {
                let project_config = NfiConfig::load_from_file(&config_path)?;
                return Ok((Some(current), project_config));
            }

            match current.parent() {
                Some(parent) => current = parent.to_path_buf(),
                None => return Ok((None, NfiConfig::default())),
            }
        }
    }

    /// Load global configuration from ~/.atlas/nfi.toml
    fn load_global_config(&mut self) -> ConfigResult<NfiConfig> {
        let path = match &self.global_config_path {
            Some(path) => path.clone(),
            None => match Self::global_config_dir() {
                Ok(dir) => {
                    let path = dir.join(CONFIG_FILE_NAME);
                    self.global_config_path = Some(path.clone());
                    path
                }
                // No home directory means no global config
                Err(ConfigError::HomeNotFound) => return Ok(NfiConfig::default()),
                Err(e) => return Err(e),
            },
        };

        // Global config is optional
        if !path.exists() {
            return Ok(NfiConfig::default());
        }

        NfiConfig::load_from_file(&path)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&self, mut config: NfiConfig) -> ConfigResult<NfiConfig> {
        if let Ok(cache) = env::var(ENV_CACHE_SIGNATURES) {
            config
                .signatures
                .get_or_insert_with(Default::default)
                .cache = Some(parse_bool(&cache));
        }

        if let Ok(isolate) = env::var(ENV_ISOLATE) {
            config
                .loader
                .get_or_insert_with(LoaderConfig::default)
                .isolate = Some(parse_bool(&isolate));
        }

        if let Ok(lazy) = env::var(ENV_LAZY_BINDING) {
            config
                .loader
                .get_or_insert_with(LoaderConfig::default)
                .lazy_binding = Some(parse_bool(&lazy));
        }

        if let Some(paths) = env::var_os(ENV_LIBRARY_PATH) {
            let paths: Vec<PathBuf> = env::split_paths(&paths)
                .filter(|p| !p.as_os_str().is_empty())
                .collect();
            let env_config = NfiConfig {
                loader: Some(LoaderConfig {
                    search_paths: paths,
                    ..Default::default()
                }),
                ..Default::default()
            };
            config.merge(&env_config);
        }

        config.validate()?;
        Ok(config)
    }

    /// Get the global configuration directory (~/.atlas)
    pub fn global_config_dir() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::HomeNotFound)?;
        Ok(home.join(".atlas"))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Get the project root directory
    pub fn project_root(&self) -> Option<&Path> {
        self.project_root.as_deref()
    }

    /// Check if a project nfi.toml was found
    pub fn is_project(&self) -> bool {
        self.project_root.is_some()
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes")
}
