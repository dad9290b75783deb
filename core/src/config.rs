//! Configuration loading for poison damage profiles.
//!
//! Profiles are loaded from TOML files in two locations:
//! - **Builtin**: shipped with the application (read-only)
//! - **Custom**: user-created profiles (editable)
//!
//! Custom profiles with the same ID override builtins. A file that fails
//! to parse is logged and skipped; a bad profile must never take the
//! whole registry down, because the save-restore path depends on a
//! canonical config always resolving.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use runeward_types::PoisonConfig;

/// ID used when a lookup misses or no profiles are loaded.
pub const DEFAULT_PROFILE_ID: &str = "poison_standard";

/// All loaded poison profiles, keyed by ID.
#[derive(Debug, Clone)]
pub struct PoisonConfigRegistry {
    configs: HashMap<String, PoisonConfig>,
    default_id: String,

    /// Compiled-in profile; the floor when even the default ID is gone.
    fallback: PoisonConfig,
}

impl Default for PoisonConfigRegistry {
    fn default() -> Self {
        let mut configs = HashMap::new();
        let builtin = PoisonConfig::default();
        configs.insert(builtin.id.clone(), builtin.clone());
        Self {
            configs,
            default_id: DEFAULT_PROFILE_ID.to_string(),
            fallback: builtin,
        }
    }
}

impl PoisonConfigRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add profiles from a parsed file, returning IDs of any duplicates.
    pub fn add_config(&mut self, file: PoisonConfigFile) -> Vec<String> {
        let mut duplicates = Vec::new();
        for config in file.configs {
            let config = config.normalized();
            if self.configs.contains_key(&config.id) {
                duplicates.push(config.id.clone());
            }
            self.configs.insert(config.id.clone(), config);
        }
        duplicates
    }

    pub fn get(&self, id: &str) -> Option<&PoisonConfig> {
        self.configs.get(id)
    }

    /// The profile the restore path falls back to.
    pub fn default_config(&self) -> &PoisonConfig {
        self.configs.get(&self.default_id).unwrap_or(&self.fallback)
    }

    /// Resolve an ID to a known profile, normalizing unknown IDs to the
    /// default with a log instead of an error.
    pub fn canonical(&self, id: &str) -> &PoisonConfig {
        match self.configs.get(id) {
            Some(config) => config,
            None => {
                tracing::warn!(id, default = %self.default_id, "unknown poison profile; using default");
                self.default_config()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.configs.keys().map(String::as_str)
    }
}

/// On-disk shape: one or more `[[poison]]` tables per file.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct PoisonConfigFile {
    #[serde(default, rename = "poison")]
    pub configs: Vec<PoisonConfig>,
}

/// Load profiles from builtin and custom config directories.
///
/// Builtin profiles are loaded first, then custom profiles, so custom
/// profiles with the same ID override builtins. The compiled-in default
/// profile is always present as a floor.
pub fn load_profiles(
    builtin_dir: Option<&Path>,
    custom_dir: Option<&Path>,
) -> Result<PoisonConfigRegistry, ConfigError> {
    let mut registry = PoisonConfigRegistry::new();

    if let Some(dir) = builtin_dir {
        if dir.exists() {
            load_directory(&mut registry, dir, "builtin")?;
        }
    }

    if let Some(dir) = custom_dir {
        if dir.exists() {
            load_directory(&mut registry, dir, "custom")?;
        }
    }

    Ok(registry)
}

/// Load all TOML files from a directory.
fn load_directory(
    registry: &mut PoisonConfigRegistry,
    dir: &Path,
    source: &str,
) -> Result<(), ConfigError> {
    let entries = fs::read_dir(dir).map_err(|e| ConfigError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;

    for entry in entries.flatten() {
        let path = entry.path();

        if path.extension().is_some_and(|ext| ext == "toml") {
            match load_file(&path) {
                Ok(file) => {
                    let duplicates = registry.add_config(file);
                    if !duplicates.is_empty() {
                        tracing::warn!(
                            source,
                            file = ?path.file_name(),
                            ?duplicates,
                            "duplicate poison profile IDs"
                        );
                    }
                }
                Err(e) => {
                    // Skip the bad file, keep loading the rest.
                    tracing::error!(source, file = ?path.file_name(), error = %e, "failed to load profile file");
                }
            }
        }
    }

    Ok(())
}

/// Load a single TOML profile file.
pub fn load_file(path: &Path) -> Result<PoisonConfigFile, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: Box::new(e),
    })
}

/// Default custom profiles directory under the platform config dir.
pub fn default_custom_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("runeward").join("poisons"))
}

/// Errors that can occur during profile loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse error in {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: Box<toml::de::Error>,
    },
}
