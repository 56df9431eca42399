//! Configuration loading.
//!
//! Layers, lowest to highest priority: built-in defaults, a TOML file,
//! then `EQUIP_` environment variables (`__` separates nested keys, e.g.
//! `EQUIP_PLACEMENT__MAX_OFFSET=2.5`).

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use equip_doc::geometry::SHORT_CURVE_TOLERANCE;
use equip_doc::{BindingError, ParameterBindings};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::catalog::{CatalogError, ProfileCatalog, ProfileOverride};
use crate::executor::DEFAULT_TRANSACTION_NAME;
use crate::model::EquipmentType;

/// File looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "equip.toml";

const ENV_PREFIX: &str = "EQUIP_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to load config: {0}")]
    Load(#[from] figment::Error),

    #[error("placement.max_offset must be finite and non-negative, got {0}")]
    InvalidOffset(f64),

    #[error("transaction.name cannot be empty")]
    EmptyTransactionName,

    #[error("Invalid catalog override: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Catalog keys {first:?} and {second:?} both resolve to {ty:?}")]
    DuplicateCatalogKey {
        ty: EquipmentType,
        first: String,
        second: String,
    },

    #[error("{ty:?}: {field} {value} is below the short-curve tolerance")]
    DimensionTooSmall {
        ty: EquipmentType,
        field: &'static str,
        value: f64,
    },

    #[error("Failed to read bindings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid bindings file {path}: {source}")]
    Bindings {
        path: PathBuf,
        #[source]
        source: BindingError,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// Symmetric bound on the X and Y offset
    pub max_offset: f64,
    /// Fixed RNG seed; entropy-seeded when absent
    pub seed: Option<u64>,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            max_offset: 5.0,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionConfig {
    pub name: String,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_TRANSACTION_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    /// Parameter bindings file; the electrical bindings are used when absent
    pub bindings: Option<PathBuf>,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EquipConfig {
    pub placement: PlacementConfig,
    pub transaction: TransactionConfig,
    pub document: DocumentConfig,
    /// Profile overrides keyed by type tag; unknown tags patch the fallback
    pub catalog: BTreeMap<String, ProfileOverride>,
}

impl EquipConfig {
    /// Load from `path` (or `equip.toml` if present) plus the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) if !path.exists() => return Err(ConfigError::NotFound(path.to_path_buf())),
            Some(path) => path.to_path_buf(),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };
        debug!("Loading config from {}", file.display());

        let env = Env::prefixed(ENV_PREFIX).split("__");
        let figment = Self::figment(&file).merge(env);
        let config = Self::from_figment(figment)?;
        info!(
            "Config loaded: max_offset={}, {} catalog override(s)",
            config.placement.max_offset,
            config.catalog.len()
        );
        Ok(config)
    }

    /// Parse a TOML string over the defaults, ignoring the environment.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let figment = Figment::from(Serialized::defaults(EquipConfig::default()))
            .merge(Toml::string(content));
        Self::from_figment(figment)
    }

    fn figment(file: &Path) -> Figment {
        Figment::from(Serialized::defaults(EquipConfig::default())).merge(Toml::file(file))
    }

    fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: EquipConfig = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let offset = self.placement.max_offset;
        // Offsets are drawn from -offset..=offset, so the span must be finite too
        if !offset.is_finite() || offset < 0.0 || !(2.0 * offset).is_finite() {
            return Err(ConfigError::InvalidOffset(offset));
        }
        if self.transaction.name.trim().is_empty() {
            return Err(ConfigError::EmptyTransactionName);
        }
        check_dimensions(&self.catalog()?)
    }

    /// Catalog overrides resolved to equipment types.
    ///
    /// Keys parse like CLI type names; unknown keys map to `Unclassified`.
    /// Two keys resolving to the same type are rejected.
    pub fn catalog_overrides(
        &self,
    ) -> Result<HashMap<EquipmentType, ProfileOverride>, ConfigError> {
        let mut resolved = HashMap::new();
        let mut keys: HashMap<EquipmentType, &str> = HashMap::new();

        for (key, patch) in &self.catalog {
            let ty = key.parse().unwrap_or_else(|_| {
                warn!("Unknown catalog key {:?}, using fallback profile", key);
                EquipmentType::Unclassified
            });
            if let Some(first) = keys.insert(ty, key) {
                return Err(ConfigError::DuplicateCatalogKey {
                    ty,
                    first: first.to_string(),
                    second: key.clone(),
                });
            }
            resolved.insert(ty, patch.clone());
        }

        Ok(resolved)
    }

    /// The profile catalog with this config's overrides applied.
    pub fn catalog(&self) -> Result<ProfileCatalog, ConfigError> {
        Ok(ProfileCatalog::with_overrides(&self.catalog_overrides()?)?)
    }

    /// Parameter bindings for a fresh document.
    pub fn bindings(&self) -> Result<ParameterBindings, ConfigError> {
        let Some(path) = &self.document.bindings else {
            return Ok(ParameterBindings::electrical());
        };
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        ParameterBindings::from_toml(&content).map_err(|source| ConfigError::Bindings {
            path: path.clone(),
            source,
        })
    }
}

/// Box edges shorter than the curve tolerance cannot be built.
fn check_dimensions(catalog: &ProfileCatalog) -> Result<(), ConfigError> {
    let types = EquipmentType::ALL
        .into_iter()
        .chain([EquipmentType::Unclassified]);

    for ty in types {
        let geometry = catalog.geometry_for(ty);
        let dimensions = [
            ("width", geometry.width),
            ("height", geometry.height),
            ("depth", geometry.depth),
        ];
        for (field, value) in dimensions {
            if value < SHORT_CURVE_TOLERANCE {
                return Err(ConfigError::DimensionTooSmall { ty, field, value });
            }
        }
    }
    Ok(())
}
