//! # Explorer Configuration
//!
//! TOML file with every field defaulted; an empty file is a valid config.
//!
//! ```toml
//! catalog_path = "data/catalog.toml"
//!
//! [generation]
//! max_size = 128
//! timeout_ms = 30000
//! worker_threads = 0      # 0 = rayon default
//!
//! [mining]
//! overlay_dir = "overlays" # omit for an in-memory store
//! cover_selection = "seeded"
//! # cover_variant = "clay" # pins one variant, overriding cover_selection
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use lithos_mining::CoverSelection;
use lithos_procedural::{Catalog, MAX_CHUNK_SIZE, MIN_CHUNK_SIZE};
use serde::Deserialize;

use crate::error::{ExplorerError, ExplorerResult};

/// Top-level explorer configuration.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExplorerConfig {
    /// Mineral catalog to load.
    pub catalog_path: PathBuf,
    /// Chunk generation limits.
    pub generation: GenerationConfig,
    /// Overlay storage and cover selection.
    pub mining: MiningConfig,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            catalog_path: PathBuf::from("data/catalog.toml"),
            generation: GenerationConfig::default(),
            mining: MiningConfig::default(),
        }
    }
}

/// Generation limits.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GenerationConfig {
    /// Largest chunk edge a request may ask for.
    pub max_size: u32,
    /// Wall-clock budget per chunk, in milliseconds.
    pub timeout_ms: u64,
    /// Worker threads for generation; 0 uses the global rayon pool.
    pub worker_threads: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_size: MAX_CHUNK_SIZE,
            timeout_ms: 30_000,
            worker_threads: 0,
        }
    }
}

/// How fresh overlays pick their cover.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverMode {
    /// Derived from the generation seed.
    #[default]
    Seeded,
    /// Random per overlay.
    Random,
}

/// Overlay storage.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MiningConfig {
    /// Directory for persisted overlays; in-memory when `None`.
    pub overlay_dir: Option<PathBuf>,
    /// Cover selection mode.
    pub cover_selection: CoverMode,
    /// Fixed cover variant; overrides `cover_selection` when set.
    pub cover_variant: Option<String>,
}

impl ExplorerConfig {
    /// Loads and validates a config file.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read, parsed or validated.
    pub fn load(path: &Path) -> ExplorerResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ExplorerError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!("Loaded explorer config from {}", path.display());
        Ok(config)
    }

    /// Parses and validates config text.
    ///
    /// # Errors
    ///
    /// Fails on malformed TOML, unknown keys or out-of-range values.
    pub fn from_toml_str(text: &str) -> ExplorerResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ExplorerError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> ExplorerResult<()> {
        let max = self.generation.max_size;
        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&max) {
            return Err(ExplorerError::InvalidConfig(format!(
                "generation.max_size {max} is outside [{MIN_CHUNK_SIZE}, {MAX_CHUNK_SIZE}]"
            )));
        }
        if self.generation.timeout_ms == 0 {
            return Err(ExplorerError::InvalidConfig(
                "generation.timeout_ms must be positive".to_owned(),
            ));
        }
        Ok(())
    }

    /// Per-chunk time budget.
    #[must_use]
    pub const fn time_budget(&self) -> Duration {
        Duration::from_millis(self.generation.timeout_ms)
    }

    /// Resolves the cover policy against a loaded catalog.
    ///
    /// # Errors
    ///
    /// Fails if `mining.cover_variant` names a variant the catalog lacks.
    pub fn cover_selection(&self, catalog: &Catalog) -> ExplorerResult<CoverSelection> {
        if let Some(name) = &self.mining.cover_variant {
            return catalog
                .cover_variant(name)
                .map(CoverSelection::Explicit)
                .ok_or_else(|| {
                    ExplorerError::InvalidConfig(format!("unknown cover variant `{name}`"))
                });
        }
        Ok(match self.mining.cover_selection {
            CoverMode::Seeded => CoverSelection::Seeded,
            CoverMode::Random => CoverSelection::Random,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_is_default() {
        let config = ExplorerConfig::from_toml_str("").unwrap();
        assert_eq!(config, ExplorerConfig::default());
        assert_eq!(config.generation.max_size, 128);
        assert_eq!(config.time_budget(), Duration::from_secs(30));
        assert_eq!(config.mining.overlay_dir, None);
        assert_eq!(config.mining.cover_selection, CoverMode::Seeded);
    }

    #[test]
    fn test_full_config() {
        let config = ExplorerConfig::from_toml_str(
            r#"
catalog_path = "elsewhere/catalog.toml"

[generation]
max_size = 64
timeout_ms = 500
worker_threads = 2

[mining]
overlay_dir = "/tmp/overlays"
cover_selection = "random"
"#,
        )
        .unwrap();
        assert_eq!(config.catalog_path, PathBuf::from("elsewhere/catalog.toml"));
        assert_eq!(config.generation.max_size, 64);
        assert_eq!(config.generation.worker_threads, 2);
        assert_eq!(config.time_budget(), Duration::from_millis(500));
        assert_eq!(config.mining.overlay_dir, Some(PathBuf::from("/tmp/overlays")));
        assert_eq!(config.mining.cover_selection, CoverMode::Random);
    }

    #[test]
    fn test_out_of_range_rejected() {
        for text in [
            "[generation]\nmax_size = 0",
            "[generation]\nmax_size = 129",
            "[generation]\ntimeout_ms = 0",
        ] {
            assert!(matches!(
                ExplorerConfig::from_toml_str(text),
                Err(ExplorerError::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn test_unknown_keys_rejected() {
        assert!(matches!(
            ExplorerConfig::from_toml_str("[generation]\nmax_sise = 12"),
            Err(ExplorerError::ConfigParse(_))
        ));
        assert!(matches!(
            ExplorerConfig::from_toml_str("[mining]\ncover_selection = \"sometimes\""),
            Err(ExplorerError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_cover_selection_resolution() {
        let catalog = Catalog::from_toml_str(
            "cover_variants = [\"topsoil\", \"clay\"]\n[[layers]]\nkey = \"all\"\nstart = 0\n",
        )
        .unwrap();

        let seeded = ExplorerConfig::default();
        assert_eq!(seeded.cover_selection(&catalog).unwrap(), CoverSelection::Seeded);

        let mut pinned = ExplorerConfig::default();
        pinned.mining.cover_variant = Some("clay".to_owned());
        assert_eq!(
            pinned.cover_selection(&catalog).unwrap(),
            CoverSelection::Explicit(catalog.cover_variant("clay").unwrap())
        );

        pinned.mining.cover_variant = Some("lava".to_owned());
        assert!(pinned.cover_selection(&catalog).is_err());
    }
}
