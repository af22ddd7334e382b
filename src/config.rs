//! TOML configuration.
//!
//! Every section and field is optional; missing values take their defaults.
//!
//! ```toml
//! [bases]
//! title_to_issnl = "bases/title_to_issnl.tsv"
//! issn_bases = ["bases/issnl_to_all.csv", "bases/issnl_to_all_latindex.csv"]
//! year_volume = "bases/year_volume.csv"
//! synthetic_year_volume = "bases/year_volume_artificial.csv"
//! equations = "bases/equations_issnl.csv"
//!
//! [loader]
//! conflict_policy = "first_seen"
//!
//! [loader.regression]
//! min_r2 = 0.7
//!
//! [matching]
//! use_fuzzy = true
//! run_in_parallel = true
//!
//! [matching.fuzzy]
//! min_title_length = 6
//! ```

use crate::engine::MatchOptions;
use crate::{BasePaths, CorrectionBases, LoaderConfig, MatchError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Complete configuration of a matching run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    pub bases: BasePaths,
    pub loader: LoaderConfig,
    pub matching: MatchOptions,
}

impl MatchConfig {
    /// Parses a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Reads a TOML file. Relative base paths are taken relative to the file's directory.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(MatchError::MissingInput(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        if let Some(dir) = path.parent() {
            config.resolve_relative_to(dir);
        }

        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Serializes the configuration back to TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| MatchError::Config(e.to_string()))
    }

    /// Prefixes every relative base path with `dir`.
    pub fn resolve_relative_to(&mut self, dir: &Path) {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() && !path.as_os_str().is_empty() {
                *path = dir.join(&*path);
            }
        };

        let bases = &mut self.bases;
        resolve(&mut bases.title_to_issnl);
        for path in &mut bases.issn_bases {
            resolve(path);
        }
        resolve(&mut bases.year_volume);
        if let Some(path) = bases.synthetic_year_volume.as_mut() {
            resolve(path);
        }
        if let Some(path) = bases.equations.as_mut() {
            resolve(path);
        }
    }

    /// Loads the configured correction bases.
    pub fn load_bases(&self) -> Result<CorrectionBases> {
        CorrectionBases::load(&self.bases, &self.loader)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConflictPolicy;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = MatchConfig::from_toml_str("").unwrap();
        assert_eq!(config, MatchConfig::default());
        assert!(!config.matching.use_fuzzy);
        assert_eq!(config.loader.regression.min_r2, 0.70);
    }

    #[test]
    fn test_partial_config() {
        let content = r#"
            [bases]
            title_to_issnl = "title_to_issnl.tsv"
            issn_bases = ["primary.csv", "secondary.csv"]

            [loader]
            conflict_policy = "last_seen"

            [loader.regression]
            min_observation_frequency = 5

            [matching]
            use_fuzzy = true

            [matching.fuzzy]
            min_words = 3
        "#;

        let config = MatchConfig::from_toml_str(content).unwrap();
        assert_eq!(config.bases.issn_bases.len(), 2);
        assert_eq!(config.loader.conflict_policy, ConflictPolicy::LastSeen);
        assert_eq!(config.loader.regression.min_observation_frequency, 5);
        assert_eq!(config.loader.regression.min_r2, 0.70);
        assert!(config.matching.use_fuzzy);
        assert_eq!(config.matching.fuzzy.min_words, 3);
        assert_eq!(config.matching.fuzzy.min_title_length, 6);
    }

    #[test]
    fn test_invalid_config() {
        let result = MatchConfig::from_toml_str("[loader]\nconflict_policy = \"newest\"\n");
        assert!(matches!(result, Err(MatchError::Config(_))));
    }

    #[test]
    fn test_from_path_resolves_relative_paths() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("issnl-match.toml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[bases]\ntitle_to_issnl = \"t.tsv\"\nissn_bases = [\"/abs/i.csv\"]\nequations = \"e.csv\""
        )
        .unwrap();

        let config = MatchConfig::from_path(&path).unwrap();
        assert_eq!(config.bases.title_to_issnl, dir.path().join("t.tsv"));
        assert_eq!(config.bases.issn_bases, vec![PathBuf::from("/abs/i.csv")]);
        assert_eq!(config.bases.equations, Some(dir.path().join("e.csv")));
        assert_eq!(config.bases.year_volume, PathBuf::new());
    }

    #[test]
    fn test_missing_config_file() {
        let result = MatchConfig::from_path("/nonexistent/issnl-match.toml");
        assert!(matches!(result, Err(MatchError::MissingInput(_))));
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = MatchConfig::default();
        config.bases = BasePaths::new("t.tsv", "i.csv", "yv.csv").with_equations("e.csv");
        config.matching.set_use_fuzzy(true);

        let text = config.to_toml_string().unwrap();
        assert_eq!(MatchConfig::from_toml_str(&text).unwrap(), config);
    }
}
