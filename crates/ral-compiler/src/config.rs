//! Compiler configuration, loaded from TOML.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Comment each let binding and macro argument copy with its slot.
    pub var_comments: bool,
    /// Comment the first line of every statement with its source position.
    pub source_comments: bool,
    /// Prefix of generated jump labels.
    pub label_prefix: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            var_comments: true,
            source_comments: false,
            label_prefix: "_RAL_".to_string(),
        }
    }
}

impl CompilerConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = CompilerConfig::from_toml_str("source_comments = true\n").unwrap();
        assert!(config.source_comments);
        assert!(config.var_comments);
        assert_eq!(config.label_prefix, "_RAL_");
    }

    #[test]
    fn test_bad_config() {
        assert!(matches!(
            CompilerConfig::from_toml_str("var_comments = \"yes\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ral.toml");
        std::fs::write(&path, "label_prefix = \"_L\"\nvar_comments = false\n").unwrap();
        let config = CompilerConfig::from_file(&path).unwrap();
        assert_eq!(config.label_prefix, "_L");
        assert!(!config.var_comments);
        assert!(matches!(
            CompilerConfig::from_file(dir.path().join("missing.toml")),
            Err(ConfigError::Io { .. })
        ));
    }
}
