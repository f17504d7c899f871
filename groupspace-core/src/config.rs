//! Namespace configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),
}

/// Tunables for a [`Namespace`](crate::Namespace)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceConfig {
    /// Cache composite and universe evaluations per remote node
    #[serde(default = "default_true")]
    pub memoize: bool,

    /// Warn when a path is re-declared with different creation attributes
    #[serde(default = "default_true")]
    pub warn_on_conflicting_declarations: bool,

    /// Record evaluation metrics
    #[serde(default = "default_true")]
    pub track_metrics: bool,

    /// `distributed` flag used by [`JoinOptions`](crate::JoinOptions) built from this namespace
    #[serde(default)]
    pub default_distributed: bool,
}

fn default_true() -> bool {
    true
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self {
            memoize: true,
            warn_on_conflicting_declarations: true,
            track_metrics: true,
            default_distributed: false,
        }
    }
}

impl NamespaceConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&contents)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }
}
