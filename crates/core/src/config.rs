//! Scan configuration: which detector to run over which program.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::detectors::Detector;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no checker implemented for bug {0}")]
    UnknownBug(String),
    #[error("scan config '{0}' is required")]
    MissingField(&'static str),
}

/// A saved scan request. Values given on the command line take precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Detector identifier, e.g. `MozillaBug35294`.
    #[serde(default)]
    pub bug: String,
    /// Program dump to scan.
    #[serde(default)]
    pub program: PathBuf,
    /// Base for debug directories recorded as relative paths.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_root: Option<PathBuf>,
    /// Findings database to record the run into.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ScanConfig {
    pub fn new(bug: impl Into<String>, program: impl Into<PathBuf>) -> Self {
        Self { bug: bug.into(), program: program.into(), ..Self::default() }
    }

    /// Check required fields and resolve the detector.
    pub fn validate(&self) -> Result<Detector, ConfigError> {
        if self.bug.trim().is_empty() {
            return Err(ConfigError::MissingField("bug"));
        }
        if self.program.as_os_str().is_empty() {
            return Err(ConfigError::MissingField("program"));
        }
        self.bug.parse()
    }
}

/// Load a scan config; `.json` files are read as JSON, anything else as YAML.
pub fn load_scan_config(path: &Path) -> Result<ScanConfig> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read scan config at {}", path.display()))?;
    let config: ScanConfig = if path.extension().and_then(|e| e.to_str()) == Some("json") {
        serde_json::from_slice(&bytes).context("Failed to parse scan config JSON")?
    } else {
        serde_yaml::from_slice(&bytes).context("Failed to parse scan config YAML")?
    };
    Ok(config)
}
