//! Project configuration.
//!
//! Reads `nodegen.toml` from the working directory unless `--config` names
//! another file. Command-line flags take precedence over file values.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Where and what to generate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output directory for `generate` (default: `generated`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    /// Emitter targets; empty means every available target.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<String>,
}

/// Contents of `nodegen.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodegenConfig {
    /// External root type, used when the schema does not declare one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,

    /// Extra opaque external types, merged with the schema's `extern` lists.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub externals: Vec<String>,

    #[serde(default)]
    pub output: OutputConfig,
}

impl NodegenConfig {
    pub const FILE_NAME: &'static str = "nodegen.toml";

    /// Default config file path: ./nodegen.toml.
    pub fn default_path() -> PathBuf {
        PathBuf::from(Self::FILE_NAME)
    }

    /// The explicit path if given, otherwise the default.
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        explicit.map(Path::to_path_buf).unwrap_or_else(Self::default_path)
    }

    /// Load config from disk. A missing default file yields the defaults;
    /// a missing explicit file is an error.
    pub fn load(path: &Path, explicit: bool) -> anyhow::Result<Self> {
        if !explicit && !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config {}", path.display()))?;
        let config: NodegenConfig = toml::from_str(&content)
            .with_context(|| format!("invalid config {}", path.display()))?;
        Ok(config)
    }

    /// Output directory, letting a flag override the file.
    pub fn output_dir(&self, flag: Option<&Path>) -> PathBuf {
        flag.map(Path::to_path_buf)
            .or_else(|| self.output.dir.clone())
            .unwrap_or_else(|| PathBuf::from("generated"))
    }

    /// Emitter targets, letting flags override the file.
    pub fn targets(&self, flags: &[String], available: &[&str]) -> Vec<String> {
        if !flags.is_empty() {
            flags.to_vec()
        } else if !self.output.targets.is_empty() {
            self.output.targets.clone()
        } else {
            available.iter().map(|t| t.to_string()).collect()
        }
    }
}
