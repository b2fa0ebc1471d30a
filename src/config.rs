use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

pub const DEFAULT_BINARY: &str = "bunker-convert";
pub const BINARY_ENV: &str = "BUNKER_CONVERT_BIN";
pub const WORKING_DIR_ENV: &str = "BUNKER_CONVERT_CWD";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Program name or path; bare names are resolved through `PATH`.
    pub binary: String,
    pub working_dir: Option<PathBuf>,
    /// Extra environment variables set on every child.
    pub env: BTreeMap<String, String>,
    /// Default for operations whose options leave `check` unset.
    pub check: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            binary: DEFAULT_BINARY.to_string(),
            working_dir: None,
            env: BTreeMap::new(),
            check: true,
        }
    }
}

impl ClientConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read client config: {}", path.display()))?;
        let config: ClientConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse client config YAML: {}", path.display()))?;
        Ok(config)
    }

    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Applies `BUNKER_CONVERT_BIN` and `BUNKER_CONVERT_CWD` when set and non-empty.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(binary) = non_empty_var(BINARY_ENV) {
            self.binary = binary;
        }
        if let Some(dir) = non_empty_var(WORKING_DIR_ENV) {
            self.working_dir = Some(PathBuf::from(dir));
        }
        self
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}
