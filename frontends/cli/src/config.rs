use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use rota::SyncConfig;

/// Settings file of the `rota` binary.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// `EnvFilter` directives used when `RUST_LOG` is unset
    pub log_filter: String,
    /// Operator followed when `--operator` is not given
    pub operator: Option<String>,
    pub sync: SyncConfig,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            operator: None,
            sync: SyncConfig::default(),
        }
    }
}

impl CliConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: CliConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config YAML {}", path.display()))?;
        config.sync.validate()?;

        Ok(config)
    }
}
