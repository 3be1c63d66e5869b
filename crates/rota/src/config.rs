use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Settings shared by the sync controllers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Feed channel name of the assigned-shifts controller
    pub shifts_channel: String,
    /// Feed channel name of the stats controller
    pub stats_channel: String,
    /// Undelivered signals queued per channel before extras are dropped
    pub signal_buffer: usize,
    /// Published for failures that carry no store message
    pub load_error_message: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            shifts_channel: "operator-shifts".to_string(),
            stats_channel: "operator-stats".to_string(),
            signal_buffer: 64,
            load_error_message: "Error loading assigned shifts".to_string(),
        }
    }
}

impl SyncConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&content)
            .with_context(|| format!("Failed to parse config YAML {}", path.display()))
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: SyncConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.signal_buffer == 0 {
            bail!("signal_buffer must be greater than zero");
        }
        if self.shifts_channel.is_empty() || self.stats_channel.is_empty() {
            bail!("channel names must not be empty");
        }
        Ok(())
    }
}
