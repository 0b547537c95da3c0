use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

use super::types::{Config, StorageBackend};
use crate::number::DialingPlan;

impl Config {
    /// Load configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        debug!(path = %path.display(), "loading configuration");

        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        Self::from_yaml(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        // An empty document means "all defaults"
        let config: Config = if yaml.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(yaml).context("failed to parse YAML configuration")?
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if DialingPlan::for_region(&self.platform.region).is_none() {
            anyhow::bail!(
                "unsupported region '{}', expected one of: {}",
                self.platform.region,
                DialingPlan::regions().collect::<Vec<_>>().join(", ")
            );
        }

        if self.platform.max_blocking_disabled_duration.is_zero() {
            anyhow::bail!("platform.max_blocking_disabled_duration must be positive");
        }

        if self.store.backend == StorageBackend::Memory && self.store.path.is_some() {
            warn!("store.path is ignored by the memory backend");
        }

        let ceiling = self.platform.max_blocking_disabled_duration.as_secs();
        let default_secs = self.carrier.defaults.blocking_disabled_duration_secs;
        if default_secs >= 0 && default_secs as u64 > ceiling {
            anyhow::bail!(
                "carrier.defaults.blocking_disabled_duration_secs ({}) exceeds the platform ceiling ({}s)",
                default_secs,
                ceiling
            );
        }

        for number in &self.emergency.numbers {
            if !number.chars().any(|c| c.is_ascii_digit()) {
                anyhow::bail!("emergency number '{}' contains no digits", number);
            }
        }

        info!("configuration validated successfully");
        Ok(())
    }
}
