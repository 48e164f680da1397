//! Cache configuration
//!
//! Loaded from an optional JSON file; every field has a default.

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Sweeper tick period in milliseconds
    pub sweep_interval_ms: u64,

    /// Max expired entries removed per tick
    pub sweep_limit: usize,

    /// Starting capacity of each typed store
    pub initial_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            sweep_interval_ms: 100,
            sweep_limit: 100,
            initial_capacity: 1024,
        }
    }
}

impl CacheConfig {
    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        let config: CacheConfig = serde_json::from_str(text).context("Invalid cache config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.sweep_interval_ms == 0 {
            bail!("sweep_interval_ms must be greater than 0");
        }
        if self.sweep_limit == 0 {
            bail!("sweep_limit must be greater than 0");
        }
        Ok(())
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert_eq!(config.sweep_interval(), Duration::from_millis(100));
        assert_eq!(config.sweep_limit, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let config = CacheConfig::from_json(r#"{"sweep_limit": 20}"#).unwrap();
        assert_eq!(config.sweep_limit, 20);
        assert_eq!(config.sweep_interval_ms, 100);
        assert_eq!(config.initial_capacity, 1024);
    }

    #[test]
    fn test_rejects_zero_values() {
        assert!(CacheConfig::from_json(r#"{"sweep_interval_ms": 0}"#).is_err());
        assert!(CacheConfig::from_json(r#"{"sweep_limit": 0}"#).is_err());
        assert!(CacheConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_load_file() {
        let path = std::env::temp_dir()
            .join(format!("ferrumcache_config_{}.json", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, r#"{{"sweep_interval_ms": 250, "initial_capacity": 16}}"#).unwrap();
        drop(file);

        let config = CacheConfig::load(&path).unwrap();
        assert_eq!(config.sweep_interval(), Duration::from_millis(250));
        assert_eq!(config.initial_capacity, 16);

        std::fs::remove_file(&path).unwrap();
        assert!(CacheConfig::load(&path).is_err());
    }
}
