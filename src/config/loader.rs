//! Configuration loader with environment variable expansion

use super::{expand_env_vars, Config, ConfigError};
use std::path::Path;

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from YAML text
    pub fn from_yaml(content: &str) -> Result<Config, ConfigError> {
        let expanded = expand_env_vars(content);
        let config: Config = serde_yaml::from_str(&expanded)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_yaml_applies_defaults() {
        let config = ConfigLoader::from_yaml("server:\n  address: \"127.0.0.1:3000\"\n").unwrap();
        assert_eq!(config.server.address, "127.0.0.1:3000");
        assert_eq!(config.upstream.timeout_seconds, 300);
        assert_eq!(config.metrics.port, 9090);
    }

    #[test]
    fn test_from_yaml_rejects_missing_server() {
        assert!(ConfigLoader::from_yaml("upstream:\n  field_name: video\n").is_err());
    }
}
