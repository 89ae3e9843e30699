use serde::{Deserialize, Serialize};
use timeslice_storage::StoreConfig;

use crate::error::EngineError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Upper bound on link chain depth. Traversals that go deeper are
    /// treated as cyclic data.
    #[serde(default = "EngineConfig::default_max_link_depth")]
    pub max_link_depth: usize,

    #[serde(default)]
    pub store: StoreConfig,
}

impl EngineConfig {
    const fn default_max_link_depth() -> usize {
        16
    }

    pub fn with_max_link_depth(mut self, depth: usize) -> Result<Self, EngineError> {
        self.max_link_depth = depth;
        self.validate()?;
        Ok(self)
    }

    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if self.max_link_depth == 0 {
            return Err(EngineError::InvalidConfig(
                "max_link_depth must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    #[cfg(feature = "toml")]
    pub fn from_toml_str(s: &str) -> Result<Self, EngineError> {
        let config: Self =
            toml::from_str(s).map_err(|e| EngineError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_link_depth: Self::default_max_link_depth(),
            store: StoreConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_link_depth, 16);
        assert_eq!(config.store, StoreConfig::default());
        assert_eq!(config.with_max_link_depth(3).unwrap().max_link_depth, 3);
    }

    #[test]
    fn zero_depth_is_rejected() {
        assert!(matches!(
            EngineConfig::default().with_max_link_depth(0),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[cfg(feature = "toml")]
    #[test]
    fn missing_fields_take_defaults() {
        let config = EngineConfig::from_toml_str("max_link_depth = 4\n[store]\nwal = false\n").unwrap();
        assert_eq!(config.max_link_depth, 4);
        assert!(!config.store.wal);
        assert_eq!(config.store.busy_timeout_ms, 5000);
    }

    #[cfg(feature = "toml")]
    #[test]
    fn unknown_fields_are_rejected() {
        assert!(EngineConfig::from_toml_str("depth = 4").is_err());
    }

    #[cfg(feature = "toml")]
    #[test]
    fn zero_depth_from_toml_is_rejected() {
        assert!(matches!(
            EngineConfig::from_toml_str("max_link_depth = 0"),
            Err(EngineError::InvalidConfig(_))
        ));
    }
}
