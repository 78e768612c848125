//! Configuration loading for the filter controller

use crate::core::{EventBus, FilterError};
use crate::storage::DEFAULT_PRESET_NAME;
use serde::{Deserialize, Serialize};

fn default_enabled() -> bool {
    true
}

fn default_event_bus_capacity() -> usize {
    1024
}

fn default_preset_name() -> String {
    DEFAULT_PRESET_NAME.to_string()
}

/// Settings for one filtering session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Scene whose presets are loaded
    pub scene_id: String,

    /// Whether the engine starts enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Name shown for presets created when the backend has none
    #[serde(default = "default_preset_name")]
    pub default_preset_name: String,

    /// Buffer size of the scene event bus
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            scene_id: String::new(),
            enabled: default_enabled(),
            default_preset_name: default_preset_name(),
            event_bus_capacity: default_event_bus_capacity(),
        }
    }
}

impl FilterConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self, FilterError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| FilterError::Config(format!("cannot read {}: {}", path, e)))?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self, FilterError> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| FilterError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), FilterError> {
        if self.scene_id.trim().is_empty() {
            return Err(FilterError::Config("scene_id must not be empty".to_string()));
        }
        if self.event_bus_capacity == 0 {
            return Err(FilterError::Config(
                "event_bus_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// A scene event bus sized per this configuration
    pub fn event_bus(&self) -> EventBus {
        EventBus::new(self.event_bus_capacity.max(1))
    }

    /// Create a configuration for testing
    pub fn default_config() -> Self {
        Self {
            scene_id: "scene-1".to_string(),
            ..Self::default()
        }
    }
}
