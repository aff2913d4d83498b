use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::fs;

/// 跳转引擎配置
/// Every field has a default, so an empty YAML document is a valid config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedirectConfig {
    pub variables: VariableKeys,
    pub naming: NamingConfig,
    pub counters: CounterKeys,
}

/// Instance-scoped variables read from the first active task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariableKeys {
    pub process_number: String,
    pub form_code: String,
    pub starter: String,
}

impl Default for VariableKeys {
    fn default() -> Self {
        Self {
            process_number: "processNumber".to_string(),
            form_code: "formCode".to_string(),
            starter: "startUser".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    /// Configured variable name meaning "the process starter".
    pub starter_marker: String,
    /// Substring marking a list-typed variable name.
    pub list_marker: String,
    pub plural_suffix: String,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            starter_marker: "startUser".to_string(),
            list_marker: "List".to_string(),
            plural_suffix: "s".to_string(),
        }
    }
}

/// Variable names holding the multi-instance counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterKeys {
    pub total: String,
    pub active: String,
    pub completed: String,
}

impl Default for CounterKeys {
    fn default() -> Self {
        Self {
            total: "nrOfInstances".to_string(),
            active: "nrOfActiveInstances".to_string(),
            completed: "nrOfCompletedInstances".to_string(),
        }
    }
}

impl RedirectConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to deserialize redirect config")
    }

    pub fn from_yaml_file(file_path: &str) -> Result<Self> {
        let content = fs::read_to_string(file_path)
            .with_context(|| format!("Failed to read config file from {}", file_path))?;
        Self::from_yaml_str(&content)
            .with_context(|| format!("Invalid config in {}", file_path))
    }
}
