use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::agent::ModelConfig;
use crate::error::{Result, WeftError};

/// Top-level engine configuration, loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub model: ModelConfig,
    #[serde(default)]
    pub store: StoreConfig,
    /// Tracing filter directive, e.g. "info" or "weft_engine=debug".
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl EngineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| WeftError::ConfigNotFound(path.display().to_string()))?;
        toml::from_str(&content).map_err(|e| WeftError::Config(e.to_string()))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig {
                provider: "echo".into(),
                model_id: "echo-1".into(),
                temperature: 0.0,
                max_tokens: 4096,
            },
            store: StoreConfig::default(),
            log_filter: default_log_filter(),
        }
    }
}

/// Execution state store lifecycle settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// How long terminal executions are retained before eviction.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            retention_secs: default_retention_secs(),
        }
    }
}

fn default_retention_secs() -> u64 {
    3600
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn load_minimal_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[model]
provider = "scripted"
model_id = "test-model"
"#
        )
        .unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.model.provider, "scripted");
        assert_eq!(config.model.model_id, "test-model");
        assert_eq!(config.store.retention_secs, 3600);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn load_missing_file_is_config_not_found() {
        let err = EngineConfig::load(Path::new("/nonexistent/weft.toml")).unwrap_err();
        assert!(matches!(err, WeftError::ConfigNotFound(_)));
    }

    #[test]
    fn defaults_are_sensible() {
        let config = EngineConfig::default();
        assert_eq!(config.model.provider, "echo");
        assert_eq!(config.model.max_tokens, 4096);
    }
}
