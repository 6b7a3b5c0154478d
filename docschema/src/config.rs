use crate::context::Context;
use crate::discovery::DiscoverOptions;
use crate::error::{DocSchemaError, Result};
use crate::migration::{DriftPolicy, EnforceOptions, MigrateOptions, DRIFT_SAMPLE_SIZE};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Engine settings, usually loaded from a YAML file:
///
/// ```yaml
/// timeout_secs: 30
/// discover:
///   sample_size: 1000
///   collections: [users, orders]
/// migrate:
///   drop_extras: true
/// drift:
///   policy: warn
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    #[serde(default)]
    pub discover: DiscoverOptions,
    #[serde(default)]
    pub migrate: MigrateOptions,
    #[serde(default)]
    pub drift: DriftConfig,
    /// Deadline applied to a whole discovery or reconciliation run.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftConfig {
    #[serde(default)]
    pub policy: DriftPolicy,
    #[serde(default = "default_drift_sample_size")]
    pub sample_size: usize,
}

fn default_drift_sample_size() -> usize {
    DRIFT_SAMPLE_SIZE
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            policy: DriftPolicy::Ignore,
            sample_size: DRIFT_SAMPLE_SIZE,
        }
    }
}

impl EngineConfig {
    /// Parse a config YAML file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Parse a config YAML string. An empty document yields the defaults.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: EngineConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.drift.sample_size == 0 {
            return Err(DocSchemaError::Config("drift.sample_size must be at least 1".into()));
        }
        if self.timeout_secs == Some(0) {
            return Err(DocSchemaError::Config("timeout_secs must be at least 1".into()));
        }
        Ok(())
    }

    pub fn discover_options(&self) -> DiscoverOptions {
        self.discover.clone()
    }

    pub fn migrate_options(&self) -> MigrateOptions {
        self.migrate
    }

    pub fn enforce_options(&self) -> EnforceOptions {
        EnforceOptions {
            drift_policy: self.drift.policy,
            drift_sample_size: self.drift.sample_size,
        }
    }

    /// A fresh context carrying the configured timeout, if any.
    pub fn context(&self) -> Context {
        match self.timeout_secs {
            Some(secs) => Context::with_timeout(Duration::from_secs(secs)),
            None => Context::background(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_empty_config_is_default() {
        let config = EngineConfig::from_yaml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.discover_options().effective_sample_size(), 500);
        assert_eq!(config.enforce_options(), EnforceOptions::default());
        assert!(config.context().deadline().is_none());
    }

    #[test]
    fn test_full_config() {
        let yaml = r#"
timeout_secs: 30
discover:
  sample_size: 1000
  collections: [users, orders]
migrate:
  dry_run: true
  drop_extras: true
drift:
  policy: fatal
  sample_size: 20
"#;
        let config = EngineConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.discover.sample_size, 1000);
        assert_eq!(config.discover.collections, vec!["users", "orders"]);
        assert_eq!(config.migrate_options(), MigrateOptions { dry_run: true, drop_extras: true });
        assert_eq!(
            config.enforce_options(),
            EnforceOptions { drift_policy: DriftPolicy::Fatal, drift_sample_size: 20 }
        );
        assert!(config.context().deadline().is_some());
    }

    #[test]
    fn test_partial_sections_default() {
        let config = EngineConfig::from_yaml_str("drift:\n  policy: warn\n").unwrap();
        assert_eq!(config.drift.sample_size, DRIFT_SAMPLE_SIZE);
        assert!(!config.migrate.drop_extras);
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            EngineConfig::from_yaml_str("drift:\n  sample_size: 0\n"),
            Err(DocSchemaError::Config(_))
        ));
        assert!(matches!(
            EngineConfig::from_yaml_str("unknown_key: 1\n"),
            Err(DocSchemaError::Yaml(_))
        ));
        assert!(matches!(
            EngineConfig::from_yaml_str("drift:\n  policy: loud\n"),
            Err(DocSchemaError::Yaml(_))
        ));
    }

    #[test]
    fn test_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "migrate:\n  drop_extras: true").unwrap();
        let config = EngineConfig::from_path(file.path()).unwrap();
        assert!(config.migrate.drop_extras);

        let missing = EngineConfig::from_path(Path::new("/nonexistent/docschema.yaml"));
        assert!(matches!(missing, Err(DocSchemaError::Io(_))));
    }
}
