//! Configuration for aggsynth.
//!
//! Supports TOML-based configuration with global defaults and per-engine overrides.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::engine::DatabaseType;
use crate::error::{AggsynthError, Result};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AggsynthConfig {
    /// Defaults applied to every engine unless overridden.
    pub defaults: AggregateDefaults,

    /// Per-engine overrides keyed by database type name (`mysql`, `sqlserver`, ...).
    #[serde(default)]
    pub engines: HashMap<String, EngineConfig>,
}

/// Naming defaults used when the caller's lines do not supply an alias.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AggregateDefaults {
    /// Alias for the axis column when the axis line is unaliased (default: `joinDt`).
    pub axis_alias: String,
    /// Alias for the count column when the count line is unaliased (default: `MyCount`).
    pub count_alias: String,
}

/// Per-engine configuration (can override the defaults).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    pub aggregate: Option<AggregateOverrides>,

    /// MySQL-specific options.
    pub mysql: Option<MySqlConfig>,
}

/// Engine-level alias overrides; unset fields fall back to `[defaults]`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AggregateOverrides {
    pub axis_alias: Option<String>,
    pub count_alias: Option<String>,
}

/// MySQL-specific configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MySqlConfig {
    /// `group_concat_max_len` set before building dynamic pivot columns (default: 1000000).
    pub group_concat_max_len: u64,
}

impl Default for AggregateDefaults {
    fn default() -> Self {
        Self {
            axis_alias: "joinDt".to_string(),
            count_alias: "MyCount".to_string(),
        }
    }
}

impl Default for MySqlConfig {
    fn default() -> Self {
        Self {
            group_concat_max_len: 1_000_000,
        }
    }
}

impl AggregateDefaults {
    fn with_overrides(&self, overrides: &AggregateOverrides) -> Self {
        Self {
            axis_alias: overrides
                .axis_alias
                .clone()
                .unwrap_or_else(|| self.axis_alias.clone()),
            count_alias: overrides
                .count_alias
                .clone()
                .unwrap_or_else(|| self.count_alias.clone()),
        }
    }
}

impl AggsynthConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| AggsynthError::Config(format!("failed to read config file: {e}")))?;
        Self::from_toml(&contents)
    }

    /// Load configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(toml_str)
            .map_err(|e| AggsynthError::Config(format!("failed to parse config: {e}")))?;
        for name in cfg.engines.keys() {
            name.parse::<DatabaseType>()
                .map_err(|_| AggsynthError::Config(format!("unknown engine '{name}' in config")))?;
        }
        Ok(cfg)
    }

    /// Load from default locations (env var, cwd, user config dir, or defaults).
    ///
    /// Search order:
    /// 1. `AGGSYNTH_CONFIG` environment variable
    /// 2. `./aggsynth.toml` (current directory)
    /// 3. `~/.config/aggsynth/config.toml` (user config dir)
    /// 4. Built-in defaults
    pub fn load_default() -> Self {
        if let Ok(path) = std::env::var("AGGSYNTH_CONFIG") {
            match Self::from_file(&path) {
                Ok(cfg) => {
                    tracing::info!(path = %path, "loaded config from AGGSYNTH_CONFIG");
                    return cfg;
                }
                Err(e) => tracing::warn!(path = %path, error = %e, "ignoring AGGSYNTH_CONFIG"),
            }
        }

        if let Ok(cfg) = Self::from_file("aggsynth.toml") {
            tracing::info!("loaded config from ./aggsynth.toml");
            return cfg;
        }

        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("aggsynth").join("config.toml");
            if let Ok(cfg) = Self::from_file(&user_config) {
                tracing::info!(path = %user_config.display(), "loaded config from user config dir");
                return cfg;
            }
        }

        tracing::debug!("no config file found, using defaults");
        Self::default()
    }

    /// Resolved config for one engine (overrides merged over defaults).
    pub fn for_engine(&self, database_type: DatabaseType) -> ResolvedEngineConfig {
        let overrides = self
            .engines
            .iter()
            .find(|(name, _)| name.parse::<DatabaseType>().ok() == Some(database_type))
            .map(|(_, cfg)| cfg);
        ResolvedEngineConfig::merge(&self.defaults, overrides)
    }
}

/// Fully resolved configuration for an engine (no Option fields).
#[derive(Debug, Clone, Default)]
pub struct ResolvedEngineConfig {
    pub aggregate: AggregateDefaults,
    pub mysql: MySqlConfig,
}

impl ResolvedEngineConfig {
    fn merge(defaults: &AggregateDefaults, override_cfg: Option<&EngineConfig>) -> Self {
        match override_cfg {
            Some(engine) => Self {
                aggregate: match &engine.aggregate {
                    Some(overrides) => defaults.with_overrides(overrides),
                    None => defaults.clone(),
                },
                mysql: engine.mysql.clone().unwrap_or_default(),
            },
            None => Self {
                aggregate: defaults.clone(),
                mysql: MySqlConfig::default(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = AggsynthConfig::default();
        assert_eq!(cfg.defaults.axis_alias, "joinDt");
        assert_eq!(cfg.defaults.count_alias, "MyCount");
        let resolved = cfg.for_engine(DatabaseType::MySql);
        assert_eq!(resolved.mysql.group_concat_max_len, 1_000_000);
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
[defaults]
axis_alias = "bucket"

[engines.mysql.mysql]
group_concat_max_len = 4096
"#;
        let cfg = AggsynthConfig::from_toml(toml).unwrap();
        assert_eq!(cfg.defaults.axis_alias, "bucket");
        assert_eq!(cfg.defaults.count_alias, "MyCount");

        let resolved = cfg.for_engine(DatabaseType::MySql);
        assert_eq!(resolved.mysql.group_concat_max_len, 4096);
        assert_eq!(resolved.aggregate.axis_alias, "bucket");
    }

    #[test]
    fn test_engine_override() {
        let toml = r#"
[defaults]
count_alias = "n"

[engines.sqlserver.aggregate]
axis_alias = "period"
count_alias = "total"
"#;
        let cfg = AggsynthConfig::from_toml(toml).unwrap();

        let oracle = cfg.for_engine(DatabaseType::Oracle);
        assert_eq!(oracle.aggregate.count_alias, "n");

        let mssql = cfg.for_engine(DatabaseType::MicrosoftSqlServer);
        assert_eq!(mssql.aggregate.axis_alias, "period");
        assert_eq!(mssql.aggregate.count_alias, "total");
    }

    #[test]
    fn test_partial_engine_override_keeps_defaults() {
        let toml = r#"
[defaults]
count_alias = "n"

[engines.mssql.aggregate]
axis_alias = "yr"
"#;
        let cfg = AggsynthConfig::from_toml(toml).unwrap();
        let mssql = cfg.for_engine(DatabaseType::MicrosoftSqlServer);
        assert_eq!(mssql.aggregate.axis_alias, "yr");
        assert_eq!(mssql.aggregate.count_alias, "n");
    }

    #[test]
    fn test_unknown_engine_rejected() {
        let err = AggsynthConfig::from_toml("[engines.sqlite]\n").unwrap_err();
        assert!(matches!(err, AggsynthError::Config(_)));
    }
}
