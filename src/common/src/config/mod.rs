use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

/// Configuration for the pruning worker.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PrunerConfig {
    /// Enable the pruning worker.
    ///
    /// Env: CERTKEEP__PRUNER__ENABLED
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Interval between full resync passes over all certificates.
    ///
    /// Env: CERTKEEP__PRUNER__TICK_INTERVAL
    #[serde(with = "humantime_serde", default = "default_tick_interval")]
    pub tick_interval: Duration,

    /// Log pruning decisions without issuing deletes.
    ///
    /// Env: CERTKEEP__PRUNER__DRY_RUN
    #[serde(default)]
    pub dry_run: bool,

    /// Restrict resync passes to a single namespace. Event-triggered keys
    /// are processed regardless of this setting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watch_namespace: Option<String>,
}

fn default_enabled() -> bool {
    true
}

fn default_tick_interval() -> Duration {
    Duration::from_secs(300)
}

impl Default for PrunerConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            tick_interval: default_tick_interval(),
            dry_run: false,
            watch_namespace: None,
        }
    }
}

impl PrunerConfig {
    /// Validate the pruner configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval.is_zero() {
            return Err(ConfigError::InvalidTickInterval(self.tick_interval));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Configuration {
    /// Pruning worker configuration.
    pub pruner: PrunerConfig,
}

impl Configuration {
    /// Load configuration from defaults, `certkeep.toml`, and
    /// `CERTKEEP__`-prefixed environment variables, in ascending
    /// precedence.
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config = Figment::from(Serialized::defaults(Configuration::default()))
            .merge(Toml::file("certkeep.toml"))
            .merge(Env::prefixed("CERTKEEP__").split("__"))
            .extract()
            .map_err(Box::new)?;

        Ok(config)
    }

    /// Load configuration from an explicit TOML file path, still honoring
    /// environment overrides.
    pub fn load_from_path(path: &Path) -> Result<Self, Box<figment::Error>> {
        let config = Figment::from(Serialized::defaults(Configuration::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("CERTKEEP__").split("__"))
            .extract()
            .map_err(Box::new)?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.pruner.validate()
    }
}

/// Errors that can occur during configuration validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Tick interval must be positive.
    #[error("invalid pruner tick interval: {0:?} must be positive")]
    InvalidTickInterval(Duration),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_configuration() {
        let config = Configuration::default();

        assert!(config.pruner.enabled);
        assert_eq!(config.pruner.tick_interval, Duration::from_secs(300));
        assert!(!config.pruner.dry_run);
        assert_eq!(config.pruner.watch_namespace, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[pruner]
tick_interval = "30s"
dry_run = true
watch_namespace = "production"
"#
        )
        .unwrap();

        let config = Configuration::load_from_path(file.path()).unwrap();
        assert_eq!(config.pruner.tick_interval, Duration::from_secs(30));
        assert!(config.pruner.dry_run);
        assert_eq!(config.pruner.watch_namespace.as_deref(), Some("production"));
        // Unset keys keep their defaults.
        assert!(config.pruner.enabled);
    }

    #[test]
    fn test_env_var_override() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("CERTKEEP__PRUNER__ENABLED", "false");
            jail.set_env("CERTKEEP__PRUNER__TICK_INTERVAL", "45s");

            let config = Figment::from(Serialized::defaults(Configuration::default()))
                .merge(Env::prefixed("CERTKEEP__").split("__"))
                .extract::<Configuration>()?;

            assert!(!config.pruner.enabled);
            assert_eq!(config.pruner.tick_interval, Duration::from_secs(45));
            Ok(())
        });
    }

    #[test]
    fn test_zero_tick_interval_is_invalid() {
        let config = PrunerConfig {
            tick_interval: Duration::from_secs(0),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidTickInterval(_))
        ));
    }
}
