//! Configuration Loader
//!
//! Environment-aware configuration loading. Defaults, an optional TOML file and
//! `CONVERSION_`-prefixed environment variables are merged with the `config` crate and
//! deserialized into a validated [`PipelineConfig`].

use config::{Config, Environment, File, FileFormat};
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use super::error::{ConfigResult, ConfigurationError};
use super::PipelineConfig;

const ENV_PREFIX: &str = "CONVERSION";
const CONFIG_PATH_VAR: &str = "CONVERSION_CONFIG_PATH";
const DEFAULT_CONFIG_FILE: &str = "config/conversion.toml";

/// Loaded, validated configuration plus where it came from
#[derive(Debug)]
pub struct ConfigManager {
    config: PipelineConfig,
    environment: String,
    config_file: Option<PathBuf>,
}

impl ConfigManager {
    /// Load configuration from the default locations and the process environment
    pub fn load() -> ConfigResult<Arc<ConfigManager>> {
        let path = env::var(CONFIG_PATH_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_FILE));

        let file = if path.exists() { Some(path) } else { None };
        Self::from_sources(file.as_deref(), None)
    }

    /// Load configuration from an explicit TOML file plus the process environment
    pub fn load_from_file(path: impl AsRef<Path>) -> ConfigResult<Arc<ConfigManager>> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigurationError::load_error(
                path.display().to_string(),
                "file does not exist",
            ));
        }
        Self::from_sources(Some(path), None)
    }

    /// Build configuration from an optional file and an optional explicit environment map.
    ///
    /// When `env_vars` is `None` the process environment is read. Passing a map keeps
    /// tests independent of global environment state.
    pub fn from_sources(
        file: Option<&Path>,
        env_vars: Option<HashMap<String, String>>,
    ) -> ConfigResult<Arc<ConfigManager>> {
        let environment = Self::detect_environment();

        let defaults = Config::try_from(&PipelineConfig::default())
            .map_err(|e| ConfigurationError::load_error("defaults", e))?;

        let mut builder = Config::builder().add_source(defaults);

        if let Some(path) = file {
            debug!(path = %path.display(), "Adding configuration file source");
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        let environment_source = Environment::with_prefix(ENV_PREFIX)
            .try_parsing(true)
            .source(env_vars);
        builder = builder.add_source(environment_source);

        let source_name = file
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "environment".to_string());

        let merged = builder
            .build()
            .map_err(|e| ConfigurationError::load_error(source_name, e))?;

        let config: PipelineConfig = merged
            .try_deserialize()
            .map_err(ConfigurationError::deserialization_error)?;

        config.validate()?;

        info!(
            environment = %environment,
            pool_concurrency = config.pool_concurrency,
            pool_queue_capacity = config.pool_queue_capacity,
            cache_ttl_seconds = config.cache_ttl_seconds,
            breaker_failure_threshold = config.breaker_failure_threshold,
            request_timeout_ms = config.request_timeout_ms,
            "Configuration loaded successfully"
        );

        Ok(Arc::new(ConfigManager {
            config,
            environment,
            config_file: file.map(Path::to_path_buf),
        }))
    }

    /// Wrap an already-built configuration after validating it
    pub fn from_config(config: PipelineConfig) -> ConfigResult<Arc<ConfigManager>> {
        config.validate()?;
        Ok(Arc::new(ConfigManager {
            config,
            environment: Self::detect_environment(),
            config_file: None,
        }))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn config_file(&self) -> Option<&Path> {
        self.config_file.as_deref()
    }

    /// Detect current environment: CONVERSION_ENV || APP_ENV || 'development'
    pub fn detect_environment() -> String {
        env::var("CONVERSION_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_sources() {
        let manager = ConfigManager::from_sources(None, Some(HashMap::new())).unwrap();
        assert_eq!(manager.config(), &PipelineConfig::default());
        assert!(manager.config_file().is_none());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "pool_concurrency = 2\npool_queue_capacity = 8\nbreaker_failure_threshold = 0.75"
        )
        .unwrap();

        let manager = ConfigManager::from_sources(Some(file.path()), Some(HashMap::new())).unwrap();
        let config = manager.config();
        assert_eq!(config.pool_concurrency, 2);
        assert_eq!(config.pool_queue_capacity, 8);
        assert!((config.breaker_failure_threshold - 0.75).abs() < f64::EPSILON);
        assert_eq!(config.cache_ttl_seconds, 300);
    }

    #[test]
    fn test_environment_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "pool_concurrency = 2\npool_queue_capacity = 8").unwrap();

        let env_vars = HashMap::from([
            ("CONVERSION_POOL_CONCURRENCY".to_string(), "6".to_string()),
            ("CONVERSION_POOL_QUEUE_CAPACITY".to_string(), "12".to_string()),
        ]);

        let manager = ConfigManager::from_sources(Some(file.path()), Some(env_vars)).unwrap();
        assert_eq!(manager.config().pool_concurrency, 6);
        assert_eq!(manager.config().pool_queue_capacity, 12);
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        let env_vars = HashMap::from([(
            "CONVERSION_POOL_CONCURRENCY".to_string(),
            "0".to_string(),
        )]);

        let result = ConfigManager::from_sources(None, Some(env_vars));
        assert!(matches!(
            result,
            Err(ConfigurationError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = ConfigManager::load_from_file("/nonexistent/conversion.toml");
        assert!(matches!(result, Err(ConfigurationError::LoadError { .. })));
    }
}
