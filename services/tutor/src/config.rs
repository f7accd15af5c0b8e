use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub openai_api_key: String,
    pub api_base: Option<String>,
    pub chat_model: String,
    pub log_level: Level,
    pub cache_ttl: Duration,
    pub cache_max_entries: usize,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let openai_api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| ConfigError::MissingVar("OPENAI_API_KEY".to_string()))?;

        let api_base = std::env::var("OPENAI_API_BASE").ok();

        let chat_model = std::env::var("CHAT_MODEL").unwrap_or_else(|_| "gpt-4o".to_string());

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cache_ttl_str =
            std::env::var("PROMPT_CACHE_TTL_SECS").unwrap_or_else(|_| "300".to_string());
        let cache_ttl_secs = cache_ttl_str.parse::<u64>().map_err(|e| {
            ConfigError::InvalidValue("PROMPT_CACHE_TTL_SECS".to_string(), e.to_string())
        })?;

        let cache_max_str =
            std::env::var("PROMPT_CACHE_MAX_ENTRIES").unwrap_or_else(|_| "128".to_string());
        let cache_max_entries = cache_max_str.parse::<usize>().map_err(|e| {
            ConfigError::InvalidValue("PROMPT_CACHE_MAX_ENTRIES".to_string(), e.to_string())
        })?;

        Ok(Self {
            openai_api_key,
            api_base,
            chat_model,
            log_level,
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            cache_max_entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn clear_env_vars() {
        unsafe {
            env::remove_var("OPENAI_API_KEY");
            env::remove_var("OPENAI_API_BASE");
            env::remove_var("CHAT_MODEL");
            env::remove_var("RUST_LOG");
            env::remove_var("PROMPT_CACHE_TTL_SECS");
            env::remove_var("PROMPT_CACHE_MAX_ENTRIES");
        }
    }

    #[test]
    fn test_config_error_display() {
        let missing = ConfigError::MissingVar("OPENAI_API_KEY".to_string());
        assert_eq!(
            format!("{}", missing),
            "Missing environment variable: OPENAI_API_KEY"
        );

        let invalid = ConfigError::InvalidValue("RUST_LOG".to_string(), "bad".to_string());
        assert_eq!(
            format!("{}", invalid),
            "Invalid value for environment variable RUST_LOG: bad"
        );
    }

    #[test]
    #[serial]
    fn test_config_from_env_minimal() {
        clear_env_vars();
        unsafe {
            env::set_var("OPENAI_API_KEY", "test-key");
        }

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.openai_api_key, "test-key");
        assert_eq!(config.api_base, None);
        assert_eq!(config.chat_model, "gpt-4o");
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert_eq!(config.cache_max_entries, 128);
    }

    #[test]
    #[serial]
    fn test_config_from_env_custom_values() {
        clear_env_vars();
        unsafe {
            env::set_var("OPENAI_API_KEY", "custom-key");
            env::set_var("OPENAI_API_BASE", "http://localhost:11434/v1");
            env::set_var("CHAT_MODEL", "gpt-4o-mini");
            env::set_var("RUST_LOG", "debug");
            env::set_var("PROMPT_CACHE_TTL_SECS", "60");
            env::set_var("PROMPT_CACHE_MAX_ENTRIES", "16");
        }

        let config = Config::from_env().expect("Config should load successfully");

        assert_eq!(config.api_base.as_deref(), Some("http://localhost:11434/v1"));
        assert_eq!(config.chat_model, "gpt-4o-mini");
        assert_eq!(config.log_level, Level::DEBUG);
        assert_eq!(config.cache_ttl, Duration::from_secs(60));
        assert_eq!(config.cache_max_entries, 16);
    }

    #[test]
    #[serial]
    fn test_config_missing_api_key() {
        clear_env_vars();

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::MissingVar(var) => assert_eq!(var, "OPENAI_API_KEY"),
            _ => panic!("Expected MissingVar for OPENAI_API_KEY"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_log_level() {
        clear_env_vars();
        unsafe {
            env::set_var("OPENAI_API_KEY", "test-key");
            env::set_var("RUST_LOG", "not-a-level");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "RUST_LOG"),
            _ => panic!("Expected InvalidValue for RUST_LOG"),
        }
    }

    #[test]
    #[serial]
    fn test_config_invalid_cache_ttl() {
        clear_env_vars();
        unsafe {
            env::set_var("OPENAI_API_KEY", "test-key");
            env::set_var("PROMPT_CACHE_TTL_SECS", "soon");
        }

        let err = Config::from_env().unwrap_err();
        match err {
            ConfigError::InvalidValue(var, _) => assert_eq!(var, "PROMPT_CACHE_TTL_SECS"),
            _ => panic!("Expected InvalidValue for PROMPT_CACHE_TTL_SECS"),
        }
    }
}
