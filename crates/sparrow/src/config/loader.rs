use std::path::Path;

use secrecy::SecretString;

use crate::config::schema::Config;
use crate::error::ConfigError;

const SCHEMA_JSON: &str = include_str!("../../../../schema/config-v1.json");

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let json_value: serde_json::Value = serde_json::from_str(content)?;

    validate_schema(&json_value)?;

    let config: Config = serde_json::from_value(json_value)?;

    validate_config(&config)?;

    Ok(config)
}

/// Resolves a secret from the environment variable named in the config.
pub fn resolve_secret(env_var: &str) -> Result<SecretString, ConfigError> {
    match std::env::var(env_var) {
        Ok(value) if !value.trim().is_empty() => Ok(SecretString::from(value)),
        _ => Err(ConfigError::MissingSecret(env_var.to_string())),
    }
}

fn validate_schema(json_value: &serde_json::Value) -> Result<(), ConfigError> {
    let schema: serde_json::Value =
        serde_json::from_str(SCHEMA_JSON).map_err(|e| ConfigError::Validation {
            message: format!("Invalid embedded schema JSON: {}", e),
        })?;

    let compiled =
        jsonschema::JSONSchema::compile(&schema).map_err(|e| ConfigError::Validation {
            message: format!("Failed to compile JSON schema: {}", e),
        })?;

    let result = compiled.validate(json_value);
    if let Err(errors) = result {
        let error_messages: Vec<String> = errors
            .map(|e| format!("{} at {}", e, e.instance_path))
            .collect();
        return Err(ConfigError::SchemaValidation {
            errors: error_messages.join("; "),
        });
    }

    Ok(())
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Validate version
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.backoff.max_secs < config.backoff.base_secs {
        return Err(ConfigError::Validation {
            message: format!(
                "backoff.max_secs ({}) must be >= backoff.base_secs ({})",
                config.backoff.max_secs, config.backoff.base_secs
            ),
        });
    }

    if config.telegram.bot_token_env.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "telegram.bot_token_env must not be empty".to_string(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_valid_config() {
        let config_json = r#"
        {
            "version": "1.0",
            "poll_interval_secs": 120,
            "telegram": { "bot_token_env": "SPARROW_BOT_TOKEN" }
        }
        "#;

        let config = load_config_from_str(config_json).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.poll_interval_secs, 120);
        assert_eq!(config.telegram.bot_token_env, "SPARROW_BOT_TOKEN");
    }

    #[test]
    fn test_load_full_config() {
        let config_json = r#"
        {
            "version": "1.0",
            "database_path": "/tmp/sparrow.db",
            "poll_interval_secs": 60,
            "max_messages_per_cycle": 25,
            "max_concurrent_summaries": 2,
            "backoff": { "base_secs": 10, "max_secs": 600 },
            "telegram": {
                "bot_token_env": "BOT_TOKEN",
                "api_base": "https://api.telegram.org",
                "timeout_secs": 20
            },
            "summarizer": {
                "endpoint": "http://localhost:11434/api/chat",
                "model": "sum",
                "timeout_secs": 90,
                "max_body_chars": 2000,
                "cache_retention_days": 30
            },
            "gmail": {
                "api_base": "https://gmail.googleapis.com",
                "timeout_secs": 15
            }
        }
        "#;

        let config = load_config_from_str(config_json).unwrap();
        assert_eq!(config.database_path.as_deref(), Some("/tmp/sparrow.db"));
        assert_eq!(config.max_messages_per_cycle, 25);
        assert_eq!(config.backoff.base_secs, 10);
        assert_eq!(config.summarizer.max_body_chars, 2000);
        assert_eq!(config.gmail.timeout_secs, 15);
    }

    #[test]
    fn test_invalid_version() {
        let config_json = r#"
        {
            "version": "2.0",
            "telegram": { "bot_token_env": "BOT_TOKEN" }
        }
        "#;

        let result = load_config_from_str(config_json);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_telegram_section() {
        let config_json = r#"{ "version": "1.0" }"#;

        let result = load_config_from_str(config_json);
        assert!(result.is_err());
    }

    #[test]
    fn test_backoff_max_below_base_rejected() {
        let config_json = r#"
        {
            "version": "1.0",
            "backoff": { "base_secs": 120, "max_secs": 60 },
            "telegram": { "bot_token_env": "BOT_TOKEN" }
        }
        "#;

        let result = load_config_from_str(config_json);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let config_json = r#"
        {
            "version": "1.0",
            "telegram": { "bot_token_env": "BOT_TOKEN" },
            "unknown_field": true
        }
        "#;

        let result = load_config_from_str(config_json);
        assert!(result.is_err());
    }

    #[test]
    fn test_resolve_secret_missing() {
        let result = resolve_secret("SPARROW_TEST_VAR_THAT_DOES_NOT_EXIST");
        assert!(matches!(result, Err(ConfigError::MissingSecret(_))));
    }
}
