use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SparrowError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Registry error: {0}")]
    Registry(#[from] crate::registry::RegistryError),

    #[error("Mail error: {0}")]
    Mail(#[from] crate::mail::MailError),

    #[error("Summarizer error: {0}")]
    Summarizer(#[from] crate::summarizer::SummarizerError),

    #[error("Delivery error: {0}")]
    Delivery(#[from] crate::delivery::DeliveryError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Environment variable '{0}' is not set")]
    MissingSecret(String),
}

pub type Result<T> = std::result::Result<T, SparrowError>;
