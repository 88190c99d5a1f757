//! Service configuration: JSON config file validated against an
//! embedded JSON Schema, with secrets resolved from the environment.

pub mod loader;
pub mod schema;

pub use loader::{load_config, load_config_from_str, resolve_secret};
pub use schema::{BackoffConfig, Config, GmailConfig, SummarizerConfig, TelegramConfig};
