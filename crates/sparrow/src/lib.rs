pub mod config;
pub mod db;
pub mod delivery;
pub mod error;
pub mod ledger;
pub mod mail;
pub mod pipeline;
pub mod registry;
pub mod scheduler;
pub mod summarizer;

pub use config::{load_config, resolve_secret, Config};
pub use db::{Database, DatabaseError};
pub use delivery::{DeliveryError, DeliverySink, TelegramSink};
pub use error::{ConfigError, Result, SparrowError};
pub use ledger::DedupLedger;
pub use mail::{
    AccessTokenProvider, EnvTokenProvider, GmailClient, MailError, MailFetcher, UnreadMessage,
};
pub use pipeline::{CycleReport, MailPipeline, PipelineError};
pub use registry::{Account, AccountRegistry, RegistryError};
pub use scheduler::{AccountPollStatus, AccountState, LastCycle, PollScheduler};
pub use summarizer::{OllamaClient, Summarizer, SummarizerError, Summary};
