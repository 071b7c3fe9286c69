//! Shared configuration and record types for the feedtag pipeline.

pub mod app_config;
pub mod config;
pub mod records;
pub mod tags;

use thiserror::Error;

pub use app_config::{AppConfig, SheetConfig, ShortenerConfig};
pub use config::{load_app_config, load_app_config_from_env};
pub use records::{CorpusDocument, FeedRecord, TaggedRecord};
pub use tags::{CorpusMatch, Prediction, TagField};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
