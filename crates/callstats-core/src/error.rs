// crates/callstats-core/src/error.rs

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("input is missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Config file could not be parsed: {0}")]
    ConfigToml(#[from] toml::de::Error),

    #[error("Object storage error: {0}")]
    Bucket(#[from] callstats_bucket::BucketError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
