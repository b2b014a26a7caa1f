//! Error types for Anzuelo

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Data error: {0}")]
    Data(String),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("Model load error: {0}")]
    ModelLoad(String),

    #[error("No base tensor matches the configured target modules: {0}")]
    IncompatibleTargets(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

pub type Result<T> = std::result::Result<T, Error>;
