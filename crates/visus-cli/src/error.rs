use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] visus_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No customer with sync id {0}")]
    CustomerNotFound(String),
    #[error("{0} must not be empty")]
    EmptyField(&'static str),
}
