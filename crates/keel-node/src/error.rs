//! Node-level errors.
use thiserror::Error;

use keel_core::error::ChainError;

#[derive(Error, Debug)]
pub enum NodeError {
    #[error(transparent)] Chain(#[from] ChainError),
    #[error("metrics: {0}")] Metrics(#[from] prometheus::Error),
    #[error("io: {0}")] Io(#[from] std::io::Error),
    #[error("config: {0}")] Config(String),
}
