use std::io;

use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Database(#[from] rusqlite::Error),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("{0}")]
    Config(String),
    #[error("coordinate out of range: lat={latitude}, lon={longitude}")]
    InvalidCoordinate { latitude: f64, longitude: f64 },
    #[error("invalid postal code: {0}")]
    InvalidPostalCode(String),
    #[error("{provider} did not answer within {after_ms} ms")]
    Timeout { provider: &'static str, after_ms: u64 },
    #[error("{0}")]
    Provider(String),
}
