use thiserror::Error;
use tpccore::error::CoreError;

pub type Result<T> = std::result::Result<T, ImgError>;

#[derive(Debug, Error)]
pub enum ImgError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("data inconsistency: {0}")]
    DataInconsistency(String),
    #[error("numeric failure: {0}")]
    Numeric(String),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("malformed configuration json: {0}")]
    Json(#[from] serde_json::Error),
}

impl ImgError {
    pub fn config(msg: impl Into<String>) -> Self {
        ImgError::Config(msg.into())
    }

    pub fn inconsistency(msg: impl Into<String>) -> Self {
        ImgError::DataInconsistency(msg.into())
    }
}
