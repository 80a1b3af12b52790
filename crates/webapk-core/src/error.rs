//! Error types for `webapk-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown display mode: {0:?}")]
  UnknownDisplayMode(String),

  #[error("unknown orientation: {0:?}")]
  UnknownOrientation(String),

  #[error("unknown update reason: {0:?}")]
  UnknownReason(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
