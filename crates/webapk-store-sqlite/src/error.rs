//! Error type for `webapk-store-sqlite`.

use thiserror::Error;
use webapk_core::app::AppId;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("app not found: {0}")]
  AppNotFound(AppId),

  #[error("app is already registered: {0}")]
  AlreadyRegistered(AppId),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
