//! Error type for `webapk-updater`.

use std::path::PathBuf;

use thiserror::Error;
use webapk_core::app::AppId;

#[derive(Debug, Error)]
pub enum Error {
  #[error("app not found: {0}")]
  AppNotFound(AppId),

  #[error("core error: {0}")]
  Core(#[from] webapk_core::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("scheduler error: {0}")]
  Schedule(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("i/o error on {path:?}: {source}")]
  Io {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("http client error: {0}")]
  Http(#[from] reqwest::Error),
}

impl Error {
  pub(crate) fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }

  pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
    Self::Io { path: path.into(), source }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
