//! Runtime configuration, read from a TOML file and `WEBAPK_*` environment
//! variables.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use chrono::TimeDelta;
use config::ConfigError;
use serde::Deserialize;
use webapk_core::{app::ShellVersion, policy::UpdatePolicy};

#[derive(Deserialize, Clone, Debug)]
pub struct UpdaterConfig {
  #[serde(default = "default_store_path")]
  pub store_path:             PathBuf,
  /// Directory holding serialized update requests awaiting dispatch.
  #[serde(default = "default_pending_dir")]
  pub pending_dir:            PathBuf,
  pub current_shell_version:  ShellVersion,
  pub update_server_url:      String,
  #[serde(default = "default_check_interval_hours")]
  pub check_interval_hours:   i64,
  #[serde(default = "default_relaxed_interval_hours")]
  pub relaxed_interval_hours: i64,
  #[serde(default = "default_retry_interval_hours")]
  pub retry_interval_hours:   i64,
  #[serde(default = "default_fetch_timeout_secs")]
  pub fetch_timeout_secs:     u64,
}

fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/webapk/apps.db") }
fn default_pending_dir() -> PathBuf { PathBuf::from("~/.local/share/webapk/pending") }
fn default_check_interval_hours() -> i64 { 3 * 24 }
fn default_relaxed_interval_hours() -> i64 { 30 * 24 }
fn default_retry_interval_hours() -> i64 { 12 }
fn default_fetch_timeout_secs() -> u64 { 30 }

impl UpdaterConfig {
  /// Layer `path` (optional) under `WEBAPK_*` environment variables.
  ///
  /// Intervals and the fetch timeout are validated here, so [`Self::policy`]
  /// cannot fail on a loaded config.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let cfg: Self = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("WEBAPK").try_parsing(true))
      .build()?
      .try_deserialize()?;
    cfg.policy()?;
    if cfg.fetch_timeout_secs == 0 {
      return Err(ConfigError::Message("fetch_timeout_secs must be positive".into()));
    }
    Ok(cfg)
  }

  pub fn policy(&self) -> Result<UpdatePolicy, ConfigError> {
    Ok(UpdatePolicy {
      current_shell_version:  self.current_shell_version,
      check_interval:         interval("check_interval_hours", self.check_interval_hours)?,
      relaxed_check_interval: interval("relaxed_interval_hours", self.relaxed_interval_hours)?,
      retry_interval:         interval("retry_interval_hours", self.retry_interval_hours)?,
    })
  }

  pub fn fetch_timeout(&self) -> Duration { Duration::from_secs(self.fetch_timeout_secs) }

  pub fn resolved_store_path(&self) -> PathBuf { expand_tilde(&self.store_path) }

  pub fn resolved_pending_dir(&self) -> PathBuf { expand_tilde(&self.pending_dir) }
}

fn interval(key: &str, hours: i64) -> Result<TimeDelta, ConfigError> {
  match TimeDelta::try_hours(hours) {
    Some(d) if hours > 0 => Ok(d),
    _ => Err(ConfigError::Message(format!(
      "{key} must be a positive number of hours, got {hours}"
    ))),
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
