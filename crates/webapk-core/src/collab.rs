//! Asynchronous collaborators of the update driver: manifest fetching, update
//! dispatch, and deferred scheduling.
//!
//! Each returns an explicit result type instead of reporting through
//! callbacks.

use std::{future::Future, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  app::{AppId, InstalledAppRecord, ShellVersion},
  lifecycle::UpdateResult,
  manifest::FetchedManifestData,
  reason::UpdateReason,
};

// ─── Fetch ───────────────────────────────────────────────────────────────────

/// Result of fetching an app's live manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
  Data(FetchedManifestData),
  /// No usable manifest was found (includes timeouts).
  NoData,
  /// The fetch could not be performed at all.
  Failed(String),
}

impl FetchOutcome {
  /// The policy treats every non-`Data` outcome the same way.
  pub fn into_data(self) -> Option<FetchedManifestData> {
    match self {
      Self::Data(d) => Some(d),
      Self::NoData | Self::Failed(_) => None,
    }
  }
}

pub trait ManifestFetcher: Send + Sync {
  /// Fetch the manifest at `manifest_url` for an app installed with `scope`.
  /// The caller bounds the call with a timeout.
  fn fetch<'a>(
    &'a self,
    scope: &'a str,
    manifest_url: &'a str,
  ) -> impl Future<Output = FetchOutcome> + Send + 'a;
}

// ─── Dispatch ────────────────────────────────────────────────────────────────

/// Payload sent to the update server. Also the on-disk form of a pending
/// request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRequest {
  pub app_id:            AppId,
  pub manifest:          FetchedManifestData,
  pub reason:            UpdateReason,
  /// Numeric form of `reason`.
  pub reason_code:       u8,
  /// The server should prefer its own manifest copy if it is newer.
  pub stale_manifest:    bool,
  pub old_shell_version: Option<ShellVersion>,
  pub new_shell_version: ShellVersion,
  pub created_at:        DateTime<Utc>,
}

impl UpdateRequest {
  pub fn new(
    record: &InstalledAppRecord,
    manifest: FetchedManifestData,
    reason: UpdateReason,
    stale_manifest: bool,
    new_shell_version: ShellVersion,
    now: DateTime<Utc>,
  ) -> Self {
    Self {
      app_id: record.app_id.clone(),
      manifest,
      reason,
      reason_code: reason.code(),
      stale_manifest,
      old_shell_version: record.shell_version,
      new_shell_version,
      created_at: now,
    }
  }

  pub fn to_json(&self) -> crate::Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(self)?)
  }

  pub fn from_json(bytes: &[u8]) -> crate::Result<Self> {
    Ok(serde_json::from_slice(bytes)?)
  }
}

/// What the update server answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOutcome {
  pub result:        UpdateResult,
  /// The server asked for less frequent checks of this app.
  pub relax_updates: bool,
}

impl DispatchOutcome {
  pub fn failed(result: UpdateResult) -> Self {
    Self { result, relax_updates: false }
  }
}

pub trait UpdateDispatcher: Send + Sync {
  /// Send `request`. Failures are reported in the outcome, never as errors.
  fn dispatch<'a>(
    &'a self,
    request: &'a UpdateRequest,
  ) -> impl Future<Output = DispatchOutcome> + Send + 'a;
}

// ─── Scheduling ──────────────────────────────────────────────────────────────

/// Device conditions under which a scheduled update may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateConstraints {
  pub requires_network:  bool,
  pub requires_charging: bool,
  pub one_off:           bool,
  /// Earliest start, relative to scheduling time.
  pub window_start:      Duration,
  /// Latest start, relative to scheduling time.
  pub window_end:        Duration,
}

impl Default for UpdateConstraints {
  fn default() -> Self {
    Self {
      requires_network:  true,
      requires_charging: true,
      one_off:           true,
      window_start:      Duration::ZERO,
      window_end:        Duration::from_secs(23 * 60 * 60),
    }
  }
}

pub trait UpdateScheduler: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Ask for the pending update of `id` to run once `constraints` allow.
  fn schedule<'a>(
    &'a self,
    id: &'a AppId,
    constraints: UpdateConstraints,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}
