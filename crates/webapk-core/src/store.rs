//! The `AppRecordStore` trait.
//!
//! Implemented by storage backends (e.g. `webapk-store-sqlite`). The update
//! driver depends on this abstraction and receives the store as an explicit
//! handle; there is no process-wide registry.
//!
//! Callers are expected to serialise writes per app id. The store itself only
//! guarantees that each method is applied atomically.

use std::{future::Future, path::PathBuf};

use chrono::{DateTime, Utc};

use crate::{
  app::{AppId, InstalledAppRecord, NewApp, ShellVersion},
  lifecycle::UpdateCompletion,
  manifest::FetchedManifestData,
};

/// Abstraction over a persisted installed-app registry.
///
/// Methods addressing an unknown id fail with the backend's "app not found"
/// error.
pub trait AppRecordStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Persist a newly installed app. Fails if the id is already registered.
  fn register(
    &self,
    app: NewApp,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<InstalledAppRecord, Self::Error>> + Send + '_;

  /// Retrieve a record by id. Returns `None` if not found.
  fn get<'a>(
    &'a self,
    id: &'a AppId,
  ) -> impl Future<Output = Result<Option<InstalledAppRecord>, Self::Error>>
  + Send
  + 'a;

  /// All records, ordered by id.
  fn list(
    &self,
  ) -> impl Future<Output = Result<Vec<InstalledAppRecord>, Self::Error>> + Send + '_;

  /// Stamp the time of the latest manifest check.
  fn record_check<'a>(
    &'a self,
    id: &'a AppId,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Write all fields of `completion` in one transaction.
  fn record_update_completion<'a>(
    &'a self,
    id: &'a AppId,
    completion: UpdateCompletion,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn set_pending_update<'a>(
    &'a self,
    id: &'a AppId,
    path: Option<PathBuf>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn set_dismissed_disclosure<'a>(
    &'a self,
    id: &'a AppId,
    dismissed: bool,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Replace the stored manifest snapshot and shell version after an update
  /// was installed.
  fn apply_manifest<'a>(
    &'a self,
    id: &'a AppId,
    manifest: &'a FetchedManifestData,
    shell_version: ShellVersion,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Delete the record of an uninstalled app. Returns whether it existed.
  fn remove<'a>(
    &'a self,
    id: &'a AppId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;
}
