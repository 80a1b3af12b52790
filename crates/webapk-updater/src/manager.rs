//! [`UpdateManager`] — runs check cycles and pending updates for installed
//! apps.
//!
//! A check cycle loads the record, asks the policy whether a check is due,
//! fetches the manifest under a timeout, and persists whatever the policy
//! decides. Scheduling always records a pessimistic failure first, so a crash
//! between scheduling and dispatch leaves the app marked for retry.

use std::{
  io::ErrorKind,
  path::{Path, PathBuf},
  time::Duration,
};

use chrono::{DateTime, Utc};
use uuid::Uuid;
use webapk_core::{
  app::{AppId, InstalledAppRecord},
  collab::{
    DispatchOutcome, FetchOutcome, ManifestFetcher, UpdateConstraints,
    UpdateDispatcher, UpdateRequest, UpdateScheduler,
  },
  lifecycle::{UpdateEvent, UpdateResult, UpdateState},
  manifest::FetchedManifestData,
  policy::{CheckOutcome, UpdatePolicy},
  reason::UpdateReason,
  store::AppRecordStore,
};

use crate::{Error, Result};

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// What a single call to [`UpdateManager::check_for_update`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckReport {
  /// No check was due.
  Skipped,
  NoChange,
  /// Nothing changed; a previously failed update was marked successful.
  MarkedSuccess,
  Scheduled {
    reason:         UpdateReason,
    stale_manifest: bool,
    request_path:   PathBuf,
  },
}

pub struct UpdateManager<S, F, D, C> {
  policy:        UpdatePolicy,
  store:         S,
  fetcher:       F,
  dispatcher:    D,
  scheduler:     C,
  fetch_timeout: Duration,
  pending_dir:   PathBuf,
}

impl<S, F, D, C> UpdateManager<S, F, D, C>
where
  S: AppRecordStore,
  F: ManifestFetcher,
  D: UpdateDispatcher,
  C: UpdateScheduler,
{
  pub fn new(
    policy: UpdatePolicy,
    store: S,
    fetcher: F,
    dispatcher: D,
    scheduler: C,
    pending_dir: impl Into<PathBuf>,
  ) -> Self {
    Self {
      policy,
      store,
      fetcher,
      dispatcher,
      scheduler,
      fetch_timeout: DEFAULT_FETCH_TIMEOUT,
      pending_dir: pending_dir.into(),
    }
  }

  pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
    self.fetch_timeout = timeout;
    self
  }

  pub fn policy(&self) -> &UpdatePolicy { &self.policy }

  pub fn store(&self) -> &S { &self.store }

  async fn load(&self, id: &AppId) -> Result<InstalledAppRecord> {
    self
      .store
      .get(id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::AppNotFound(id.clone()))
  }

  // ── Checks ──────────────────────────────────────────────────────────────

  /// Run one check cycle for `id` at `now`.
  pub async fn check_for_update(
    &self,
    id: &AppId,
    now: DateTime<Utc>,
  ) -> Result<CheckReport> {
    let record = self.load(id).await?;
    if !self.policy.should_check_for_update(&record, now) {
      tracing::debug!(app_id = %id, "update check not due");
      return Ok(CheckReport::Skipped);
    }

    let state = advance(id, UpdateState::CheckDue, UpdateEvent::FetchStarted);
    let fetched = self.fetch_manifest(&record).await;
    self.store.record_check(id, now).await.map_err(Error::store)?;

    let reason = self.policy.needs_update(
      &record,
      fetched.as_ref(),
      fetched.as_ref().and_then(FetchedManifestData::primary_icon_url),
      fetched.as_ref().and_then(FetchedManifestData::badge_icon_url),
    );
    let state = advance(id, state, UpdateEvent::Evaluated {
      needs_update: reason.needs_update(),
    });
    tracing::info!(
      app_id = %id,
      reason = reason.as_str(),
      got_manifest = fetched.is_some(),
      "update check finished"
    );

    match self.policy.on_check_completed(&record, fetched, reason) {
      CheckOutcome::NoChange => {
        advance(id, state, UpdateEvent::Finished(UpdateResult::Success));
        Ok(CheckReport::NoChange)
      }
      CheckOutcome::MarkSuccess => {
        let completion = self.policy.completion(UpdateResult::Success, false, now);
        self
          .store
          .record_update_completion(id, completion)
          .await
          .map_err(Error::store)?;
        advance(id, state, UpdateEvent::Finished(UpdateResult::Success));
        Ok(CheckReport::MarkedSuccess)
      }
      CheckOutcome::ScheduleUpdate { reason, stale_manifest, manifest } => {
        self
          .store
          .record_update_completion(id, self.policy.pessimistic_failure(now))
          .await
          .map_err(Error::store)?;

        let request = UpdateRequest::new(
          &record,
          manifest,
          reason,
          stale_manifest,
          self.policy.current_shell_version,
          now,
        );
        let request_path = self.write_request(&request).await?;
        // The record must never point at a deleted file.
        if let Err(e) = self
          .store
          .set_pending_update(id, Some(request_path.clone()))
          .await
        {
          remove_request_file(&request_path).await;
          return Err(Error::store(e));
        }
        if let Some(previous) = &record.pending_update_path {
          remove_request_file(previous).await;
        }
        self
          .scheduler
          .schedule(id, UpdateConstraints::default())
          .await
          .map_err(|e| Error::Schedule(Box::new(e)))?;
        advance(id, state, UpdateEvent::Scheduled);

        Ok(CheckReport::Scheduled { reason, stale_manifest, request_path })
      }
    }
  }

  /// Check every registered app. Per-app failures are logged and skipped.
  pub async fn check_all(&self, now: DateTime<Utc>) -> Result<Vec<(AppId, CheckReport)>> {
    let records = self.store.list().await.map_err(Error::store)?;
    let mut reports = Vec::with_capacity(records.len());
    for record in records {
      match self.check_for_update(&record.app_id, now).await {
        Ok(report) => reports.push((record.app_id, report)),
        Err(e) => tracing::error!(app_id = %record.app_id, "update check failed: {e}"),
      }
    }
    Ok(reports)
  }

  /// Fetch under the configured timeout. Timeouts and failures yield `None`.
  async fn fetch_manifest(
    &self,
    record: &InstalledAppRecord,
  ) -> Option<FetchedManifestData> {
    let fetch = self.fetcher.fetch(&record.scope, &record.manifest_url);
    match tokio::time::timeout(self.fetch_timeout, fetch).await {
      Ok(FetchOutcome::Failed(reason)) => {
        tracing::warn!(app_id = %record.app_id, "manifest fetch failed: {reason}");
        None
      }
      Ok(outcome) => outcome.into_data(),
      Err(_) => {
        tracing::warn!(
          app_id = %record.app_id,
          timeout_secs = self.fetch_timeout.as_secs_f64(),
          "manifest fetch timed out"
        );
        None
      }
    }
  }

  async fn write_request(&self, request: &UpdateRequest) -> Result<PathBuf> {
    tokio::fs::create_dir_all(&self.pending_dir)
      .await
      .map_err(|e| Error::io(&self.pending_dir, e))?;
    let path = self.pending_dir.join(format!("{}.json", Uuid::new_v4()));
    tokio::fs::write(&path, request.to_json()?)
      .await
      .map_err(|e| Error::io(&path, e))?;
    Ok(path)
  }

  // ── Pending updates ─────────────────────────────────────────────────────

  /// Dispatch the pending update of `id`, if any, and record the outcome.
  pub async fn run_pending_update(
    &self,
    id: &AppId,
    now: DateTime<Utc>,
  ) -> Result<Option<DispatchOutcome>> {
    let record = self.load(id).await?;
    let Some(path) = record.pending_update_path else {
      return Ok(None);
    };

    let outcome = match read_request(&path).await {
      Ok(request) => {
        advance(id, UpdateState::UpdateScheduled, UpdateEvent::Dispatched);
        let outcome = self.dispatcher.dispatch(&request).await;
        self.record_outcome(id, outcome, now).await?;
        if outcome.result.is_success() {
          let mut installed = request.manifest;
          installed.icon_hashes = installed.hashes_to_store(&record.icon_hashes);
          self
            .store
            .apply_manifest(id, &installed, request.new_shell_version)
            .await
            .map_err(Error::store)?;
        }
        outcome
      }
      Err(e) => {
        tracing::warn!(app_id = %id, "dropping unreadable update request: {e}");
        let outcome = DispatchOutcome::failed(UpdateResult::Failure);
        self.record_outcome(id, outcome, now).await?;
        outcome
      }
    };

    remove_request_file(&path).await;
    self
      .store
      .set_pending_update(id, None)
      .await
      .map_err(Error::store)?;
    advance(
      id,
      UpdateState::UpdateAttempted,
      UpdateEvent::Finished(outcome.result),
    );
    Ok(Some(outcome))
  }

  /// Run every pending update. Per-app failures are logged and skipped.
  pub async fn run_all_pending(
    &self,
    now: DateTime<Utc>,
  ) -> Result<Vec<(AppId, DispatchOutcome)>> {
    let records = self.store.list().await.map_err(Error::store)?;
    let mut outcomes = vec![];
    for record in records.into_iter().filter(|r| r.pending_update_path.is_some()) {
      match self.run_pending_update(&record.app_id, now).await {
        Ok(Some(outcome)) => outcomes.push((record.app_id, outcome)),
        Ok(None) => {}
        Err(e) => tracing::error!(app_id = %record.app_id, "pending update failed: {e}"),
      }
    }
    Ok(outcomes)
  }

  async fn record_outcome(
    &self,
    id: &AppId,
    outcome: DispatchOutcome,
    now: DateTime<Utc>,
  ) -> Result<()> {
    let completion = self.policy.completion(outcome.result, outcome.relax_updates, now);
    self
      .store
      .record_update_completion(id, completion)
      .await
      .map_err(Error::store)
  }

  // ── Uninstall ───────────────────────────────────────────────────────────

  /// Drop the record (and any pending request) of an uninstalled app.
  pub async fn forget(&self, id: &AppId) -> Result<bool> {
    if let Some(record) = self.store.get(id).await.map_err(Error::store)?
      && let Some(path) = &record.pending_update_path
    {
      remove_request_file(path).await;
    }
    self.store.remove(id).await.map_err(Error::store)
  }
}

fn advance(id: &AppId, state: UpdateState, event: UpdateEvent) -> UpdateState {
  match state.advance(event) {
    Some(next) => {
      tracing::debug!(app_id = %id, from = state.as_str(), to = next.as_str(), "update state");
      next
    }
    None => {
      tracing::warn!(app_id = %id, state = state.as_str(), ?event, "unexpected update event");
      state
    }
  }
}

async fn read_request(path: &Path) -> Result<UpdateRequest> {
  let bytes = tokio::fs::read(path).await.map_err(|e| Error::io(path, e))?;
  Ok(UpdateRequest::from_json(&bytes)?)
}

async fn remove_request_file(path: &Path) {
  match tokio::fs::remove_file(path).await {
    Ok(()) => {}
    Err(e) if e.kind() == ErrorKind::NotFound => {}
    Err(e) => tracing::warn!(path = %path.display(), "could not remove update request: {e}"),
  }
}
