//! The update policy: when to re-check an installed app, whether a re-check
//! found a material change, and what to do about it.
//!
//! Everything here is pure. Callers supply the clock and perform the writes
//! the returned decisions call for.

use chrono::{DateTime, TimeDelta, Utc};

use crate::{
  app::{InstalledAppRecord, ShellVersion},
  lifecycle::{UpdateCompletion, UpdateResult, UpdateState},
  manifest::{
    FetchedManifestData, find_hash_ignoring_fragment, urls_match_ignoring_fragment,
  },
  reason::UpdateReason,
};

pub const DEFAULT_CHECK_INTERVAL: TimeDelta = TimeDelta::days(3);
pub const DEFAULT_RELAXED_CHECK_INTERVAL: TimeDelta = TimeDelta::days(30);
pub const DEFAULT_RETRY_INTERVAL: TimeDelta = TimeDelta::hours(12);

// ─── Decisions ───────────────────────────────────────────────────────────────

/// What to do once a check has produced an [`UpdateReason`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
  /// Nothing changed and there is no failure state to clear.
  NoChange,
  /// Nothing changed, but the previous update had failed: record success so
  /// the retry timer stops firing.
  MarkSuccess,
  /// Request an update. The caller must persist
  /// [`UpdatePolicy::pessimistic_failure`] before scheduling it.
  ScheduleUpdate {
    reason:         UpdateReason,
    /// `true` when no fresh manifest was available; the server should prefer
    /// its own copy of the manifest if it is newer.
    stale_manifest: bool,
    manifest:       FetchedManifestData,
  },
}

// ─── Policy ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePolicy {
  /// Shell version this updater would install today.
  pub current_shell_version:  ShellVersion,
  pub check_interval:         TimeDelta,
  /// Used instead of `check_interval` when the server asked to relax updates.
  pub relaxed_check_interval: TimeDelta,
  /// Minimum wait after a failed update before trying again.
  pub retry_interval:         TimeDelta,
}

impl UpdatePolicy {
  pub fn new(current_shell_version: ShellVersion) -> Self {
    Self {
      current_shell_version,
      check_interval: DEFAULT_CHECK_INTERVAL,
      relaxed_check_interval: DEFAULT_RELAXED_CHECK_INTERVAL,
      retry_interval: DEFAULT_RETRY_INTERVAL,
    }
  }

  /// A missing shell version counts as stale.
  pub fn is_shell_stale(&self, record: &InstalledAppRecord) -> bool {
    record
      .shell_version
      .is_none_or(|v| v < self.current_shell_version)
  }

  /// Whether a manifest re-check is due at `now`.
  pub fn should_check_for_update(
    &self,
    record: &InstalledAppRecord,
    now: DateTime<Utc>,
  ) -> bool {
    // A shell upgrade triggers at most one check per new shell version.
    if self.is_shell_stale(record)
      && record
        .last_requested_shell_version
        .is_none_or(|v| self.current_shell_version > v)
    {
      return true;
    }

    let interval = if record.relaxed_updates {
      self.relaxed_check_interval
    } else {
      self.check_interval
    };
    let Some(last_check) = record.last_check_at else {
      return true;
    };
    if now - last_check >= interval {
      return true;
    }

    if record.last_update_succeeded {
      return false;
    }
    record
      .last_update_completed_at
      .is_none_or(|done| now - done >= self.retry_interval)
  }

  /// Compare the installed record against freshly fetched data.
  ///
  /// `primary_icon_url` and `badge_icon_url` are the icons chosen from the
  /// fetched manifest. Their fetched hashes are looked up by exact URL and the
  /// installed hashes by URL ignoring the fragment.
  pub fn needs_update(
    &self,
    old: &InstalledAppRecord,
    fetched: Option<&FetchedManifestData>,
    primary_icon_url: Option<&str>,
    badge_icon_url: Option<&str>,
  ) -> UpdateReason {
    if self.is_shell_stale(old) {
      return UpdateReason::StaleShellVersion;
    }
    let Some(fetched) = fetched else {
      return UpdateReason::None;
    };

    let icon_differs = |url: Option<&str>| {
      let new_hash =
        url.and_then(|u| fetched.icon_hashes.get(u).map(String::as_str));
      let old_hash =
        url.and_then(|u| find_hash_ignoring_fragment(&old.icon_hashes, u));
      new_hash != old_hash
    };

    if icon_differs(primary_icon_url) {
      UpdateReason::PrimaryIconDiffers
    } else if icon_differs(badge_icon_url) {
      UpdateReason::BadgeIconDiffers
    } else if !urls_match_ignoring_fragment(&old.scope, &fetched.scope) {
      UpdateReason::ScopeDiffers
    } else if !urls_match_ignoring_fragment(&old.start_url, &fetched.start_url) {
      UpdateReason::StartUrlDiffers
    } else if old.short_name != fetched.short_name {
      UpdateReason::ShortNameDiffers
    } else if old.name != fetched.name {
      UpdateReason::NameDiffers
    } else if old.background_color != fetched.background_color {
      UpdateReason::BackgroundColorDiffers
    } else if old.theme_color != fetched.theme_color {
      UpdateReason::ThemeColorDiffers
    } else if old.orientation != fetched.orientation {
      UpdateReason::OrientationDiffers
    } else if old.display != fetched.display {
      UpdateReason::DisplayModeDiffers
    } else {
      UpdateReason::None
    }
  }

  /// Turn a computed reason into the action the driver should take.
  pub fn on_check_completed(
    &self,
    record: &InstalledAppRecord,
    fetched: Option<FetchedManifestData>,
    reason: UpdateReason,
  ) -> CheckOutcome {
    if !reason.needs_update() {
      return if record.last_update_succeeded {
        CheckOutcome::NoChange
      } else {
        CheckOutcome::MarkSuccess
      };
    }

    match fetched {
      Some(manifest) => CheckOutcome::ScheduleUpdate {
        reason,
        stale_manifest: false,
        manifest,
      },
      None => CheckOutcome::ScheduleUpdate {
        reason,
        stale_manifest: true,
        manifest: FetchedManifestData::from_record(record),
      },
    }
  }

  /// The atomic write recorded once an update attempt finishes.
  pub fn completion(
    &self,
    result: UpdateResult,
    relax_updates: bool,
    now: DateTime<Utc>,
  ) -> UpdateCompletion {
    UpdateCompletion {
      completed_at: now,
      succeeded: result.is_success(),
      relax_updates,
      requested_shell_version: self.current_shell_version,
    }
  }

  /// Recorded before an update is scheduled, so that a process killed before
  /// the attempt finishes leaves the app marked for retry.
  pub fn pessimistic_failure(&self, now: DateTime<Utc>) -> UpdateCompletion {
    self.completion(UpdateResult::Failure, false, now)
  }

  /// The resting state of `record` at `now`.
  pub fn state(
    &self,
    record: &InstalledAppRecord,
    now: DateTime<Utc>,
  ) -> UpdateState {
    if record.pending_update_path.is_some() {
      UpdateState::UpdateScheduled
    } else if self.should_check_for_update(record, now) {
      UpdateState::CheckDue
    } else if !record.last_update_succeeded {
      UpdateState::RetryPending
    } else {
      UpdateState::Idle
    }
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;
  use crate::{
    app::{AppId, DisplayMode, IconHashes, Orientation},
    manifest::FetchedIcon,
  };

  const SHELL: ShellVersion = 120;
  const PRIMARY: &str = "https://example.com/icon-192.png";
  const BADGE: &str = "https://example.com/badge.png";

  fn now() -> DateTime<Utc> { Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap() }

  fn policy() -> UpdatePolicy { UpdatePolicy::new(SHELL) }

  fn record() -> InstalledAppRecord {
    let mut icon_hashes = IconHashes::new();
    icon_hashes.insert(PRIMARY.into(), "p1".into());
    icon_hashes.insert(BADGE.into(), "b1".into());
    InstalledAppRecord {
      app_id: AppId::new("org.chromium.webapk.a1"),
      manifest_url: "https://example.com/manifest.json".into(),
      scope: "https://example.com/".into(),
      start_url: "https://example.com/start".into(),
      name: "Example App".into(),
      short_name: "Example".into(),
      display: DisplayMode::Standalone,
      orientation: Orientation::Portrait,
      theme_color: Some(0xff00_00ff),
      background_color: Some(0xffff_ffff),
      icon_hashes,
      shell_version: Some(SHELL),
      registered_at: now() - TimeDelta::days(100),
      last_check_at: Some(now()),
      last_update_completed_at: None,
      last_update_succeeded: true,
      relaxed_updates: false,
      last_requested_shell_version: Some(SHELL),
      dismissed_disclosure: false,
      pending_update_path: None,
    }
  }

  fn fetched() -> FetchedManifestData {
    let r = record();
    FetchedManifestData {
      primary_icon: Some(FetchedIcon {
        url:  PRIMARY.into(),
        hash: "p1".into(),
        data: vec![],
      }),
      badge_icon: Some(FetchedIcon {
        url:  BADGE.into(),
        hash: "b1".into(),
        data: vec![],
      }),
      ..FetchedManifestData::from_record(&r)
    }
  }

  fn reason_for(old: &InstalledAppRecord, new: &FetchedManifestData) -> UpdateReason {
    policy().needs_update(old, Some(new), new.primary_icon_url(), new.badge_icon_url())
  }

  // ── should_check_for_update ─────────────────────────────────────────────

  #[test]
  fn check_not_due_right_after_stamping() {
    let mut r = record();
    r.last_check_at = Some(now());
    for hours in [0, 1, 24, 71] {
      assert!(!policy().should_check_for_update(&r, now() + TimeDelta::hours(hours)));
    }
  }

  #[test]
  fn check_due_after_standard_interval() {
    let mut r = record();
    r.last_check_at = Some(now() - TimeDelta::days(4));
    assert!(policy().should_check_for_update(&r, now()));
  }

  #[test]
  fn relaxed_interval_defers_check() {
    let mut r = record();
    r.relaxed_updates = true;
    r.last_check_at = Some(now() - TimeDelta::days(20));
    assert!(!policy().should_check_for_update(&r, now()));

    r.last_check_at = Some(now() - TimeDelta::days(31));
    assert!(policy().should_check_for_update(&r, now()));
  }

  #[test]
  fn intervals_are_inclusive_at_the_boundary() {
    let p = policy();
    let mut r = record();
    r.last_check_at = Some(now() - p.check_interval);
    assert!(p.should_check_for_update(&r, now()));
    assert!(!p.should_check_for_update(&r, now() - TimeDelta::seconds(1)));

    r.relaxed_updates = true;
    r.last_check_at = Some(now() - p.relaxed_check_interval);
    assert!(p.should_check_for_update(&r, now()));
    assert!(!p.should_check_for_update(&r, now() - TimeDelta::seconds(1)));

    let mut r = record();
    r.last_update_succeeded = false;
    r.last_update_completed_at = Some(now() - p.retry_interval);
    assert!(p.should_check_for_update(&r, now()));
    assert!(!p.should_check_for_update(&r, now() - TimeDelta::seconds(1)));
  }

  #[test]
  fn stale_shell_triggers_once_per_shell_version() {
    let mut r = record();
    r.shell_version = Some(SHELL - 1);
    r.last_requested_shell_version = Some(SHELL - 1);
    assert!(policy().should_check_for_update(&r, now()));

    // Already requested an update to the current shell.
    r.last_requested_shell_version = Some(SHELL);
    assert!(!policy().should_check_for_update(&r, now()));
  }

  #[test]
  fn failed_update_is_retried_after_retry_interval() {
    let mut r = record();
    r.last_update_succeeded = false;
    r.last_update_completed_at = Some(now() - TimeDelta::hours(11));
    assert!(!policy().should_check_for_update(&r, now()));

    r.last_update_completed_at = Some(now() - TimeDelta::hours(13));
    assert!(policy().should_check_for_update(&r, now()));

    r.last_update_succeeded = true;
    assert!(!policy().should_check_for_update(&r, now()));
  }

  #[test]
  fn missing_fields_mean_never_checked() {
    let mut r = record();
    r.last_check_at = None;
    assert!(policy().should_check_for_update(&r, now()));

    let mut r = record();
    r.shell_version = None;
    r.last_requested_shell_version = None;
    assert!(policy().should_check_for_update(&r, now()));
  }

  // ── needs_update ────────────────────────────────────────────────────────

  #[test]
  fn unchanged_manifest_needs_no_update() {
    assert_eq!(reason_for(&record(), &fetched()), UpdateReason::None);
  }

  #[test]
  fn missing_fetch_without_stale_shell_is_none() {
    let r = record();
    assert_eq!(
      policy().needs_update(&r, None, Some(PRIMARY), Some(BADGE)),
      UpdateReason::None
    );
  }

  #[test]
  fn stale_shell_wins_regardless_of_fetch() {
    let mut r = record();
    r.shell_version = Some(SHELL - 3);
    let mut f = fetched();
    f.name = "Different".into();

    assert_eq!(reason_for(&r, &f), UpdateReason::StaleShellVersion);
    assert_eq!(
      policy().needs_update(&r, None, None, None),
      UpdateReason::StaleShellVersion
    );
  }

  #[test]
  fn primary_icon_change_outranks_everything_else() {
    let mut f = fetched();
    f.icon_hashes.insert(PRIMARY.into(), "p2".into());
    f.icon_hashes.insert(BADGE.into(), "b2".into());
    f.name = "Renamed".into();
    assert_eq!(reason_for(&record(), &f), UpdateReason::PrimaryIconDiffers);
  }

  #[test]
  fn badge_only_difference_reports_badge() {
    let mut f = fetched();
    f.icon_hashes.insert(BADGE.into(), "b2".into());
    assert_eq!(reason_for(&record(), &f), UpdateReason::BadgeIconDiffers);
  }

  #[test]
  fn stored_icon_url_fragment_is_ignored() {
    let mut r = record();
    let hash = r.icon_hashes.remove(PRIMARY).unwrap();
    r.icon_hashes.insert(format!("{PRIMARY}#maskable"), hash);
    assert_eq!(reason_for(&r, &fetched()), UpdateReason::None);
  }

  #[test]
  fn scope_fragment_only_difference_is_none() {
    let mut f = fetched();
    f.scope = "https://example.com/#home".into();
    assert_eq!(reason_for(&record(), &f), UpdateReason::None);

    f.scope = "https://example.com/app/".into();
    assert_eq!(reason_for(&record(), &f), UpdateReason::ScopeDiffers);
  }

  #[test]
  fn each_field_maps_to_its_reason() {
    type Mutation = fn(&mut FetchedManifestData);
    let cases: [(Mutation, UpdateReason); 7] = [
      (
        |f: &mut FetchedManifestData| f.start_url = "https://example.com/other".into(),
        UpdateReason::StartUrlDiffers,
      ),
      (
        |f: &mut FetchedManifestData| f.short_name = "Ex".into(),
        UpdateReason::ShortNameDiffers,
      ),
      (
        |f: &mut FetchedManifestData| f.name = "Example 2".into(),
        UpdateReason::NameDiffers,
      ),
      (
        |f: &mut FetchedManifestData| f.background_color = None,
        UpdateReason::BackgroundColorDiffers,
      ),
      (
        |f: &mut FetchedManifestData| f.theme_color = Some(0xff00_ff00),
        UpdateReason::ThemeColorDiffers,
      ),
      (
        |f: &mut FetchedManifestData| f.orientation = Orientation::Landscape,
        UpdateReason::OrientationDiffers,
      ),
      (
        |f: &mut FetchedManifestData| f.display = DisplayMode::Fullscreen,
        UpdateReason::DisplayModeDiffers,
      ),
    ];
    for (mutate, expected) in cases {
      let mut f = fetched();
      mutate(&mut f);
      assert_eq!(reason_for(&record(), &f), expected);
    }
  }

  #[test]
  fn textual_change_outranks_color_change() {
    let mut f = fetched();
    f.theme_color = None;
    f.short_name = "E".into();
    assert_eq!(reason_for(&record(), &f), UpdateReason::ShortNameDiffers);
  }

  #[test]
  fn needs_update_is_idempotent() {
    let r = record();
    let mut f = fetched();
    f.orientation = Orientation::Any;
    assert_eq!(reason_for(&r, &f), reason_for(&r, &f));
  }

  // ── on_check_completed ──────────────────────────────────────────────────

  #[test]
  fn no_update_after_failure_marks_success() {
    let mut r = record();
    r.last_update_succeeded = false;
    assert_eq!(
      policy().on_check_completed(&r, Some(fetched()), UpdateReason::None),
      CheckOutcome::MarkSuccess
    );
    assert_eq!(
      policy().on_check_completed(&record(), Some(fetched()), UpdateReason::None),
      CheckOutcome::NoChange
    );
  }

  #[test]
  fn update_with_fetched_data_carries_it() {
    let mut f = fetched();
    f.name = "New".into();
    let outcome = policy().on_check_completed(
      &record(),
      Some(f.clone()),
      UpdateReason::NameDiffers,
    );
    assert_eq!(
      outcome,
      CheckOutcome::ScheduleUpdate {
        reason:         UpdateReason::NameDiffers,
        stale_manifest: false,
        manifest:       f,
      }
    );
  }

  #[test]
  fn update_without_fetched_data_is_stale_manifest() {
    let mut r = record();
    r.shell_version = Some(SHELL - 1);
    let outcome =
      policy().on_check_completed(&r, None, UpdateReason::StaleShellVersion);
    let (stale_manifest, manifest) = match outcome {
      CheckOutcome::ScheduleUpdate { stale_manifest, manifest, .. } => {
        (stale_manifest, manifest)
      }
      other => panic!("expected an update, got {other:?}"),
    };
    assert!(stale_manifest);
    assert_eq!(manifest, FetchedManifestData::from_record(&r));
  }

  #[test]
  fn completion_stamps_current_shell_version() {
    let c = policy().completion(UpdateResult::Success, true, now());
    assert!(c.succeeded);
    assert!(c.relax_updates);
    assert_eq!(c.requested_shell_version, SHELL);

    let p = policy().pessimistic_failure(now());
    assert!(!p.succeeded);
    assert!(!p.relax_updates);
  }

  // ── state ───────────────────────────────────────────────────────────────

  #[test]
  fn resting_states() {
    let p = policy();
    assert_eq!(p.state(&record(), now()), UpdateState::Idle);

    let mut r = record();
    r.pending_update_path = Some("/tmp/req.json".into());
    assert_eq!(p.state(&r, now()), UpdateState::UpdateScheduled);

    let mut r = record();
    r.last_update_succeeded = false;
    r.last_update_completed_at = Some(now() - TimeDelta::hours(1));
    assert_eq!(p.state(&r, now()), UpdateState::RetryPending);
    assert_eq!(p.state(&r, now() + TimeDelta::hours(12)), UpdateState::CheckDue);
  }
}
