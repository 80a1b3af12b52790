//! Update attempt results and the check/update state machine.
//!
//! The persisted record only ever rests in `Idle`, `CheckDue`,
//! `UpdateScheduled` or `RetryPending`; the other states exist while a check
//! cycle is in flight.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::AsRefStr;

use crate::app::ShellVersion;

// ─── Results ─────────────────────────────────────────────────────────────────

/// Outcome of one update request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateResult {
  Success,
  Failure,
  /// The request may have reached the server but no answer came back.
  ProbableFailure,
}

impl UpdateResult {
  pub fn is_success(self) -> bool { matches!(self, Self::Success) }
}

/// The four fields written together when an update attempt finishes.
///
/// Writing them separately could leave a fresh completion time next to the
/// success flag of an older attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateCompletion {
  pub completed_at:            DateTime<Utc>,
  pub succeeded:               bool,
  pub relax_updates:           bool,
  pub requested_shell_version: ShellVersion,
}

// ─── State machine ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UpdateState {
  Idle,
  CheckDue,
  Fetching,
  NoUpdateNeeded,
  UpdateNeeded,
  UpdateScheduled,
  UpdateAttempted,
  RetryPending,
}

/// Inputs that move an [`UpdateState`] forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateEvent {
  /// The check or retry interval has elapsed.
  IntervalElapsed,
  FetchStarted,
  /// The fetch finished (or timed out) and the reason was computed.
  Evaluated { needs_update: bool },
  Scheduled,
  Dispatched,
  Finished(UpdateResult),
}

impl UpdateState {
  /// Apply `event`, returning `None` when the event is not valid in this
  /// state.
  pub fn advance(self, event: UpdateEvent) -> Option<Self> {
    use UpdateEvent as E;
    use UpdateState as S;

    let next = match (self, event) {
      (S::Idle | S::RetryPending, E::IntervalElapsed) => S::CheckDue,
      (S::CheckDue, E::FetchStarted) => S::Fetching,
      (S::Fetching, E::Evaluated { needs_update: false }) => S::NoUpdateNeeded,
      (S::Fetching, E::Evaluated { needs_update: true }) => S::UpdateNeeded,
      (S::NoUpdateNeeded, E::Finished(_)) => S::Idle,
      (S::UpdateNeeded, E::Scheduled) => S::UpdateScheduled,
      (S::UpdateScheduled, E::Dispatched) => S::UpdateAttempted,
      (S::UpdateAttempted, E::Finished(r)) if r.is_success() => S::Idle,
      (S::UpdateAttempted, E::Finished(_)) => S::RetryPending,
      _ => return None,
    };
    Some(next)
  }

  pub fn as_str(&self) -> &str { self.as_ref() }
}
