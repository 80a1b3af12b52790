//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, icon hashes compact JSON, enums their
//! kebab-case names. Every column decodes leniently so one damaged row never
//! hides the others: unreadable bookkeeping is treated as absent, which the
//! policy reads as "never checked", and unreadable enums fall back to their
//! defaults.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use webapk_core::app::{
  AppId, DisplayMode, IconHashes, InstalledAppRecord, Orientation,
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_dt_lenient(app_id: &str, column: &str, s: Option<String>) -> Option<DateTime<Utc>> {
  let s = s?;
  match decode_dt(&s) {
    Ok(dt) => Some(dt),
    Err(e) => {
      tracing::warn!(app_id, column, "ignoring unreadable timestamp: {e}");
      None
    }
  }
}

fn decode_enum_lenient<T>(
  app_id: &str,
  column: &str,
  raw: &str,
  parse: fn(&str) -> webapk_core::Result<T>,
  fallback: T,
) -> T {
  parse(raw).unwrap_or_else(|e| {
    tracing::warn!(app_id, column, "ignoring unreadable value: {e}");
    fallback
  })
}

// ─── Icon hashes ─────────────────────────────────────────────────────────────

pub fn encode_icon_hashes(hashes: &IconHashes) -> Result<String> {
  Ok(serde_json::to_string(hashes)?)
}

fn decode_icon_hashes(app_id: &str, s: &str) -> IconHashes {
  serde_json::from_str(s).unwrap_or_else(|e| {
    tracing::warn!(app_id, "ignoring unreadable icon hashes: {e}");
    IconHashes::new()
  })
}

// ─── Paths ───────────────────────────────────────────────────────────────────

pub fn encode_path(path: Option<PathBuf>) -> Option<String> {
  path.map(|p| p.to_string_lossy().into_owned())
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list shared by every query that produces a [`RawApp`].
pub const APP_COLUMNS: &str = "
  app_id, manifest_url, scope, start_url, name, short_name, display,
  orientation, theme_color, background_color, icon_hashes, shell_version,
  registered_at, last_check_at, last_update_completed_at,
  last_update_succeeded, relaxed_updates, last_requested_shell_version,
  dismissed_disclosure, pending_update_path";

/// Raw values read directly from an `apps` row.
pub struct RawApp {
  pub app_id:                       String,
  pub manifest_url:                 String,
  pub scope:                        String,
  pub start_url:                    String,
  pub name:                         String,
  pub short_name:                   String,
  pub display:                      String,
  pub orientation:                  String,
  pub theme_color:                  Option<u32>,
  pub background_color:             Option<u32>,
  pub icon_hashes:                  String,
  pub shell_version:                Option<u32>,
  pub registered_at:                String,
  pub last_check_at:                Option<String>,
  pub last_update_completed_at:     Option<String>,
  pub last_update_succeeded:        bool,
  pub relaxed_updates:              bool,
  pub last_requested_shell_version: Option<u32>,
  pub dismissed_disclosure:         bool,
  pub pending_update_path:          Option<String>,
}

impl RawApp {
  /// Read a row selected with [`APP_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      app_id:                       row.get(0)?,
      manifest_url:                 row.get(1)?,
      scope:                        row.get(2)?,
      start_url:                    row.get(3)?,
      name:                         row.get(4)?,
      short_name:                   row.get(5)?,
      display:                      row.get(6)?,
      orientation:                  row.get(7)?,
      theme_color:                  row.get(8)?,
      background_color:             row.get(9)?,
      icon_hashes:                  row.get(10)?,
      shell_version:                row.get(11)?,
      registered_at:                row.get(12)?,
      last_check_at:                row.get(13)?,
      last_update_completed_at:     row.get(14)?,
      last_update_succeeded:        row.get(15)?,
      relaxed_updates:              row.get(16)?,
      last_requested_shell_version: row.get(17)?,
      dismissed_disclosure:         row.get(18)?,
      pending_update_path:          row.get(19)?,
    })
  }

  /// Build the domain record. Never fails; damaged columns are logged and
  /// replaced.
  pub fn into_record(self) -> InstalledAppRecord {
    let id = self.app_id.as_str();
    let last_check_at = decode_dt_lenient(id, "last_check_at", self.last_check_at);
    let last_update_completed_at = decode_dt_lenient(
      id,
      "last_update_completed_at",
      self.last_update_completed_at,
    );
    let icon_hashes = decode_icon_hashes(id, &self.icon_hashes);
    let display = decode_enum_lenient(
      id,
      "display",
      &self.display,
      DisplayMode::parse,
      DisplayMode::Undefined,
    );
    let orientation = decode_enum_lenient(
      id,
      "orientation",
      &self.orientation,
      Orientation::parse,
      Orientation::Default,
    );
    let registered_at = decode_dt_lenient(id, "registered_at", Some(self.registered_at))
      .unwrap_or_else(Utc::now);

    InstalledAppRecord {
      display,
      orientation,
      registered_at,
      app_id: AppId(self.app_id),
      manifest_url: self.manifest_url,
      scope: self.scope,
      start_url: self.start_url,
      name: self.name,
      short_name: self.short_name,
      theme_color: self.theme_color,
      background_color: self.background_color,
      icon_hashes,
      shell_version: self.shell_version,
      last_check_at,
      last_update_completed_at,
      last_update_succeeded: self.last_update_succeeded,
      relaxed_updates: self.relaxed_updates,
      last_requested_shell_version: self.last_requested_shell_version,
      dismissed_disclosure: self.dismissed_disclosure,
      pending_update_path: self.pending_update_path.map(PathBuf::from),
    }
  }
}
