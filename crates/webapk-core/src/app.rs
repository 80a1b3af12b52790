//! The installed-app record: everything the updater persists about one WebAPK.
//!
//! A record is created when the app is registered and is mutated by every
//! check and update cycle. It is only deleted when the app is uninstalled.

use std::{collections::BTreeMap, fmt, path::PathBuf, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, EnumString};

use crate::{Error, Result};

// ─── Identity ────────────────────────────────────────────────────────────────

/// Opaque identifier of an installed app (the package name on device).
#[derive(
  Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AppId(pub String);

impl AppId {
  pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for AppId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Version of the native runtime shell packaged with an app.
pub type ShellVersion = u32;

/// Icon content hashes keyed by icon URL.
pub type IconHashes = BTreeMap<String, String>;

// ─── Presentation ────────────────────────────────────────────────────────────

/// The manifest `display` member.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  AsRefStr,
  EnumIter,
  EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum DisplayMode {
  Undefined,
  #[default]
  Browser,
  MinimalUi,
  Standalone,
  Fullscreen,
}

impl DisplayMode {
  pub fn as_str(&self) -> &str { self.as_ref() }

  /// Interpret a raw manifest value. A missing member means `browser`; a value
  /// the browser does not understand maps to `undefined`.
  pub fn from_manifest(raw: Option<&str>) -> Self {
    match raw {
      None => Self::Browser,
      Some(s) => s.trim().parse().unwrap_or(Self::Undefined),
    }
  }

  pub fn parse(s: &str) -> Result<Self> {
    Self::from_str(s).map_err(|_| Error::UnknownDisplayMode(s.to_owned()))
  }
}

/// The manifest `orientation` member.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  AsRefStr,
  EnumIter,
  EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Orientation {
  #[default]
  Default,
  PortraitPrimary,
  PortraitSecondary,
  LandscapePrimary,
  LandscapeSecondary,
  Any,
  Landscape,
  Portrait,
  Natural,
}

impl Orientation {
  pub fn as_str(&self) -> &str { self.as_ref() }

  /// Interpret a raw manifest value; anything unrecognised is `default`.
  pub fn from_manifest(raw: Option<&str>) -> Self {
    raw
      .and_then(|s| s.trim().parse().ok())
      .unwrap_or(Self::Default)
  }

  pub fn parse(s: &str) -> Result<Self> {
    Self::from_str(s).map_err(|_| Error::UnknownOrientation(s.to_owned()))
  }
}

// ─── Record ──────────────────────────────────────────────────────────────────

/// Persisted per-app state.
///
/// Optional timestamps and versions are `None` when they were never written
/// (or could not be read back); the policy treats those as "never checked".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledAppRecord {
  pub app_id:                       AppId,
  pub manifest_url:                 String,
  pub scope:                        String,
  pub start_url:                    String,
  pub name:                         String,
  pub short_name:                   String,
  pub display:                      DisplayMode,
  pub orientation:                  Orientation,
  /// ARGB; `None` when the manifest does not specify one.
  pub theme_color:                  Option<u32>,
  pub background_color:             Option<u32>,
  pub icon_hashes:                  IconHashes,
  pub shell_version:                Option<ShellVersion>,
  pub registered_at:                DateTime<Utc>,
  pub last_check_at:                Option<DateTime<Utc>>,
  pub last_update_completed_at:     Option<DateTime<Utc>>,
  pub last_update_succeeded:        bool,
  pub relaxed_updates:              bool,
  pub last_requested_shell_version: Option<ShellVersion>,
  pub dismissed_disclosure:         bool,
  /// Serialized update request waiting for the scheduler to run it.
  pub pending_update_path:          Option<PathBuf>,
}

// ─── NewApp ──────────────────────────────────────────────────────────────────

/// Input to [`crate::store::AppRecordStore::register`].
///
/// A freshly installed app counts as just checked and as having no outstanding
/// failed update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewApp {
  pub app_id:           AppId,
  pub manifest_url:     String,
  pub scope:            String,
  pub start_url:        String,
  pub name:             String,
  #[serde(default)]
  pub short_name:       String,
  #[serde(default)]
  pub display:          DisplayMode,
  #[serde(default)]
  pub orientation:      Orientation,
  #[serde(default)]
  pub theme_color:      Option<u32>,
  #[serde(default)]
  pub background_color: Option<u32>,
  #[serde(default)]
  pub icon_hashes:      IconHashes,
  pub shell_version:    ShellVersion,
}

impl NewApp {
  /// Build the record stored on registration at `now`.
  pub fn into_record(self, now: DateTime<Utc>) -> InstalledAppRecord {
    InstalledAppRecord {
      app_id:                       self.app_id,
      manifest_url:                 self.manifest_url,
      scope:                        self.scope,
      start_url:                    self.start_url,
      name:                         self.name,
      short_name:                   self.short_name,
      display:                      self.display,
      orientation:                  self.orientation,
      theme_color:                  self.theme_color,
      background_color:             self.background_color,
      icon_hashes:                  self.icon_hashes,
      shell_version:                Some(self.shell_version),
      registered_at:                now,
      last_check_at:                Some(now),
      last_update_completed_at:     None,
      last_update_succeeded:        true,
      relaxed_updates:              false,
      last_requested_shell_version: None,
      dismissed_disclosure:         false,
      pending_update_path:          None,
    }
  }
}

#[cfg(test)]
mod tests {
  use strum::IntoEnumIterator;

  use super::*;

  #[test]
  fn display_mode_string_forms_are_stable() {
    for mode in DisplayMode::iter() {
      assert_eq!(DisplayMode::parse(mode.as_str()).unwrap(), mode);
    }
    assert_eq!(DisplayMode::MinimalUi.as_str(), "minimal-ui");
  }

  #[test]
  fn display_mode_from_manifest_defaults() {
    assert_eq!(DisplayMode::from_manifest(None), DisplayMode::Browser);
    assert_eq!(
      DisplayMode::from_manifest(Some("standalone")),
      DisplayMode::Standalone
    );
    assert_eq!(
      DisplayMode::from_manifest(Some("window-controls-overlay")),
      DisplayMode::Undefined
    );
  }

  #[test]
  fn orientation_from_manifest_falls_back_to_default() {
    assert_eq!(
      Orientation::from_manifest(Some("landscape-primary")),
      Orientation::LandscapePrimary
    );
    assert_eq!(Orientation::from_manifest(Some("sideways")), Orientation::Default);
    assert_eq!(Orientation::from_manifest(None), Orientation::Default);
    assert!(Orientation::parse("sideways").is_err());
  }

  #[test]
  fn registration_counts_as_fresh_check() {
    let now = Utc::now();
    let record = NewApp {
      app_id:           AppId::new("org.example.app"),
      manifest_url:     "https://example.com/manifest.json".into(),
      scope:            "https://example.com/".into(),
      start_url:        "https://example.com/start".into(),
      name:             "Example".into(),
      short_name:       "Ex".into(),
      display:          DisplayMode::Standalone,
      orientation:      Orientation::Default,
      theme_color:      None,
      background_color: None,
      icon_hashes:      IconHashes::new(),
      shell_version:    7,
    }
    .into_record(now);

    assert_eq!(record.last_check_at, Some(now));
    assert_eq!(record.shell_version, Some(7));
    assert!(record.last_update_succeeded);
    assert!(record.pending_update_path.is_none());
  }
}
