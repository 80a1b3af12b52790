//! Freshly fetched manifest data and the URL comparison helpers used to
//! compare it against an installed record.

use serde::{Deserialize, Serialize};

use crate::app::{DisplayMode, IconHashes, InstalledAppRecord, Orientation};

// ─── Fetched data ────────────────────────────────────────────────────────────

/// An icon chosen from the manifest, downloaded and hashed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedIcon {
  pub url:  String,
  /// Hex digest of `data`.
  pub hash: String,
  #[serde(with = "base64_bytes", default)]
  pub data: Vec<u8>,
}

/// A snapshot of the web app's live manifest. Never persisted directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchedManifestData {
  pub manifest_url:     String,
  pub scope:            String,
  pub start_url:        String,
  pub name:             String,
  pub short_name:       String,
  pub display:          DisplayMode,
  pub orientation:      Orientation,
  pub theme_color:      Option<u32>,
  pub background_color: Option<u32>,
  /// Hashes for the icons that were downloaded, keyed by exact URL.
  pub icon_hashes:      IconHashes,
  pub primary_icon:     Option<FetchedIcon>,
  pub badge_icon:       Option<FetchedIcon>,
}

impl FetchedManifestData {
  /// Rebuild manifest data from what the record already knows. Used when an
  /// update must be requested without a fresh manifest; no icon bytes are
  /// available in that case.
  pub fn from_record(record: &InstalledAppRecord) -> Self {
    Self {
      manifest_url:     record.manifest_url.clone(),
      scope:            record.scope.clone(),
      start_url:        record.start_url.clone(),
      name:             record.name.clone(),
      short_name:       record.short_name.clone(),
      display:          record.display,
      orientation:      record.orientation,
      theme_color:      record.theme_color,
      background_color: record.background_color,
      icon_hashes:      record.icon_hashes.clone(),
      primary_icon:     None,
      badge_icon:       None,
    }
  }

  pub fn primary_icon_url(&self) -> Option<&str> {
    self.primary_icon.as_ref().map(|i| i.url.as_str())
  }

  pub fn badge_icon_url(&self) -> Option<&str> {
    self.badge_icon.as_ref().map(|i| i.url.as_str())
  }

  /// The icon hashes to store once this data is installed over `old`.
  ///
  /// When no badge icon was downloaded, the badge hash held by `old` cannot
  /// be told apart from other stale entries, so every old hash not superseded
  /// by a fetched one is kept. A later check that does download the badge then
  /// compares against its previous hash.
  pub fn hashes_to_store(&self, old: &IconHashes) -> IconHashes {
    if self.badge_icon.is_some() {
      return self.icon_hashes.clone();
    }
    let primary = self.primary_icon_url();
    let mut merged: IconHashes = old
      .iter()
      .filter(|(url, _)| primary.is_none_or(|p| !urls_match_ignoring_fragment(url, p)))
      .map(|(url, hash)| (url.clone(), hash.clone()))
      .collect();
    merged.extend(self.icon_hashes.clone());
    merged
  }
}

// ─── URL helpers ─────────────────────────────────────────────────────────────

/// `url` with any `#fragment` removed.
pub fn strip_fragment(url: &str) -> &str {
  url.split_once('#').map_or(url, |(base, _)| base)
}

pub fn urls_match_ignoring_fragment(a: &str, b: &str) -> bool {
  strip_fragment(a) == strip_fragment(b)
}

/// Find the hash stored for `url`, allowing the stored key to differ from
/// `url` by its fragment only.
pub fn find_hash_ignoring_fragment<'a>(
  hashes: &'a IconHashes,
  url: &str,
) -> Option<&'a str> {
  if let Some(hash) = hashes.get(url) {
    return Some(hash);
  }
  hashes
    .iter()
    .find(|(key, _)| urls_match_ignoring_fragment(key, url))
    .map(|(_, hash)| hash.as_str())
}

// ─── Serde helpers ───────────────────────────────────────────────────────────

mod base64_bytes {
  use base64::{Engine as _, engine::general_purpose::STANDARD};
  use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

  pub fn serialize<S: Serializer>(
    bytes: &[u8],
    serializer: S,
  ) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&STANDARD.encode(bytes))
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(
    deserializer: D,
  ) -> Result<Vec<u8>, D::Error> {
    let s = String::deserialize(deserializer)?;
    STANDARD.decode(s.as_bytes()).map_err(D::Error::custom)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn strip_fragment_removes_only_the_fragment() {
    assert_eq!(strip_fragment("https://a.com/x?q=1#frag"), "https://a.com/x?q=1");
    assert_eq!(strip_fragment("https://a.com/x"), "https://a.com/x");
    assert_eq!(strip_fragment("https://a.com/#"), "https://a.com/");
  }

  #[test]
  fn hash_lookup_tolerates_fragment_on_stored_key() {
    let mut hashes = IconHashes::new();
    hashes.insert("https://a.com/icon.png#v2".into(), "abc".into());

    assert_eq!(
      find_hash_ignoring_fragment(&hashes, "https://a.com/icon.png"),
      Some("abc")
    );
    assert_eq!(
      find_hash_ignoring_fragment(&hashes, "https://a.com/icon.png#other"),
      Some("abc")
    );
    assert_eq!(find_hash_ignoring_fragment(&hashes, "https://a.com/b.png"), None);
  }

  fn fetched(icon_hashes: IconHashes, badge: bool) -> FetchedManifestData {
    let icon = |url: &str| FetchedIcon { url: url.into(), hash: "new".into(), data: vec![] };
    FetchedManifestData {
      manifest_url:     "https://a.com/m.json".into(),
      scope:            "https://a.com/".into(),
      start_url:        "https://a.com/".into(),
      name:             "A".into(),
      short_name:       "A".into(),
      display:          DisplayMode::Standalone,
      orientation:      Orientation::Default,
      theme_color:      None,
      background_color: None,
      icon_hashes,
      primary_icon:     Some(icon("https://a.com/icon.png")),
      badge_icon:       badge.then(|| icon("https://a.com/badge.png")),
    }
  }

  #[test]
  fn missing_badge_keeps_old_badge_hash() {
    let mut old = IconHashes::new();
    old.insert("https://a.com/icon.png#v1".into(), "old".into());
    old.insert("https://a.com/badge.png".into(), "badge".into());
    let mut new = IconHashes::new();
    new.insert("https://a.com/icon.png".into(), "new".into());

    let stored = fetched(new.clone(), false).hashes_to_store(&old);
    assert_eq!(stored.len(), 2);
    assert_eq!(stored["https://a.com/icon.png"], "new");
    assert_eq!(stored["https://a.com/badge.png"], "badge");

    // With a fetched badge the fetched map is authoritative.
    assert_eq!(fetched(new.clone(), true).hashes_to_store(&old), new);
  }

  #[test]
  fn icon_bytes_serialize_as_base64() {
    let icon = FetchedIcon {
      url:  "https://a.com/i.png".into(),
      hash: "00".into(),
      data: vec![1, 2, 3],
    };
    let json = serde_json::to_value(&icon).unwrap();
    assert_eq!(json["data"], "AQID");

    let back: FetchedIcon = serde_json::from_value(json).unwrap();
    assert_eq!(back.data, vec![1, 2, 3]);
  }
}
