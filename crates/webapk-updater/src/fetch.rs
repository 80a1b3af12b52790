//! [`HttpManifestFetcher`] — fetches a web app manifest over HTTP, picks the
//! icons an installed app would use, and hashes their contents.

use std::time::Duration;

use reqwest::{Client, Url};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use webapk_core::{
  app::{DisplayMode, IconHashes, Orientation},
  collab::{FetchOutcome, ManifestFetcher},
  manifest::{FetchedIcon, FetchedManifestData},
};

use crate::Result;

/// Ideal edge length of the launcher icon, in pixels.
pub const IDEAL_PRIMARY_ICON_PX: u32 = 192;
/// Ideal edge length of the monochrome notification badge, in pixels.
pub const IDEAL_BADGE_ICON_PX: u32 = 72;

// ─── Manifest JSON ───────────────────────────────────────────────────────────

/// The subset of the W3C web app manifest the updater cares about.
#[derive(Debug, Default, Deserialize)]
pub struct WebManifest {
  pub name:             Option<String>,
  pub short_name:       Option<String>,
  pub start_url:        Option<String>,
  pub scope:            Option<String>,
  pub display:          Option<String>,
  pub orientation:      Option<String>,
  pub theme_color:      Option<String>,
  pub background_color: Option<String>,
  #[serde(default)]
  pub icons:            Vec<ManifestIcon>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestIcon {
  pub src:     String,
  #[serde(default)]
  pub sizes:   Option<String>,
  #[serde(default)]
  pub purpose: Option<String>,
}

impl ManifestIcon {
  /// A missing `purpose` means `any`.
  fn has_purpose(&self, purpose: &str) -> bool {
    match &self.purpose {
      None => purpose == "any",
      Some(p) => p.split_whitespace().any(|p| p.eq_ignore_ascii_case(purpose)),
    }
  }

  /// Largest declared edge length; `any` counts as unbounded.
  fn largest_size(&self) -> u32 {
    let Some(sizes) = &self.sizes else { return 0 };
    sizes
      .split_whitespace()
      .filter_map(|s| {
        if s.eq_ignore_ascii_case("any") {
          return Some(u32::MAX);
        }
        let (w, h) = s.to_ascii_lowercase().split_once('x').map(|(w, h)| {
          (w.parse::<u32>().ok(), h.parse::<u32>().ok())
        })?;
        Some(w?.max(h?))
      })
      .max()
      .unwrap_or(0)
  }
}

/// Pick the icon with `purpose` closest to `ideal`, preferring icons at least
/// that large.
pub fn choose_icon<'a>(
  icons: &'a [ManifestIcon],
  purpose: &str,
  ideal: u32,
) -> Option<&'a ManifestIcon> {
  icons
    .iter()
    .filter(|i| i.has_purpose(purpose))
    .min_by_key(|i| {
      let size = i.largest_size();
      if size >= ideal { (0, size - ideal) } else { (1, ideal - size) }
    })
}

/// Parse a CSS hex color (`#rgb`, `#rrggbb`, `#rrggbbaa`) into ARGB. Named
/// and functional colors are not understood and yield `None`.
pub fn parse_color(raw: &str) -> Option<u32> {
  let hex = raw.trim().strip_prefix('#')?;
  if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
    return None;
  }
  let expand = |s: &str| -> Option<u32> {
    let doubled: String = s.chars().flat_map(|c| [c, c]).collect();
    u32::from_str_radix(&doubled, 16).ok()
  };
  match hex.len() {
    3 => expand(hex).map(|rgb| 0xff00_0000 | rgb),
    6 => u32::from_str_radix(hex, 16).ok().map(|rgb| 0xff00_0000 | rgb),
    8 => {
      let rgba = u32::from_str_radix(hex, 16).ok()?;
      Some(rgba.rotate_right(8))
    }
    _ => None,
  }
}

pub fn hash_icon(bytes: &[u8]) -> String { hex::encode(Sha256::digest(bytes)) }

// ─── Resolution ──────────────────────────────────────────────────────────────

/// A parsed manifest with URLs resolved, before any icon is downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedManifest {
  pub data:             FetchedManifestData,
  pub primary_icon_url: Option<String>,
  pub badge_icon_url:   Option<String>,
}

/// Resolve relative URLs against `manifest_url` and fill defaults. Returns
/// `None` for manifests an installed app could not have been built from.
pub fn resolve_manifest(
  manifest: &WebManifest,
  manifest_url: &Url,
) -> Option<ResolvedManifest> {
  let start_url = manifest_url.join(manifest.start_url.as_deref()?).ok()?;
  let scope = match manifest.scope.as_deref() {
    Some(s) => manifest_url.join(s).ok()?,
    // Default scope is the start URL's directory.
    None => start_url.join(".").ok()?,
  };
  let name = manifest
    .name
    .clone()
    .or_else(|| manifest.short_name.clone())?;
  let short_name = manifest.short_name.clone().unwrap_or_else(|| name.clone());

  let resolve_icon = |icon: &ManifestIcon| {
    manifest_url.join(&icon.src).ok().map(String::from)
  };
  let primary_icon_url = choose_icon(&manifest.icons, "any", IDEAL_PRIMARY_ICON_PX)
    .and_then(resolve_icon);
  let badge_icon_url = choose_icon(&manifest.icons, "monochrome", IDEAL_BADGE_ICON_PX)
    .and_then(resolve_icon);

  Some(ResolvedManifest {
    data: FetchedManifestData {
      manifest_url: manifest_url.to_string(),
      scope: scope.to_string(),
      start_url: start_url.to_string(),
      name,
      short_name,
      display: DisplayMode::from_manifest(manifest.display.as_deref()),
      orientation: Orientation::from_manifest(manifest.orientation.as_deref()),
      theme_color: manifest.theme_color.as_deref().and_then(parse_color),
      background_color: manifest.background_color.as_deref().and_then(parse_color),
      icon_hashes: IconHashes::new(),
      primary_icon: None,
      badge_icon: None,
    },
    primary_icon_url,
    badge_icon_url,
  })
}

// ─── Fetcher ─────────────────────────────────────────────────────────────────

/// Fetches manifests and icons with a shared [`reqwest::Client`].
///
/// Cheap to clone — the inner client is `Arc`-based.
#[derive(Clone)]
pub struct HttpManifestFetcher {
  client: Client,
}

impl HttpManifestFetcher {
  /// `request_timeout` bounds each individual HTTP request.
  pub fn new(request_timeout: Duration) -> Result<Self> {
    let client = Client::builder().timeout(request_timeout).build()?;
    Ok(Self { client })
  }

  pub fn with_client(client: Client) -> Self { Self { client } }

  async fn download_icon(&self, url: &str) -> Option<FetchedIcon> {
    let response = match self.client.get(url).send().await {
      Ok(r) if r.status().is_success() => r,
      Ok(r) => {
        tracing::debug!(url, status = %r.status(), "icon download refused");
        return None;
      }
      Err(e) => {
        tracing::debug!(url, "icon download failed: {e}");
        return None;
      }
    };
    let data = response.bytes().await.ok()?.to_vec();
    Some(FetchedIcon {
      url: url.to_owned(),
      hash: hash_icon(&data),
      data,
    })
  }
}

impl ManifestFetcher for HttpManifestFetcher {
  async fn fetch(&self, scope: &str, manifest_url: &str) -> FetchOutcome {
    let url = match Url::parse(manifest_url) {
      Ok(u) => u,
      Err(e) => return FetchOutcome::Failed(format!("bad manifest url: {e}")),
    };

    let response = match self.client.get(url.clone()).send().await {
      Ok(r) => r,
      Err(e) => return FetchOutcome::Failed(e.to_string()),
    };
    if !response.status().is_success() {
      tracing::debug!(scope, manifest_url, status = %response.status(), "no manifest");
      return FetchOutcome::NoData;
    }
    let manifest: WebManifest = match response.json().await {
      Ok(m) => m,
      Err(e) => {
        tracing::warn!(scope, manifest_url, "unparseable manifest: {e}");
        return FetchOutcome::NoData;
      }
    };

    let Some(resolved) = resolve_manifest(&manifest, &url) else {
      tracing::warn!(scope, manifest_url, "manifest lacks name or start_url");
      return FetchOutcome::NoData;
    };
    let mut data = resolved.data;

    // Without the launcher icon there is nothing reliable to compare.
    if let Some(icon_url) = resolved.primary_icon_url {
      let Some(icon) = self.download_icon(&icon_url).await else {
        return FetchOutcome::NoData;
      };
      data.icon_hashes.insert(icon.url.clone(), icon.hash.clone());
      data.primary_icon = Some(icon);
    }
    if let Some(icon_url) = resolved.badge_icon_url
      && let Some(icon) = self.download_icon(&icon_url).await
    {
      data.icon_hashes.insert(icon.url.clone(), icon.hash.clone());
      data.badge_icon = Some(icon);
    }

    FetchOutcome::Data(data)
  }
}
