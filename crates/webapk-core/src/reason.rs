//! Why an update was (or was not) requested.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, EnumString};

use crate::{Error, Result};

/// The single reason reported by [`crate::policy::UpdatePolicy::needs_update`].
///
/// Variants are declared in priority order: when several fields differ, the
/// earliest variant wins.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  AsRefStr,
  EnumIter,
  EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UpdateReason {
  None,
  StaleShellVersion,
  PrimaryIconDiffers,
  BadgeIconDiffers,
  ScopeDiffers,
  StartUrlDiffers,
  ShortNameDiffers,
  NameDiffers,
  BackgroundColorDiffers,
  ThemeColorDiffers,
  OrientationDiffers,
  DisplayModeDiffers,
}

impl UpdateReason {
  pub fn needs_update(self) -> bool { self != Self::None }

  /// Numeric code sent to the update server.
  pub fn code(self) -> u8 { self as u8 }

  pub fn as_str(&self) -> &str { self.as_ref() }

  pub fn parse(s: &str) -> Result<Self> {
    s.parse().map_err(|_| Error::UnknownReason(s.to_owned()))
  }
}

#[cfg(test)]
mod tests {
  use strum::IntoEnumIterator;

  use super::*;

  #[test]
  fn codes_follow_priority_order() {
    let codes: Vec<u8> = UpdateReason::iter().map(UpdateReason::code).collect();
    assert_eq!(codes, (0..12).collect::<Vec<u8>>());
    assert_eq!(UpdateReason::StaleShellVersion.code(), 1);
  }

  #[test]
  fn string_forms_round_trip() {
    for reason in UpdateReason::iter() {
      assert_eq!(UpdateReason::parse(reason.as_str()).unwrap(), reason);
    }
    assert_eq!(UpdateReason::StartUrlDiffers.as_str(), "start_url_differs");
  }

  #[test]
  fn only_none_means_no_update() {
    assert!(!UpdateReason::None.needs_update());
    assert!(
      UpdateReason::iter()
        .skip(1)
        .all(UpdateReason::needs_update)
    );
  }
}
