//! Release version parsing and ordering.
//!
//! Every stage that compares releases (label bucketing, choosing `latest`,
//! sorting the manifest) goes through [`Version`]'s `Ord` impl, so there is
//! exactly one notion of "newer" in the crate.
//!
//! ## Tag grammar
//!
//! Tags are semantic versions with an optional leading `v`:
//!
//! ```text
//! v3.24.1          → (3, 24, 1, "")
//! v4.0.0-alpha.2   → (4, 0, 0, "alpha.2")
//! 5.1.0-rc.1+g12ab → (5, 1, 0, "rc.1+g12ab")
//! v1.13            → rejected (no patch component)
//! ```
//!
//! The annotation is everything after the first hyphen. An empty annotation
//! marks a stable release.
//!
//! ## Ordering
//!
//! `(major, minor, patch)` first. At an equal triple a stable release ranks
//! above any annotated one, and two annotations compare by semver pre-release
//! precedence (`alpha.2 < alpha.10 < beta`).

use semver::Prerelease;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid version tag {tag:?}: {reason}")]
pub struct VersionError {
    pub tag: String,
    pub reason: String,
}

/// A parsed release version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Version {
    #[serde(rename = "majorVersion")]
    pub major: u64,
    #[serde(rename = "minorVersion")]
    pub minor: u64,
    #[serde(rename = "patchVersion")]
    pub patch: u64,
    /// Pre-release/build suffix; empty for stable releases.
    pub annotation: String,
}

impl Version {
    /// Parse a release tag such as `v3.24.1` or `v4.0.0-alpha.2`.
    pub fn parse(tag: &str) -> Result<Self, VersionError> {
        let trimmed = tag.trim();
        let raw = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);

        let parsed = semver::Version::parse(raw).map_err(|e| VersionError {
            tag: tag.to_string(),
            reason: e.to_string(),
        })?;

        // A non-empty pre-release guarantees the first hyphen is its delimiter;
        // build metadata alone (`1.0.0+build-7`) carries no annotation.
        let annotation = if parsed.pre.is_empty() {
            String::new()
        } else {
            raw.split_once('-')
                .map(|(_, rest)| rest.to_string())
                .unwrap_or_default()
        };

        Ok(Self {
            major: parsed.major,
            minor: parsed.minor,
            patch: parsed.patch,
            annotation,
        })
    }

    /// The `vMAJOR.MINOR.x` bucket this version belongs to.
    pub fn label(&self) -> String {
        format!("v{}.{}.x", self.major, self.minor)
    }

    pub fn is_stable(&self) -> bool {
        self.annotation.is_empty()
    }

    /// Whether the numeric triple is strictly below `floor`'s.
    ///
    /// Annotations are ignored: `v1.0.0-alpha` is not below a `v1.0.0` floor.
    pub fn is_below(&self, floor: &Version) -> bool {
        self.triple() < floor.triple()
    }

    fn triple(&self) -> (u64, u64, u64) {
        (self.major, self.minor, self.patch)
    }
}

/// Pre-release precedence of an annotation, ignoring any `+build` suffix.
fn precedence(annotation: &str) -> Prerelease {
    let pre = annotation.split('+').next().unwrap_or(annotation);
    Prerelease::new(pre).unwrap_or(Prerelease::EMPTY)
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.triple().cmp(&other.triple()).then_with(|| {
            match (self.is_stable(), other.is_stable()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => precedence(&self.annotation)
                    .cmp(&precedence(&other.annotation))
                    .then_with(|| self.annotation.cmp(&other.annotation)),
            }
        })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}.{}", self.major, self.minor, self.patch)?;
        if !self.annotation.is_empty() {
            write!(f, "-{}", self.annotation)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(tag: &str) -> Version {
        Version::parse(tag).unwrap()
    }

    // =========================================================================
    // Parsing
    // =========================================================================

    #[test]
    fn parses_prefixed_tag() {
        let parsed = v("v3.24.1");
        assert_eq!((parsed.major, parsed.minor, parsed.patch), (3, 24, 1));
        assert!(parsed.is_stable());
    }

    #[test]
    fn parses_unprefixed_tag() {
        assert_eq!(v("1.2.3"), v("v1.2.3"));
    }

    #[test]
    fn annotation_is_everything_after_first_hyphen() {
        assert_eq!(v("v4.0.0-alpha.2").annotation, "alpha.2");
        assert_eq!(v("v4.0.0-pre-release.2").annotation, "pre-release.2");
        assert_eq!(v("v5.1.0-rc.1+g12ab").annotation, "rc.1+g12ab");
    }

    #[test]
    fn build_metadata_alone_is_stable() {
        let parsed = v("v1.0.0+build-7");
        assert!(parsed.is_stable());
    }

    #[test]
    fn rejects_missing_patch() {
        let err = Version::parse("v1.13").unwrap_err();
        assert_eq!(err.tag, "v1.13");
    }

    #[test]
    fn rejects_garbage() {
        assert!(Version::parse("nightly").is_err());
        assert!(Version::parse("").is_err());
        assert!(Version::parse("vx.y.z").is_err());
    }

    #[test]
    fn label_groups_by_minor_line() {
        assert_eq!(v("v3.24.1").label(), "v3.24.x");
        assert_eq!(v("v4.0.0-alpha.1").label(), "v4.0.x");
    }

    #[test]
    fn display_round_trips_tag_shape() {
        assert_eq!(v("3.1.0").to_string(), "v3.1.0");
        assert_eq!(v("v4.0.0-beta.1").to_string(), "v4.0.0-beta.1");
    }

    // =========================================================================
    // Ordering
    // =========================================================================

    #[test]
    fn orders_numerically_not_lexically() {
        assert!(v("v1.10.0") > v("v1.9.3"));
        assert!(v("v2.0.0") > v("v1.99.99"));
        assert!(v("v1.0.10") > v("v1.0.9"));
    }

    #[test]
    fn stable_beats_annotated_at_same_triple() {
        assert!(v("v1.1.0") > v("v1.1.0-alpha"));
        assert!(v("v1.1.0-rc.9") < v("v1.1.0"));
    }

    #[test]
    fn annotated_patch_still_beats_older_patch() {
        assert!(v("v1.1.1-alpha") > v("v1.1.0"));
    }

    #[test]
    fn annotations_use_prerelease_precedence() {
        assert!(v("v4.0.0-alpha.10") > v("v4.0.0-alpha.2"));
        assert!(v("v4.0.0-beta") > v("v4.0.0-alpha.10"));
    }

    #[test]
    fn equal_only_when_identical() {
        assert_eq!(v("v1.0.0").cmp(&v("1.0.0")), Ordering::Equal);
        assert_ne!(v("v1.0.0-a+x").cmp(&v("v1.0.0-a+y")), Ordering::Equal);
    }

    #[test]
    fn floor_comparison_ignores_annotation() {
        let floor = v("v1.0.0");
        assert!(!v("v1.0.0-alpha").is_below(&floor));
        assert!(!v("v1.0.0").is_below(&floor));
        assert!(v("v0.9.9").is_below(&floor));
    }
}
