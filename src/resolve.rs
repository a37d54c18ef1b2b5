//! Release resolution: release feed → ordered [`ReleaseManifest`].
//!
//! ## Steps
//!
//! 1. Drop drafts, pre-releases, unparseable tags and records without an
//!    archive URL.
//! 2. Drop releases whose `(major, minor, patch)` is below the floor. The
//!    floor itself is kept.
//! 3. Apply the annotated-label policy (`keep` | `drop`).
//! 4. Bucket by label (`v3.24.x`) and keep the greatest release per bucket
//!    under [`Version`]'s ordering. Exact ties keep the first one seen.
//! 5. The greatest stable winner becomes `latest`. No stable winner is fatal.
//! 6. Append the trunk alias.
//! 7. Order: `latest`, trunk, then winners newest first.
//!
//! Every dropped record is returned as a [`DroppedRelease`] so callers can
//! report why a tag is missing from the site.

use crate::cache::hash_url;
use crate::config::{AnnotatedLabels, HarvestConfig};
use crate::remote::{FetchError, HttpBackend};
use crate::types::{CachePolicy, Release, ReleaseKind, ReleaseManifest};
use crate::version::{Version, VersionError};
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Docs path of the newest-stable alias.
pub const LATEST: &str = "latest";

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("no release survived filtering; nothing to publish")]
    NoReleases,
    #[error("no stable release to alias as latest")]
    NoLatest,
    #[error("invalid release floor: {0}")]
    InvalidFloor(#[from] VersionError),
}

/// One record of the release feed, as served by the REST API.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ReleaseRecord {
    #[serde(default)]
    pub name: Option<String>,
    pub tag_name: String,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub zipball_url: Option<String>,
}

/// Why a record did not make it into the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    Draft,
    Prerelease,
    InvalidTag(String),
    MissingArchive,
    BelowFloor,
    Annotated,
    Superseded { by: String },
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::Draft => write!(f, "draft"),
            DropReason::Prerelease => write!(f, "pre-release"),
            DropReason::InvalidTag(reason) => write!(f, "invalid tag: {reason}"),
            DropReason::MissingArchive => write!(f, "no archive URL"),
            DropReason::BelowFloor => write!(f, "older than the release floor"),
            DropReason::Annotated => write!(f, "annotated release"),
            DropReason::Superseded { by } => write!(f, "superseded by {by}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedRelease {
    pub tag: String,
    pub reason: DropReason,
}

/// Inputs of [`resolve`] besides the records themselves.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    pub floor: Version,
    pub annotated_labels: AnnotatedLabels,
    /// Trunk branch name; also its docs path.
    pub trunk: String,
    pub trunk_url: String,
}

impl ResolveOptions {
    pub fn from_config(config: &HarvestConfig) -> Result<Self, ResolveError> {
        Ok(Self {
            floor: Version::parse(&config.releases.min_release)?,
            annotated_labels: config.releases.annotated_labels,
            trunk: config.repository.trunk.clone(),
            trunk_url: config.repository.trunk_archive_url(),
        })
    }
}

#[derive(Debug)]
pub struct ResolveOutcome {
    pub manifest: ReleaseManifest,
    pub dropped: Vec<DroppedRelease>,
}

struct Candidate<'a> {
    version: Version,
    record: &'a ReleaseRecord,
    url: &'a str,
}

/// Resolve feed records into the release manifest.
pub fn resolve(
    records: &[ReleaseRecord],
    options: &ResolveOptions,
) -> Result<ResolveOutcome, ResolveError> {
    let mut dropped = Vec::new();
    let mut reject = |tag: &str, reason: DropReason| {
        match &reason {
            DropReason::InvalidTag(_) => warn!("dropping release {tag}: {reason}"),
            _ => debug!("dropping release {tag}: {reason}"),
        }
        dropped.push(DroppedRelease {
            tag: tag.to_string(),
            reason,
        });
    };

    let mut candidates: Vec<Candidate> = Vec::new();
    for record in records {
        let tag = record.tag_name.as_str();
        if record.draft {
            reject(tag, DropReason::Draft);
            continue;
        }
        if record.prerelease {
            reject(tag, DropReason::Prerelease);
            continue;
        }
        let version = match Version::parse(tag) {
            Ok(v) => v,
            Err(e) => {
                reject(tag, DropReason::InvalidTag(e.reason));
                continue;
            }
        };
        let Some(url) = record.zipball_url.as_deref().filter(|u| !u.is_empty()) else {
            reject(tag, DropReason::MissingArchive);
            continue;
        };
        if version.is_below(&options.floor) {
            reject(tag, DropReason::BelowFloor);
            continue;
        }
        if options.annotated_labels == AnnotatedLabels::Drop && !version.is_stable() {
            reject(tag, DropReason::Annotated);
            continue;
        }
        candidates.push(Candidate {
            version,
            record,
            url,
        });
    }

    // One winner per label, buckets in first-seen order.
    let mut winners: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        let label = candidate.version.label();
        match winners.iter_mut().find(|w| w.version.label() == label) {
            Some(current) if candidate.version > current.version => {
                let loser = std::mem::replace(current, candidate);
                reject(
                    &loser.record.tag_name,
                    DropReason::Superseded {
                        by: current.record.tag_name.clone(),
                    },
                );
            }
            Some(current) => reject(
                &candidate.record.tag_name,
                DropReason::Superseded {
                    by: current.record.tag_name.clone(),
                },
            ),
            None => winners.push(candidate),
        }
    }

    if winners.is_empty() {
        return Err(ResolveError::NoReleases);
    }

    // Stable sort keeps first-seen order among equal versions.
    winners.sort_by(|a, b| b.version.cmp(&a.version));

    let latest = winners
        .iter()
        .find(|w| w.version.is_stable())
        .ok_or(ResolveError::NoLatest)?;

    let mut releases = Vec::with_capacity(winners.len() + 2);
    releases.push(latest_alias(latest));
    releases.push(trunk_alias(options));
    releases.extend(winners.iter().map(dated_release));

    info!(
        "resolved {} labels, latest = {}",
        winners.len(),
        latest.record.tag_name
    );

    Ok(ResolveOutcome {
        manifest: ReleaseManifest::new(releases),
        dropped,
    })
}

fn dated_release(candidate: &Candidate) -> Release {
    let record = candidate.record;
    let label = candidate.version.label();
    let name = record
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(&record.tag_name);
    Release {
        name: name.to_string(),
        tag: record.tag_name.clone(),
        docs_path: label.clone(),
        label,
        full_version: record.tag_name.clone(),
        version: Some(candidate.version.clone()),
        url: candidate.url.to_string(),
        cache_key: hash_url(candidate.url),
        kind: ReleaseKind::Dated,
        alias_of: None,
        cache_policy: CachePolicy::ContentAddressed,
    }
}

fn latest_alias(candidate: &Candidate) -> Release {
    let dated = dated_release(candidate);
    Release {
        name: LATEST.to_string(),
        docs_path: LATEST.to_string(),
        kind: ReleaseKind::Alias,
        alias_of: Some(dated.label.clone()),
        ..dated
    }
}

fn trunk_alias(options: &ResolveOptions) -> Release {
    Release {
        name: options.trunk.clone(),
        tag: options.trunk.clone(),
        label: options.trunk.clone(),
        docs_path: options.trunk.clone(),
        full_version: options.trunk.clone(),
        version: None,
        url: options.trunk_url.clone(),
        cache_key: hash_url(&options.trunk_url),
        kind: ReleaseKind::Alias,
        alias_of: None,
        cache_policy: CachePolicy::AlwaysRefetch,
    }
}

// =============================================================================
// Release feed
// =============================================================================

/// Extract the `rel="next"` target from a `Link` header.
pub fn next_page_url(link_header: &str) -> Option<String> {
    link_header.split(',').find_map(|part| {
        let (target, params) = part.split_once(';')?;
        let is_next = params.split(';').any(|param| {
            let param = param.trim();
            param == "rel=\"next\"" || param == "rel=next"
        });
        if !is_next {
            return None;
        }
        let target = target.trim();
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(str::to_string)
    })
}

/// Download every page of the release feed starting at `first_page`.
pub fn fetch_release_feed(
    backend: &dyn HttpBackend,
    first_page: &str,
) -> Result<Vec<ReleaseRecord>, FetchError> {
    let mut records = Vec::new();
    let mut seen = HashSet::new();
    let mut next = Some(first_page.to_string());

    while let Some(url) = next.take() {
        if !seen.insert(url.clone()) {
            warn!("release feed links back to {url}; stopping pagination");
            break;
        }
        let response = backend.get(&url)?;
        let page: Vec<ReleaseRecord> = serde_json::from_slice(&response.body)?;
        debug!("feed page {url}: {} records", page.len());
        records.extend(page);
        next = response.link.as_deref().and_then(next_page_url);
    }

    info!("release feed: {} records", records.len());
    Ok(records)
}
