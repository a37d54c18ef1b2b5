//! Shared types used across all pipeline stages.
//!
//! The resolved manifest is written to `releases.json` between stages and the
//! TOC ends up in `docs.yml`, so field names here are the camelCase names the
//! site generator reads.

use crate::version::Version;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Whether a manifest entry is a real tagged release or a synthetic alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseKind {
    Dated,
    Alias,
}

/// How the fetcher treats an entry's archive on later runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachePolicy {
    /// Reused while its cache key and extracted tree are present.
    ContentAddressed,
    /// Downloaded on every run (the trunk branch moves).
    AlwaysRefetch,
}

/// One entry of the release manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    /// Display name: the release title for dated entries, the alias otherwise.
    pub name: String,
    /// Source tag this entry was resolved from.
    pub tag: String,
    /// `vMAJOR.MINOR.x`, or the trunk name.
    pub label: String,
    /// URL segment under the docs route: the label, `latest` or the trunk name.
    pub docs_path: String,
    /// Full version shown to readers, e.g. `v3.24.1`.
    pub full_version: String,
    /// Parsed version; absent for the trunk.
    #[serde(flatten)]
    pub version: Option<Version>,
    /// Zip archive URL.
    pub url: String,
    /// Hex SHA-256 of `url`.
    pub cache_key: String,
    pub kind: ReleaseKind,
    /// Label of the release an alias copies (`latest` only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias_of: Option<String>,
    pub cache_policy: CachePolicy,
}

impl Release {
    pub fn is_alias(&self) -> bool {
        self.kind == ReleaseKind::Alias
    }
}

/// The resolved, ordered set of releases: `latest`, trunk, then dated
/// releases newest first.
///
/// Built once by the resolver and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ReleaseManifest {
    releases: Vec<Release>,
}

impl ReleaseManifest {
    pub(crate) fn new(releases: Vec<Release>) -> Self {
        Self { releases }
    }

    pub fn releases(&self) -> &[Release] {
        &self.releases
    }

    pub fn len(&self) -> usize {
        self.releases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.releases.is_empty()
    }

    /// The `latest` alias entry.
    pub fn latest(&self) -> Option<&Release> {
        self.releases
            .iter()
            .find(|r| r.is_alias() && r.alias_of.is_some())
    }

    /// The trunk alias entry.
    pub fn trunk(&self) -> Option<&Release> {
        self.releases
            .iter()
            .find(|r| r.cache_policy == CachePolicy::AlwaysRefetch)
    }

    /// Docs paths in manifest order.
    pub fn docs_paths(&self) -> Vec<String> {
        self.releases.iter().map(|r| r.docs_path.clone()).collect()
    }
}

/// One page's resolved metadata.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentEntry {
    /// Source file name, e.g. `Getting-Started.md`.
    pub file_name: String,
    /// Stem with dashes shown as spaces.
    pub display_name: String,
    #[serde(skip)]
    pub source_path: PathBuf,
    #[serde(skip)]
    pub destination_path: PathBuf,
    pub slug: String,
    /// Nesting path below the docs root, `/`-separated; empty at the top.
    pub section: String,
    /// Docs path of the owning release.
    pub version: String,
    pub label: String,
    pub full_version: String,
    /// Site path of the rendered page.
    pub link: String,
    /// Body used instead of `source_path` (synthesized indexes).
    #[serde(skip)]
    pub inline_body: Option<String>,
}

impl DocumentEntry {
    pub fn is_index(&self) -> bool {
        self.slug == "index"
    }

    /// Path of the source file relative to the docs root.
    pub fn relative_source(&self) -> String {
        if self.section.is_empty() {
            self.file_name.clone()
        } else {
            format!("{}/{}", self.section, self.file_name)
        }
    }
}

/// Ordered sections of one version.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VersionToc {
    pub docs_path: String,
    pub sections: Vec<TocSection>,
}

/// Ordered pages of one section; the index page comes first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TocSection {
    pub name: String,
    pub entries: Vec<DocumentEntry>,
}

/// version → section → ordered entries.
///
/// Versions keep manifest order and sections keep first-discovery order,
/// which a plain map would lose.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TocTree {
    versions: Vec<VersionToc>,
}

impl TocTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a version, grouping its entries by section in the order
    /// sections first appear.
    pub fn push_version(&mut self, docs_path: &str, entries: Vec<DocumentEntry>) {
        let mut sections: Vec<TocSection> = Vec::new();
        for entry in entries {
            match sections.iter_mut().find(|s| s.name == entry.section) {
                Some(section) => section.entries.push(entry),
                None => sections.push(TocSection {
                    name: entry.section.clone(),
                    entries: vec![entry],
                }),
            }
        }
        self.versions.push(VersionToc {
            docs_path: docs_path.to_string(),
            sections,
        });
    }

    pub fn versions(&self) -> &[VersionToc] {
        &self.versions
    }

    pub fn get(&self, docs_path: &str) -> Option<&VersionToc> {
        self.versions.iter().find(|v| v.docs_path == docs_path)
    }

    /// Every entry of every version, in tree order.
    pub fn entries(&self) -> impl Iterator<Item = &DocumentEntry> {
        self.versions
            .iter()
            .flat_map(|v| v.sections.iter())
            .flat_map(|s| s.entries.iter())
    }

    pub fn document_count(&self) -> usize {
        self.entries().count()
    }
}

struct SectionsMap<'a>(&'a [TocSection]);

impl Serialize for SectionsMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for section in self.0 {
            map.serialize_entry(&section.name, &section.entries)?;
        }
        map.end()
    }
}

impl Serialize for TocTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.versions.len()))?;
        for version in &self.versions {
            map.serialize_entry(&version.docs_path, &SectionsMap(&version.sections))?;
        }
        map.end()
    }
}
