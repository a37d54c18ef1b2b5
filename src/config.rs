//! Harvest configuration.
//!
//! Handles loading, validating, and merging the `harvest.toml` file. The user
//! file is sparse: it is merged table-by-table on top of the stock defaults,
//! so it only needs the keys it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [repository]
//! owner = "fastify"
//! name = "fastify"
//! trunk = "master"                  # default branch, published as an alias
//! api_base = "https://api.github.com"
//! web_base = "https://github.com"
//! docs_dir = "docs"                 # docs root inside each release archive
//! user_agent = "docs-harvest"
//!
//! [releases]
//! min_release = "v1.13.0"           # floor, inclusive
//! annotated_labels = "keep"         # "keep" | "drop"
//!
//! [fetch]
//! # max_downloads = 8               # omit for 2 x CPU cores
//! timeout_secs = 120
//! max_archive_mb = 256
//!
//! [toc]
//! include_unlisted = false
//! synthesize_root_index = true
//! default_index = "..."
//!
//! [site]
//! docs_route = "/docs"
//! layout = "docs_page.html"
//! strip = ["<h1 align=\"center\">Fastify</h1>\n"]
//!
//! [site.named_pages]
//! "Ecosystem.md" = "/ecosystem"
//!
//! [ecosystem]
//! enabled = true
//! sources = ["Guides/Ecosystem.md", "Ecosystem.md"]
//! core_heading = "Core"
//! community_heading = "Community"
//!
//! [processing]
//! # max_processes = 4               # omit for auto = CPU cores
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Complete harvest configuration.
///
/// All fields have defaults; a missing config file yields
/// `HarvestConfig::default()`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HarvestConfig {
    /// Where releases and archives come from.
    pub repository: RepositoryConfig,
    /// Release selection.
    pub releases: ReleasesConfig,
    /// Archive download settings.
    pub fetch: FetchConfig,
    /// Table-of-contents extraction.
    pub toc: TocConfig,
    /// Destination-site routes and page layout.
    pub site: SiteConfig,
    /// Plugin registry extraction.
    pub ecosystem: EcosystemConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl HarvestConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let repo = &self.repository;
        for (key, value) in [
            ("repository.owner", &repo.owner),
            ("repository.name", &repo.name),
            ("repository.trunk", &repo.trunk),
            ("repository.docs_dir", &repo.docs_dir),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation(format!("{key} must not be empty")));
            }
        }
        Version::parse(&self.releases.min_release).map_err(|e| {
            ConfigError::Validation(format!("releases.min_release: {e}"))
        })?;
        if self.fetch.max_downloads == Some(0) {
            return Err(ConfigError::Validation(
                "fetch.max_downloads must be at least 1".into(),
            ));
        }
        let route = &self.site.docs_route;
        if !route.starts_with('/') || route.ends_with('/') {
            return Err(ConfigError::Validation(
                "site.docs_route must start with '/' and not end with '/'".into(),
            ));
        }
        for (file, target) in &self.site.named_pages {
            if !file.ends_with(".md") || file.contains('/') {
                return Err(ConfigError::Validation(format!(
                    "site.named_pages key {file:?} must be a bare .md file name"
                )));
            }
            if !target.starts_with('/') {
                return Err(ConfigError::Validation(format!(
                    "site.named_pages route {target:?} must start with '/'"
                )));
            }
        }
        if self.ecosystem.enabled && self.ecosystem.sources.is_empty() {
            return Err(ConfigError::Validation(
                "ecosystem.sources must not be empty when ecosystem is enabled".into(),
            ));
        }
        Ok(())
    }

    /// The parsed release floor. Only valid after [`validate`](Self::validate).
    pub fn min_release(&self) -> Result<Version, ConfigError> {
        Version::parse(&self.releases.min_release)
            .map_err(|e| ConfigError::Validation(format!("releases.min_release: {e}")))
    }
}

/// Source repository coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RepositoryConfig {
    pub owner: String,
    pub name: String,
    /// Default branch, published under its own name as a docs version.
    pub trunk: String,
    /// REST API root used for the release feed.
    pub api_base: String,
    /// Web root used for trunk archives and blob links.
    pub web_base: String,
    /// Directory holding the docs inside each archive.
    pub docs_dir: String,
    pub user_agent: String,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            owner: "fastify".to_string(),
            name: "fastify".to_string(),
            trunk: "master".to_string(),
            api_base: "https://api.github.com".to_string(),
            web_base: "https://github.com".to_string(),
            docs_dir: "docs".to_string(),
            user_agent: "docs-harvest".to_string(),
        }
    }
}

impl RepositoryConfig {
    /// First page of the release feed.
    pub fn releases_url(&self) -> String {
        format!(
            "{}/repos/{}/{}/releases?per_page=100",
            self.api_base.trim_end_matches('/'),
            self.owner,
            self.name
        )
    }

    /// Zip archive of the trunk branch.
    pub fn trunk_archive_url(&self) -> String {
        format!(
            "{}/{}/{}/archive/{}.zip",
            self.web_base.trim_end_matches('/'),
            self.owner,
            self.name,
            self.trunk
        )
    }

    /// Canonical blob URL of the trunk docs folder, without trailing slash.
    pub fn docs_blob_base(&self) -> String {
        format!(
            "{}/{}/{}/blob/{}/{}",
            self.web_base.trim_end_matches('/'),
            self.owner,
            self.name,
            self.trunk,
            self.docs_dir.trim_matches('/')
        )
    }
}

/// What to do with a label whose best release is a pre-release.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotatedLabels {
    /// Publish the label using its best annotated release.
    #[default]
    Keep,
    /// Drop labels that have no stable release at all.
    Drop,
}

/// Release selection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReleasesConfig {
    /// Oldest release to publish (inclusive).
    pub min_release: String,
    pub annotated_labels: AnnotatedLabels,
}

impl Default for ReleasesConfig {
    fn default() -> Self {
        Self {
            min_release: "v1.13.0".to_string(),
            annotated_labels: AnnotatedLabels::Keep,
        }
    }
}

/// Archive download settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchConfig {
    /// Concurrent downloads. When absent, twice the CPU core count.
    pub max_downloads: Option<usize>,
    /// Per-request timeout handed to the HTTP transport.
    pub timeout_secs: u64,
    /// Upper bound on a single archive body.
    pub max_archive_mb: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_downloads: None,
            timeout_secs: 120,
            max_archive_mb: 256,
        }
    }
}

/// Table-of-contents extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TocConfig {
    /// Append pages and indexed subsections that no index links to.
    pub include_unlisted: bool,
    /// Synthesize a root index for releases that predate one.
    pub synthesize_root_index: bool,
    /// Body of the synthesized root index.
    pub default_index: String,
}

impl Default for TocConfig {
    fn default() -> Self {
        Self {
            include_unlisted: false,
            synthesize_root_index: true,
            default_index: DEFAULT_INDEX.to_string(),
        }
    }
}

const DEFAULT_INDEX: &str = "\
Welcome to the Fastify documentation:

This documentation utilizes a very formal style in an effort to document
Fastify's API and implementation details thoroughly for the developer who
needs such.

## Where To Start

Complete newcomers to Fastify should first read our [Getting Started](./Getting-Started.md)
guide.

Developers experienced with Fastify should consult the
api documentation directly to find the topic they are
seeking more information about.
";

/// Destination-site settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Route prefix of all versioned docs, e.g. `/docs`.
    pub docs_route: String,
    /// Layout name written into every page's frontmatter.
    pub layout: String,
    /// Literal snippets removed from every document before rewriting.
    pub strip: Vec<String>,
    /// Pages that live at a fixed route regardless of version/section.
    pub named_pages: BTreeMap<String, String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            docs_route: "/docs".to_string(),
            layout: "docs_page.html".to_string(),
            strip: vec!["<h1 align=\"center\">Fastify</h1>\n".to_string()],
            named_pages: BTreeMap::from([("Ecosystem.md".to_string(), "/ecosystem".to_string())]),
        }
    }
}

/// Plugin registry extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EcosystemConfig {
    pub enabled: bool,
    /// Candidate paths relative to the docs root; the first that exists wins.
    pub sources: Vec<String>,
    pub core_heading: String,
    pub community_heading: String,
}

impl Default for EcosystemConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sources: vec!["Guides/Ecosystem.md".to_string(), "Ecosystem.md".to_string()],
            core_heading: "Core".to_string(),
            community_heading: "Community".to_string(),
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel extraction/emission workers.
    /// When absent or null, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

fn available_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Resolve the effective thread count for extraction and emission.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = available_cores();
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores).max(1)
}

/// Resolve the download pool size.
///
/// Downloads are I/O bound, so the default oversubscribes the cores twice;
/// an explicit value is taken as-is.
pub fn effective_downloads(config: &FetchConfig) -> usize {
    config
        .max_downloads
        .unwrap_or_else(|| available_cores() * 2)
        .max(1)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(HarvestConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<HarvestConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: HarvestConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`, falling back to stock defaults when it is absent.
pub fn load_config(path: &Path) -> Result<HarvestConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = load_raw_config(path)?;
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `harvest.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# docs-harvest configuration
# ==========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# ---------------------------------------------------------------------------
# Source repository
# ---------------------------------------------------------------------------
[repository]
owner = "fastify"
name = "fastify"

# Default branch. Always published (and always re-downloaded) under its own name.
trunk = "master"

api_base = "https://api.github.com"
web_base = "https://github.com"

# Directory holding the documentation inside every release archive.
docs_dir = "docs"

user_agent = "docs-harvest"

# ---------------------------------------------------------------------------
# Release selection
# ---------------------------------------------------------------------------
[releases]
# Oldest release to publish. The floor itself is included.
min_release = "v1.13.0"

# A minor line (v4.0.x) whose newest release is a pre-release:
#   "keep" publishes it using that pre-release
#   "drop" leaves the line out until it has a stable release
annotated_labels = "keep"

# ---------------------------------------------------------------------------
# Archive downloads
# ---------------------------------------------------------------------------
[fetch]
# Concurrent downloads. Omit to use twice the number of CPU cores.
# max_downloads = 8

# Per-request timeout in seconds.
timeout_secs = 120

# Largest accepted archive, in megabytes.
max_archive_mb = 256

# ---------------------------------------------------------------------------
# Table of contents
# ---------------------------------------------------------------------------
[toc]
# Also publish pages and indexed sub-directories no index links to,
# after the listed ones, in file-name order.
include_unlisted = false

# Old releases without docs/index.md get a generated one instead of failing.
# With false, such releases are reported as failed.
synthesize_root_index = true

# Body of the generated index.
# default_index = "..."

# ---------------------------------------------------------------------------
# Destination site
# ---------------------------------------------------------------------------
[site]
# Route prefix of the versioned docs.
docs_route = "/docs"

# Layout written into every page's frontmatter.
layout = "docs_page.html"

# Literal snippets removed from every page (e.g. GitHub-only headers).
strip = ["<h1 align=\"center\">Fastify</h1>\n"]

# Pages served from a fixed route no matter which version links to them.
[site.named_pages]
"Ecosystem.md" = "/ecosystem"

# ---------------------------------------------------------------------------
# Plugin registry (read from the trunk docs)
# ---------------------------------------------------------------------------
[ecosystem]
enabled = true
sources = ["Guides/Ecosystem.md", "Ecosystem.md"]
core_heading = "Core"
community_heading = "Community"

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel extraction/emission workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
