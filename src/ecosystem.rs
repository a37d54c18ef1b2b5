//! Plugin registry extraction from the trunk's ecosystem document.
//!
//! The document has a `Core` heading and a `Community` heading, each followed
//! by a bullet list of plugins:
//!
//! ```text
//! #### [Core](#core)
//! - [`@acme/cors`](https://github.com/acme/cors) Enables CORS.
//! - [`@acme/static`](https://github.com/acme/static) Serve files,
//!   with a continuation line.
//!
//! #### [Community](#community)
//! - [`widget-auth`](https://github.com/someone/widget-auth)
//! ```
//!
//! Headings match by their text with link syntax removed, and fenced code
//! blocks are ignored. Core entries run up to the `Community` heading;
//! community entries run up to the next heading. The result is written to
//! `data/ecosystem.yml`.

use crate::config::HarvestConfig;
use crate::emit::write_if_changed;
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum EcosystemError {
    #[error("no ecosystem document found (tried {tried:?})")]
    Missing { tried: Vec<PathBuf> },
    #[error("ecosystem document has no '{heading}' heading")]
    MissingHeading { heading: String },
    #[error("invalid plugin entry: {line:?}")]
    InvalidEntry { line: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

static ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[`([-a-zA-Z0-9./@]+)`\]\(([^)]+)\)(\s*(.+))?").expect("literal pattern")
});

static HEADING_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\([^)]*\)").expect("literal pattern"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plugin {
    pub name: String,
    pub url: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginRegistry {
    pub core_plugins: Vec<Plugin>,
    pub community_plugins: Vec<Plugin>,
}

/// Shape of `data/ecosystem.yml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EcosystemData {
    pub plugins: PluginRegistry,
}

#[derive(Debug, Clone)]
pub struct EcosystemOptions {
    pub docs_dir: String,
    pub sources: Vec<String>,
    pub core_heading: String,
    pub community_heading: String,
}

impl EcosystemOptions {
    pub fn from_config(config: &HarvestConfig) -> Self {
        Self {
            docs_dir: config.repository.docs_dir.clone(),
            sources: config.ecosystem.sources.clone(),
            core_heading: config.ecosystem.core_heading.clone(),
            community_heading: config.ecosystem.community_heading.clone(),
        }
    }
}

/// First candidate source that exists below the release's docs root.
pub fn find_source(release_root: &Path, options: &EcosystemOptions) -> Result<PathBuf, EcosystemError> {
    let docs_root = release_root.join(&options.docs_dir);
    let tried: Vec<PathBuf> = options.sources.iter().map(|s| docs_root.join(s)).collect();
    tried
        .iter()
        .find(|p| p.is_file())
        .cloned()
        .ok_or(EcosystemError::Missing { tried })
}

#[derive(Clone, Copy, PartialEq)]
enum Part {
    Before,
    Core,
    Community,
    After,
}

/// Opening marker of a fenced code block (```` ``` ```` or `~~~`).
fn fence_marker(line: &str) -> Option<&'static str> {
    let trimmed = line.trim_start();
    ["```", "~~~"].into_iter().find(|m| trimmed.starts_with(m))
}

/// Text of an ATX heading line, with link syntax reduced to its label.
fn heading_text(line: &str) -> Option<String> {
    let trimmed = line.trim_start();
    if !trimmed.starts_with('#') {
        return None;
    }
    let text = trimmed.trim_start_matches('#').trim().trim_end_matches('#').trim();
    Some(HEADING_LINK.replace_all(text, "$1").trim().to_string())
}

pub fn parse_registry(
    content: &str,
    core_heading: &str,
    community_heading: &str,
) -> Result<PluginRegistry, EcosystemError> {
    let mut part = Part::Before;
    let mut seen_core = false;
    let mut core = Vec::new();
    let mut community = Vec::new();

    let mut fence: Option<&str> = None;

    for line in content.lines() {
        // Fenced blocks are skipped whole: their `#` lines are not headings.
        if let Some(marker) = fence {
            if line.trim_start().starts_with(marker) {
                fence = None;
            }
            continue;
        }
        if let Some(marker) = fence_marker(line) {
            fence = Some(marker);
            continue;
        }
        if let Some(text) = heading_text(line) {
            if text.eq_ignore_ascii_case(core_heading) {
                part = Part::Core;
                seen_core = true;
            } else if text.eq_ignore_ascii_case(community_heading) && seen_core {
                part = Part::Community;
            } else if part == Part::Community {
                part = Part::After;
            }
            continue;
        }
        match part {
            Part::Core => core.push(line),
            Part::Community => community.push(line),
            Part::Before | Part::After => {}
        }
    }

    if !seen_core {
        return Err(EcosystemError::MissingHeading {
            heading: core_heading.to_string(),
        });
    }
    if part == Part::Core {
        return Err(EcosystemError::MissingHeading {
            heading: community_heading.to_string(),
        });
    }

    Ok(PluginRegistry {
        core_plugins: parse_entries(&core)?,
        community_plugins: parse_entries(&community)?,
    })
}

/// Merge continuation lines into their bullet, then parse each bullet.
fn parse_entries(lines: &[&str]) -> Result<Vec<Plugin>, EcosystemError> {
    let mut merged: Vec<String> = Vec::new();
    for line in lines.iter().filter(|l| !l.trim().is_empty()) {
        if line.starts_with('-') {
            merged.push(line.to_string());
        } else if let Some(last) = merged.last_mut() {
            last.push(' ');
            last.push_str(line);
        } else {
            return Err(EcosystemError::InvalidEntry {
                line: line.to_string(),
            });
        }
    }

    merged
        .into_iter()
        .map(|line| {
            let Some(caps) = ENTRY.captures(&line) else {
                return Err(EcosystemError::InvalidEntry { line });
            };
            Ok(Plugin {
                name: caps[1].to_string(),
                url: caps[2].to_string(),
                description: caps
                    .get(4)
                    .map(|m| m.as_str().trim().to_string())
                    .unwrap_or_default(),
            })
        })
        .collect()
}

/// Locate and parse the ecosystem document of a release.
pub fn extract_ecosystem(
    release_root: &Path,
    options: &EcosystemOptions,
) -> Result<EcosystemData, EcosystemError> {
    let source = find_source(release_root, options)?;
    let content = fs::read_to_string(&source)?;
    let plugins = parse_registry(&content, &options.core_heading, &options.community_heading)?;
    info!(
        "{}: {} core, {} community plugins",
        source.display(),
        plugins.core_plugins.len(),
        plugins.community_plugins.len()
    );
    Ok(EcosystemData { plugins })
}

pub fn write_ecosystem_data(output_dir: &Path, data: &EcosystemData) -> Result<PathBuf, EcosystemError> {
    let path = output_dir.join("data").join("ecosystem.yml");
    write_if_changed(&path, serde_yaml::to_string(data)?.as_bytes())?;
    Ok(path)
}
