//! Page emission: TOC entries + rewritten bodies → the output tree.
//!
//! Every document becomes `content/docs/{docsPath}/{section}/{slug}.md`: a
//! YAML frontmatter block followed by the rewritten markdown. Non-markdown
//! files below a release's docs root are copied alongside, and the
//! aggregate `data/docs.yml` (`versions`, `toc`, `releases`) ties it all
//! together for the site templates.
//!
//! ## Frontmatter
//!
//! | Key | Value |
//! |-----|-------|
//! | `title` | Display name; for an index the last section segment, or `Documentation` at the root |
//! | `layout` | `site.layout` |
//! | `path` | Site path of the page |
//! | `version`, `docsPath` | Docs path of the release |
//! | `fullVersion`, `label` | From the release |
//! | `section` | Nesting path, empty at the root |
//! | `canonical` | `latest` only: the same page under the aliased label |
//! | `editUrl` | Trunk only: blob URL of the source file |
//!
//! All writes compare bytes first, so re-running over an unchanged tree
//! leaves file timestamps alone.

use crate::config::HarvestConfig;
use crate::naming::is_markdown;
use crate::rewrite::RewriteChain;
use crate::toc::page_link;
use crate::types::{CachePolicy, DocumentEntry, Release, ReleaseManifest, TocTree};
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum EmitError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Title of the root index page.
const ROOT_TITLE: &str = "Documentation";

#[derive(Debug, Clone)]
pub struct EmitOptions {
    pub layout: String,
    pub docs_route: String,
    pub docs_dir: String,
    /// Blob URL of the trunk docs folder, used for edit links.
    pub blob_base: String,
}

impl EmitOptions {
    pub fn from_config(config: &HarvestConfig) -> Self {
        Self {
            layout: config.site.layout.clone(),
            docs_route: config.site.docs_route.clone(),
            docs_dir: config.repository.docs_dir.clone(),
            blob_base: config.repository.docs_blob_base(),
        }
    }
}

/// Generated header of a page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Frontmatter {
    pub title: String,
    pub layout: String,
    pub path: String,
    pub version: String,
    pub full_version: String,
    pub label: String,
    pub docs_path: String,
    pub section: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edit_url: Option<String>,
}

pub fn frontmatter(entry: &DocumentEntry, release: &Release, options: &EmitOptions) -> Frontmatter {
    let title = if entry.is_index() {
        entry
            .section
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or(ROOT_TITLE)
            .to_string()
    } else {
        entry.display_name.clone()
    };

    let canonical = release
        .alias_of
        .as_deref()
        .map(|label| page_link(&options.docs_route, label, &entry.section, &entry.slug));

    let edit_url = (release.cache_policy == CachePolicy::AlwaysRefetch
        && entry.inline_body.is_none())
    .then(|| format!("{}/{}", options.blob_base, entry.relative_source()));

    Frontmatter {
        title,
        layout: options.layout.clone(),
        path: entry.link.clone(),
        version: entry.version.clone(),
        full_version: entry.full_version.clone(),
        label: entry.label.clone(),
        docs_path: release.docs_path.clone(),
        section: entry.section.clone(),
        canonical,
        edit_url,
    }
}

/// Frontmatter block followed by the body.
pub fn render_page(frontmatter: &Frontmatter, body: &str) -> Result<String, EmitError> {
    let yaml = serde_yaml::to_string(frontmatter)?;
    Ok(format!("---\n{yaml}---\n\n{body}"))
}

/// Write `contents` unless the file already holds exactly those bytes.
/// Returns whether a write happened.
pub fn write_if_changed(path: &Path, contents: &[u8]) -> io::Result<bool> {
    if let Ok(existing) = fs::read(path)
        && existing == contents
    {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;
    Ok(true)
}

/// Outcome of emitting one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedPage {
    pub destination: PathBuf,
    pub written: bool,
    pub unmatched_links: usize,
}

/// Rewrite one document and write it below `output_dir`.
pub fn emit_document(
    entry: &DocumentEntry,
    release: &Release,
    chain: &RewriteChain,
    options: &EmitOptions,
    output_dir: &Path,
) -> Result<EmittedPage, EmitError> {
    let raw = match &entry.inline_body {
        Some(body) => body.clone(),
        None => fs::read_to_string(&entry.source_path)?,
    };

    let rewritten = chain.rewrite(&raw, entry);
    for link in &rewritten.unmatched {
        warn!(
            "{}: unmatched link {:?} on line {}",
            entry.link, link.target, link.line
        );
    }

    let page = render_page(&frontmatter(entry, release, options), &rewritten.content)?;
    let destination = output_dir.join(&entry.destination_path);
    let written = write_if_changed(&destination, page.as_bytes())?;
    debug!(
        "{} {}",
        if written { "wrote" } else { "unchanged" },
        destination.display()
    );

    Ok(EmittedPage {
        destination,
        written,
        unmatched_links: rewritten.unmatched.len(),
    })
}

/// Totals for one release.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EmitStats {
    pub written: usize,
    pub unchanged: usize,
    pub assets: usize,
    pub unmatched_links: usize,
}

/// Emit every page of a release in parallel, then copy its assets.
pub fn emit_release(
    entries: &[DocumentEntry],
    release: &Release,
    release_root: &Path,
    chain: &RewriteChain,
    options: &EmitOptions,
    output_dir: &Path,
) -> Result<EmitStats, EmitError> {
    let pages = entries
        .par_iter()
        .map(|entry| emit_document(entry, release, chain, options, output_dir))
        .collect::<Result<Vec<_>, _>>()?;

    let assets = copy_assets(
        &release_root.join(&options.docs_dir),
        &release.docs_path,
        options,
        output_dir,
    )?;

    let written = pages.iter().filter(|p| p.written).count();
    Ok(EmitStats {
        written,
        unchanged: pages.len() - written,
        assets,
        unmatched_links: pages.iter().map(|p| p.unmatched_links).sum(),
    })
}

/// Copy non-markdown files below `docs_root` into the versioned tree.
/// Dot files are skipped. Returns the number of files written.
pub fn copy_assets(
    docs_root: &Path,
    docs_path: &str,
    options: &EmitOptions,
    output_dir: &Path,
) -> Result<usize, EmitError> {
    let target_root = output_dir
        .join("content")
        .join(options.docs_route.trim_matches('/'))
        .join(docs_path);

    let mut copied = 0;
    let walker = WalkDir::new(docs_root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));
    for entry in walker {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() || is_markdown(&entry.file_name().to_string_lossy()) {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(docs_root) else {
            continue;
        };
        if write_if_changed(&target_root.join(relative), &fs::read(entry.path())?)? {
            copied += 1;
        }
    }
    Ok(copied)
}

#[derive(Serialize)]
struct DocsData<'a> {
    versions: &'a [String],
    toc: &'a TocTree,
    releases: &'a [Release],
}

/// Write `data/docs.yml`. `versions` lists the docs paths that made it into
/// `toc`, in manifest order.
pub fn write_docs_data(
    output_dir: &Path,
    versions: &[String],
    toc: &TocTree,
    manifest: &ReleaseManifest,
) -> Result<PathBuf, EmitError> {
    let data = DocsData {
        versions,
        toc,
        releases: manifest.releases(),
    };
    let path = output_dir.join("data").join("docs.yml");
    write_if_changed(&path, serde_yaml::to_string(&data)?.as_bytes())?;
    Ok(path)
}
