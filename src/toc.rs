//! Table-of-contents extraction: release root → ordered [`DocumentEntry`] list.
//!
//! Each release stores its navigation in its index documents rather than in
//! a schema, and the shape changed over time:
//!
//! ```text
//! flat                        nested
//! docs/                       docs/
//! ├── index.md  ─┐            ├── index.md ──────► Guides/index.md
//! ├── Server.md ◄┤            ├── Guides/              │
//! └── Routes.md ◄┘            │   ├── index.md ◄───────┘
//!                             │   └── Testing.md
//!                             └── Reference/
//!                                 └── Hooks.md     (no index: omitted)
//! ```
//!
//! ## Traversal
//!
//! Sections are visited depth-first with an explicit stack and a visited set
//! keyed by section path, so an index that links to itself, its parent or a
//! sibling more than once cannot loop or duplicate pages. Pages come out in
//! the order their index links them; subsections follow their parent in the
//! order they were first referenced.
//!
//! A link counts as a subsection reference when it points at a directory, at
//! `Sub/index.md`, or at any page inside another directory. A referenced
//! section without an index document is a dead link and contributes nothing.
//!
//! ## Legacy layouts
//!
//! Very old releases have no root index. With `toc.synthesize_root_index`
//! (on by default) the configured default index is used as an inline body
//! and the root is enumerated from disk instead; with it off the release
//! fails with [`ExtractError::MissingIndex`].

use crate::config::HarvestConfig;
use crate::fetch::StagedRelease;
use crate::naming::{is_markdown, parse_doc_name};
use crate::types::{DocumentEntry, Release};
use pulldown_cmark::{Event, Options, Parser, Tag};
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("docs directory not found: {0}")]
    MissingDocsDir(PathBuf),
    #[error("no index document in section {section:?}")]
    MissingIndex { section: String },
    #[error("duplicate slug {slug:?} in section {section:?}")]
    DuplicateSlug { section: String, slug: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Extraction settings shared by every release.
#[derive(Debug, Clone)]
pub struct TocOptions {
    pub docs_dir: String,
    pub docs_route: String,
    pub include_unlisted: bool,
    pub synthesize_root_index: bool,
    pub default_index: String,
}

impl TocOptions {
    pub fn from_config(config: &HarvestConfig) -> Self {
        Self {
            docs_dir: config.repository.docs_dir.clone(),
            docs_route: config.site.docs_route.clone(),
            include_unlisted: config.toc.include_unlisted,
            synthesize_root_index: config.toc.synthesize_root_index,
            default_index: config.toc.default_index.clone(),
        }
    }
}

/// Extraction result for one release.
#[derive(Debug)]
pub struct ReleaseToc {
    pub release: Release,
    pub result: Result<Vec<DocumentEntry>, ExtractError>,
}

/// Extract every staged release on the global rayon pool.
///
/// Failures stay attached to their release; the caller decides what to do
/// with them. Output order matches input order.
pub fn extract_all(staged: &[StagedRelease], options: &TocOptions) -> Vec<ReleaseToc> {
    staged
        .par_iter()
        .map(|s| ReleaseToc {
            release: s.release.clone(),
            result: extract_release(&s.release, &s.root, options),
        })
        .collect()
}

/// Extract one release rooted at `root` (the archive's top-level directory).
pub fn extract_release(
    release: &Release,
    root: &Path,
    options: &TocOptions,
) -> Result<Vec<DocumentEntry>, ExtractError> {
    let docs_root = root.join(&options.docs_dir);
    if !docs_root.is_dir() {
        return Err(ExtractError::MissingDocsDir(docs_root));
    }

    let builder = EntryBuilder {
        release,
        docs_root: &docs_root,
        options,
    };
    let mut entries = Vec::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut stack: Vec<String> = Vec::new();

    match find_index(&docs_root, "")? {
        Some(_) => stack.push(String::new()),
        None if options.synthesize_root_index => {
            warn!(
                "{}: no root index, synthesizing one from disk",
                release.docs_path
            );
            visited.insert(String::new());
            let scan = scan_section_from_disk(&docs_root, "")?;
            entries.push(builder.synthesized_index());
            for file_name in &scan.pages {
                entries.push(builder.page("", file_name, docs_root.join(file_name)));
            }
            check_unique_slugs("", &entries)?;
            stack.extend(scan.subsections.into_iter().rev());
        }
        None => {
            return Err(ExtractError::MissingIndex {
                section: String::new(),
            });
        }
    }

    while let Some(section) = stack.pop() {
        if !visited.insert(section.clone()) {
            continue;
        }
        let dir = docs_root.join(&section);
        let Some(index_path) = find_index(&dir, &section)? else {
            warn!(
                "{}: section {section:?} has no index document; omitted",
                release.docs_path
            );
            continue;
        };

        let listing = read_index_listing(&docs_root, &section, &index_path)?;
        let mut section_entries = vec![builder.page(
            &section,
            &file_name_of(&index_path),
            index_path.clone(),
        )];
        let mut listed: HashSet<String> = HashSet::new();
        for file_name in &listing.pages {
            if listed.insert(file_name.clone()) {
                section_entries.push(builder.page(&section, file_name, dir.join(file_name)));
            }
        }
        let mut subsections = listing.subsections;

        if options.include_unlisted {
            let scan = scan_section_from_disk(&dir, &section)?;
            for file_name in scan.pages {
                if !listed.contains(&file_name) {
                    section_entries.push(builder.page(&section, &file_name, dir.join(&file_name)));
                }
            }
            for sub in scan.subsections {
                if !subsections.contains(&sub) {
                    subsections.push(sub);
                }
            }
        }

        check_unique_slugs(&section, &section_entries)?;
        entries.extend(section_entries);
        stack.extend(subsections.into_iter().rev());
    }

    info!("{}: {} documents", release.docs_path, entries.len());
    Ok(entries)
}

// =============================================================================
// Entries
// =============================================================================

struct EntryBuilder<'a> {
    release: &'a Release,
    docs_root: &'a Path,
    options: &'a TocOptions,
}

impl EntryBuilder<'_> {
    fn page(&self, section: &str, file_name: &str, source_path: PathBuf) -> DocumentEntry {
        let (slug, display_name) = match parse_doc_name(file_name) {
            Some(parsed) => (parsed.slug, parsed.display_name),
            None => (file_name.to_string(), file_name.to_string()),
        };
        DocumentEntry {
            file_name: file_name.to_string(),
            display_name,
            destination_path: destination_path(
                &self.options.docs_route,
                &self.release.docs_path,
                section,
                &slug,
            ),
            link: page_link(
                &self.options.docs_route,
                &self.release.docs_path,
                section,
                &slug,
            ),
            source_path,
            slug,
            section: section.to_string(),
            version: self.release.docs_path.clone(),
            label: self.release.label.clone(),
            full_version: self.release.full_version.clone(),
            inline_body: None,
        }
    }

    fn synthesized_index(&self) -> DocumentEntry {
        DocumentEntry {
            inline_body: Some(self.options.default_index.clone()),
            ..self.page("", "index.md", self.docs_root.join("index.md"))
        }
    }
}

/// Site path of a page; an index maps to its section root.
pub fn page_link(route: &str, docs_path: &str, section: &str, slug: &str) -> String {
    let mut link = format!("{}/{}", route.trim_end_matches('/'), docs_path);
    if !section.is_empty() {
        link.push('/');
        link.push_str(section);
    }
    if slug != "index" {
        link.push('/');
        link.push_str(slug);
    }
    link
}

/// Output path of a page, relative to the output directory.
pub fn destination_path(route: &str, docs_path: &str, section: &str, slug: &str) -> PathBuf {
    let mut path = PathBuf::from("content");
    path.push(route.trim_matches('/'));
    path.push(docs_path);
    for segment in section.split('/').filter(|s| !s.is_empty()) {
        path.push(segment);
    }
    path.push(format!("{slug}.md"));
    path
}

fn check_unique_slugs(section: &str, entries: &[DocumentEntry]) -> Result<(), ExtractError> {
    let mut seen = HashSet::new();
    for entry in entries.iter().filter(|e| e.section == section) {
        if !seen.insert(entry.slug.as_str()) {
            return Err(ExtractError::DuplicateSlug {
                section: section.to_string(),
                slug: entry.slug.clone(),
            });
        }
    }
    Ok(())
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// =============================================================================
// Filesystem
// =============================================================================

/// Case-insensitive lookup of `index.md` in `dir`.
///
/// `Index.md` next to `index.md` would publish two pages at one path, so it
/// is a duplicate slug.
fn find_index(dir: &Path, section: &str) -> Result<Option<PathBuf>, ExtractError> {
    if !dir.is_dir() {
        return Ok(None);
    }
    let mut found = None;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.eq_ignore_ascii_case("index.md") && entry.file_type()?.is_file() {
            if found.is_some() {
                return Err(ExtractError::DuplicateSlug {
                    section: section.to_string(),
                    slug: "index".to_string(),
                });
            }
            found = Some(entry.path());
        }
    }
    Ok(found)
}

/// Pages and indexed subsections of a directory, each sorted by name.
struct DiskScan {
    pages: Vec<String>,
    subsections: Vec<String>,
}

fn scan_section_from_disk(dir: &Path, section: &str) -> Result<DiskScan, ExtractError> {
    let mut pages = Vec::new();
    let mut subsections = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let file_type = entry.file_type()?;
        if file_type.is_file() && is_markdown(&name) && !name.eq_ignore_ascii_case("index.md") {
            pages.push(name);
        } else if file_type.is_dir() {
            let sub = join_section(section, &name);
            if find_index(&entry.path(), &sub)?.is_some() {
                subsections.push(sub);
            }
        }
    }
    pages.sort();
    subsections.sort();
    Ok(DiskScan { pages, subsections })
}

fn join_section(section: &str, name: &str) -> String {
    if section.is_empty() {
        name.to_string()
    } else {
        format!("{section}/{name}")
    }
}

// =============================================================================
// Index parsing
// =============================================================================

/// What one index document references, in first-appearance order.
#[derive(Debug, Default, PartialEq)]
struct IndexListing {
    /// Page file names in the index's own section.
    pages: Vec<String>,
    /// Sections referenced by the index.
    subsections: Vec<String>,
}

fn read_index_listing(
    docs_root: &Path,
    section: &str,
    index_path: &Path,
) -> Result<IndexListing, ExtractError> {
    let content = fs::read_to_string(index_path)?;
    let mut listing = IndexListing::default();

    for target in link_targets(&content) {
        let Some(resolved) = resolve_link_path(section, &target) else {
            continue;
        };
        let on_disk = docs_root.join(&resolved);

        if is_markdown(&resolved) {
            let (dir, file_name) = match resolved.rsplit_once('/') {
                Some((dir, name)) => (dir.to_string(), name.to_string()),
                None => (String::new(), resolved.clone()),
            };
            if dir != section {
                push_unique(&mut listing.subsections, dir);
            } else if file_name.eq_ignore_ascii_case("index.md") {
                // The section's own index is always first.
            } else if on_disk.is_file() {
                listing.pages.push(file_name);
            } else {
                warn!("index {} links to missing page {resolved}", index_path.display());
            }
        } else if !resolved.is_empty() && resolved != section && on_disk.is_dir() {
            push_unique(&mut listing.subsections, resolved);
        }
    }
    Ok(listing)
}

fn push_unique(items: &mut Vec<String>, item: String) {
    if !items.contains(&item) {
        items.push(item);
    }
}

/// Link destinations of a markdown document in document order.
///
/// Inline, reference-style and autolinks are all reported with their
/// resolved destination.
pub fn link_targets(markdown: &str) -> Vec<String> {
    Parser::new_ext(markdown, Options::empty())
        .filter_map(|event| match event {
            Event::Start(Tag::Link { dest_url, .. }) => Some(dest_url.into_string()),
            _ => None,
        })
        .collect()
}

/// Resolve a relative link target against a section, returning a path
/// relative to the docs root without anchor or query.
///
/// Returns `None` for external, site-absolute and anchor-only targets, and
/// for paths escaping the docs root.
pub fn resolve_link_path(section: &str, target: &str) -> Option<String> {
    let target = target.trim();
    if target.is_empty() || target.starts_with('#') || target.starts_with('/') {
        return None;
    }
    if has_scheme(target) {
        return None;
    }
    let path = target.split(['#', '?']).next().unwrap_or(target);

    let mut segments: Vec<&str> = section.split('/').filter(|s| !s.is_empty()).collect();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop()?;
            }
            other => segments.push(other),
        }
    }
    Some(segments.join("/"))
}

/// Whether `target` starts with a URL scheme (`https:`, `mailto:`).
pub fn has_scheme(target: &str) -> bool {
    match target.split_once(':') {
        Some((scheme, _)) => {
            !scheme.is_empty()
                && scheme
                    .chars()
                    .next()
                    .is_some_and(|c| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use tempfile::TempDir;

    fn options() -> TocOptions {
        TocOptions::from_config(&test_config())
    }

    fn extract(files: &[(&str, &str)]) -> Result<Vec<DocumentEntry>, ExtractError> {
        extract_with(files, &options())
    }

    fn extract_with(
        files: &[(&str, &str)],
        opts: &TocOptions,
    ) -> Result<Vec<DocumentEntry>, ExtractError> {
        let tmp = TempDir::new().unwrap();
        write_tree(&tmp.path().join("docs"), files);
        extract_release(&dated("v3.1.0"), tmp.path(), opts)
    }

    fn shape(entries: &[DocumentEntry]) -> Vec<String> {
        entries
            .iter()
            .map(|e| {
                if e.section.is_empty() {
                    e.slug.clone()
                } else {
                    format!("{}/{}", e.section, e.slug)
                }
            })
            .collect()
    }

    // =========================================================================
    // Flat form
    // =========================================================================

    #[test]
    fn flat_index_order_is_preserved() {
        let entries = extract(&[
            ("index.md", "- [Server](./Server.md)\n- [Routes](Routes.md)\n- [Hooks](./Hooks.md#top)\n"),
            ("Server.md", "# Server"),
            ("Routes.md", "# Routes"),
            ("Hooks.md", "# Hooks"),
        ])
        .unwrap();
        assert_eq!(shape(&entries), ["index", "Server", "Routes", "Hooks"]);
    }

    #[test]
    fn entry_fields_follow_release_and_section() {
        let entries = extract(&[
            ("index.md", "[Getting started](./Getting-Started.md)"),
            ("Getting-Started.md", "# Hi"),
        ])
        .unwrap();
        let page = &entries[1];
        assert_eq!(page.file_name, "Getting-Started.md");
        assert_eq!(page.display_name, "Getting Started");
        assert_eq!(page.slug, "Getting-Started");
        assert_eq!(page.section, "");
        assert_eq!(page.version, "v3.1.x");
        assert_eq!(page.label, "v3.1.x");
        assert_eq!(page.full_version, "v3.1.0");
        assert_eq!(page.link, "/docs/v3.1.x/Getting-Started");
        assert_eq!(
            page.destination_path,
            PathBuf::from("content/docs/v3.1.x/Getting-Started.md")
        );
        assert!(page.source_path.ends_with("docs/Getting-Started.md"));
    }

    #[test]
    fn index_maps_to_section_root() {
        let entries = extract(&[("index.md", "hello")]).unwrap();
        assert_eq!(entries[0].slug, "index");
        assert_eq!(entries[0].link, "/docs/v3.1.x");
        assert_eq!(
            entries[0].destination_path,
            PathBuf::from("content/docs/v3.1.x/index.md")
        );
    }

    #[test]
    fn ignores_external_absolute_anchor_and_escaping_links() {
        let entries = extract(&[
            (
                "index.md",
                "[a](https://example.com/Page.md) [b](/docs/latest/Server.md) [c](#intro) \
                 [d](../outside.md) [e](mailto:x@y.z) [f](./logo.png) [g](./Server.md)",
            ),
            ("Server.md", "x"),
        ])
        .unwrap();
        assert_eq!(shape(&entries), ["index", "Server"]);
    }

    #[test]
    fn reference_and_repeated_links_listed_once() {
        let entries = extract(&[
            (
                "index.md",
                "See [routes][r] and [server](Server.md), again [server](./Server.md).\n\n[r]: ./Routes.md\n",
            ),
            ("Server.md", "x"),
            ("Routes.md", "x"),
        ])
        .unwrap();
        assert_eq!(shape(&entries), ["index", "Routes", "Server"]);
    }

    #[test]
    fn missing_linked_page_is_skipped() {
        let entries = extract(&[("index.md", "[gone](./Gone.md)")]).unwrap();
        assert_eq!(shape(&entries), ["index"]);
    }

    // =========================================================================
    // Nested form
    // =========================================================================

    #[test]
    fn nested_sections_follow_their_parent() {
        let entries = extract(&[
            (
                "index.md",
                "[Guides](./Guides/index.md)\n[Server](./Server.md)\n[Reference](Reference/)\n",
            ),
            ("Server.md", "x"),
            ("Guides/index.md", "[Testing](./Testing.md)\n[Deep](./Deep/Page.md)"),
            ("Guides/Testing.md", "x"),
            ("Guides/Deep/index.md", "[Page](Page.md)"),
            ("Guides/Deep/Page.md", "x"),
            ("Reference/index.md", "[Hooks](Hooks.md)"),
            ("Reference/Hooks.md", "x"),
        ])
        .unwrap();
        assert_eq!(
            shape(&entries),
            [
                "index",
                "Server",
                "Guides/index",
                "Guides/Testing",
                "Guides/Deep/index",
                "Guides/Deep/Page",
                "Reference/index",
                "Reference/Hooks",
            ]
        );
        let deep = entries.iter().find(|e| e.slug == "Page").unwrap();
        assert_eq!(deep.link, "/docs/v3.1.x/Guides/Deep/Page");
        assert_eq!(
            deep.destination_path,
            PathBuf::from("content/docs/v3.1.x/Guides/Deep/Page.md")
        );
    }

    #[test]
    fn link_to_page_in_subdirectory_references_the_section() {
        let entries = extract(&[
            ("index.md", "[Testing](./Guides/Testing.md)"),
            ("Guides/index.md", "[Testing](Testing.md)"),
            ("Guides/Testing.md", "x"),
        ])
        .unwrap();
        assert_eq!(shape(&entries), ["index", "Guides/index", "Guides/Testing"]);
    }

    #[test]
    fn section_without_index_is_absent() {
        let entries = extract(&[
            ("index.md", "[Guides](./Guides/Testing.md)\n[Server](Server.md)"),
            ("Server.md", "x"),
            ("Guides/Testing.md", "x"),
        ])
        .unwrap();
        assert_eq!(shape(&entries), ["index", "Server"]);
        assert!(entries.iter().all(|e| e.section != "Guides"));
    }

    #[test]
    fn cyclic_references_terminate() {
        let entries = extract(&[
            ("index.md", "[Guides](Guides/index.md)"),
            (
                "Guides/index.md",
                "[up](../index.md) [self](./index.md) [again](../Guides/) [Page](Page.md)",
            ),
            ("Guides/Page.md", "[back](../Guides/index.md)"),
        ])
        .unwrap();
        assert_eq!(shape(&entries), ["index", "Guides/index", "Guides/Page"]);
    }

    #[test]
    fn capitalized_index_is_normalized() {
        let entries = extract(&[
            ("Index.md", "[Guides](Guides/Index.md)"),
            ("Guides/Index.md", "x"),
        ])
        .unwrap();
        assert_eq!(shape(&entries), ["index", "Guides/index"]);
        assert_eq!(entries[0].file_name, "Index.md");
        assert_eq!(entries[1].link, "/docs/v3.1.x/Guides");
    }

    // =========================================================================
    // Failures
    // =========================================================================

    #[test]
    fn missing_docs_dir_is_error() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            extract_release(&dated("v3.1.0"), tmp.path(), &options()),
            Err(ExtractError::MissingDocsDir(_))
        ));
    }

    #[test]
    fn missing_root_index_is_error_without_synthesis() {
        let mut opts = options();
        opts.synthesize_root_index = false;
        assert!(matches!(
            extract_with(&[("Server.md", "x")], &opts),
            Err(ExtractError::MissingIndex { .. })
        ));
    }

    #[test]
    fn stock_config_synthesizes_legacy_root_index() {
        let opts = TocOptions::from_config(&HarvestConfig::default());
        let entries = extract_with(
            &[("Getting-Started.md", "x"), ("Server.md", "x")],
            &opts,
        )
        .unwrap();
        assert_eq!(shape(&entries), ["index", "Getting-Started", "Server"]);
        let body = entries[0].inline_body.as_deref().unwrap();
        assert!(body.contains("## Where To Start"));
        assert!(body.contains("[Getting Started](./Getting-Started.md)"));
    }

    #[test]
    fn duplicate_index_files_are_duplicate_slug() {
        let result = extract(&[
            ("index.md", "[Guides](Guides/)"),
            ("Guides/index.md", "x"),
            ("Guides/Index.md", "y"),
        ]);
        match result {
            Err(ExtractError::DuplicateSlug { section, slug }) => {
                assert_eq!(section, "Guides");
                assert_eq!(slug, "index");
            }
            other => panic!("expected DuplicateSlug, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_page_slugs_are_rejected() {
        let result = extract(&[
            ("index.md", "[a](Server.md) [b](Server.MD)"),
            ("Server.md", "x"),
            ("Server.MD", "y"),
        ]);
        assert!(matches!(result, Err(ExtractError::DuplicateSlug { .. })));
    }

    // =========================================================================
    // Options
    // =========================================================================

    #[test]
    fn include_unlisted_appends_in_name_order() {
        let mut opts = options();
        opts.include_unlisted = true;
        let entries = extract_with(
            &[
                ("index.md", "[Server](Server.md)"),
                ("Server.md", "x"),
                ("Zebra.md", "x"),
                ("Apple.md", "x"),
                ("Extra/index.md", "x"),
                ("NoIndex/Page.md", "x"),
            ],
            &opts,
        )
        .unwrap();
        assert_eq!(
            shape(&entries),
            ["index", "Server", "Apple", "Zebra", "Extra/index"]
        );
    }

    #[test]
    fn synthesized_root_index_for_legacy_layout() {
        let mut opts = options();
        opts.synthesize_root_index = true;
        let entries = extract_with(
            &[
                ("Server.md", "x"),
                ("Hooks.md", "x"),
                ("Guides/index.md", "[T](Testing.md)"),
                ("Guides/Testing.md", "x"),
                ("Orphans/Page.md", "x"),
            ],
            &opts,
        )
        .unwrap();
        assert_eq!(
            shape(&entries),
            ["index", "Hooks", "Server", "Guides/index", "Guides/Testing"]
        );
        assert_eq!(entries[0].inline_body.as_deref(), Some(opts.default_index.as_str()));
        assert!(entries[1].inline_body.is_none());
    }

    #[test]
    fn extraction_is_repeatable() {
        let tmp = TempDir::new().unwrap();
        write_tree(
            &tmp.path().join("docs"),
            &[
                ("index.md", "[G](Guides/) [S](Server.md)"),
                ("Server.md", "x"),
                ("Guides/index.md", "[T](Testing.md)"),
                ("Guides/Testing.md", "x"),
            ],
        );
        let release = dated("v3.1.0");
        let first = extract_release(&release, tmp.path(), &options()).unwrap();
        let second = extract_release(&release, tmp.path(), &options()).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_yaml::to_string(&first).unwrap(),
            serde_yaml::to_string(&second).unwrap()
        );
    }

    #[test]
    fn extract_all_isolates_failures() {
        let good = TempDir::new().unwrap();
        write_tree(&good.path().join("docs"), &[("index.md", "x")]);
        let bad = TempDir::new().unwrap();

        let staged = vec![
            StagedRelease {
                release: dated("v2.0.0"),
                root: bad.path().to_path_buf(),
            },
            StagedRelease {
                release: dated("v3.1.0"),
                root: good.path().to_path_buf(),
            },
        ];
        let results = extract_all(&staged, &options());
        assert_eq!(results[0].release.docs_path, "v2.0.x");
        assert!(results[0].result.is_err());
        assert_eq!(results[1].result.as_ref().unwrap().len(), 1);
    }

    // =========================================================================
    // Link helpers
    // =========================================================================

    #[test]
    fn resolve_link_path_normalizes_segments() {
        assert_eq!(resolve_link_path("", "./Server.md").as_deref(), Some("Server.md"));
        assert_eq!(
            resolve_link_path("Guides", "../Reference/Hooks.md#x").as_deref(),
            Some("Reference/Hooks.md")
        );
        assert_eq!(
            resolve_link_path("Guides/Deep", "../Page.md?plain=1").as_deref(),
            Some("Guides/Page.md")
        );
        assert_eq!(resolve_link_path("", "../escape.md"), None);
        assert_eq!(resolve_link_path("", "https://x.test/a.md"), None);
        assert_eq!(resolve_link_path("", "#anchor"), None);
        assert_eq!(resolve_link_path("", "/docs/latest"), None);
    }

    #[test]
    fn has_scheme_detects_urls() {
        assert!(has_scheme("https://example.com"));
        assert!(has_scheme("mailto:a@b.c"));
        assert!(!has_scheme("./Page.md"));
        assert!(!has_scheme("Page.md#a:b"));
    }

    #[test]
    fn link_targets_in_document_order() {
        let md = "[b](./B.md) text <https://auto.test> [a][ref]\n\n[ref]: ./A.md\n";
        assert_eq!(
            link_targets(md),
            ["./B.md", "https://auto.test", "./A.md"]
        );
    }
}
