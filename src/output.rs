//! CLI output formatting for all pipeline stages.
//!
//! Output is **release-centric**: every line leads with the docs path a
//! reader would see in the site URL, with tags, archive URLs and counts as
//! secondary context.
//!
//! # Output Format
//!
//! ## Resolve
//!
//! ```text
//! Releases
//!     latest → v2.1.x (v2.1.3)
//!     master → trunk
//!     v2.1.x (v2.1.3)
//!     v1.0.x (v1.0.0)
//!
//! Dropped
//!     v3.0.0-rc.1: pre-release
//! ```
//!
//! ## Fetch
//!
//! ```text
//! latest, v2.1.x: downloaded
//!     Source: https://api.github.com/repos/acme/widget/zipball/v2.1.3
//! ```
//!
//! ## Build
//!
//! ```text
//! latest: 14 documents (14 written, 0 unchanged, 3 assets)
//! v1.0.x: 9 documents (0 written, 9 unchanged, 0 assets, 2 unmatched links)
//!
//! Failed
//!     v0.9.x: release has no index document in section ''
//!
//! Data: site/data/docs.yml
//! Ecosystem: site/data/ecosystem.yml (12 core, 240 community)
//! ```
//!
//! # Architecture
//!
//! Each stage has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure:
//! no I/O, no side effects.

use crate::fetch::{FetchEvent, FetchStatus};
use crate::pipeline::BuildReport;
use crate::resolve::ResolveOutcome;
use crate::types::{CachePolicy, Release};

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn release_line(release: &Release) -> String {
    match (&release.alias_of, release.cache_policy) {
        (Some(label), _) => format!(
            "{} \u{2192} {} ({})",
            release.docs_path, label, release.full_version
        ),
        (None, CachePolicy::AlwaysRefetch) => format!("{} \u{2192} trunk", release.docs_path),
        (None, CachePolicy::ContentAddressed) => {
            format!("{} ({})", release.docs_path, release.full_version)
        }
    }
}

// ============================================================================
// Resolve
// ============================================================================

pub fn format_resolve_output(outcome: &ResolveOutcome) -> Vec<String> {
    let mut lines = vec!["Releases".to_string()];
    for release in outcome.manifest.releases() {
        lines.push(format!("{}{}", indent(1), release_line(release)));
    }

    if !outcome.dropped.is_empty() {
        lines.push(String::new());
        lines.push("Dropped".to_string());
        for dropped in &outcome.dropped {
            lines.push(format!("{}{}: {}", indent(1), dropped.tag, dropped.reason));
        }
    }
    lines
}

pub fn print_resolve_output(outcome: &ResolveOutcome) {
    for line in format_resolve_output(outcome) {
        println!("{}", line);
    }
}

// ============================================================================
// Fetch
// ============================================================================

/// Format a single fetch progress event as display lines.
pub fn format_fetch_event(event: &FetchEvent) -> Vec<String> {
    match event {
        FetchEvent::Staged {
            docs_paths,
            url,
            status,
        } => {
            let status = match status {
                FetchStatus::Cached => "cached",
                FetchStatus::Downloaded => "downloaded",
                FetchStatus::Refetched => "refetched",
            };
            vec![
                format!("{}: {}", docs_paths.join(", "), status),
                format!("{}Source: {}", indent(1), url),
            ]
        }
    }
}

// ============================================================================
// Build
// ============================================================================

pub fn format_build_output(report: &BuildReport) -> Vec<String> {
    let mut lines = Vec::new();

    for release in &report.releases {
        let stats = &release.stats;
        let mut detail = format!(
            "{} written, {} unchanged, {} assets",
            stats.written, stats.unchanged, stats.assets
        );
        if stats.unmatched_links > 0 {
            detail.push_str(&format!(", {} unmatched links", stats.unmatched_links));
        }
        lines.push(format!(
            "{}: {} documents ({})",
            release.docs_path, release.documents, detail
        ));
    }

    if !report.failed.is_empty() {
        lines.push(String::new());
        lines.push("Failed".to_string());
        for failed in &report.failed {
            lines.push(format!("{}{}: {}", indent(1), failed.docs_path, failed.error));
        }
    }

    lines.push(String::new());
    lines.push(format!("Data: {}", report.docs_data.display()));
    if let Some(ecosystem) = &report.ecosystem {
        lines.push(format!(
            "Ecosystem: {} ({} core, {} community)",
            ecosystem.path.display(),
            ecosystem.core,
            ecosystem.community
        ));
    }
    lines
}

pub fn print_build_output(report: &BuildReport) {
    for line in format_build_output(report) {
        println!("{}", line);
    }
}
