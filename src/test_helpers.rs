//! Shared test utilities for the docs-harvest test suite.
//!
//! Provides a small repository config, release builders that go through the
//! real resolver, and in-memory zip archives shaped like the ones the
//! archive endpoint serves.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let manifest = manifest_for(&["v1.0.0", "v2.0.0"]);
//! assert_eq!(manifest.docs_paths(), ["latest", "master", "v2.0.x", "v1.0.x"]);
//!
//! let bytes = docs_archive("acme-widget-1a2b", &[("index.md", "# Docs\n")]);
//! ```

use std::io::{Cursor, Write};
use std::path::Path;

use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

use crate::config::HarvestConfig;
use crate::resolve::{ReleaseRecord, ResolveOptions, resolve};
use crate::types::{Release, ReleaseManifest};

/// Trunk archive URL of [`test_config`].
pub const TRUNK_URL: &str = "https://github.com/acme/widget/archive/master.zip";

// =========================================================================
// Config and releases
// =========================================================================

/// Stock config pointed at `acme/widget` with a `v1.0.0` floor.
pub fn test_config() -> HarvestConfig {
    let mut config = HarvestConfig::default();
    config.repository.owner = "acme".into();
    config.repository.name = "widget".into();
    config.repository.api_base = "https://api.test".into();
    config.releases.min_release = "v1.0.0".into();
    config
}

/// A published, non-draft feed record with a zipball URL.
pub fn record(tag: &str) -> ReleaseRecord {
    ReleaseRecord {
        name: Some(tag.to_string()),
        tag_name: tag.to_string(),
        draft: false,
        prerelease: false,
        zipball_url: Some(format!("https://api.test/zipball/{tag}")),
    }
}

/// Resolve a manifest from tags using [`test_config`].
pub fn manifest_for(tags: &[&str]) -> ReleaseManifest {
    let records: Vec<_> = tags.iter().map(|t| record(t)).collect();
    let options = ResolveOptions::from_config(&test_config()).unwrap();
    resolve(&records, &options).unwrap().manifest
}

/// The dated manifest entry for a single tag.
pub fn dated(tag: &str) -> Release {
    let manifest = manifest_for(&[tag]);
    manifest
        .releases()
        .iter()
        .find(|r| !r.is_alias())
        .cloned()
        .unwrap_or_else(|| panic!("{tag} did not resolve to a dated release"))
}

/// Find a release by docs path, panicking with the available paths.
pub fn find_release<'a>(manifest: &'a ReleaseManifest, docs_path: &str) -> &'a Release {
    manifest
        .releases()
        .iter()
        .find(|r| r.docs_path == docs_path)
        .unwrap_or_else(|| {
            panic!(
                "release '{}' not found. Available: {:?}",
                docs_path,
                manifest.docs_paths()
            )
        })
}

// =========================================================================
// Archives and trees
// =========================================================================

/// Build a zip from `(path, contents)` pairs, stored uncompressed.
pub fn zip_bytes(files: &[(&str, &str)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    for (path, contents) in files {
        if path.ends_with('/') {
            writer.add_directory(*path, options).unwrap();
        } else {
            writer.start_file(*path, options).unwrap();
            writer.write_all(contents.as_bytes()).unwrap();
        }
    }
    writer.finish().unwrap().into_inner()
}

/// A repository archive: one `{top}/` folder holding `docs/` and `files`
/// relative to it.
pub fn docs_archive(top: &str, files: &[(&str, &str)]) -> Vec<u8> {
    let top_dir = format!("{top}/");
    let docs_dir = format!("{top}/docs/");
    let paths: Vec<String> = files
        .iter()
        .map(|(path, _)| format!("{top}/docs/{path}"))
        .collect();

    let mut entries: Vec<(&str, &str)> = vec![(top_dir.as_str(), ""), (docs_dir.as_str(), "")];
    entries.extend(
        paths
            .iter()
            .zip(files)
            .map(|(path, (_, contents))| (path.as_str(), *contents)),
    );
    zip_bytes(&entries)
}

/// Write `(relative path, contents)` pairs under `root`, creating parents.
pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (path, contents) in files {
        let full = root.join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(full, contents).unwrap();
    }
}
