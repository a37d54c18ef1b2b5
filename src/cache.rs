//! Archive cache for incremental runs.
//!
//! Downloading every release archive is the slow part of a run, and tagged
//! releases never change once published. This module lets the fetch stage
//! skip a download when the archive for a URL has already been extracted into
//! the staging area.
//!
//! # Design
//!
//! ## Cache keys
//!
//! The cache is **content-addressed by source URL**: the key of a release is
//! the SHA-256 of its archive URL ([`hash_url`]), which is also the name of
//! its staging directory. Two manifest entries with the same URL (a label
//! and the `latest` alias pointing at it) share one key and one download.
//!
//! A cache hit requires:
//! 1. An entry for the key exists in the manifest
//! 2. The recorded release root is still on disk under `staging/{key}/`
//!
//! The trunk alias is never looked up: its URL is stable while its content
//! moves, so it is downloaded on every run.
//!
//! ## Storage
//!
//! The cache manifest is a JSON file at `<staging>/.archive-cache.json`,
//! alongside the extracted archives so the two travel together.
//!
//! ## Bypassing the cache
//!
//! Pass `--no-cache` to `fetch` or `build` to start from an empty manifest.
//! Every archive is downloaded again and its directory replaced.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Name of the cache manifest file within the staging directory.
const MANIFEST_FILENAME: &str = ".archive-cache.json";

/// Version of the cache manifest format. Bump this to invalidate all
/// existing caches when the format or key computation changes.
const MANIFEST_VERSION: u32 = 1;

/// A single extracted archive.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Archive URL the key was computed from.
    pub url: String,
    /// Release root, relative to the staging directory (`{key}/{top-level}`).
    pub root: String,
}

/// On-disk cache manifest mapping cache keys to extracted archives.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ArchiveCache {
    pub version: u32,
    pub entries: HashMap<String, ArchiveEntry>,
}

impl ArchiveCache {
    /// Create an empty manifest (used for `--no-cache` or first run).
    pub fn empty() -> Self {
        Self {
            version: MANIFEST_VERSION,
            entries: HashMap::new(),
        }
    }

    /// Load from the staging directory. Returns an empty manifest if the
    /// file doesn't exist or can't be parsed (version mismatch, corruption).
    pub fn load(staging_dir: &Path) -> Self {
        let path = staging_dir.join(MANIFEST_FILENAME);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(_) => return Self::empty(),
        };
        let manifest: Self = match serde_json::from_str(&content) {
            Ok(m) => m,
            Err(_) => return Self::empty(),
        };
        if manifest.version != MANIFEST_VERSION {
            return Self::empty();
        }
        manifest
    }

    /// Save to the staging directory.
    pub fn save(&self, staging_dir: &Path) -> io::Result<()> {
        let path = staging_dir.join(MANIFEST_FILENAME);
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
    }

    /// Look up an extracted archive by cache key.
    ///
    /// Returns the absolute release root if an entry exists for `key`, was
    /// recorded for the same `url`, **and** its directory is still on disk.
    pub fn find_cached(&self, key: &str, url: &str, staging_dir: &Path) -> Option<PathBuf> {
        let entry = self.entries.get(key)?;
        if entry.url != url {
            return None;
        }
        let root = staging_dir.join(&entry.root);
        root.is_dir().then_some(root)
    }

    /// Record an extracted archive.
    pub fn insert(&mut self, key: String, url: String, root: String) {
        self.entries.insert(key, ArchiveEntry { url, root });
    }
}

/// SHA-256 of an archive URL, returned as a hex string.
pub fn hash_url(url: &str) -> String {
    format!("{:x}", Sha256::digest(url.as_bytes()))
}

/// Summary of cache performance for a fetch run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub cached: u32,
    pub downloaded: u32,
    pub refetched: u32,
}

impl CacheStats {
    pub fn total(&self) -> u32 {
        self.cached + self.downloaded + self.refetched
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.cached > 0 {
            write!(
                f,
                "{} cached, {} downloaded, {} refetched ({} total)",
                self.cached,
                self.downloaded,
                self.refetched,
                self.total()
            )
        } else {
            write!(
                f,
                "{} downloaded, {} refetched",
                self.downloaded, self.refetched
            )
        }
    }
}

/// Resolve the cache manifest path for a staging directory.
pub fn manifest_path(staging_dir: &Path) -> PathBuf {
    staging_dir.join(MANIFEST_FILENAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const URL: &str = "https://api.test/zipball/v1.0.0";

    // =========================================================================
    // ArchiveCache basics
    // =========================================================================

    #[test]
    fn empty_manifest_has_no_entries() {
        let m = ArchiveCache::empty();
        assert_eq!(m.version, MANIFEST_VERSION);
        assert!(m.entries.is_empty());
    }

    #[test]
    fn find_cached_hit() {
        let tmp = TempDir::new().unwrap();
        let key = hash_url(URL);
        let mut m = ArchiveCache::empty();
        m.insert(key.clone(), URL.into(), format!("{key}/acme-widget-1a2b"));
        fs::create_dir_all(tmp.path().join(&key).join("acme-widget-1a2b")).unwrap();

        assert_eq!(
            m.find_cached(&key, URL, tmp.path()),
            Some(tmp.path().join(&key).join("acme-widget-1a2b"))
        );
    }

    #[test]
    fn find_cached_miss_directory_deleted() {
        let tmp = TempDir::new().unwrap();
        let mut m = ArchiveCache::empty();
        m.insert("k".into(), URL.into(), "k/root".into());
        assert_eq!(m.find_cached("k", URL, tmp.path()), None);
    }

    #[test]
    fn find_cached_miss_url_mismatch() {
        let tmp = TempDir::new().unwrap();
        let mut m = ArchiveCache::empty();
        m.insert("k".into(), "https://other.test/a.zip".into(), "k/root".into());
        fs::create_dir_all(tmp.path().join("k/root")).unwrap();
        assert_eq!(m.find_cached("k", URL, tmp.path()), None);
    }

    #[test]
    fn find_cached_miss_no_entry() {
        let tmp = TempDir::new().unwrap();
        assert_eq!(ArchiveCache::empty().find_cached("k", URL, tmp.path()), None);
    }

    // =========================================================================
    // Save / Load roundtrip
    // =========================================================================

    #[test]
    fn save_and_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let mut m = ArchiveCache::empty();
        m.insert("a".into(), "https://a.test".into(), "a/root".into());
        m.insert("b".into(), "https://b.test".into(), "b/root".into());

        m.save(tmp.path()).unwrap();
        let loaded = ArchiveCache::load(tmp.path());

        assert_eq!(loaded.version, MANIFEST_VERSION);
        assert_eq!(loaded.entries.len(), 2);
        assert_eq!(
            loaded.entries["a"],
            ArchiveEntry {
                url: "https://a.test".into(),
                root: "a/root".into()
            }
        );
        assert!(manifest_path(tmp.path()).exists());
    }

    #[test]
    fn load_missing_file_returns_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(ArchiveCache::load(tmp.path()).entries.is_empty());
    }

    #[test]
    fn load_corrupt_json_returns_empty() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(MANIFEST_FILENAME), "not json").unwrap();
        assert!(ArchiveCache::load(tmp.path()).entries.is_empty());
    }

    #[test]
    fn load_wrong_version_returns_empty() {
        let tmp = TempDir::new().unwrap();
        let json = format!(
            r#"{{"version": {}, "entries": {{"a": {{"url":"u","root":"a/r"}}}}}}"#,
            MANIFEST_VERSION + 1
        );
        fs::write(tmp.path().join(MANIFEST_FILENAME), json).unwrap();
        assert!(ArchiveCache::load(tmp.path()).entries.is_empty());
    }

    // =========================================================================
    // Hashing
    // =========================================================================

    #[test]
    fn hash_url_is_hex_sha256() {
        let h = hash_url(URL);
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(h, hash_url(URL));
        assert_ne!(h, hash_url("https://api.test/zipball/v1.0.1"));
    }

    #[test]
    fn hash_url_known_vector() {
        assert_eq!(
            hash_url(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    // =========================================================================
    // CacheStats
    // =========================================================================

    #[test]
    fn cache_stats_display_with_hits() {
        let s = CacheStats {
            cached: 5,
            downloaded: 2,
            refetched: 1,
        };
        assert_eq!(format!("{}", s), "5 cached, 2 downloaded, 1 refetched (8 total)");
    }

    #[test]
    fn cache_stats_display_cold_cache() {
        let s = CacheStats {
            cached: 0,
            downloaded: 3,
            refetched: 1,
        };
        assert_eq!(format!("{}", s), "3 downloaded, 1 refetched");
    }
}
