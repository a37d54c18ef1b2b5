//! Archive fetching: manifest → extracted release roots in the staging area.
//!
//! Each distinct archive URL is one unit of work. Units run on a dedicated
//! rayon pool sized by `fetch.max_downloads`, separate from the global pool
//! used for extraction and emission, since downloads are I/O bound.
//!
//! ```text
//! staging/
//! ├── .archive-cache.json
//! ├── 3f1c…e2/                      # sha256(url)
//! │   └── acme-widget-1a2b3c4/      # release root (single top-level dir)
//! │       └── docs/
//! └── 9b0d….partial/                # in-flight extraction, renamed when done
//! ```
//!
//! Any failed unit fails the whole stage; nothing is retried. Results come
//! back in manifest order regardless of completion order.

use crate::cache::{ArchiveCache, CacheStats};
use crate::remote::HttpBackend;
use crate::types::{CachePolicy, Release, ReleaseManifest};
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use tracing::{debug, info};

pub use crate::remote::FetchError;

/// A manifest entry together with its extracted release root.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedRelease {
    pub release: Release,
    pub root: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Cached,
    Downloaded,
    Refetched,
}

/// Progress event, one per archive.
#[derive(Debug, Clone)]
pub enum FetchEvent {
    Staged {
        /// Docs paths served by this archive, in manifest order.
        docs_paths: Vec<String>,
        url: String,
        status: FetchStatus,
    },
}

#[derive(Debug)]
pub struct FetchResult {
    pub staged: Vec<StagedRelease>,
    pub cache_stats: CacheStats,
}

/// One archive to resolve, shared by every manifest entry with its URL.
struct Unit {
    key: String,
    url: String,
    refetch: bool,
    docs_paths: Vec<String>,
}

struct Outcome {
    key: String,
    url: String,
    root: String,
    status: FetchStatus,
}

fn plan_units(manifest: &ReleaseManifest) -> Vec<Unit> {
    let mut units: Vec<Unit> = Vec::new();
    for release in manifest.releases() {
        let refetch = release.cache_policy == CachePolicy::AlwaysRefetch;
        match units.iter_mut().find(|u| u.key == release.cache_key) {
            Some(unit) => {
                unit.refetch |= refetch;
                unit.docs_paths.push(release.docs_path.clone());
            }
            None => units.push(Unit {
                key: release.cache_key.clone(),
                url: release.url.clone(),
                refetch,
                docs_paths: vec![release.docs_path.clone()],
            }),
        }
    }
    units
}

/// Resolve every manifest entry to an extracted release root.
pub fn fetch_all(
    manifest: &ReleaseManifest,
    backend: &dyn HttpBackend,
    staging_dir: &Path,
    pool_size: usize,
    use_cache: bool,
    progress: Option<Sender<FetchEvent>>,
) -> Result<FetchResult, FetchError> {
    fs::create_dir_all(staging_dir)?;
    let mut cache = if use_cache {
        ArchiveCache::load(staging_dir)
    } else {
        ArchiveCache::empty()
    };

    let units = plan_units(manifest);
    info!(
        "fetching {} archives for {} releases ({} workers)",
        units.len(),
        manifest.len(),
        pool_size
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(pool_size.max(1))
        .build()
        .map_err(|e| FetchError::Io(std::io::Error::other(e)))?;

    let outcomes: Vec<Outcome> = pool.install(|| {
        units
            .par_iter()
            .map(|unit| {
                let outcome = stage_unit(unit, &cache, backend, staging_dir)?;
                if let Some(tx) = &progress {
                    tx.send(FetchEvent::Staged {
                        docs_paths: unit.docs_paths.clone(),
                        url: unit.url.clone(),
                        status: outcome.status,
                    })
                    .ok();
                }
                Ok(outcome)
            })
            .collect::<Result<Vec<_>, FetchError>>()
    })?;

    let mut stats = CacheStats::default();
    let mut roots: HashMap<String, PathBuf> = HashMap::new();
    for outcome in outcomes {
        match outcome.status {
            FetchStatus::Cached => stats.cached += 1,
            FetchStatus::Downloaded => stats.downloaded += 1,
            FetchStatus::Refetched => stats.refetched += 1,
        }
        roots.insert(outcome.key.clone(), staging_dir.join(&outcome.root));
        cache.insert(outcome.key, outcome.url, outcome.root);
    }
    cache.save(staging_dir)?;

    let staged = manifest
        .releases()
        .iter()
        .filter_map(|release| {
            roots.get(&release.cache_key).map(|root| StagedRelease {
                release: release.clone(),
                root: root.clone(),
            })
        })
        .collect();

    info!("archives: {stats}");
    Ok(FetchResult {
        staged,
        cache_stats: stats,
    })
}

fn stage_unit(
    unit: &Unit,
    cache: &ArchiveCache,
    backend: &dyn HttpBackend,
    staging_dir: &Path,
) -> Result<Outcome, FetchError> {
    if !unit.refetch
        && let Some(root) = cache.find_cached(&unit.key, &unit.url, staging_dir)
        && let Some(rel) = cache.entries.get(&unit.key).map(|e| e.root.clone())
    {
        debug!("cache hit for {} at {}", unit.url, root.display());
        return Ok(Outcome {
            key: unit.key.clone(),
            url: unit.url.clone(),
            root: rel,
            status: FetchStatus::Cached,
        });
    }

    debug!("downloading {}", unit.url);
    let response = backend.get(&unit.url)?;
    let root = extract_archive(&response.body, &unit.url, &unit.key, staging_dir)?;
    info!("staged {} ({})", unit.docs_paths.join(", "), unit.url);

    Ok(Outcome {
        key: unit.key.clone(),
        url: unit.url.clone(),
        root,
        status: if unit.refetch {
            FetchStatus::Refetched
        } else {
            FetchStatus::Downloaded
        },
    })
}

/// Unpack a zip archive into `staging/{key}/` and return the release root
/// relative to the staging directory.
///
/// Extraction goes to `{key}.partial` first so an interrupted run never
/// leaves a half-written tree under the final name.
pub fn extract_archive(
    bytes: &[u8],
    url: &str,
    key: &str,
    staging_dir: &Path,
) -> Result<String, FetchError> {
    let archive_error = |e: zip::result::ZipError| FetchError::Archive {
        url: url.to_string(),
        message: e.to_string(),
    };

    let partial = staging_dir.join(format!("{key}.partial"));
    if partial.exists() {
        fs::remove_dir_all(&partial)?;
    }
    fs::create_dir_all(&partial)?;

    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(archive_error)?;
    archive.extract(&partial).map_err(archive_error)?;

    let top = single_top_level_dir(&partial)?.ok_or_else(|| FetchError::EmptyArchive {
        url: url.to_string(),
    })?;

    let target = staging_dir.join(key);
    if target.exists() {
        fs::remove_dir_all(&target)?;
    }
    fs::rename(&partial, &target)?;

    Ok(format!("{key}/{top}"))
}

fn single_top_level_dir(dir: &Path) -> Result<Option<String>, FetchError> {
    let mut entries = fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
    if entries.len() != 1 {
        return Ok(None);
    }
    let entry = entries.remove(0);
    if !entry.file_type()?.is_dir() {
        return Ok(None);
    }
    Ok(Some(entry.file_name().to_string_lossy().into_owned()))
}
