//! Stage wiring: resolve → fetch → extract → rewrite + emit.
//!
//! Each stage is a function the CLI can run on its own. `resolve` leaves the
//! manifest in `{temp}/releases.json` so `fetch` can pick it up later;
//! `build` runs everything in one go.
//!
//! Extraction failures are per release: the release is reported in
//! [`BuildReport::failed`] and left out of `versions` and `toc`, and the
//! rest of the run continues. Every other error aborts.

use crate::config::{ConfigError, HarvestConfig, effective_downloads};
use crate::ecosystem::{EcosystemError, EcosystemOptions, extract_ecosystem, write_ecosystem_data};
use crate::emit::{EmitError, EmitOptions, EmitStats, emit_release, write_docs_data};
use crate::fetch::{FetchEvent, FetchResult, StagedRelease, fetch_all};
use crate::remote::{FetchError, HttpBackend};
use crate::resolve::{ResolveError, ResolveOptions, ResolveOutcome, fetch_release_feed, resolve};
use crate::rewrite::{RewriteChain, RewriteError};
use crate::toc::{TocOptions, extract_all};
use crate::types::{Release, ReleaseManifest, TocTree};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{info, warn};

/// Resolved manifest, relative to the temp directory.
pub const RELEASES_FILE: &str = "releases.json";

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Rewrite(#[from] RewriteError),
    #[error(transparent)]
    Emit(#[from] EmitError),
    #[error(transparent)]
    Ecosystem(#[from] EcosystemError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no manifest at {0}; run `resolve` first")]
    MissingManifest(PathBuf),
    #[error("trunk release was not staged")]
    MissingTrunk,
}

/// Where extracted archives live below the temp directory.
pub fn staging_dir(temp_dir: &Path) -> PathBuf {
    temp_dir.join("archives")
}

// ============================================================================
// Resolve
// ============================================================================

/// Fetch the release feed, resolve it and persist the manifest.
pub fn resolve_stage(
    config: &HarvestConfig,
    backend: &dyn HttpBackend,
    temp_dir: &Path,
) -> Result<ResolveOutcome, PipelineError> {
    let records = fetch_release_feed(backend, &config.repository.releases_url())?;
    let outcome = resolve(&records, &ResolveOptions::from_config(config)?)?;

    fs::create_dir_all(temp_dir)?;
    let json = serde_json::to_string_pretty(&outcome.manifest)?;
    fs::write(temp_dir.join(RELEASES_FILE), json)?;
    Ok(outcome)
}

/// Read the manifest a previous `resolve` left behind.
pub fn load_manifest(temp_dir: &Path) -> Result<ReleaseManifest, PipelineError> {
    let path = temp_dir.join(RELEASES_FILE);
    if !path.is_file() {
        return Err(PipelineError::MissingManifest(path));
    }
    let releases: Vec<Release> = serde_json::from_str(&fs::read_to_string(&path)?)?;
    Ok(ReleaseManifest::new(releases))
}

// ============================================================================
// Fetch
// ============================================================================

pub fn fetch_stage(
    config: &HarvestConfig,
    manifest: &ReleaseManifest,
    backend: &dyn HttpBackend,
    temp_dir: &Path,
    use_cache: bool,
    progress: Option<Sender<FetchEvent>>,
) -> Result<FetchResult, PipelineError> {
    let staging = staging_dir(temp_dir);
    fs::create_dir_all(&staging)?;
    Ok(fetch_all(
        manifest,
        backend,
        &staging,
        effective_downloads(&config.fetch),
        use_cache,
        progress,
    )?)
}

// ============================================================================
// Build
// ============================================================================

/// Emission totals of one published release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseReport {
    pub docs_path: String,
    pub documents: usize,
    pub stats: EmitStats,
}

/// A release whose table of contents could not be extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedRelease {
    pub docs_path: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcosystemReport {
    pub path: PathBuf,
    pub core: usize,
    pub community: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub releases: Vec<ReleaseReport>,
    pub failed: Vec<FailedRelease>,
    pub docs_data: PathBuf,
    pub ecosystem: Option<EcosystemReport>,
}

/// Extract, rewrite and emit every staged release, then write the
/// aggregate data files.
pub fn build_stage(
    config: &HarvestConfig,
    manifest: &ReleaseManifest,
    staged: &[StagedRelease],
    output_dir: &Path,
) -> Result<BuildReport, PipelineError> {
    let chain = RewriteChain::from_config(config)?;
    let emit_options = EmitOptions::from_config(config);
    let tocs = extract_all(staged, &TocOptions::from_config(config));

    let mut tree = TocTree::new();
    let mut versions = Vec::new();
    let mut releases = Vec::new();
    let mut failed = Vec::new();

    for (stage, toc) in staged.iter().zip(tocs) {
        let docs_path = toc.release.docs_path.clone();
        let entries = match toc.result {
            Ok(entries) => entries,
            Err(e) => {
                warn!("{docs_path}: skipped: {e}");
                failed.push(FailedRelease {
                    docs_path,
                    error: e.to_string(),
                });
                continue;
            }
        };

        let stats = emit_release(
            &entries,
            &toc.release,
            &stage.root,
            &chain,
            &emit_options,
            output_dir,
        )?;
        info!(
            "{docs_path}: {} documents ({} written)",
            entries.len(),
            stats.written
        );
        releases.push(ReleaseReport {
            docs_path: docs_path.clone(),
            documents: entries.len(),
            stats,
        });
        tree.push_version(&docs_path, entries);
        versions.push(docs_path);
    }

    let docs_data = write_docs_data(output_dir, &versions, &tree, manifest)?;

    let ecosystem = if config.ecosystem.enabled {
        Some(build_ecosystem(config, manifest, staged, output_dir)?)
    } else {
        None
    };

    Ok(BuildReport {
        releases,
        failed,
        docs_data,
        ecosystem,
    })
}

fn build_ecosystem(
    config: &HarvestConfig,
    manifest: &ReleaseManifest,
    staged: &[StagedRelease],
    output_dir: &Path,
) -> Result<EcosystemReport, PipelineError> {
    let trunk = manifest.trunk().ok_or(PipelineError::MissingTrunk)?;
    let root = staged
        .iter()
        .find(|s| s.release.docs_path == trunk.docs_path)
        .map(|s| s.root.as_path())
        .ok_or(PipelineError::MissingTrunk)?;

    let data = extract_ecosystem(root, &EcosystemOptions::from_config(config))?;
    let path = write_ecosystem_data(output_dir, &data)?;
    Ok(EcosystemReport {
        path,
        core: data.plugins.core_plugins.len(),
        community: data.plugins.community_plugins.len(),
    })
}

/// The whole pipeline with no progress reporting.
pub fn run(
    config: &HarvestConfig,
    backend: &dyn HttpBackend,
    output_dir: &Path,
    temp_dir: &Path,
    use_cache: bool,
) -> Result<BuildReport, PipelineError> {
    let outcome = resolve_stage(config, backend, temp_dir)?;
    let fetched = fetch_stage(config, &outcome.manifest, backend, temp_dir, use_cache, None)?;
    build_stage(config, &outcome.manifest, &fetched.staged, output_dir)
}
