//! # docs-harvest
//!
//! Builds a versioned documentation corpus for a static site from a
//! project's tagged releases. Every supported minor version gets its own
//! copy of the docs, plus a `latest` alias and the moving trunk branch.
//!
//! # Architecture: Four-Stage Pipeline
//!
//! ```text
//! 1. Resolve   release feed   →  releases.json   (feed → ordered manifest)
//! 2. Fetch     manifest       →  archives/       (zipballs, content-addressed)
//! 3. Extract   release roots  →  TOC             (index files → ordered entries)
//! 4. Emit      TOC + bodies   →  content/, data/ (rewritten pages + site data)
//! ```
//!
//! Resolution is pure once the feed is in memory, so the selection rules
//! (one release per `vMAJOR.MINOR.x`, floor, `latest` election) are tested
//! without a network. The manifest is persisted so `fetch` can run on its own.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`version`] | Tag parsing and the single ordering used everywhere |
//! | [`resolve`] | Stage 1: release feed pagination, filtering, label election |
//! | [`remote`] | HTTP seam: `HttpBackend` trait and the `ureq` implementation |
//! | [`fetch`] | Stage 2: parallel archive download and extraction |
//! | [`cache`] | Archive cache manifest keyed by archive URL |
//! | [`toc`] | Stage 3: index-driven discovery of a release's documents |
//! | [`rewrite`] | Ordered link rewrite chain and unmatched-link audit |
//! | [`emit`] | Stage 4: frontmatter, page files, assets, `docs.yml` |
//! | [`ecosystem`] | Plugin registry extraction into `ecosystem.yml` |
//! | [`pipeline`] | Stage wiring and the build report |
//! | [`config`] | `harvest.toml` loading, merging over stock defaults, validation |
//! | [`types`] | Manifest, document entry and TOC types shared between stages |
//! | [`naming`] | Markdown file name → slug and display name |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Aliases Are Manifest Entries
//!
//! `latest` and the trunk are ordinary [`types::Release`] values tagged with
//! a [`types::ReleaseKind`]. Downstream stages never special-case them except
//! where the output differs (canonical links for `latest`, edit links for the
//! trunk). `latest` shares its archive URL with its label, so the fetch stage
//! downloads it once.
//!
//! ## The Index Is the Table of Contents
//!
//! A release's `index.md` files decide what is published and in which order.
//! Files nobody links to stay unpublished unless `toc.include_unlisted` is
//! set, which keeps drafts and internal notes out of the site.
//!
//! ## Rewriting Is Data, Not Errors
//!
//! A link no rewrite rule understands is left as written and reported. A
//! broken link in an old release should not block publishing the other
//! thirty versions.

pub mod cache;
pub mod config;
pub mod ecosystem;
pub mod emit;
pub mod fetch;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod remote;
pub mod resolve;
pub mod rewrite;
pub mod toc;
pub mod types;
pub mod version;

#[cfg(test)]
pub(crate) mod test_helpers;
