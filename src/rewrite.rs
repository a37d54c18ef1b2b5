//! Link rewriting: raw markdown + page context → site-valid markdown.
//!
//! The rewrite is an ordered chain of [`RewriteRule`]s, each a regex plus a
//! transform. Order matters: earlier rules turn absolute repository URLs and
//! named pages into their final form before the generic relative-link rules
//! see them.
//!
//! | # | Rule | Example (page `Guides/Testing` of `v3.1.x`) |
//! |---|------|------------------------------------------------|
//! | 1 | `absolute-blob` | `(https://github.com/o/r/blob/main/docs/Reply.md#x)` → `(/docs/v3.1.x/Reply#x)` |
//! | 2 | `absolute-blob-href` | `href="https://github.com/o/r/blob/main/docs/Reply.md"` → `href="/docs/v3.1.x/Reply"` |
//! | 3 | `absolute-blob-autolink` | `<https://github.com/o/r/blob/main/docs/Reply.md>` → `[/docs/v3.1.x/Reply](/docs/v3.1.x/Reply)` |
//! | 4 | `named-page` | `(../Ecosystem.md)` → `(/ecosystem)` |
//! | 5 | `relative-doc` | `(./Plugins.md#use)` → `(/docs/v3.1.x/Guides/Plugins#use)` |
//! | 6 | `relative-doc-reference` | `[p]: ../Server.md` → `[p]: /docs/v3.1.x/Server` |
//! | 7 | `site-doc-suffix` | `(/docs/v2.0.x/Server.md)` → `(/docs/v2.0.x/Server)` |
//! | 8 | `relative-doc-titled` | `('./Hooks.md' "Hooks")` → `(/docs/v3.1.x/Guides/Hooks "Hooks")` |
//! | 9 | `anchor` | `(#setup)` → `(/docs/v3.1.x/Guides/Testing#setup)` |
//! | 10 | `resource` | `(./resources/flow.png)` → `(/docs/v3.1.x/Guides/resources/flow.png)` |
//!
//! `absolute-blob-autolink` also picks up bare blob URLs in prose. A relative
//! link only reaches `named-page` with its `.md` suffix.
//!
//! A target naming `index` collapses to its section root. Every rule emits
//! site-absolute paths without a `.md` suffix, which no rule matches, so the
//! chain is idempotent.
//!
//! After the chain, any link target that is still relative is reported as an
//! [`UnmatchedLink`] and left untouched.

use crate::config::HarvestConfig;
use crate::toc::{has_scheme, page_link, resolve_link_path};
use crate::types::DocumentEntry;
use regex::{Captures, Regex};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RewriteError {
    #[error("rewrite rule {rule} failed to compile: {source}")]
    Pattern {
        rule: &'static str,
        source: regex::Error,
    },
}

/// Page context a rewrite runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewriteContext<'a> {
    /// Docs path of the page's release.
    pub version: &'a str,
    /// Section of the page, `/`-separated; empty at the top.
    pub section: &'a str,
    pub slug: &'a str,
}

impl<'a> From<&'a DocumentEntry> for RewriteContext<'a> {
    fn from(entry: &'a DocumentEntry) -> Self {
        Self {
            version: &entry.version,
            section: &entry.section,
            slug: &entry.slug,
        }
    }
}

/// A link target no rule rewrote and that is not already site-valid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmatchedLink {
    pub target: String,
    /// 1-based line in the rewritten document.
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteOutput {
    pub content: String,
    pub unmatched: Vec<UnmatchedLink>,
}

type Transform = Box<dyn Fn(&Captures, &RewriteContext) -> String + Send + Sync>;

/// One `(matcher, transform)` step of the chain.
pub struct RewriteRule {
    pub name: &'static str,
    regex: Regex,
    transform: Transform,
}

impl RewriteRule {
    fn new(name: &'static str, pattern: &str, transform: Transform) -> Result<Self, RewriteError> {
        let regex = Regex::new(pattern).map_err(|source| RewriteError::Pattern { rule: name, source })?;
        Ok(Self {
            name,
            regex,
            transform,
        })
    }

    pub fn apply(&self, content: &str, ctx: &RewriteContext) -> String {
        self.regex
            .replace_all(content, |caps: &Captures| (self.transform)(caps, ctx))
            .into_owned()
    }
}

impl std::fmt::Debug for RewriteRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RewriteRule")
            .field("name", &self.name)
            .field("regex", &self.regex.as_str())
            .finish()
    }
}

/// Settings the chain is built from.
#[derive(Debug, Clone)]
pub struct RewriteSettings {
    pub docs_route: String,
    /// Blob URL of the trunk docs folder, without trailing slash.
    pub blob_base: String,
    /// Named page file name → fixed route.
    pub named_pages: Vec<(String, String)>,
    /// Literal snippets removed before rewriting.
    pub strip: Vec<String>,
}

impl RewriteSettings {
    pub fn from_config(config: &HarvestConfig) -> Self {
        Self {
            docs_route: config.site.docs_route.trim_end_matches('/').to_string(),
            blob_base: config.repository.docs_blob_base(),
            named_pages: config
                .site
                .named_pages
                .iter()
                .map(|(file, route)| (file.clone(), route.clone()))
                .collect(),
            strip: config.site.strip.clone(),
        }
    }
}

/// The ordered rule chain plus the post-chain audit.
#[derive(Debug)]
pub struct RewriteChain {
    rules: Vec<RewriteRule>,
    strip: Vec<String>,
    audit: Regex,
}

// Link openers: inline `](` or a reference definition `[id]: `.
const OPEN_ANY: &str = r"(?P<open>\]\(\s*|^[ \t]{0,3}\[[^\]\n]+\]:[ \t]*)";
const OPEN_INLINE: &str = r"(?P<open>\]\(\s*)";
const OPEN_DEFINITION: &str = r"(?P<open>^[ \t]{0,3}\[[^\]\n]+\]:[ \t]*)";
// A relative markdown path: optional `./`/`../` hops, then a name.
const RELATIVE_MD: &str = r"(?P<path>(?:\.{1,2}/)*[\w\-][\w\-./]*?(?i:\.md))";
const ANCHOR: &str = r#"(?P<anchor>#[^\s)"']*)?"#;
const NEVER: &str = r"[^\s\S]";

impl RewriteChain {
    pub fn new(settings: &RewriteSettings) -> Result<Self, RewriteError> {
        let route = settings.docs_route.clone();
        let blob = regex::escape(&settings.blob_base);
        let route_rx = regex::escape(&route);

        let mut rules = Vec::new();

        let r = route.clone();
        rules.push(RewriteRule::new(
            "absolute-blob",
            &format!(
                r#"(?m){OPEN_ANY}{blob}(?:/(?P<path>[^\s)"'#]*))?{ANCHOR}(?P<end>[\s)"']|$)"#
            ),
            Box::new(move |c: &Captures, ctx: &RewriteContext| {
                format!(
                    "{}{}{}{}",
                    &c["open"],
                    blob_target(&r, ctx.version, c.name("path").map_or("", |m| m.as_str())),
                    c.name("anchor").map_or("", |m| m.as_str()),
                    &c["end"]
                )
            }),
        )?);

        let r = route.clone();
        rules.push(RewriteRule::new(
            "absolute-blob-href",
            &format!(r#"href=(?P<q>["']){blob}(?:/(?P<path>[^\s"'#]*))?{ANCHOR}(?P<end>["'])"#),
            Box::new(move |c: &Captures, ctx: &RewriteContext| {
                format!(
                    "href={}{}{}{}",
                    &c["q"],
                    blob_target(&r, ctx.version, c.name("path").map_or("", |m| m.as_str())),
                    c.name("anchor").map_or("", |m| m.as_str()),
                    &c["end"]
                )
            }),
        )?);

        let r = route.clone();
        rules.push(RewriteRule::new(
            "absolute-blob-autolink",
            &format!(
                r"(?m)<{blob}(?:/(?P<path>[^\s<>#]*))?(?P<anchor>#[^\s<>]*)?>|(?P<lead>^|[ \t]){blob}(?:/(?P<bare_path>[\w\-./]*[\w\-/]))?(?P<bare_anchor>#[\w\-]+)?(?P<trail>[.,;:!?]?(?:[ \t]|$))"
            ),
            Box::new(move |c: &Captures, ctx: &RewriteContext| {
                let path = c.name("path").or_else(|| c.name("bare_path"));
                let anchor = c.name("anchor").or_else(|| c.name("bare_anchor"));
                let target = format!(
                    "{}{}",
                    blob_target(&r, ctx.version, path.map_or("", |m| m.as_str())),
                    anchor.map_or("", |m| m.as_str())
                );
                format!(
                    "{}[{target}]({target}){}",
                    c.name("lead").map_or("", |m| m.as_str()),
                    c.name("trail").map_or("", |m| m.as_str())
                )
            }),
        )?);

        let named: HashMap<String, String> = settings
            .named_pages
            .iter()
            .map(|(file, target)| (md_stem(file).to_ascii_lowercase(), target.clone()))
            .collect();
        let stems = settings
            .named_pages
            .iter()
            .map(|(file, _)| regex::escape(md_stem(file)))
            .collect::<Vec<_>>()
            .join("|");
        let named_pattern = if stems.is_empty() {
            NEVER.to_string()
        } else {
            // Site paths may omit `.md`; relative paths must carry it.
            format!(
                r"(?m){OPEN_ANY}(?:{route_rx}/[\w.\-]+/(?:[\w\-.]+/)*(?i:(?P<stem>{stems}))(?i:\.md)?|(?:\.{{1,2}}/|[\w\-.]+/)*(?i:(?P<file>{stems}))(?i:\.md)){ANCHOR}(?P<end>[\s)]|$)"
            )
        };
        rules.push(RewriteRule::new(
            "named-page",
            &named_pattern,
            Box::new(move |c: &Captures, _: &RewriteContext| {
                let stem = c
                    .name("stem")
                    .or_else(|| c.name("file"))
                    .map_or(String::new(), |m| m.as_str().to_ascii_lowercase());
                match named.get(&stem) {
                    Some(target) => format!(
                        "{}{}{}{}",
                        &c["open"],
                        target,
                        c.name("anchor").map_or("", |m| m.as_str()),
                        &c["end"]
                    ),
                    None => c[0].to_string(),
                }
            }),
        )?);

        let r = route.clone();
        rules.push(RewriteRule::new(
            "relative-doc",
            &format!(r"{OPEN_INLINE}{RELATIVE_MD}{ANCHOR}(?P<close>\s*\))"),
            Box::new(move |c: &Captures, ctx: &RewriteContext| match relative_target(&r, ctx, &c["path"]) {
                Some(target) => format!(
                    "{}{}{}{}",
                    &c["open"],
                    target,
                    c.name("anchor").map_or("", |m| m.as_str()),
                    &c["close"]
                ),
                None => c[0].to_string(),
            }),
        )?);

        let r = route.clone();
        rules.push(RewriteRule::new(
            "relative-doc-reference",
            &format!(r"(?m){OPEN_DEFINITION}{RELATIVE_MD}{ANCHOR}(?P<close>[ \t]+|$)"),
            Box::new(move |c: &Captures, ctx: &RewriteContext| match relative_target(&r, ctx, &c["path"]) {
                Some(target) => format!(
                    "{}{}{}{}",
                    &c["open"],
                    target,
                    c.name("anchor").map_or("", |m| m.as_str()),
                    &c["close"]
                ),
                None => c[0].to_string(),
            }),
        )?);

        rules.push(RewriteRule::new(
            "site-doc-suffix",
            &format!(
                r"(?m){OPEN_ANY}(?P<path>{route_rx}/[\w.\-]+(?:/[\w.\-]+)*?)(?i:\.md){ANCHOR}(?P<end>[\s)]|$)"
            ),
            Box::new(|c: &Captures, _: &RewriteContext| {
                format!(
                    "{}{}{}{}",
                    &c["open"],
                    collapse_index(&c["path"]),
                    c.name("anchor").map_or("", |m| m.as_str()),
                    &c["end"]
                )
            }),
        )?);

        let r = route.clone();
        rules.push(RewriteRule::new(
            "relative-doc-titled",
            &format!(
                r#"{OPEN_INLINE}'?{RELATIVE_MD}{ANCHOR}'?(?P<title>\s+(?:"[^"\n]*"|'[^'\n]*'))\s*\)"#
            ),
            Box::new(move |c: &Captures, ctx: &RewriteContext| match relative_target(&r, ctx, &c["path"]) {
                Some(target) => format!(
                    "{}{}{}{})",
                    &c["open"],
                    target,
                    c.name("anchor").map_or("", |m| m.as_str()),
                    &c["title"]
                ),
                None => c[0].to_string(),
            }),
        )?);

        let r = route.clone();
        rules.push(RewriteRule::new(
            "anchor",
            &format!(r"{OPEN_INLINE}#(?P<anchor>[^\s)]+)(?P<close>\s*\))"),
            Box::new(move |c: &Captures, ctx: &RewriteContext| {
                format!(
                    "{}{}#{}{}",
                    &c["open"],
                    page_link(&r, ctx.version, ctx.section, ctx.slug),
                    &c["anchor"],
                    &c["close"]
                )
            }),
        )?);

        let r = route;
        rules.push(RewriteRule::new(
            "resource",
            r#"(?m)(?P<open>\]\(\s*|src="|href="|^[ \t]{0,3}\[[^\]\n]+\]:[ \t]*)(?P<path>(?:\.{1,2}/)*(?:[\w\-.]+/)*resources/[^\s)"'#?]+)"#,
            Box::new(move |c: &Captures, ctx: &RewriteContext| {
                let path = &c["path"];
                if is_md(path) {
                    return c[0].to_string();
                }
                match resolve_link_path(ctx.section, path) {
                    Some(resolved) => format!("{}{}/{}/{}", &c["open"], r, ctx.version, resolved),
                    None => c[0].to_string(),
                }
            }),
        )?);

        let audit = Regex::new(
            r#"(?m)\]\(\s*<?(?P<inline>[^\s)>]+)|^[ \t]{0,3}\[[^\]\n]+\]:[ \t]*<?(?P<def>[^\s>]+)|href=["'](?P<href>[^"']*)["']"#,
        )
        .map_err(|source| RewriteError::Pattern {
            rule: "audit",
            source,
        })?;

        Ok(Self {
            rules,
            strip: settings.strip.clone(),
            audit,
        })
    }

    pub fn from_config(config: &HarvestConfig) -> Result<Self, RewriteError> {
        Self::new(&RewriteSettings::from_config(config))
    }

    /// Rule names in application order.
    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name).collect()
    }

    /// Run the chain without stripping or auditing.
    pub fn apply(&self, content: &str, ctx: &RewriteContext) -> String {
        self.rules
            .iter()
            .fold(content.to_string(), |acc, rule| rule.apply(&acc, ctx))
    }

    /// Strip configured snippets, run the chain, then audit what is left.
    pub fn rewrite(&self, raw: &str, entry: &DocumentEntry) -> RewriteOutput {
        let mut content = raw.to_string();
        for snippet in self.strip.iter().filter(|s| !s.is_empty()) {
            content = content.replace(snippet.as_str(), "");
        }
        let content = self.apply(&content, &RewriteContext::from(entry));
        let unmatched = self.audit(&content);
        RewriteOutput { content, unmatched }
    }

    /// Link targets that are neither fully qualified nor site-absolute.
    pub fn audit(&self, content: &str) -> Vec<UnmatchedLink> {
        self.audit
            .captures_iter(content)
            .filter_map(|caps| {
                let m = caps
                    .name("inline")
                    .or_else(|| caps.name("def"))
                    .or_else(|| caps.name("href"))?;
                let target = m.as_str();
                if is_accounted(target) {
                    return None;
                }
                Some(UnmatchedLink {
                    target: target.to_string(),
                    line: content[..m.start()].matches('\n').count() + 1,
                })
            })
            .collect()
    }
}

fn is_accounted(target: &str) -> bool {
    target.is_empty() || target.starts_with('/') || target.starts_with('#') || has_scheme(target)
}

fn is_md(path: &str) -> bool {
    md_stem_of(path).is_some()
}

/// `path` without a trailing `.md` (any case), when it has a non-empty stem.
fn md_stem_of(path: &str) -> Option<&str> {
    let split = path.len().checked_sub(3).filter(|&i| i > 0)?;
    let suffix = path.get(split..)?;
    suffix
        .eq_ignore_ascii_case(".md")
        .then(|| &path[..split])
}

fn md_stem(file: &str) -> &str {
    md_stem_of(file).unwrap_or(file)
}

/// Drop a trailing `index` segment (any case) so it addresses the section root.
fn collapse_index(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some((parent, last)) if last.eq_ignore_ascii_case("index") => parent.to_string(),
        None if trimmed.eq_ignore_ascii_case("index") => String::new(),
        _ => trimmed.to_string(),
    }
}

/// Site path of a docs-root-relative path.
fn site_path(route: &str, version: &str, docs_relative: &str) -> String {
    let path = collapse_index(md_stem(docs_relative));
    if path.is_empty() {
        format!("{route}/{version}")
    } else {
        format!("{route}/{version}/{path}")
    }
}

fn blob_target(route: &str, version: &str, path: &str) -> String {
    if is_md(path) {
        site_path(route, version, path)
    } else if path.is_empty() {
        format!("{route}/{version}")
    } else {
        format!("{route}/{version}/{path}")
    }
}

fn relative_target(route: &str, ctx: &RewriteContext, path: &str) -> Option<String> {
    resolve_link_path(ctx.section, path).map(|resolved| site_path(route, ctx.version, &resolved))
}
