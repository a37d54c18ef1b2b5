//! Centralized filename parsing for documentation pages.
//!
//! Every page in every release is named by its markdown file, and all derived
//! names (slug, display name, index detection) come from this one function so
//! that the extractor and the rewriter agree on them.
//!
//! ## Display Names
//!
//! Dashes in the stem are converted to spaces for display:
//! - `Getting-Started.md` → "Getting Started"
//! - `Reply.md` → "Reply"
//! - `Index.md` → slug `index`, display "Index"

/// Result of parsing a documentation file name like `Getting-Started.md`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocName {
    /// File name without the `.md` extension, case preserved.
    pub stem: String,
    /// URL segment: the stem, with any-case `index` normalized to `index`.
    pub slug: String,
    /// Stem with dashes converted to spaces.
    pub display_name: String,
}

impl ParsedDocName {
    pub fn is_index(&self) -> bool {
        self.slug == "index"
    }
}

/// Whether `file_name` names a markdown document.
pub fn is_markdown(file_name: &str) -> bool {
    file_name
        .rsplit_once('.')
        .is_some_and(|(stem, ext)| !stem.is_empty() && ext.eq_ignore_ascii_case("md"))
}

/// Parse a documentation file name.
///
/// Returns `None` for anything that is not a markdown file.
/// - `"Getting-Started.md"` → stem="Getting-Started", slug="Getting-Started"
/// - `"Index.md"` → slug="index"
/// - `"logo.png"` → None
pub fn parse_doc_name(file_name: &str) -> Option<ParsedDocName> {
    if !is_markdown(file_name) {
        return None;
    }
    let (stem, _) = file_name.rsplit_once('.')?;
    let slug = if stem.eq_ignore_ascii_case("index") {
        "index".to_string()
    } else {
        stem.to_string()
    };
    Some(ParsedDocName {
        stem: stem.to_string(),
        slug,
        display_name: stem.replace('-', " "),
    })
}
