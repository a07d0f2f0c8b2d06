//! Options Module
//!
//! Configuration for the rewriter and the per-file gating a build hook applies
//! before calling it: which files qualify, how their display paths are
//! derived, and whether they are plain code or hybrid markup documents.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::error::CallsiteError;

/// Accessor of the rewritten, metadata-carrying call (`gg._ns(…)`).
pub const EMIT_ACCESSOR: &str = "_ns";
/// Accessor of the positional metadata builder used in markup (`gg._o(…)`).
pub const POSITIONAL_ACCESSOR: &str = "_o";

lazy_static! {
    pub static ref DEFAULT_OPTIONS: TransformOptions = TransformOptions::default();
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSFORM OPTIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransformOptions {
    /// The logging function whose calls are rewritten.
    pub identifier: String,
    /// Accessors that take a string label as first argument (`gg.ns('…')`).
    pub label_accessors: Vec<String>,
    /// Directory marker stripped from ids to build display paths.
    pub src_root: String,
    /// File extensions (without dot) eligible for rewriting.
    pub extensions: Vec<String>,
    /// Extensions treated as markup documents with embedded code.
    pub hybrid_extensions: Vec<String>,
    /// Path substrings that disable rewriting (vendored code, the logger itself).
    pub exclude: Vec<String>,
    /// Whether to inject the argument source text.
    pub emit_source: bool,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            identifier: "gg".to_string(),
            label_accessors: vec!["ns".to_string()],
            src_root: "src".to_string(),
            extensions: ["js", "mjs", "cjs", "ts", "mts", "cts", "jsx", "tsx", "svelte"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            hybrid_extensions: vec!["svelte".to_string()],
            exclude: vec!["/node_modules/".to_string()],
            emit_source: true,
        }
    }
}

impl TransformOptions {
    /// Parses options from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, CallsiteError> {
        let options: TransformOptions = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Stable text identifying everything that affects rewrite output.
    pub fn fingerprint(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), CallsiteError> {
        if !is_valid_identifier(&self.identifier) {
            return Err(CallsiteError::invalid_options(format!(
                "'{}' is not a valid identifier",
                self.identifier
            )));
        }
        for accessor in &self.label_accessors {
            if !is_valid_identifier(accessor) {
                return Err(CallsiteError::invalid_options(format!(
                    "'{}' is not a valid accessor name",
                    accessor
                )));
            }
            // Rewritten calls must never match again.
            if accessor == EMIT_ACCESSOR || accessor == POSITIONAL_ACCESSOR {
                return Err(CallsiteError::invalid_options(format!(
                    "'{}' is reserved for rewritten calls",
                    accessor
                )));
            }
        }
        Ok(())
    }

    pub fn is_label_accessor(&self, name: &str) -> bool {
        self.label_accessors.iter().any(|a| a == name)
    }

    pub fn document_kind(&self, id: &str) -> DocumentKind {
        match extension_of(strip_query(id)) {
            Some(ext) if self.hybrid_extensions.iter().any(|h| h == ext) => DocumentKind::Hybrid,
            _ => DocumentKind::Plain,
        }
    }
}

fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// The whole file is code.
    Plain,
    /// Markup with script blocks and `{…}` expressions.
    Hybrid,
}

// ═══════════════════════════════════════════════════════════════════════════════
// PATHS
// ═══════════════════════════════════════════════════════════════════════════════

/// Display paths derived from a module id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcePaths {
    /// Path below the source root, used in namespaces (`routes/+page.svelte`).
    pub short_path: String,
    /// Path keeping the source root marker (`src/routes/+page.svelte`).
    pub file_path: String,
}

impl SourcePaths {
    pub fn from_id(id: &str, src_root: &str) -> Self {
        let path = strip_query(id).replace('\\', "/");
        let path = path
            .strip_prefix("file://")
            .map(str::to_string)
            .unwrap_or(path);

        let marker = format!("/{}/", src_root);
        if let Some(idx) = path.find(&marker) {
            return Self {
                short_path: path[idx + marker.len()..].to_string(),
                file_path: path[idx + 1..].to_string(),
            };
        }
        if let Some(rest) = path.strip_prefix(&marker[1..]) {
            return Self {
                short_path: rest.to_string(),
                file_path: path.clone(),
            };
        }

        let is_absolute = path.starts_with('/') || path.as_bytes().get(1) == Some(&b':');
        let display = if is_absolute {
            path.rsplit('/').next().unwrap_or(&path).to_string()
        } else {
            path.clone()
        };
        Self {
            short_path: display.clone(),
            file_path: display,
        }
    }
}

fn strip_query(id: &str) -> &str {
    id.split('?').next().unwrap_or(id)
}

fn extension_of(path: &str) -> Option<&str> {
    let file_name = path.rsplit(['/', '\\']).next()?;
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    Some(ext)
}

// ═══════════════════════════════════════════════════════════════════════════════
// GATING
// ═══════════════════════════════════════════════════════════════════════════════

/// Whether the file at `path` may be rewritten, ignoring its content.
pub fn is_eligible_path(path: &str, options: &TransformOptions) -> bool {
    let path = strip_query(path).replace('\\', "/");
    let Some(ext) = extension_of(&path) else {
        return false;
    };
    if !options.extensions.iter().any(|e| e == ext) {
        return false;
    }
    !options.exclude.iter().any(|marker| path.contains(marker.as_str()))
}

/// Cheap pre-check a build hook runs before invoking the rewriter: an
/// eligible path and at least one `<identifier>(` or `<identifier>.`.
pub fn should_transform(id: &str, code: &str, options: &TransformOptions) -> bool {
    is_eligible_path(id, options) && mentions_call(code, &options.identifier)
}

fn mentions_call(code: &str, identifier: &str) -> bool {
    code.match_indices(identifier).any(|(at, _)| {
        let rest = code[at + identifier.len()..].trim_start();
        rest.starts_with('(') || code[at + identifier.len()..].starts_with('.')
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/home/me/app/src/routes/+page.svelte", "routes/+page.svelte", "src/routes/+page.svelte")]
    #[case("/home/me/app/src/lib/a.ts?v=123", "lib/a.ts", "src/lib/a.ts")]
    #[case("C:\\work\\app\\src\\main.ts", "main.ts", "src/main.ts")]
    #[case("src/a.ts", "a.ts", "src/a.ts")]
    #[case("lib/util.js", "lib/util.js", "lib/util.js")]
    #[case("/tmp/scratch.js", "scratch.js", "scratch.js")]
    fn test_source_paths(#[case] id: &str, #[case] short: &str, #[case] file: &str) {
        let paths = SourcePaths::from_id(id, "src");
        assert_eq!(paths.short_path, short);
        assert_eq!(paths.file_path, file);
    }

    #[test]
    fn test_should_transform() {
        let options = TransformOptions::default();
        assert!(should_transform("/app/src/a.ts", "gg(1)", &options));
        assert!(should_transform("/app/src/a.svelte?x", "gg(1)", &options));
        assert!(!should_transform("/app/src/a.ts", "console.log(1)", &options));
        assert!(should_transform("/app/src/a.ts", "gg (1)", &options));
        assert!(should_transform("/app/src/a.ts", "gg.ns('x')", &options));
        assert!(!should_transform("/app/src/a.ts", "const gg = 1;", &options));
        assert!(!should_transform("/app/src/a.ts", "import { gg } from 'gg'", &options));
        assert!(!should_transform("/app/src/a.css", "gg(1)", &options));
        assert!(!should_transform("/app/node_modules/x/a.js", "gg(1)", &options));
        assert!(!should_transform("/app/src/Makefile", "gg(1)", &options));
    }

    #[test]
    fn test_document_kind() {
        let options = TransformOptions::default();
        assert_eq!(options.document_kind("a.svelte"), DocumentKind::Hybrid);
        assert_eq!(options.document_kind("a.svelte?type=script"), DocumentKind::Hybrid);
        assert_eq!(options.document_kind("a.ts"), DocumentKind::Plain);
    }

    #[test]
    fn test_options_from_json_defaults() {
        let options = TransformOptions::from_json(r#"{"identifier":"dbg"}"#).unwrap();
        assert_eq!(options.identifier, "dbg");
        assert_eq!(options.label_accessors, vec!["ns".to_string()]);
        assert!(options.emit_source);
    }

    #[test]
    fn test_options_rejects_bad_values() {
        assert!(matches!(
            TransformOptions::from_json(r#"{"identifier":"1x"}"#),
            Err(CallsiteError::InvalidOptions { .. })
        ));
        assert!(matches!(
            TransformOptions::from_json(r#"{"labelAccessors":["_ns"]}"#),
            Err(CallsiteError::InvalidOptions { .. })
        ));
        assert!(matches!(
            TransformOptions::from_json("{"),
            Err(CallsiteError::OptionsJson(_))
        ));
    }
}
