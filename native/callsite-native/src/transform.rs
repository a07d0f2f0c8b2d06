//! Call Rewriter / Emitter
//!
//! Walks a source unit once and rewrites every top-level `gg(…)` and
//! `gg.ns('label', …)` call into a call carrying static call-site metadata:
//!
//! ```text
//! gg(x)              →  gg._ns({ns:"a.ts@load",file:"src/a.ts",line:3,col:5,src:"x"}, x)
//! {gg(x)} in markup  →  gg._ns(gg._o("a.ts","src/a.ts",3,5,"x"), x)
//! ```
//!
//! ## Invariants
//!
//! 1. Text inside strings, template literals and comments is never matched.
//! 2. Offsets outside every code region (markup prose) are never matched and
//!    never lexed, so a prose apostrophe cannot open a string.
//! 3. Only bare calls and allow-listed label accessors are rewritten. The
//!    emitted `_ns`/`_o` accessors are not in the grammar, so rewriting is
//!    idempotent.
//! 4. A unit without rewrites yields `None`, never an identical copy.

use serde::{Deserialize, Serialize};

use crate::delimiters::{match_paren, split_first_argument};
use crate::label::{parse_string_literal, substitute, LabelVars};
use crate::lexer::{self, is_ident_byte};
use crate::options::{TransformOptions, DEFAULT_OPTIONS, EMIT_ACCESSOR, POSITIONAL_ACCESSOR};
use crate::regions::{CodeRegion, RegionClassifier, RegionContext};
use crate::scope::{resolver_for, FunctionScope, ScopeResolver};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformOutput {
    pub code: String,
    pub changed: bool,
    /// Number of call sites rewritten.
    pub rewrites: usize,
}

/// Metadata injected into a rewritten call. The runtime reads both emitted
/// forms into this same shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSiteMetadata {
    pub ns: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub col: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENTRY POINTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Rewrites `source` with the default options.
///
/// `regions`/`scopes` come from a markup document's code-info supplier; when
/// absent the whole buffer is script and function names are guessed
/// heuristically.
pub fn transform(
    source: &str,
    short_path: &str,
    file_path: &str,
    regions: Option<&[CodeRegion]>,
    scopes: Option<&[FunctionScope]>,
) -> Option<TransformOutput> {
    transform_with_options(source, short_path, file_path, regions, scopes, &DEFAULT_OPTIONS)
}

pub fn transform_with_options(
    source: &str,
    short_path: &str,
    file_path: &str,
    regions: Option<&[CodeRegion]>,
    scopes: Option<&[FunctionScope]>,
    options: &TransformOptions,
) -> Option<TransformOutput> {
    let classifier = RegionClassifier::for_document(source.len(), regions);
    let resolver = resolver_for(source, scopes);
    let emitter = Emitter {
        source,
        short_path,
        file_path,
        options,
        resolver: resolver.as_ref(),
    };

    let bytes = source.as_bytes();
    let mut code = String::with_capacity(source.len() + 256);
    let mut copied_to = 0;
    let mut rewrites = 0;
    let mut i = 0;

    while i < bytes.len() {
        let Some(region) = classifier.region_at(i) else {
            i += 1;
            continue;
        };

        let next = lexer::skip(source, i);
        if next != i {
            i = next.min(region.span.end).max(i + 1);
            continue;
        }

        match emitter.candidate_at(i) {
            Candidate::NoMatch => i += 1,
            Candidate::Ignored { resume } => i = resume,
            Candidate::Call(call) => match emitter.emit(&call, region.context) {
                Some(replacement) => {
                    code.push_str(&source[copied_to..call.start]);
                    code.push_str(&replacement);
                    copied_to = call.end;
                    rewrites += 1;
                    i = call.end;
                }
                None => i = call.args_start,
            },
        }
    }

    if rewrites == 0 {
        return None;
    }
    code.push_str(&source[copied_to..]);

    tracing::debug!(
        target: "callsite::transform",
        file = short_path,
        rewrites,
        "rewrote call sites"
    );

    Some(TransformOutput {
        code,
        changed: true,
        rewrites,
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// CANDIDATE RECOGNITION
// ═══════════════════════════════════════════════════════════════════════════════

enum CallShape {
    Bare,
    Labeled,
}

struct CallMatch {
    shape: CallShape,
    /// Offset of the identifier.
    start: usize,
    /// Offset just past `(`.
    args_start: usize,
    /// Offset just past the closing `)`.
    end: usize,
}

enum Candidate {
    NoMatch,
    /// Looks like the identifier but is not a rewritable call.
    Ignored { resume: usize },
    Call(CallMatch),
}

struct Emitter<'a> {
    source: &'a str,
    short_path: &'a str,
    file_path: &'a str,
    options: &'a TransformOptions,
    resolver: &'a dyn ScopeResolver,
}

impl<'a> Emitter<'a> {
    fn candidate_at(&self, start: usize) -> Candidate {
        let bytes = self.source.as_bytes();
        let ident = self.options.identifier.as_bytes();

        if !bytes[start..].starts_with(ident) {
            return Candidate::NoMatch;
        }
        if start > 0 {
            let prev = bytes[start - 1];
            // `obj.gg(`, `#gg(` and `this.#gg(` belong to something else.
            if is_ident_byte(prev) || prev == b'.' || prev == b'#' {
                return Candidate::NoMatch;
            }
        }
        let after = start + ident.len();
        if bytes.get(after).is_some_and(|&b| is_ident_byte(b)) {
            return Candidate::NoMatch;
        }
        if self.follows_function_keyword(start) {
            return Candidate::Ignored { resume: after };
        }

        match bytes.get(after) {
            Some(b'.') => self.accessor_call(start, after + 1),
            _ => {
                let open = skip_whitespace(bytes, after);
                if bytes.get(open) != Some(&b'(') {
                    return Candidate::Ignored { resume: after };
                }
                self.bounded(CallShape::Bare, start, open, after)
            }
        }
    }

    fn accessor_call(&self, start: usize, accessor_start: usize) -> Candidate {
        let bytes = self.source.as_bytes();
        let mut accessor_end = accessor_start;
        while bytes.get(accessor_end).is_some_and(|&b| is_ident_byte(b)) {
            accessor_end += 1;
        }
        let accessor = &self.source[accessor_start..accessor_end];
        if !self.options.is_label_accessor(accessor) {
            // Control accessors and already-rewritten calls.
            return Candidate::Ignored {
                resume: accessor_end,
            };
        }

        let open = skip_whitespace(bytes, accessor_end);
        if bytes.get(open) != Some(&b'(') {
            return Candidate::Ignored {
                resume: accessor_end,
            };
        }
        self.bounded(CallShape::Labeled, start, open, accessor_end)
    }

    fn bounded(&self, shape: CallShape, start: usize, open: usize, resume: usize) -> Candidate {
        match match_paren(self.source, open) {
            // `gg(x) { … }` in a class body or object literal defines a method.
            Some(end) if self.opens_body(end) => Candidate::Ignored { resume },
            Some(end) => Candidate::Call(CallMatch {
                shape,
                start,
                args_start: open + 1,
                end,
            }),
            None => Candidate::Ignored { resume },
        }
    }

    fn opens_body(&self, end: usize) -> bool {
        let bytes = self.source.as_bytes();
        bytes.get(skip_whitespace(bytes, end)) == Some(&b'{')
    }

    /// `function gg(` declares the logger; it is not a call.
    fn follows_function_keyword(&self, start: usize) -> bool {
        let before = &self.source[..start];
        let trimmed = before.trim_end();
        trimmed.len() < before.len() && trimmed.ends_with("function")
    }

    // ───────────────────────────────────────────────────────────────────────────
    // EMISSION
    // ───────────────────────────────────────────────────────────────────────────

    /// Builds the replacement text, or `None` when the call turns out not to
    /// be rewritable (a labeled call whose first argument is not a string).
    fn emit(&self, call: &CallMatch, context: RegionContext) -> Option<String> {
        let args = &self.source[call.args_start..call.end - 1];
        let (line, col) = lexer::line_col(self.source, call.start);
        let function = self.resolver.enclosing_function(call.start).unwrap_or("");
        let namespace = if function.is_empty() {
            self.short_path.to_string()
        } else {
            format!("{}@{}", self.short_path, function)
        };

        let (ns, tail, separator) = match call.shape {
            CallShape::Bare => (namespace, args, ", "),
            CallShape::Labeled => {
                let (first, rest) = split_first_argument(args);
                let label = parse_string_literal(first)?;
                let vars = LabelVars {
                    namespace: &namespace,
                    function,
                    file: self.short_path,
                    line,
                    col,
                };
                (substitute(&label, &vars), rest.unwrap_or(""), ",")
            }
        };

        let src = tail.trim();
        let metadata = CallSiteMetadata {
            ns,
            file: Some(self.file_path.to_string()),
            line: Some(line),
            col: Some(col),
            src: (self.options.emit_source && !src.is_empty()).then(|| src.to_string()),
        };

        let ident = &self.options.identifier;
        let meta = match context {
            RegionContext::Script => script_form(&metadata),
            RegionContext::Embedded => positional_form(ident, &metadata),
        };

        let mut out = format!("{}.{}({}", ident, EMIT_ACCESSOR, meta);
        if !src.is_empty() {
            out.push_str(separator);
            out.push_str(tail);
        }
        out.push(')');
        Some(out)
    }
}

fn skip_whitespace(bytes: &[u8], mut i: usize) -> usize {
    while bytes.get(i).is_some_and(|b| b.is_ascii_whitespace()) {
        i += 1;
    }
    i
}

fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

/// `{ns:"…",file:"…",line:N,col:N,src:"…"}`
fn script_form(meta: &CallSiteMetadata) -> String {
    let mut fields = vec![format!("ns:{}", js_string(&meta.ns))];
    if let Some(file) = &meta.file {
        fields.push(format!("file:{}", js_string(file)));
    }
    if let Some(line) = meta.line {
        fields.push(format!("line:{}", line));
    }
    if let Some(col) = meta.col {
        fields.push(format!("col:{}", col));
    }
    if let Some(src) = &meta.src {
        fields.push(format!("src:{}", js_string(src)));
    }
    format!("{{{}}}", fields.join(","))
}

/// `gg._o("ns","file",line,col[,"src"])`; markup expressions cannot hold an
/// inline object literal, so the same fields travel positionally.
fn positional_form(ident: &str, meta: &CallSiteMetadata) -> String {
    let mut args = vec![
        js_string(&meta.ns),
        meta.file.as_deref().map(js_string).unwrap_or_else(|| "undefined".to_string()),
        meta.line.map(|l| l.to_string()).unwrap_or_else(|| "undefined".to_string()),
        meta.col.map(|c| c.to_string()).unwrap_or_else(|| "undefined".to_string()),
    ];
    if let Some(src) = &meta.src {
        args.push(js_string(src));
    }
    format!("{}.{}({})", ident, POSITIONAL_ACCESSOR, args.join(","))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_form_shape() {
        let meta = CallSiteMetadata {
            ns: "a.ts@f".to_string(),
            file: Some("src/a.ts".to_string()),
            line: Some(2),
            col: Some(3),
            src: Some("\"x\"".to_string()),
        };
        assert_eq!(
            script_form(&meta),
            r#"{ns:"a.ts@f",file:"src/a.ts",line:2,col:3,src:"\"x\""}"#
        );
    }

    #[test]
    fn test_positional_form_shape() {
        let meta = CallSiteMetadata {
            ns: "a.svelte".to_string(),
            file: Some("src/a.svelte".to_string()),
            line: Some(1),
            col: Some(9),
            src: None,
        };
        assert_eq!(
            positional_form("gg", &meta),
            r#"gg._o("a.svelte","src/a.svelte",1,9)"#
        );
    }

    #[test]
    fn test_metadata_json_omits_missing_fields() {
        let meta = CallSiteMetadata {
            ns: "x".to_string(),
            file: None,
            line: None,
            col: None,
            src: None,
        };
        assert_eq!(serde_json::to_string(&meta).unwrap(), r#"{"ns":"x"}"#);
    }
}
