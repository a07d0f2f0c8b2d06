//! Scope Resolver
//!
//! Answers "which named function encloses this offset". Two strategies sit
//! behind [`ScopeResolver`]:
//!
//! - [`ScopeMapResolver`] uses exact function spans collected from a syntax
//!   tree (see `code_info`). Innermost (narrowest) containing span wins.
//! - [`HeuristicResolver`] scans the text before the offset for function-like
//!   patterns. It is a best-effort fallback for sources without a parse tree
//!   and prefers returning nothing over returning a keyword.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::regions::SourceSpan;

/// A function span paired with the name that encloses it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionScope {
    pub span: SourceSpan,
    pub name: String,
}

impl FunctionScope {
    pub fn new(start: usize, end: usize, name: impl Into<String>) -> Self {
        Self {
            span: SourceSpan::new(start, end),
            name: name.into(),
        }
    }
}

pub trait ScopeResolver {
    /// Name of the function enclosing `position`, or `None` at top level.
    fn enclosing_function(&self, position: usize) -> Option<&str>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCOPE MAP (exact)
// ═══════════════════════════════════════════════════════════════════════════════

pub struct ScopeMapResolver {
    scopes: Vec<FunctionScope>,
}

impl ScopeMapResolver {
    pub fn new(scopes: &[FunctionScope]) -> Self {
        let mut scopes = scopes.to_vec();
        scopes.sort_by_key(|s| s.span.start);
        Self { scopes }
    }
}

impl ScopeResolver for ScopeMapResolver {
    fn enclosing_function(&self, position: usize) -> Option<&str> {
        let mut best: Option<&FunctionScope> = None;
        for scope in &self.scopes {
            if scope.span.start > position {
                break;
            }
            if !scope.span.contains(position) {
                continue;
            }
            if best.map_or(true, |b| scope.span.width() < b.span.width()) {
                best = Some(scope);
            }
        }
        best.map(|s| s.name.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HEURISTIC (regex fallback)
// ═══════════════════════════════════════════════════════════════════════════════

lazy_static! {
    /// Words the patterns below can capture that are never function names.
    static ref NAME_STOPLIST: HashSet<&'static str> = [
        "if", "for", "while", "switch", "catch", "return", "function", "new",
        "else", "do", "try", "typeof", "instanceof", "in", "of", "await",
        "yield", "throw", "delete", "void", "case", "with", "const", "let",
        "var", "class", "super", "this", "import", "export", "default",
    ]
    .into_iter()
    .collect();

    /// Checked in this order; the match starting latest in the text wins.
    static ref FUNCTION_PATTERNS: Vec<Regex> = vec![
        // function name(
        Regex::new(r"\bfunction\s*\*?\s*([A-Za-z_$][\w$]*)\s*\(").unwrap(),
        // const name = function / (..) => / x =>
        Regex::new(
            r"\b(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*=\s*(?:async\s+)?(?:function\b|\([^()]*\)\s*=>|[A-Za-z_$][\w$]*\s*=>)",
        )
        .unwrap(),
        // name(..) {   (method shorthand)
        Regex::new(
            r"(?m)^[ \t]*(?:(?:async|static|get|set|public|private|protected)\s+)*\*?\s*([A-Za-z_$][\w$]*)\s*\([^()]*\)\s*\{",
        )
        .unwrap(),
        // name: function / (..) => / x =>
        Regex::new(
            r"([A-Za-z_$][\w$]*)\s*:\s*(?:async\s+)?(?:function\b|\([^()]*\)\s*=>|[A-Za-z_$][\w$]*\s*=>)",
        )
        .unwrap(),
    ];
}

/// Best-effort guess from the text before the call: the latest definition
/// matching one of the function patterns wins. It sees comments and strings as code,
/// does not know where a body closes, and rescans the prefix on every query.
pub struct HeuristicResolver<'s> {
    source: &'s str,
}

impl<'s> HeuristicResolver<'s> {
    pub fn new(source: &'s str) -> Self {
        Self { source }
    }
}

impl<'s> ScopeResolver for HeuristicResolver<'s> {
    fn enclosing_function(&self, position: usize) -> Option<&str> {
        let prefix = self.source.get(..position)?;
        let mut best: Option<(usize, &str)> = None;

        for pattern in FUNCTION_PATTERNS.iter() {
            for caps in pattern.captures_iter(prefix) {
                let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                    continue;
                };
                if NAME_STOPLIST.contains(name.as_str()) {
                    continue;
                }
                if best.map_or(true, |(start, _)| whole.start() > start) {
                    best = Some((whole.start(), name.as_str()));
                }
            }
        }

        best.map(|(_, name)| name)
    }
}

/// Picks the exact resolver when a scope map is available.
pub fn resolver_for<'s>(
    source: &'s str,
    scopes: Option<&[FunctionScope]>,
) -> Box<dyn ScopeResolver + 's> {
    match scopes {
        Some(scopes) => Box::new(ScopeMapResolver::new(scopes)),
        None => Box::new(HeuristicResolver::new(source)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn heuristic_at_marker(src: &str) -> Option<String> {
        let pos = src.find("HERE").unwrap();
        HeuristicResolver::new(src)
            .enclosing_function(pos)
            .map(str::to_string)
    }

    #[rstest]
    #[case("function handleClick() { HERE }", Some("handleClick"))]
    #[case("async function* gen(a) { HERE }", Some("gen"))]
    #[case("const load = async () => { HERE }", Some("load"))]
    #[case("let f = x => HERE", Some("f"))]
    #[case("var g = function () { HERE }", Some("g"))]
    #[case("class A {\n  render(props) {\n    HERE\n  }\n}", Some("render"))]
    #[case("const o = { save: async (x) => { HERE } }", Some("save"))]
    #[case("HERE", None)]
    #[case("const value = 42;\nHERE", None)]
    // Comments are not skipped.
    #[case("// function fake() {\nHERE", Some("fake"))]
    fn test_heuristic_patterns(#[case] src: &str, #[case] expected: Option<&str>) {
        assert_eq!(heuristic_at_marker(src).as_deref(), expected);
    }

    #[test]
    fn test_heuristic_latest_match_wins() {
        let src = "function outer() {\n  const inner = () => {\n    HERE\n  }\n}";
        assert_eq!(heuristic_at_marker(src).as_deref(), Some("inner"));
    }

    #[test]
    fn test_heuristic_skips_control_flow() {
        let src = "function run() {\n  if (ready) {\n    HERE\n  }\n}";
        assert_eq!(heuristic_at_marker(src).as_deref(), Some("run"));

        let src = "function run() {\n  try {} catch (e) {\n    HERE\n  }\n}";
        assert_eq!(heuristic_at_marker(src).as_deref(), Some("run"));
    }

    #[test]
    fn test_scope_map_innermost_wins() {
        let scopes = vec![
            FunctionScope::new(0, 100, "outer"),
            FunctionScope::new(20, 60, "inner"),
            FunctionScope::new(70, 90, "sibling"),
        ];
        let resolver = ScopeMapResolver::new(&scopes);
        assert_eq!(resolver.enclosing_function(30), Some("inner"));
        assert_eq!(resolver.enclosing_function(65), Some("outer"));
        assert_eq!(resolver.enclosing_function(75), Some("sibling"));
        assert_eq!(resolver.enclosing_function(100), None);
    }

    #[test]
    fn test_scope_map_accepts_unsorted_input() {
        let scopes = vec![
            FunctionScope::new(20, 60, "inner"),
            FunctionScope::new(0, 100, "outer"),
        ];
        let resolver = ScopeMapResolver::new(&scopes);
        assert_eq!(resolver.enclosing_function(25), Some("inner"));
        assert_eq!(resolver.enclosing_function(5), Some("outer"));
    }

    #[test]
    fn test_scope_map_ignores_keyword_stoplist() {
        // Names come straight from the syntax tree; no filtering applies.
        let scopes = vec![FunctionScope::new(0, 10, "new")];
        let resolver = ScopeMapResolver::new(&scopes);
        assert_eq!(resolver.enclosing_function(3), Some("new"));
    }

    #[test]
    fn test_resolver_for_prefers_scope_map() {
        let src = "function guess() { x }";
        let scopes = vec![FunctionScope::new(0, src.len(), "exact")];
        assert_eq!(
            resolver_for(src, Some(scopes.as_slice())).enclosing_function(19),
            Some("exact")
        );
        assert_eq!(
            resolver_for(src, None).enclosing_function(19),
            Some("guess")
        );
    }
}
