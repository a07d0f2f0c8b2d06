//! Code Info Module
//!
//! Supplies code regions and function scopes for hybrid markup documents
//! (Svelte-style components): `<script>` bodies become `Script` regions,
//! `{…}` markup expressions become `Embedded` regions, and script bodies are
//! parsed with oxc to build an exact function-scope map.
//!
//! A document whose scripts fail to parse yields empty collections. The
//! rewriter then leaves it untouched and the runtime falls back to its own
//! naming.

use lazy_static::lazy_static;
use oxc_allocator::Allocator;
use oxc_ast::ast::{
    BindingPattern, Expression, Function, MethodDefinition, ObjectProperty, VariableDeclarator,
};
use oxc_ast_visit::{walk, Visit};
use oxc_parser::Parser;
use oxc_span::{SourceType, Span};
use oxc_syntax::scope::ScopeFlags;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::delimiters::match_paren;
use crate::regions::CodeRegion;
use crate::scope::FunctionScope;

lazy_static! {
    static ref SCRIPT_BLOCK_RE: Regex =
        Regex::new(r"(?is)<script\b[^>]*>(.*?)</script\s*>").unwrap();
    static ref STYLE_BLOCK_RE: Regex = Regex::new(r"(?is)<style\b[^>]*>.*?</style\s*>").unwrap();
    static ref HTML_COMMENT_RE: Regex = Regex::new(r"(?s)<!--.*?-->").unwrap();
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeInfo {
    pub regions: Vec<CodeRegion>,
    /// Sorted by start offset.
    pub scopes: Vec<FunctionScope>,
}

impl CodeInfo {
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty() && self.scopes.is_empty()
    }
}

/// Source of regions and scopes for hybrid documents. Implementations must not
/// fail: a document they cannot read yields an empty [`CodeInfo`].
pub trait CodeInfoSupplier: Send + Sync {
    fn collect_code_info(&self, source: &str) -> CodeInfo;
}

/// Built-in supplier for HTML-like component files.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkupCodeInfo;

impl CodeInfoSupplier for MarkupCodeInfo {
    fn collect_code_info(&self, source: &str) -> CodeInfo {
        collect_code_info(source)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// REGIONS
// ═══════════════════════════════════════════════════════════════════════════════

enum BlockKind {
    Script { body: Span },
    Opaque,
}

struct Block {
    start: usize,
    end: usize,
    kind: BlockKind,
}

/// Script, style and comment blocks in document order, outermost first.
fn find_blocks(source: &str) -> Vec<Block> {
    let mut blocks = Vec::new();

    for caps in SCRIPT_BLOCK_RE.captures_iter(source) {
        let (Some(whole), Some(body)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        blocks.push(Block {
            start: whole.start(),
            end: whole.end(),
            kind: BlockKind::Script {
                body: Span::new(body.start() as u32, body.end() as u32),
            },
        });
    }
    for m in STYLE_BLOCK_RE
        .find_iter(source)
        .chain(HTML_COMMENT_RE.find_iter(source))
    {
        blocks.push(Block {
            start: m.start(),
            end: m.end(),
            kind: BlockKind::Opaque,
        });
    }

    blocks.sort_by_key(|b| b.start);
    let mut kept: Vec<Block> = Vec::with_capacity(blocks.len());
    for block in blocks {
        // A `<script>` inside a comment is commented out.
        if kept.last().is_some_and(|prev| block.start < prev.end) {
            continue;
        }
        kept.push(block);
    }
    kept
}

/// Every `{…}` in markup between `from` and `to` becomes an embedded region.
fn collect_markup_expressions(source: &str, from: usize, to: usize, out: &mut Vec<CodeRegion>) {
    let bytes = source.as_bytes();
    let mut i = from;
    while i < to {
        if bytes[i] == b'{' {
            if let Some(end) = match_paren(source, i) {
                if end <= to {
                    out.push(CodeRegion::embedded(i + 1, end - 1));
                    i = end;
                    continue;
                }
            }
        }
        i += 1;
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FUNCTION SCOPES
// ═══════════════════════════════════════════════════════════════════════════════

/// Walks a script and records every function that has a usable name.
struct FunctionScopeCollector {
    offset: usize,
    scopes: Vec<FunctionScope>,
}

impl FunctionScopeCollector {
    fn push(&mut self, span: Span, name: &str) {
        self.scopes.push(FunctionScope::new(
            self.offset + span.start as usize,
            self.offset + span.end as usize,
            name,
        ));
    }
}

/// Span of an anonymous function expression that takes its parent's name.
fn anonymous_function_span(expr: &Expression) -> Option<Span> {
    match expr {
        Expression::ArrowFunctionExpression(arrow) => Some(arrow.span),
        Expression::FunctionExpression(func) if func.id.is_none() => Some(func.span),
        _ => None,
    }
}

impl<'a> Visit<'a> for FunctionScopeCollector {
    fn visit_function(&mut self, func: &Function<'a>, flags: ScopeFlags) {
        if let Some(id) = &func.id {
            self.push(func.span, id.name.as_str());
        }
        walk::walk_function(self, func, flags);
    }

    fn visit_variable_declarator(&mut self, decl: &VariableDeclarator<'a>) {
        if let (BindingPattern::BindingIdentifier(id), Some(init)) = (&decl.id, &decl.init) {
            if let Some(span) = anonymous_function_span(init) {
                self.push(span, id.name.as_str());
            }
        }
        walk::walk_variable_declarator(self, decl);
    }

    fn visit_method_definition(&mut self, def: &MethodDefinition<'a>) {
        if let Some(name) = def.key.static_name() {
            self.push(def.value.span, &name);
        }
        walk::walk_method_definition(self, def);
    }

    fn visit_object_property(&mut self, prop: &ObjectProperty<'a>) {
        if let Some(span) = anonymous_function_span(&prop.value) {
            if let Some(name) = prop.key.static_name() {
                self.push(span, &name);
            }
        }
        walk::walk_object_property(self, prop);
    }
}

/// Parses one script body and returns its function scopes rebased by
/// `offset`, or `None` if the body does not parse cleanly.
pub fn collect_script_scopes(script: &str, offset: usize) -> Option<Vec<FunctionScope>> {
    let allocator = Allocator::default();
    let source_type = SourceType::default()
        .with_typescript(true)
        .with_module(true);

    let ret = Parser::new(&allocator, script, source_type).parse();
    if ret.panicked || !ret.errors.is_empty() {
        tracing::warn!(
            target: "callsite::code_info",
            errors = ret.errors.len(),
            offset,
            "script block failed to parse"
        );
        return None;
    }

    let mut collector = FunctionScopeCollector {
        offset,
        scopes: Vec::new(),
    };
    collector.visit_program(&ret.program);
    Some(collector.scopes)
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENTRY
// ═══════════════════════════════════════════════════════════════════════════════

/// Collects code regions and function scopes from a markup document.
pub fn collect_code_info(source: &str) -> CodeInfo {
    let mut regions = Vec::new();
    let mut scopes = Vec::new();
    let mut cursor = 0;

    for block in find_blocks(source) {
        collect_markup_expressions(source, cursor, block.start, &mut regions);
        cursor = block.end;

        if let BlockKind::Script { body } = block.kind {
            let (start, end) = (body.start as usize, body.end as usize);
            match collect_script_scopes(&source[start..end], start) {
                Some(found) => scopes.extend(found),
                None => return CodeInfo::default(),
            }
            regions.push(CodeRegion::script(start, end));
        }
    }
    collect_markup_expressions(source, cursor, source.len(), &mut regions);

    regions.sort_by_key(|r| r.span.start);
    scopes.sort_by_key(|s| s.span.start);
    CodeInfo { regions, scopes }
}
