//! # Call-Site Rewriter (build-time provenance for `gg`)
//!
//! Rewrites calls to the `gg` logger so each one carries its own origin
//! (namespace, file, line, column, argument source) at zero runtime cost.
//!
//! ## Rewriting Invariants
//!
//! 1. **Lexical Immunity**: call-like text inside strings, template literals
//!    (including `${}` bodies) and comments is never rewritten.
//!
//! 2. **Region Gating**: in markup documents only `<script>` bodies and `{…}`
//!    expressions are code. Prose is neither matched nor lexed.
//!
//! 3. **Namespace Shape**: `shortPath@function`, or `shortPath` at top level.
//!    The exact scope map wins over the regex heuristic whenever a parse tree
//!    is available.
//!
//! 4. **Two Forms, One Payload**: script code gets an inline object, markup
//!    expressions get positional `gg._o(…)` arguments. Both read as
//!    `{ ns, file?, line?, col?, src? }` at runtime.
//!
//! 5. **Idempotence**: emitted `_ns`/`_o` accessors are outside the match
//!    grammar, and an untouched unit returns `None`.
//!
//! 6. **No Fatal Path**: unterminated literals, unmatched parens, unparseable
//!    scripts and odd labels all degrade to "skip", never to an error.

#[cfg(feature = "napi")]
use napi_derive::napi;

mod cache;
mod code_info;
mod delimiters;
mod error;
mod label;
mod lexer;
mod options;
mod pipeline;
mod regions;
mod scope;
mod transform;


pub use cache::{CacheEntry, CallerLabelCache, IncrementalCache};
pub use code_info::{collect_code_info, collect_script_scopes, CodeInfo, CodeInfoSupplier, MarkupCodeInfo};
pub use delimiters::{match_paren, split_first_argument};
pub use error::CallsiteError;
pub use label::{substitute, LabelVars};
pub use lexer::{line_col, skip};
pub use options::{
    is_eligible_path, should_transform, DocumentKind, SourcePaths, TransformOptions,
    EMIT_ACCESSOR, POSITIONAL_ACCESSOR,
};
pub use pipeline::{discover_sources, CallsiteTransformer, SourceUnit};
pub use regions::{CodeRegion, RegionClassifier, RegionContext, SourceSpan};
pub use scope::{resolver_for, FunctionScope, HeuristicResolver, ScopeMapResolver, ScopeResolver};
pub use transform::{transform, transform_with_options, CallSiteMetadata, TransformOutput};

#[cfg(feature = "napi")]
pub use pipeline::transform_native;

#[cfg(feature = "napi")]
#[napi]
pub fn callsite_bridge() -> String {
    "Callsite Native Bridge Connected".to_string()
}
