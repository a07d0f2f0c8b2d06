//! Code Region Classifier
//!
//! Decides whether a byte offset lies in rewritable code and, if so, in which
//! syntactic context. Plain documents are one synthetic `Script` region; hybrid
//! documents carry externally supplied regions and everything outside them is
//! prose/markup.

use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════════════
// SPANS & REGIONS
// ═══════════════════════════════════════════════════════════════════════════════

/// Half-open byte range `[start, end)` into the original source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceSpan {
    pub start: usize,
    pub end: usize,
}

impl SourceSpan {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "span start after end");
        Self { start, end }
    }

    pub fn contains(&self, pos: usize) -> bool {
        self.start <= pos && pos < self.end
    }

    pub fn width(&self) -> usize {
        self.end - self.start
    }
}

/// Syntactic context of a code region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RegionContext {
    /// A script body. Inline object literals are fine here.
    Script,
    /// A markup expression such as `{value}` or `onclick={…}`, whose host
    /// syntax needs the positional metadata form.
    Embedded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeRegion {
    pub span: SourceSpan,
    pub context: RegionContext,
}

impl CodeRegion {
    pub fn script(start: usize, end: usize) -> Self {
        Self {
            span: SourceSpan::new(start, end),
            context: RegionContext::Script,
        }
    }

    pub fn embedded(start: usize, end: usize) -> Self {
        Self {
            span: SourceSpan::new(start, end),
            context: RegionContext::Embedded,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CLASSIFIER
// ═══════════════════════════════════════════════════════════════════════════════

pub enum RegionClassifier<'r> {
    /// The whole buffer is a single script region.
    Plain(CodeRegion),
    /// Only the listed regions are code.
    Hybrid(&'r [CodeRegion]),
}

impl<'r> RegionClassifier<'r> {
    pub fn plain(source_len: usize) -> Self {
        // Reach one past the end so a trailing offset still classifies.
        RegionClassifier::Plain(CodeRegion::script(0, source_len + 1))
    }

    pub fn hybrid(regions: &'r [CodeRegion]) -> Self {
        RegionClassifier::Hybrid(regions)
    }

    /// Plain when no regions are supplied.
    pub fn for_document(source_len: usize, regions: Option<&'r [CodeRegion]>) -> Self {
        match regions {
            Some(regions) => Self::hybrid(regions),
            None => Self::plain(source_len),
        }
    }

    /// First region containing `pos`, or `None` for prose/markup.
    pub fn region_at(&self, pos: usize) -> Option<CodeRegion> {
        match self {
            RegionClassifier::Plain(region) => Some(*region),
            RegionClassifier::Hybrid(regions) => {
                regions.iter().find(|r| r.span.contains(pos)).copied()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_covers_everything() {
        let classifier = RegionClassifier::plain(10);
        for pos in [0, 5, 9, 10] {
            let region = classifier.region_at(pos).unwrap();
            assert_eq!(region.context, RegionContext::Script);
        }
    }

    #[test]
    fn test_hybrid_lookup() {
        let regions = vec![CodeRegion::script(8, 20), CodeRegion::embedded(30, 35)];
        let classifier = RegionClassifier::hybrid(&regions);
        assert!(classifier.region_at(0).is_none());
        assert_eq!(
            classifier.region_at(8).map(|r| r.context),
            Some(RegionContext::Script)
        );
        assert!(classifier.region_at(20).is_none());
        assert_eq!(
            classifier.region_at(34).map(|r| r.context),
            Some(RegionContext::Embedded)
        );
    }

    #[test]
    fn test_empty_regions_exclude_all() {
        let empty: Vec<CodeRegion> = Vec::new();
        let classifier = RegionClassifier::for_document(50, Some(empty.as_slice()));
        assert!(classifier.region_at(3).is_none());
    }

    #[test]
    fn test_region_serde_shape() {
        let region = CodeRegion::embedded(1, 4);
        let json = serde_json::to_string(&region).unwrap();
        assert_eq!(json, r#"{"span":{"start":1,"end":4},"context":"embedded"}"#);
    }
}
