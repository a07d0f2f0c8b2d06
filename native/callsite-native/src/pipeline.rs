//! Pipeline Module
//!
//! The glue a build hook calls per module: gate the file, derive its display
//! paths, collect regions and scopes for markup documents, consult the
//! incremental cache, and run the rewriter. Units are independent, so batches
//! run in parallel without locking beyond the caches' own.

#[cfg(feature = "napi")]
use napi_derive::napi;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::cache::IncrementalCache;
use crate::code_info::{CodeInfoSupplier, MarkupCodeInfo};
use crate::error::CallsiteError;
use crate::options::{is_eligible_path, should_transform, DocumentKind, SourcePaths, TransformOptions};
use crate::transform::{transform_with_options, TransformOutput};

/// One compilation unit: a module id and its source text.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    pub id: String,
    pub code: String,
}

pub struct CallsiteTransformer<S = MarkupCodeInfo> {
    options: TransformOptions,
    supplier: S,
    cache: Option<IncrementalCache>,
}

impl CallsiteTransformer<MarkupCodeInfo> {
    pub fn new(options: TransformOptions) -> Self {
        Self::with_supplier(options, MarkupCodeInfo)
    }
}

impl<S: CodeInfoSupplier> CallsiteTransformer<S> {
    pub fn with_supplier(options: TransformOptions, supplier: S) -> Self {
        Self {
            options,
            supplier,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: IncrementalCache) -> Self {
        self.cache = Some(cache.with_fingerprint(self.options.fingerprint()));
        self
    }

    pub fn options(&self) -> &TransformOptions {
        &self.options
    }

    /// Rewrites one module, or returns `None` when it is gated out or has
    /// nothing to rewrite.
    pub fn transform_id(&self, id: &str, code: &str) -> Option<TransformOutput> {
        if !should_transform(id, code, &self.options) {
            return None;
        }

        if let Some(entry) = self.cache.as_ref().and_then(|c| c.get(id, code)) {
            return entry.output;
        }

        let output = self.run(id, code);

        if let Some(cache) = &self.cache {
            if let Err(error) = cache.set(id, code, output.clone()) {
                tracing::warn!(target: "callsite::cache", id, %error, "failed to store cache entry");
            }
        }
        output
    }

    fn run(&self, id: &str, code: &str) -> Option<TransformOutput> {
        let paths = SourcePaths::from_id(id, &self.options.src_root);

        match self.options.document_kind(id) {
            DocumentKind::Plain => transform_with_options(
                code,
                &paths.short_path,
                &paths.file_path,
                None,
                None,
                &self.options,
            ),
            DocumentKind::Hybrid => {
                let info = self.supplier.collect_code_info(code);
                if info.regions.is_empty() {
                    tracing::debug!(
                        target: "callsite::pipeline",
                        id,
                        "no code regions; leaving document unchanged"
                    );
                    return None;
                }
                transform_with_options(
                    code,
                    &paths.short_path,
                    &paths.file_path,
                    Some(info.regions.as_slice()),
                    Some(info.scopes.as_slice()),
                    &self.options,
                )
            }
        }
    }

    /// Rewrites many units in parallel. Results line up with `units`.
    pub fn transform_batch(&self, units: &[SourceUnit]) -> Vec<Option<TransformOutput>> {
        units
            .par_iter()
            .map(|unit| self.transform_id(&unit.id, &unit.code))
            .collect()
    }

    /// Reads and rewrites every eligible file under `root`, returning only the
    /// files that changed.
    pub fn transform_directory(
        &self,
        root: &Path,
    ) -> Result<Vec<(PathBuf, TransformOutput)>, CallsiteError> {
        let files = discover_sources(root, &self.options)?;
        let units = files
            .iter()
            .map(|path| {
                let code = fs::read_to_string(path).map_err(|e| CallsiteError::io(path, e))?;
                Ok(SourceUnit {
                    id: path.to_string_lossy().replace('\\', "/"),
                    code,
                })
            })
            .collect::<Result<Vec<_>, CallsiteError>>()?;

        let results = self.transform_batch(&units);
        tracing::debug!(
            target: "callsite::pipeline",
            root = %root.display(),
            files = units.len(),
            changed = results.iter().filter(|r| r.is_some()).count(),
            "transformed directory"
        );

        Ok(files
            .into_iter()
            .zip(results)
            .filter_map(|(path, output)| output.map(|o| (path, o)))
            .collect())
    }
}

/// Files under `root` whose path passes the extension and exclusion filters.
pub fn discover_sources(root: &Path, options: &TransformOptions) -> Result<Vec<PathBuf>, CallsiteError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|source| CallsiteError::Walk {
            root: root.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if is_eligible_path(&path.to_string_lossy(), options) {
            files.push(path.to_path_buf());
        }
    }
    Ok(files)
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAPI EXPORT
// ═══════════════════════════════════════════════════════════════════════════════

/// Build-hook entry: returns the rewritten code, or `null` when unchanged.
#[cfg(feature = "napi")]
#[napi]
pub fn transform_native(
    code: String,
    id: String,
    options_json: Option<String>,
) -> napi::Result<Option<String>> {
    let options = match options_json {
        Some(json) => TransformOptions::from_json(&json)
            .map_err(|e| napi::Error::from_reason(e.to_string()))?,
        None => TransformOptions::default(),
    };
    Ok(CallsiteTransformer::new(options)
        .transform_id(&id, &code)
        .map(|out| out.code))
}
