//! Caches
//!
//! - [`IncrementalCache`] remembers the rewrite result per module id, keyed by
//!   a SHA-256 of the options fingerprint and the source, optionally
//!   persisted as JSON.
//! - [`CallerLabelCache`] is the process-wide memo the runtime's fallback path
//!   uses to turn a caller location into a namespace label. Append-only, no
//!   eviction; writers serialize on a mutex and racing readers see idempotent
//!   values.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use crate::error::CallsiteError;
use crate::options::SourcePaths;
use crate::transform::TransformOutput;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // Entries are complete values; a panicked writer cannot leave one half-built.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ═══════════════════════════════════════════════════════════════════════════════
// INCREMENTAL CACHE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub hash: String,
    /// `None` records that the source needed no rewrite.
    pub output: Option<TransformOutput>,
}

pub struct IncrementalCache {
    cache_dir: Option<PathBuf>,
    fingerprint: String,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl IncrementalCache {
    pub fn in_memory() -> Self {
        Self {
            cache_dir: None,
            fingerprint: String::new(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// A cache that also reads and writes JSON entries under `cache_dir`.
    pub fn persistent(cache_dir: impl Into<PathBuf>) -> Result<Self, CallsiteError> {
        let cache_dir = cache_dir.into();
        fs::create_dir_all(&cache_dir).map_err(|e| CallsiteError::io(&cache_dir, e))?;
        Ok(Self {
            cache_dir: Some(cache_dir),
            fingerprint: String::new(),
            entries: Mutex::new(HashMap::new()),
        })
    }

    /// Entries recorded under a different fingerprint are treated as stale.
    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = fingerprint.into();
        self
    }

    fn entry_hash(&self, source: &str) -> String {
        if self.fingerprint.is_empty() {
            return Self::compute_hash(source);
        }
        let mut hasher = Sha256::new();
        hasher.update(self.fingerprint.as_bytes());
        hasher.update([0u8]);
        hasher.update(source.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn compute_hash(source: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn entry_path(&self, id: &str) -> Option<PathBuf> {
        let safe_name = id.replace(['/', '\\', ':', '?'], "_");
        self.cache_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.json", safe_name)))
    }

    /// Returns the entry for `id` if it was recorded for this exact source.
    pub fn get(&self, id: &str, source: &str) -> Option<CacheEntry> {
        let hash = self.entry_hash(source);

        if let Some(entry) = lock(&self.entries).get(id) {
            return (entry.hash == hash).then(|| entry.clone());
        }

        let entry = self.read_entry(id)?;
        if entry.hash != hash {
            return None;
        }
        lock(&self.entries).insert(id.to_string(), entry.clone());
        Some(entry)
    }

    fn read_entry(&self, id: &str) -> Option<CacheEntry> {
        let path = self.entry_path(id)?;
        let data = fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&data) {
            Ok(entry) => Some(entry),
            Err(error) => {
                tracing::warn!(
                    target: "callsite::cache",
                    id,
                    %error,
                    "dropping corrupt cache entry"
                );
                fs::remove_file(&path).ok();
                None
            }
        }
    }

    pub fn set(
        &self,
        id: &str,
        source: &str,
        output: Option<TransformOutput>,
    ) -> Result<(), CallsiteError> {
        let entry = CacheEntry {
            hash: self.entry_hash(source),
            output,
        };

        if let Some(path) = self.entry_path(id) {
            let data = serde_json::to_string(&entry)
                .map_err(|source| CallsiteError::CacheEncode { source })?;
            fs::write(&path, data).map_err(|e| CallsiteError::io(&path, e))?;
        }
        lock(&self.entries).insert(id.to_string(), entry);
        Ok(())
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CALLER LABEL CACHE
// ═══════════════════════════════════════════════════════════════════════════════

lazy_static! {
    static ref ORIGIN_RE: Regex = Regex::new(r"^(?:file://|https?://[^/]+)").unwrap();
    static ref LINE_COL_RE: Regex = Regex::new(r"^(.*?)((?::\d+){1,2})$").unwrap();
}

#[derive(Default)]
pub struct CallerLabelCache {
    labels: Mutex<HashMap<String, String>>,
}

impl CallerLabelCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Canonical key for a stack-frame location such as
    /// `http://localhost:5173/src/lib/a.ts?t=17:10:5` → `/src/lib/a.ts:10:5`.
    pub fn normalize_location(location: &str) -> String {
        let location = location.trim().replace('\\', "/");
        let location = ORIGIN_RE.replace(&location, "");
        let (path, position) = match LINE_COL_RE.captures(&location) {
            Some(caps) => (
                caps.get(1).map_or("", |m| m.as_str()).to_string(),
                caps.get(2).map_or("", |m| m.as_str()).to_string(),
            ),
            None => (location.to_string(), String::new()),
        };
        let path = path.split('?').next().unwrap_or(&path);
        format!("{}{}", path, position)
    }

    pub fn get(&self, location: &str) -> Option<String> {
        lock(&self.labels)
            .get(&Self::normalize_location(location))
            .cloned()
    }

    /// Returns the memoized label for `location`, computing it from the
    /// normalized key on first use.
    pub fn get_or_insert_with(&self, location: &str, make: impl FnOnce(&str) -> String) -> String {
        let key = Self::normalize_location(location);
        if let Some(label) = lock(&self.labels).get(&key) {
            return label.clone();
        }
        let label = make(&key);
        lock(&self.labels).entry(key).or_insert(label).clone()
    }

    /// Fallback namespace for a caller that was not rewritten at build time:
    /// the short path of the calling file.
    pub fn label_for(&self, location: &str, src_root: &str) -> String {
        self.get_or_insert_with(location, |key| {
            let path = LINE_COL_RE
                .captures(key)
                .and_then(|caps| caps.get(1))
                .map_or(key, |m| m.as_str());
            SourcePaths::from_id(path, src_root).short_path
        })
    }

    pub fn len(&self) -> usize {
        lock(&self.labels).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn output(code: &str) -> TransformOutput {
        TransformOutput {
            code: code.to_string(),
            changed: true,
            rewrites: 1,
        }
    }

    #[test]
    fn test_hash_is_stable() {
        assert_eq!(IncrementalCache::compute_hash("a"), IncrementalCache::compute_hash("a"));
        assert_ne!(IncrementalCache::compute_hash("a"), IncrementalCache::compute_hash("b"));
    }

    #[test]
    fn test_fingerprint_change_invalidates_persisted_entry() {
        let dir = tempfile::tempdir().unwrap();
        let first = IncrementalCache::persistent(dir.path()).unwrap().with_fingerprint("a");
        first.set("src/a.ts", "gg(1)", Some(output("x"))).unwrap();

        let same = IncrementalCache::persistent(dir.path()).unwrap().with_fingerprint("a");
        assert!(same.get("src/a.ts", "gg(1)").is_some());

        let other = IncrementalCache::persistent(dir.path()).unwrap().with_fingerprint("b");
        assert!(other.get("src/a.ts", "gg(1)").is_none());
    }

    #[test]
    fn test_in_memory_hit_and_invalidation() {
        let cache = IncrementalCache::in_memory();
        cache.set("src/a.ts", "gg(1)", Some(output("x"))).unwrap();
        cache.set("src/b.ts", "const b = 1", None).unwrap();

        let hit = cache.get("src/a.ts", "gg(1)").unwrap();
        assert_eq!(hit.output.unwrap().code, "x");
        assert!(cache.get("src/b.ts", "const b = 1").unwrap().output.is_none());
        assert!(cache.get("src/a.ts", "gg(2)").is_none());
        assert!(cache.get("src/c.ts", "gg(1)").is_none());
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_persistent_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        IncrementalCache::persistent(dir.path())
            .unwrap()
            .set("/app/src/a.ts?v=1", "gg(1)", Some(output("y")))
            .unwrap();

        let reopened = IncrementalCache::persistent(dir.path()).unwrap();
        assert!(reopened.is_empty());
        let entry = reopened.get("/app/src/a.ts?v=1", "gg(1)").unwrap();
        assert_eq!(entry.output.unwrap().code, "y");
        assert_eq!(reopened.len(), 1);
    }

    #[test]
    fn test_corrupt_entry_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let cache = IncrementalCache::persistent(dir.path()).unwrap();
        let path = dir.path().join("a.ts.json");
        fs::write(&path, "{not json").unwrap();

        assert!(cache.get("a.ts", "gg(1)").is_none());
        assert!(!path.exists());
    }

    #[test]
    fn test_normalize_location() {
        assert_eq!(
            CallerLabelCache::normalize_location("http://localhost:5173/src/lib/a.ts?t=17:10:5"),
            "/src/lib/a.ts:10:5"
        );
        assert_eq!(
            CallerLabelCache::normalize_location("file:///home/me/app/src/a.ts:3:1"),
            "/home/me/app/src/a.ts:3:1"
        );
        assert_eq!(CallerLabelCache::normalize_location("a.ts"), "a.ts");
    }

    #[test]
    fn test_label_for_memoizes() {
        let cache = CallerLabelCache::new();
        let label = cache.label_for("http://localhost:5173/src/routes/+page.svelte?t=1:4:2", "src");
        assert_eq!(label, "routes/+page.svelte");
        assert_eq!(
            cache.get("http://localhost:5173/src/routes/+page.svelte?t=2:4:2").as_deref(),
            Some("routes/+page.svelte")
        );

        let again = cache.get_or_insert_with("/src/routes/+page.svelte:4:2", |_| "other".to_string());
        assert_eq!(again, "routes/+page.svelte");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_concurrent_writers_agree() {
        let cache = Arc::new(CallerLabelCache::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.label_for("/src/lib/x.ts:1:1", "src"))
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), "lib/x.ts");
        }
        assert_eq!(cache.len(), 1);
    }
}
