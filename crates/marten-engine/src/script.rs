//! Compiled scripts, documents and code caching.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rustc_hash::FxHasher;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// How a module's top-level evaluation behaves.
///
/// `Standard` modules evaluate once per document; re-evaluating the same
/// document is an idempotent no-op yielding the undefined value without
/// re-running side effects. `Script` modules re-run on every evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModuleCategory {
    Standard,
    Script,
}

/// What a compile-time code cache carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheKind {
    /// No cache data.
    None,
    /// Parsed-code cache.
    Code,
    /// Code cache with eager full compilation.
    Eager,
}

/// Identity of a script source: its name plus, for modules, the category
/// governing re-evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentInfo {
    pub name: String,
    pub module: Option<ModuleCategory>,
}

impl DocumentInfo {
    pub fn script(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module: None,
        }
    }

    pub fn module(name: impl Into<String>, category: ModuleCategory) -> Self {
        Self {
            name: name.into(),
            module: Some(category),
        }
    }
}

/// A compiled script, reusable across executions on its owning engine.
#[derive(Debug, Clone)]
pub struct CompiledScript {
    pub(crate) engine_id: u64,
    pub(crate) unit: u64,
    document: DocumentInfo,
    source: Arc<str>,
}

impl CompiledScript {
    pub(crate) fn new(engine_id: u64, unit: u64, document: DocumentInfo, source: &str) -> Self {
        Self {
            engine_id,
            unit,
            document,
            source: Arc::from(source),
        }
    }

    pub fn document(&self) -> &DocumentInfo {
        &self.document
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

const CACHE_FORMAT_VERSION: u32 = 1;

/// Serializable code-cache blob. Acceptance is validated against the
/// source it was produced from; a stale or foreign blob is rejected and
/// compilation falls back to the plain path.
#[derive(Debug, Serialize, Deserialize)]
struct CacheBlob {
    format_version: u32,
    kind: CacheKind,
    source_hash: u64,
    source_len: usize,
}

pub(crate) fn source_hash(code: &str) -> u64 {
    let mut hasher = FxHasher::default();
    code.hash(&mut hasher);
    hasher.finish()
}

/// Produces a cache blob for `code`. `CacheKind::None` yields an empty
/// blob.
pub(crate) fn encode_cache(kind: CacheKind, code: &str) -> EngineResult<Vec<u8>> {
    if kind == CacheKind::None {
        return Ok(Vec::new());
    }
    let blob = CacheBlob {
        format_version: CACHE_FORMAT_VERSION,
        kind,
        source_hash: source_hash(code),
        source_len: code.len(),
    };
    serde_json::to_vec(&blob).map_err(|e| EngineError::usage(format!("cache encoding failed: {e}")))
}

/// Whether `bytes` is a cache blob usable for `code` under `kind`.
pub(crate) fn cache_accepted(kind: CacheKind, code: &str, bytes: &[u8]) -> bool {
    if kind == CacheKind::None || bytes.is_empty() {
        return false;
    }
    match serde_json::from_slice::<CacheBlob>(bytes) {
        Ok(blob) => {
            blob.format_version == CACHE_FORMAT_VERSION
                && blob.kind == kind
                && blob.source_hash == source_hash(code)
                && blob.source_len == code.len()
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_roundtrip_accepted() {
        let code = "x = 1;";
        let blob = encode_cache(CacheKind::Code, code).unwrap();
        assert!(cache_accepted(CacheKind::Code, code, &blob));
    }

    #[test]
    fn test_cache_rejected_for_different_source() {
        let blob = encode_cache(CacheKind::Code, "x = 1;").unwrap();
        assert!(!cache_accepted(CacheKind::Code, "x = 2;", &blob));
    }

    #[test]
    fn test_cache_kind_must_match() {
        let blob = encode_cache(CacheKind::Code, "x = 1;").unwrap();
        assert!(!cache_accepted(CacheKind::Eager, "x = 1;", &blob));
    }

    #[test]
    fn test_none_kind_produces_empty_blob() {
        let blob = encode_cache(CacheKind::None, "x = 1;").unwrap();
        assert!(blob.is_empty());
        assert!(!cache_accepted(CacheKind::None, "x = 1;", &blob));
    }
}
