//! Canonical cache key construction.
//!
//! A key is `prefix:paramHash` where the prefix comes from the namespace and
//! the hash is the SHA-256 of the canonical JSON encoding of the typed
//! parameters. Canonicalization sorts object keys recursively, so two
//! logically identical parameter sets always map to the same key no matter
//! how they were constructed.

use kadra_core::{CacheParams, CacheResult, Namespace, StoreError};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Number of hex characters of the parameter hash kept in the key.
///
/// 16 hex chars = 64 bits, far beyond collision range for the handful of
/// distinct parameter sets a namespace sees, while keeping keys readable
/// in backend tooling.
const HASH_LEN: usize = 16;

/// A fully-built cache key.
///
/// Keys can only be built from typed parameters; there is no constructor
/// taking a request object. Rate limit counters live outside the namespace
/// scheme and use their own `ratelimit:` prefix directly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    namespace: Namespace,
    key: String,
}

impl CacheKey {
    /// Build the key for a typed parameter struct.
    pub fn for_params<P: CacheParams>(params: &P) -> CacheResult<Self> {
        let value = serde_json::to_value(params).map_err(StoreError::serialization)?;
        let canonical = canonical_json(&value);

        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        let digest = hex::encode(hasher.finalize());

        Ok(Self {
            namespace: P::NAMESPACE,
            key: format!("{}:{}", P::NAMESPACE.prefix(), &digest[..HASH_LEN]),
        })
    }

    /// The namespace this key belongs to.
    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    /// The backend key string.
    pub fn as_str(&self) -> &str {
        &self.key
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.key)
    }
}

/// Render a JSON value canonically: object keys sorted recursively, no
/// whitespace. Scalar formatting follows `serde_json`'s `Display`.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by_key(|(k, _)| k.as_str());
            out.push('{');
            for (i, (k, v)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*k).clone()).to_string());
                out.push(':');
                write_canonical(v, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
