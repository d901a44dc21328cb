//! The C++ compile-cache key scheme and the library-detection table
//! (`spec.md` §4.7, §6 "Library detection table", §9 "Compilation cache
//! invalidation"). Neither of these touches a compiler or a dynamic
//! loader — that is `naab-exec-cpp`'s job — so they live here, the same
//! way `naab-core`'s `exec.rs` draws the line between "what the core
//! decides" and "what an executor does with it".

use sha2::{Digest, Sha256};

/// An include/import pattern to a list of linker flags it implies.
/// `spec.md` §6: "a configuration input, not code"; entries are additive,
/// so the default table below is only a starting point a driver can
/// extend via [`LibraryDetectionTable::with_entry`].
#[derive(Debug, Clone)]
pub struct LibraryDetectionTable {
    entries: Vec<(String, Vec<String>)>,
}

impl Default for LibraryDetectionTable {
    fn default() -> Self {
        Self {
            entries: vec![
                ("llvm/IR/".to_string(), vec!["-lLLVM".to_string()]),
                ("spdlog/".to_string(), vec!["-lspdlog".to_string()]),
                ("curl/curl.h".to_string(), vec!["-lcurl".to_string()]),
                ("zlib.h".to_string(), vec!["-lz".to_string()]),
            ],
        }
    }
}

impl LibraryDetectionTable {
    #[must_use]
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    #[must_use]
    pub fn with_entry(mut self, pattern: impl Into<String>, flags: impl IntoIterator<Item = String>) -> Self {
        self.entries.push((pattern.into(), flags.into_iter().collect()));
        self
    }

    /// Scan `source` for every pattern and union the matching flag sets,
    /// deduplicated but otherwise in table order, per the "entries must be
    /// additive" rule in `spec.md` §6.
    #[must_use]
    pub fn detect_flags(&self, source: &str) -> Vec<String> {
        let mut flags = Vec::new();
        for (pattern, pattern_flags) in &self.entries {
            if source.contains(pattern.as_str()) {
                for flag in pattern_flags {
                    if !flags.contains(flag) {
                        flags.push(flag.clone());
                    }
                }
            }
        }
        flags
    }
}

/// Identifies the host C++ toolchain a cached artifact was built with.
/// `spec.md` §9: "Key includes both the content hash of the source and a
/// toolchain fingerprint (compiler version + libc version + major
/// linker-flag set). Never silently reuse an artifact across toolchain
/// upgrades." Built by `naab-exec-cpp` (which actually invokes the
/// compiler to learn its version) and passed in here as an opaque string.
pub type ToolchainFingerprint = String;

/// `(block-id, content-hash, toolchain-fingerprint)` — the on-disk cache
/// key from `spec.md` §6 "Persisted caches". `Display` renders the
/// filesystem-safe form used as the cached shared object's file stem.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub block_id: String,
    pub content_hash: String,
    pub toolchain_fingerprint: ToolchainFingerprint,
}

impl CacheKey {
    /// `source` and `flags` together determine the content hash; `flags`
    /// is included so a library-detection table change invalidates the
    /// cache the same as a source edit would.
    #[must_use]
    pub fn compute(block_id: &str, source: &str, flags: &[String], toolchain_fingerprint: &ToolchainFingerprint) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        for flag in flags {
            hasher.update(b"\0");
            hasher.update(flag.as_bytes());
        }
        let digest = hasher.finalize();
        let content_hash = digest.iter().map(|b| format!("{b:02x}")).collect::<String>();
        Self {
            block_id: block_id.to_string(),
            content_hash,
            toolchain_fingerprint: toolchain_fingerprint.clone(),
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}-{}", self.block_id, &self.content_hash[..16.min(self.content_hash.len())], self.toolchain_fingerprint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_table_unions_multiple_matches() {
        let table = LibraryDetectionTable::default();
        let source = "#include <spdlog/spdlog.h>\n#include <zlib.h>\n";
        let flags = table.detect_flags(source);
        assert!(flags.contains(&"-lspdlog".to_string()));
        assert!(flags.contains(&"-lz".to_string()));
        assert_eq!(flags.len(), 2);
    }

    #[test]
    fn cache_key_is_stable_across_calls_for_identical_input() {
        let a = CacheKey::compute("BLOCK-CPP-MATH", "int add(int,int);", &[], &"clang-17".to_string());
        let b = CacheKey::compute("BLOCK-CPP-MATH", "int add(int,int);", &[], &"clang-17".to_string());
        assert_eq!(a, b);
    }

    #[test]
    fn cache_key_changes_when_flags_change() {
        let a = CacheKey::compute("BLOCK-CPP-MATH", "src", &[], &"clang-17".to_string());
        let b = CacheKey::compute("BLOCK-CPP-MATH", "src", &["-lz".to_string()], &"clang-17".to_string());
        assert_ne!(a.content_hash, b.content_hash);
    }

    #[test]
    fn cache_key_changes_across_toolchain_upgrades() {
        let a = CacheKey::compute("BLOCK-CPP-MATH", "src", &[], &"clang-17".to_string());
        let b = CacheKey::compute("BLOCK-CPP-MATH", "src", &[], &"clang-18".to_string());
        assert_ne!(a.toolchain_fingerprint, b.toolchain_fingerprint);
    }
}
