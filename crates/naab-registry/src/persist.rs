//! The on-disk side of the compile cache (`spec.md` §6 "Persisted caches"):
//! one shared object per [`CacheKey`], plus a sidecar file recording the
//! source and flags it was built from so a cache directory can be audited
//! or pruned without re-deriving the hash.
//!
//! This is "registry I/O glue" in the sense `SPEC_FULL.md` §2.1 uses the
//! phrase: plumbing that never becomes a user-facing NAAb error by itself
//! (a cache miss just means "compile it"), so it reports failures as
//! `anyhow::Error` rather than `naab_core::Error`. `naab-exec-cpp` is the
//! only caller that turns a genuine failure here (e.g. a read-only cache
//! directory) into a `CompileError` the running program can catch.

use crate::cache::CacheKey;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const SIDECAR_EXTENSION: &str = "naab-cache.json";

/// What a sidecar file actually holds. `naab-core`'s own `Value`/`BlockId`
/// use `serde` the same way, behind its `serde` feature — this is the
/// "richer config/record shape" that feature exists for.
#[derive(Debug, Serialize, Deserialize)]
struct SidecarRecord {
    source: String,
    flags: Vec<String>,
}

/// Where the compiled shared object for `key` would live, whether or not
/// it has been built yet. Extension is platform-specific to keep
/// `dlopen`/`LoadLibrary` happy on the host.
#[must_use]
pub fn object_path(cache_dir: &Path, key: &CacheKey) -> PathBuf {
    let ext = if cfg!(target_os = "macos") {
        "dylib"
    } else if cfg!(target_os = "windows") {
        "dll"
    } else {
        "so"
    };
    cache_dir.join(format!("{key}.{ext}"))
}

#[must_use]
fn sidecar_path(cache_dir: &Path, key: &CacheKey) -> PathBuf {
    cache_dir.join(format!("{key}.{SIDECAR_EXTENSION}"))
}

/// `true` when both the shared object and its sidecar already exist —
/// `naab-exec-cpp` treats this as "no toolchain invocation needed"
/// (`spec.md` §8 scenario 4: "does not invoke the C++ toolchain").
#[must_use]
pub fn is_cached(cache_dir: &Path, key: &CacheKey) -> bool {
    object_path(cache_dir, key).is_file() && sidecar_path(cache_dir, key).is_file()
}

/// Record the source and flags a freshly compiled object was built from.
/// Called once, immediately after a successful compile.
pub fn write_sidecar(cache_dir: &Path, key: &CacheKey, source: &str, flags: &[String]) -> Result<()> {
    std::fs::create_dir_all(cache_dir).with_context(|| format!("creating cache directory {}", cache_dir.display()))?;
    let record = SidecarRecord { source: source.to_string(), flags: flags.to_vec() };
    let body = serde_json::to_string(&record).context("serializing sidecar record")?;
    std::fs::write(sidecar_path(cache_dir, key), body)
        .with_context(|| format!("writing sidecar for {key}"))
}

/// Recover `(source, flags)` from a previously written sidecar, for cache
/// auditing/pruning tools; the hot load path never needs this since the
/// `CacheKey` itself already encodes a hash of the same source and flags.
pub fn read_sidecar(cache_dir: &Path, key: &CacheKey) -> Result<Option<(String, Vec<String>)>> {
    let path = sidecar_path(cache_dir, key);
    if !path.is_file() {
        return Ok(None);
    }
    let body = std::fs::read_to_string(&path).with_context(|| format!("reading sidecar at {}", path.display()))?;
    let record: SidecarRecord = serde_json::from_str(&body).with_context(|| format!("parsing sidecar at {}", path.display()))?;
    Ok(Some((record.source, record.flags)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_source_and_flags_through_a_sidecar() {
        let dir = std::env::temp_dir().join(format!("naab-registry-test-{}", std::process::id()));
        let key = CacheKey::compute("BLOCK-CPP-MATH", "int add(int a,int b){return a+b;}", &["-lz".to_string()], &"clang-17".to_string());

        write_sidecar(&dir, &key, "int add(int a,int b){return a+b;}", &["-lz".to_string()]).unwrap();
        let (source, flags) = read_sidecar(&dir, &key).unwrap().unwrap();

        assert_eq!(source, "int add(int a,int b){return a+b;}");
        assert_eq!(flags, vec!["-lz".to_string()]);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn is_cached_is_false_until_both_files_exist() {
        let dir = std::env::temp_dir().join(format!("naab-registry-test-empty-{}", std::process::id()));
        let key = CacheKey::compute("BLOCK-CPP-MATH", "src", &[], &"clang-17".to_string());
        assert!(!is_cached(&dir, &key));
    }
}
