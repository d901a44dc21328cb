//! Host C++ toolchain discovery and invocation (`spec.md` §4.7: "invoke
//! the host C++ toolchain (clang or equivalent) with position-independent-
//! code and shared-library options plus optimization level 2").
//!
//! This core never vendors a compiler (`SPEC_FULL.md` §4.7) — discovery is
//! the same `PATH`-probing every Rust build script does when it shells out
//! to `cc`, just without the `cc` crate's build-script-specific conventions
//! since this runs at interpreter time, not at `naab-exec-cpp`'s own build
//! time.

use anyhow::{bail, Context, Result};
use std::path::Path;
use std::process::Command;

/// A discovered compiler plus the fingerprint used in `CacheKey`s
/// (`spec.md` §9: "compiler version + libc version + major linker-flag
/// set" — libc version folded in via `uname -r`/`ldd --version` is a
/// driver-level refinement; this core captures compiler identity, the
/// dominant source of ABI-relevant drift in a single-host cache).
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub program: String,
    pub fingerprint: String,
}

const CANDIDATES: &[&str] = &["cc", "clang", "g++"];

/// Probe `PATH` for the first working candidate in [`CANDIDATES`], in that
/// priority order, matching `spec.md`'s own ordering ("clang or
/// equivalent").
pub fn discover() -> Result<Toolchain> {
    for program in CANDIDATES {
        if let Ok(output) = Command::new(program).arg("--version").output() {
            if output.status.success() {
                let version_text = String::from_utf8_lossy(&output.stdout);
                let first_line = version_text.lines().next().unwrap_or(program).trim();
                return Ok(Toolchain {
                    program: (*program).to_string(),
                    fingerprint: first_line.to_string(),
                });
            }
        }
    }
    bail!("no usable C++ toolchain found on PATH (tried {})", CANDIDATES.join(", "))
}

/// Compile `source_path` into a position-independent shared object at
/// `output_path` with `flags` from the library-detection table, at `-O2`
/// per `spec.md` §4.7. Returns the toolchain's captured diagnostic text on
/// failure so the caller can surface it verbatim in a `CompileError`.
pub fn compile_shared_object(toolchain: &Toolchain, source_path: &Path, output_path: &Path, flags: &[String]) -> Result<()> {
    let mut cmd = Command::new(&toolchain.program);
    cmd.arg("-shared")
        .arg("-fPIC")
        .arg("-O2")
        .arg("-x")
        .arg("c++")
        .arg(source_path)
        .arg("-o")
        .arg(output_path)
        .args(flags);

    let output = cmd.output().with_context(|| format!("invoking {}", toolchain.program))?;
    if !output.status.success() {
        bail!("{}", String::from_utf8_lossy(&output.stderr));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_order_prefers_cc_then_clang_then_gpp() {
        assert_eq!(CANDIDATES, &["cc", "clang", "g++"]);
    }
}
