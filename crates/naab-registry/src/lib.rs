//! The content-addressed block registry and loader support (`spec.md`
//! §4.6, §6, §9), split out from `naab-core` the way the teacher splits
//! its engine crate from its own satellite tooling: the interpreter only
//! ever sees the [`naab_core::BlockStore`]/[`naab_core::Executor`] traits,
//! never this crate's concrete types, by depending the other direction
//! (this crate depends on `naab-core`, not vice versa).
//!
//! - [`InMemoryBlockStore`] — the one concrete [`naab_core::BlockStore`]
//!   every embedding and test in this workspace can share.
//! - [`LibraryDetectionTable`] / [`CacheKey`] — the data `naab-exec-cpp`
//!   needs to decide what to link and whether a compiled artifact can be
//!   reused, without this crate ever invoking a compiler itself.
//! - [`LoadLocks`] — the per-block-id serialization the spec's resource
//!   policy requires during first-load compilation.

mod cache;
mod loader;
pub mod persist;
mod store;

pub use cache::{CacheKey, LibraryDetectionTable, ToolchainFingerprint};
pub use loader::LoadLocks;
pub use store::InMemoryBlockStore;
