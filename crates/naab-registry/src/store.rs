//! The concrete, in-process [`BlockStore`] (`spec.md` §4.6 "supplemented").
//!
//! `spec.md` leaves the store itself — relational database, file tree, HTTP
//! service — unspecified; this is the one concrete implementation every
//! embedding and every test in this workspace can share, backed by a plain
//! `ahash::HashMap` the way `naab-core`'s own symbol tables are.

use ahash::AHashMap;
use naab_core::{BlockRecord, BlockStore};
use parking_lot::RwLock;

/// An embeddable, in-memory block store. Cheap to clone (an `Arc` around the
/// map would be the natural next step for a driver sharing one store across
/// interpreter instances); kept a plain struct here since nothing in this
/// crate needs that yet.
#[derive(Default)]
pub struct InMemoryBlockStore {
    records: RwLock<AHashMap<String, BlockRecord>>,
}

impl InMemoryBlockStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Populate or replace a record. Re-`use`ing an id whose record changed
    /// invalidates nothing by itself — the loader's compile cache is keyed
    /// on content hash, so a changed source simply misses the old entry.
    pub fn insert(&self, record: BlockRecord) {
        self.records.write().insert(record.id.as_str().to_string(), record);
    }

    pub fn remove(&self, id: &str) -> Option<BlockRecord> {
        self.records.write().remove(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl BlockStore for InMemoryBlockStore {
    fn lookup(&self, id: &str) -> Option<BlockRecord> {
        self.records.read().get(id).cloned()
    }

    fn iterate_all(&self) -> Vec<BlockRecord> {
        self.records.read().values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use naab_core::{Language, ValidationStatus};

    fn record(id: &str) -> BlockRecord {
        BlockRecord {
            id: id.into(),
            name: "add".into(),
            language: Language::Cpp,
            source: "int add(int a, int b) { return a + b; }".to_string(),
            category: "math".to_string(),
            validation_status: ValidationStatus::Unvalidated,
        }
    }

    #[test]
    fn lookup_finds_an_inserted_record() {
        let store = InMemoryBlockStore::new();
        store.insert(record("BLOCK-CPP-MATH"));
        assert!(store.lookup("BLOCK-CPP-MATH").is_some());
        assert!(store.lookup("BLOCK-CPP-OTHER").is_none());
    }

    #[test]
    fn iterate_all_returns_every_record() {
        let store = InMemoryBlockStore::new();
        store.insert(record("BLOCK-CPP-A"));
        store.insert(record("BLOCK-CPP-B"));
        assert_eq!(store.iterate_all().len(), 2);
    }
}
