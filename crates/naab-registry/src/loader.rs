//! The per-block load lock (`spec.md` §5: "Block-loader operations acquire
//! a per-block lock during first-load compilation to prevent duplicate
//! work") and the "idempotent load" property from `spec.md` §8: two
//! concurrent `use` statements for the same block compile or evaluate it
//! at most once.
//!
//! The interpreter itself is single-threaded (`spec.md` §5), so nothing
//! inside `naab-core` needs this; it protects the *process-global* compiled-
//! object cache `spec.md` also describes, against a driver that runs more
//! than one interpreter instance in the same process.

use ahash::AHashMap;
use parking_lot::Mutex;
use std::sync::Arc;

/// A registry of one lock per block id, lazily created. Cloning is cheap
/// (wrap in `Arc<LoadLocks>` to share across interpreter instances); the
/// struct itself only owns the bookkeeping map, never the thing being
/// protected.
#[derive(Default)]
pub struct LoadLocks {
    locks: Mutex<AHashMap<String, Arc<Mutex<()>>>>,
}

impl LoadLocks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, block_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        locks.entry(block_id.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// Run `f` (the first-load compile/evaluate step) with this block id's
    /// lock held. A second caller racing on the same id blocks here instead
    /// of redoing the work; a caller for a different id never contends.
    pub fn with_lock<R>(&self, block_id: &str, f: impl FnOnce() -> R) -> R {
        let lock = self.lock_for(block_id);
        let _guard = lock.lock();
        f()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn concurrent_loads_of_the_same_block_serialize() {
        let locks = Arc::new(LoadLocks::new());
        let compiles = Arc::new(AtomicUsize::new(0));
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_in_flight = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = locks.clone();
                let compiles = compiles.clone();
                let in_flight = in_flight.clone();
                let max_in_flight = max_in_flight.clone();
                thread::spawn(move || {
                    locks.with_lock("BLOCK-CPP-MATH", || {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        max_in_flight.fetch_max(now, Ordering::SeqCst);
                        thread::yield_now();
                        compiles.fetch_add(1, Ordering::SeqCst);
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                    });
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(compiles.load(Ordering::SeqCst), 8);
        assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn different_blocks_do_not_contend() {
        let locks = LoadLocks::new();
        let a = locks.lock_for("BLOCK-CPP-A");
        let b = locks.lock_for("BLOCK-CPP-B");
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
