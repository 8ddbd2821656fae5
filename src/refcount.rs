//! The reference engine (spec §4.2): the three-counter discipline plus the
//! unregistration barrier.
//!
//! All counter and `unregistering` mutations are serialised by a single
//! lock, held only for short O(1) regions — the spec's "reference-engine
//! lock" is a spinlock in the source this was distilled from; we stand in
//! with [`std::sync::Mutex`] since this crate targets preemptible OS
//! threads rather than a non-preemptible kernel context (see DESIGN.md).

use std::sync::{Condvar, Mutex};

/// State of the `unregistering` slot (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnregisterSlot {
    /// No unregistration in progress.
    None,
    /// An unregistration is blocked on the barrier, waiting for use-refs to drain.
    Waiting,
    /// Unregistration has been committed; no further `acquire_use` will succeed.
    Sentinel,
}

#[derive(Debug)]
struct Counters {
    owner: usize,
    use_refs: usize,
    fs_refs: usize,
    unregister: UnregisterSlot,
}

/// The per-header reference state: owner-refs, use-refs, fs-refs and the
/// unregistration barrier (spec §3 "Every header carries... three reference
/// counts... an unregistering signal slot").
#[derive(Debug)]
pub struct RefState {
    counters: Mutex<Counters>,
    barrier: Condvar,
}

impl RefState {
    /// A freshly registered header: owner=1, use=0, fs=0 (spec §3 Lifecycles).
    pub fn new() -> Self {
        Self {
            counters: Mutex::new(Counters { owner: 1, use_refs: 0, fs_refs: 0, unregister: UnregisterSlot::None }),
            barrier: Condvar::new(),
        }
    }

    /// acquire-use(h): if unregistering, return false; else bump use-refs.
    pub fn acquire_use(&self) -> bool {
        let mut c = self.counters.lock().unwrap();
        if c.unregister != UnregisterSlot::None {
            return false;
        }
        c.use_refs += 1;
        true
    }

    /// release-use(h): drop use-refs; wake a blocked `begin_unregister` if
    /// it reaches zero while unregistering is pending.
    pub fn release_use(&self) {
        let mut c = self.counters.lock().unwrap();
        debug_assert!(c.use_refs > 0, "release_use without a matching acquire_use");
        c.use_refs -= 1;
        if c.use_refs == 0 && c.unregister == UnregisterSlot::Waiting {
            self.barrier.notify_all();
        }
    }

    /// acquire-fs(h): bump fs-refs. Overflow is a programming error — it
    /// panics in debug builds and is refused (with a log) in release builds.
    pub fn acquire_fs(&self) -> bool {
        let mut c = self.counters.lock().unwrap();
        if c.fs_refs == usize::MAX {
            if cfg!(debug_assertions) {
                panic!("fs-refs overflow");
            }
            tracing::error!("fs-refs overflow refused");
            return false;
        }
        c.fs_refs += 1;
        true
    }

    /// release-fs(h): drop fs-refs. Returns true if storage is now
    /// reclaimable (both owner-refs and fs-refs are zero).
    pub fn release_fs(&self) -> bool {
        let mut c = self.counters.lock().unwrap();
        debug_assert!(c.fs_refs > 0, "release_fs without a matching acquire_fs");
        c.fs_refs -= 1;
        c.fs_refs == 0 && c.owner == 0
    }

    /// bump-owner(h): one more logical owner of this header.
    pub fn bump_owner(&self) {
        let mut c = self.counters.lock().unwrap();
        c.owner += 1;
    }

    /// Drop one logical owner. Returns true if storage is now reclaimable.
    pub fn drop_owner(&self) -> bool {
        let mut c = self.counters.lock().unwrap();
        debug_assert!(c.owner > 0, "drop_owner without a matching owner");
        c.owner -= 1;
        c.owner == 0 && c.fs_refs == 0
    }

    /// Current owner-ref count (used by tests and by the tree engine to
    /// decide whether it is the sole owner of a directory on the unregister walk).
    pub fn owner_count(&self) -> usize {
        self.counters.lock().unwrap().owner
    }

    /// begin-unregister(h): block the caller until use-refs drains to zero,
    /// then commit `unregistering = Sentinel` so no further use-ref can be
    /// acquired.
    pub fn begin_unregister(&self) {
        let mut c = self.counters.lock().unwrap();
        if c.use_refs == 0 {
            c.unregister = UnregisterSlot::Sentinel;
            return;
        }
        c.unregister = UnregisterSlot::Waiting;
        while c.use_refs != 0 {
            c = self.barrier.wait(c).unwrap();
        }
        c.unregister = UnregisterSlot::Sentinel;
    }

    /// Whether this header has begun (or completed) unregistration.
    pub fn is_unregistering(&self) -> bool {
        self.counters.lock().unwrap().unregister != UnregisterSlot::None
    }
}

impl Default for RefState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn acquire_use_fails_once_unregistering() {
        let r = RefState::new();
        assert!(r.acquire_use());
        r.release_use();
        r.begin_unregister();
        assert!(!r.acquire_use());
    }

    #[test]
    fn begin_unregister_blocks_until_drained() {
        let r = Arc::new(RefState::new());
        assert!(r.acquire_use());

        let r2 = r.clone();
        let handle = thread::spawn(move || {
            r2.begin_unregister();
        });

        thread::sleep(Duration::from_millis(50));
        assert!(r.is_unregistering());
        r.release_use();
        handle.join().unwrap();
        assert!(!r.acquire_use());
    }

    #[test]
    fn fs_and_owner_refs_gate_reclamation() {
        let r = RefState::new();
        assert!(r.acquire_fs());
        assert!(!r.drop_owner());
        assert!(r.release_fs());
    }
}
