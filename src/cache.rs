//! The header cache (spec §4.1): a typed allocator for [`Header`] records.
//!
//! The specification describes a fixed-size slab returning storage only
//! through grace-period-deferred reclamation, so readers that began before a
//! detachment can still finish. This crate gets that property for free from
//! `Arc`: a reader obtains its own clone of a header's `Arc` while holding
//! the short-lived directory-list lock (see `Tree::find_subdir`), so the
//! backing allocation outlives the header's removal from its parent's list
//! for exactly as long as that reader is still using it — no separate
//! epoch/deferred-free queue is needed (see DESIGN.md, Open Questions).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::group::Group;
use crate::header::{DirectoryState, Header, HeaderKind, TableEntry};
use crate::refcount::RefState;

/// Allocates [`Header`] records with counts zeroed and list links empty
/// (spec §4.1).
#[derive(Debug, Default)]
pub struct HeaderCache {
    next_id: AtomicU64,
}

impl HeaderCache {
    pub fn new() -> Self {
        Self { next_id: AtomicU64::new(1) }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Allocate a directory header. `name` is empty for a namespace
    /// correspondent (spec §3, §4.4); the root header also goes through
    /// this path but is given a sentinel, non-empty name so it is never
    /// mistaken for a correspondent.
    pub fn alloc_directory(&self, group: Arc<Group>, name: String) -> Arc<Header> {
        Arc::new(Header {
            id: self.next_id(),
            kind: std::sync::RwLock::new(HeaderKind::Directory(DirectoryState {
                name,
                subdirs: Vec::new(),
                tables: Vec::new(),
                reserved: Default::default(),
            })),
            parent: Mutex::new(None),
            group,
            refs: RefState::new(),
            dirs_created: Mutex::new(0),
        })
    }

    /// Allocate a table header bound to `entries`.
    pub fn alloc_table(&self, group: Arc<Group>, entries: Arc<Vec<TableEntry>>) -> Arc<Header> {
        Arc::new(Header {
            id: self.next_id(),
            kind: std::sync::RwLock::new(HeaderKind::Table(entries)),
            parent: Mutex::new(None),
            group,
            refs: RefState::new(),
            dirs_created: Mutex::new(0),
        })
    }
}
