//! The tree engine (spec §4.3): mkdir-or-reuse insertion, subdir/table
//! lists per header, parent linkage, duplicate detection.

use std::collections::HashSet;
use std::sync::Arc;

use crate::cache::HeaderCache;
use crate::correspondent;
use crate::error::RegisterError;
use crate::group::Group;
use crate::header::{Header, HeaderKind, TableEntry};

/// Owns the root header and the header cache; the entry point registrants
/// and the filesystem adapter both go through.
pub struct Tree {
    pub root: Arc<Header>,
    cache: HeaderCache,
}

impl Tree {
    pub fn new() -> Self {
        let cache = HeaderCache::new();
        let root_group = Group::root();
        // Sentinel non-empty name: the root must never be mistaken for a
        // namespace correspondent (spec §3 "Root header").
        let root = cache.alloc_directory(root_group, "/".to_string());
        Self { root, cache }
    }

    /// register(group, path, table) -> header | null (spec §4.3, §6).
    pub fn register(&self, group: &Arc<Group>, path: &[&str], table: Vec<TableEntry>) -> Result<Arc<Header>, RegisterError> {
        Self::validate_path(path)?;
        Self::validate_table(&table)?;

        // Step 1: pre-allocate N directory headers plus, if the group has
        // correspondents, one spare correspondent header — allocation must
        // not happen under a directory's write lock (spec §4.3, §9).
        let mut prealloc: Vec<Arc<Header>> =
            (0..path.len()).map(|_| self.cache.alloc_directory(group.clone(), String::new())).collect();
        for (i, h) in prealloc.iter().enumerate() {
            Self::rename_directory(h, path[i].to_string());
        }
        let mut spare_correspondent =
            if group.has_correspondents { Some(self.cache.alloc_directory(group.clone(), String::new())) } else { None };

        // Step 2.
        self.root.refs.bump_owner();
        let mut parent = self.root.clone();
        let mut dirs_created = 0usize;
        let mut prealloc = prealloc.drain(..);
        let mut spliced = false;

        let mut i = 0;
        while i < path.len() {
            let name = path[i];
            match Self::find_subdir(&parent, name) {
                Some(existing) => {
                    if existing.refs.is_unregistering() {
                        self.rollback(&parent);
                        return Err(RegisterError::Concurrent);
                    }
                    existing.refs.bump_owner();
                    parent = existing;
                    i += 1;
                }
                None if group.has_correspondents && !spliced => {
                    let spare = spare_correspondent.take().expect("spare correspondent pre-allocated");
                    let corr = match correspondent::find_or_create(group, &parent, spare) {
                        Some(c) => c,
                        None => {
                            self.rollback(&parent);
                            return Err(RegisterError::Concurrent);
                        }
                    };
                    parent = corr;
                    spliced = true;
                    // restart at this i against the correspondent's subdir list
                }
                None => {
                    let new_dir = prealloc.next().expect("pre-allocated enough headers");
                    Self::attach_new_directory(&parent, new_dir.clone())?;
                    parent = new_dir;
                    dirs_created += 1;
                    i += 1;
                }
            }
        }

        // Step 4: allocate the table header and attach it under `parent`,
        // after passing duplicate detection.
        let entries = Arc::new(table);
        let table_header = self.cache.alloc_table(group.clone(), entries.clone());
        *table_header.dirs_created.lock().unwrap() = dirs_created;

        if let Err(e) = Self::attach_table(&parent, table_header.clone(), &entries) {
            self.rollback(&parent);
            return Err(e);
        }

        // Step 5: free unused pre-allocations (drop is automatic — the
        // iterator and the unused spare correspondent go out of scope here).
        drop(prealloc);
        drop(spare_correspondent);

        Ok(table_header)
    }

    /// register-dir(group, path): create intermediate directories only,
    /// with no table attached (spec §6).
    pub fn register_dir(&self, group: &Arc<Group>, path: &[&str]) -> Result<Arc<Header>, RegisterError> {
        self.register(group, path, Vec::new()).map_err(|e| e)?;
        // register() always creates (or reuses) the final directory as
        // `parent` before attaching an (empty) table; hand back that
        // directory itself rather than the now-empty table header by
        // walking straight to it instead of re-deriving a table header.
        //
        // We re-walk here rather than threading extra state through
        // `register` because register-dir is a rarely used convenience
        // entry point (spec §6), not a hot path.
        let mut current = self.root.clone();
        for name in path {
            current = Self::find_subdir(&current, name).ok_or(RegisterError::Allocation)?;
        }
        Ok(current)
    }

    /// unregister(header) (spec §4.3).
    pub fn unregister(&self, header: Arc<Header>) {
        let mut current = header;
        loop {
            let parent = match current.parent() {
                Some(p) => p,
                None => break, // reached the root
            };

            if current.refs.owner_count() > 1 {
                current.refs.drop_owner();
                current = parent;
                continue;
            }

            current.refs.begin_unregister();

            if current.is_correspondent() {
                current.group.correspondents.lock().unwrap().retain(|h| !Arc::ptr_eq(h, &current));
                Self::unreserve(&parent, &current);
            } else {
                Self::detach_from_parent(&parent, &current);
            }

            let reclaimable = current.refs.drop_owner();
            if reclaimable {
                tracing::debug!(header = current.id, "header storage reclaimable");
            }
            current = parent;
        }
    }

    // ---- internal helpers -------------------------------------------------

    fn validate_path(path: &[&str]) -> Result<(), RegisterError> {
        for (i, frag) in path.iter().enumerate() {
            if frag.is_empty() || frag.contains('/') {
                return Err(RegisterError::EmptyPathFragment(i));
            }
        }
        Ok(())
    }

    fn validate_table(table: &[TableEntry]) -> Result<(), RegisterError> {
        let mut seen = HashSet::new();
        for entry in table {
            if entry.procname.is_empty() || entry.procname.contains('/') {
                return Err(RegisterError::EmptyPathFragment(0));
            }
            if entry.mode > 0o777 {
                return Err(RegisterError::ModeOutOfRange(entry.procname.clone()));
            }
            if !seen.insert(entry.procname.clone()) {
                return Err(RegisterError::DuplicateInTable(entry.procname.clone()));
            }
        }
        Ok(())
    }

    fn rename_directory(header: &Arc<Header>, name: String) {
        if let HeaderKind::Directory(d) = &mut *header.kind.write().unwrap() {
            d.name = name;
        }
    }

    fn find_subdir(parent: &Arc<Header>, name: &str) -> Option<Arc<Header>> {
        match &*parent.kind.read().unwrap() {
            HeaderKind::Directory(d) => d.subdirs.iter().find(|h| h.directory_name().as_deref() == Some(name)).cloned(),
            HeaderKind::Table(_) => None,
        }
    }

    fn table_has_procname(header: &Arc<Header>, name: &str) -> bool {
        match &*header.kind.read().unwrap() {
            HeaderKind::Table(entries) => entries.iter().any(|e| e.procname == name),
            HeaderKind::Directory(_) => false,
        }
    }

    /// Attach a brand-new directory header as a child of `parent`:
    /// duplicate detection, parent linkage, and reserved-name collision
    /// check against any namespace correspondent `parent` already has
    /// (spec §4.4 "Rule enforced at registration").
    fn attach_new_directory(parent: &Arc<Header>, child: Arc<Header>) -> Result<(), RegisterError> {
        // `child` was just allocated with owner=1 (spec §3 Lifecycles
        // "Header born... counts initialised to owner=1") — that already
        // counts as this registrant's ownership, so attaching it does not
        // bump owner-refs again.
        let name = child.directory_name().unwrap_or_default();
        *child.parent.lock().unwrap() = Some(Arc::downgrade(parent));

        let mut guard = parent.kind.write().unwrap();
        match &mut *guard {
            HeaderKind::Directory(d) => {
                if d.reserved.contains(&name) {
                    return Err(RegisterError::CorrespondentNameCollision(name));
                }
                if d.subdirs.iter().any(|h| h.directory_name().as_deref() == Some(name.as_str())) {
                    return Err(RegisterError::DuplicateName(name));
                }
                drop(guard);
                if d_has_table_procname(parent, &name) {
                    return Err(RegisterError::DuplicateName(name));
                }
                if let HeaderKind::Directory(d) = &mut *parent.kind.write().unwrap() {
                    d.subdirs.push(child);
                }
                // If `parent` is itself a namespace correspondent, this
                // child's name must be reserved against the shared
                // directory it overlays too (spec §4.4 invariant 7).
                if parent.is_correspondent() {
                    if let Some(shared) = parent.parent() {
                        Self::reserve(&shared, &name);
                    }
                }
                Ok(())
            }
            HeaderKind::Table(_) => Err(RegisterError::DuplicateName(name)),
        }
    }

    /// Attach a table header under `parent`, checking every entry's
    /// procname against `parent`'s subdirectory names, its already-attached
    /// table entries, and its reserved correspondent names (spec §4.3
    /// invariant 2, §4.4 invariant 7).
    fn attach_table(parent: &Arc<Header>, table_header: Arc<Header>, entries: &[TableEntry]) -> Result<(), RegisterError> {
        *table_header.parent.lock().unwrap() = Some(Arc::downgrade(parent));

        {
            let guard = parent.kind.read().unwrap();
            let d = match &*guard {
                HeaderKind::Directory(d) => d,
                HeaderKind::Table(_) => return Err(RegisterError::DuplicateName("parent is not a directory".into())),
            };
            for entry in entries {
                if d.reserved.contains(&entry.procname) {
                    return Err(RegisterError::CorrespondentNameCollision(entry.procname.clone()));
                }
                if d.subdirs.iter().any(|h| h.directory_name().as_deref() == Some(entry.procname.as_str())) {
                    return Err(RegisterError::DuplicateName(entry.procname.clone()));
                }
            }
            for existing in &d.tables {
                for entry in entries {
                    if Self::table_has_procname(existing, &entry.procname) {
                        return Err(RegisterError::DuplicateName(entry.procname.clone()));
                    }
                }
            }
        }

        if parent.is_correspondent() {
            if let Some(shared) = parent.parent() {
                for entry in entries {
                    Self::reserve(&shared, &entry.procname);
                }
            }
        }

        if let HeaderKind::Directory(d) = &mut *parent.kind.write().unwrap() {
            d.tables.push(table_header);
        }
        Ok(())
    }

    fn reserve(shared: &Arc<Header>, name: &str) {
        if let HeaderKind::Directory(d) = &mut *shared.kind.write().unwrap() {
            d.reserved.insert(name.to_string());
        }
    }

    fn unreserve(shared: &Arc<Header>, correspondent: &Arc<Header>) {
        let names: Vec<String> = match &*correspondent.kind.read().unwrap() {
            HeaderKind::Directory(d) => {
                d.subdirs.iter().filter_map(|h| h.directory_name()).chain(d.tables.iter().flat_map(|t| match &*t.kind.read().unwrap() {
                    HeaderKind::Table(entries) => entries.iter().map(|e| e.procname.clone()).collect::<Vec<_>>(),
                    HeaderKind::Directory(_) => Vec::new(),
                })).collect()
            }
            HeaderKind::Table(_) => Vec::new(),
        };
        if let HeaderKind::Directory(d) = &mut *shared.kind.write().unwrap() {
            for name in names {
                d.reserved.remove(&name);
            }
        }
    }

    fn detach_from_parent(parent: &Arc<Header>, child: &Arc<Header>) {
        if let HeaderKind::Directory(d) = &mut *parent.kind.write().unwrap() {
            d.subdirs.retain(|h| !Arc::ptr_eq(h, child));
            d.tables.retain(|h| !Arc::ptr_eq(h, child));
        }
    }

    /// Roll back a failed registration attempt (spec §7 "partially created
    /// directory headers are rolled back through unregister"). `deepest`
    /// is the last directory header the walk reached before failing; this
    /// unwinds every owner-ref bump made along the way (dropping and
    /// detaching any directory this registrant alone created) and finally
    /// releases the root's owner-ref bumped at the start of `register`.
    fn rollback(&self, deepest: &Arc<Header>) {
        if !Arc::ptr_eq(deepest, &self.root) {
            self.unregister(deepest.clone());
        }
        self.root.refs.drop_owner();
    }
}

fn d_has_table_procname(parent: &Arc<Header>, name: &str) -> bool {
    match &*parent.kind.read().unwrap() {
        HeaderKind::Directory(d) => d.tables.iter().any(|t| Tree::table_has_procname(t, name)),
        HeaderKind::Table(_) => false,
    }
}

impl Default for Tree {
    fn default() -> Self {
        Self::new()
    }
}
