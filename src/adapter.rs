//! The filesystem adapter (spec §4.5): lookup / readdir / read / write /
//! permission dispatch against the tree, honouring the reference engine's
//! contracts. Mirrors the host-VFS trait boundary this crate's teacher uses
//! for its own protocol surface — a thin async trait wrapping a synchronous,
//! thread-oriented core (see DESIGN.md: the tree/reference engines model
//! preemptible kernel threads, not async tasks, so the boundary sits here
//! rather than inside the engines themselves).

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::{SysctlError, SysctlResult};
use crate::group::Group;
use crate::handlers;
use crate::header::{Header, HeaderKind, TableEntry};
use crate::tree::Tree;

/// An opaque identity the host filesystem binds to a `(header, entry)` pair
/// (spec §4.5 "allocate an inode bound to (header, table-entry-or-null)").
///
/// `group` is the namespace the inode is being viewed *through* — fixed for
/// the whole walk from a mount's root, not the group that originally
/// registered `header`. It is what `find correspondent` and permission
/// masking (spec §3 "Group") must use: a caller in namespace NS sees NS's
/// correspondents and NS's effective permissions over a shared header, not
/// whatever group happened to create that header.
#[derive(Clone)]
pub struct Ino {
    pub header: Arc<Header>,
    pub group: Arc<Group>,
    pub entry: Option<TableEntry>,
}

impl Ino {
    fn directory(header: Arc<Header>, group: Arc<Group>) -> Self {
        Self { header, group, entry: None }
    }

    fn table_entry(header: Arc<Header>, group: Arc<Group>, entry: TableEntry) -> Self {
        Self { header, group, entry: Some(entry) }
    }

    pub fn is_directory(&self) -> bool {
        self.entry.is_none()
    }
}

/// One emitted readdir entry (spec §4.5 "emit directory-name" / "emit procname").
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: String,
    pub is_directory: bool,
}

/// The host-facing filesystem boundary. Async so it can sit behind a real
/// VFS dispatch loop; internally every call acquires a use-ref, does its
/// work under reader protection, and releases it before returning.
#[async_trait]
pub trait FsAdapter: Sync + Send {
    async fn lookup(&self, parent: &Ino, name: &str) -> SysctlResult<Ino>;
    async fn readdir(&self, dir: &Ino, cursor: usize) -> SysctlResult<(Vec<DirEntry>, usize)>;
    async fn read(&self, ino: &Ino, offset: usize, len: usize) -> SysctlResult<Vec<u8>>;
    async fn write(&self, ino: &Ino, offset: usize, payload: &[u8]) -> SysctlResult<usize>;
    async fn permission(&self, ino: &Ino, write: bool, exec: bool) -> SysctlResult<()>;
    /// Whether a cached dentry bound to `ino` is still valid (spec §4.5
    /// "Dentry revalidation": valid only if the bound header is not
    /// unregistering; negative dentries are never cached so there is no
    /// corresponding "revalidate a miss" case here).
    async fn revalidate(&self, ino: &Ino) -> bool;
}

/// The concrete [`FsAdapter`] backed by a [`Tree`].
pub struct SysctlFs {
    tree: Arc<Tree>,
}

impl SysctlFs {
    pub fn new(tree: Arc<Tree>) -> Self {
        Self { tree }
    }

    /// The root inode as seen from `group`'s namespace.
    pub fn root_ino(&self, group: Arc<Group>) -> Ino {
        Ino::directory(self.tree.root.clone(), group)
    }

    fn find_in_directory(header: &Arc<Header>, group: &Arc<Group>, name: &str) -> Option<Ino> {
        let guard = header.kind.read().unwrap();
        let HeaderKind::Directory(d) = &*guard else { return None };
        if let Some(sub) = d.subdirs.iter().find(|h| h.directory_name().as_deref() == Some(name)) {
            return Some(Ino::directory(sub.clone(), group.clone()));
        }
        for table in &d.tables {
            if let Some(entries) = table.table_entries() {
                if let Some(entry) = entries.iter().find(|e| e.procname == name) {
                    return Some(Ino::table_entry(table.clone(), group.clone(), entry.clone()));
                }
            }
        }
        None
    }

    fn list_directory(header: &Arc<Header>) -> Vec<DirEntry> {
        let guard = header.kind.read().unwrap();
        let HeaderKind::Directory(d) = &*guard else { return Vec::new() };
        let mut out = Vec::new();
        for sub in &d.subdirs {
            if let Some(name) = sub.directory_name() {
                out.push(DirEntry { name, is_directory: true });
            }
        }
        for table in &d.tables {
            if let Some(entries) = table.table_entries() {
                for entry in entries.iter() {
                    out.push(DirEntry { name: entry.procname.clone(), is_directory: false });
                }
            }
        }
        out
    }
}

#[async_trait]
impl FsAdapter for SysctlFs {
    async fn lookup(&self, parent: &Ino, name: &str) -> SysctlResult<Ino> {
        if !parent.group.is_seen() {
            return Err(SysctlError::NoEnt);
        }
        if !parent.header.refs.acquire_use() {
            return Err(SysctlError::NoEnt);
        }

        let found = Self::find_in_directory(&parent.header, &parent.group, name).or_else(|| {
            crate::correspondent::find_correspondent(&parent.group, &parent.header)
                .and_then(|corr| Self::find_in_directory(&corr, &parent.group, name))
        });

        parent.header.refs.release_use();

        match found {
            Some(ino) => {
                ino.header.refs.acquire_fs();
                Ok(ino)
            }
            None => Err(SysctlError::NoEnt),
        }
    }

    async fn readdir(&self, dir: &Ino, cursor: usize) -> SysctlResult<(Vec<DirEntry>, usize)> {
        if !dir.group.is_seen() {
            return Err(SysctlError::NoEnt);
        }
        if !dir.header.refs.acquire_use() {
            return Err(SysctlError::NoEnt);
        }

        let mut all = Self::list_directory(&dir.header);
        if let Some(corr) = crate::correspondent::find_correspondent(&dir.group, &dir.header) {
            all.extend(Self::list_directory(&corr));
        }

        dir.header.refs.release_use();

        // `.` and `..` occupy cursor positions 0 and 1; subdir/table
        // enumeration starts at position 2 (spec §4.5).
        let next_cursor = all.len() + 2;
        let mut page = Vec::new();
        if cursor == 0 {
            page.push(DirEntry { name: ".".to_string(), is_directory: true });
        }
        if cursor <= 1 {
            page.push(DirEntry { name: "..".to_string(), is_directory: true });
        }
        page.extend(all.into_iter().skip(cursor.saturating_sub(2)));
        Ok((page, next_cursor))
    }

    async fn read(&self, ino: &Ino, offset: usize, len: usize) -> SysctlResult<Vec<u8>> {
        if !ino.header.refs.acquire_use() {
            return Err(SysctlError::NoEnt);
        }
        if let Err(e) = self.permission(ino, false, false).await {
            ino.header.refs.release_use();
            return Err(e);
        }
        let entry = ino.entry.as_ref().ok_or(SysctlError::Access);
        let result = match entry {
            Ok(entry) => handlers::read(entry, offset, len),
            Err(e) => Err(*e),
        };
        ino.header.refs.release_use();
        result
    }

    async fn write(&self, ino: &Ino, offset: usize, payload: &[u8]) -> SysctlResult<usize> {
        if !ino.header.refs.acquire_use() {
            return Err(SysctlError::NoEnt);
        }
        if let Err(e) = self.permission(ino, true, false).await {
            ino.header.refs.release_use();
            return Err(e);
        }
        let entry = ino.entry.as_ref().ok_or(SysctlError::Access);
        let result = match entry {
            Ok(entry) => handlers::write(entry, offset, payload),
            Err(e) => Err(*e),
        };
        ino.header.refs.release_use();
        result
    }

    async fn permission(&self, ino: &Ino, write: bool, exec: bool) -> SysctlResult<()> {
        match &ino.entry {
            None => {
                if write {
                    return Err(SysctlError::Access);
                }
                Ok(())
            }
            Some(entry) => {
                if exec {
                    return Err(SysctlError::Access);
                }
                let mode = ino.group.effective_mode(entry);
                let required = if write { 0o200 } else { 0o400 };
                if mode & required == 0 {
                    return Err(SysctlError::Perm);
                }
                Ok(())
            }
        }
    }

    async fn revalidate(&self, ino: &Ino) -> bool {
        ino.group.is_seen() && !ino.header.refs.is_unregistering()
    }
}

/// register(group, path, table) -> header | null (spec §6 "Registration surface").
pub fn register(tree: &Tree, group: &Arc<Group>, path: &[&str], table: Vec<TableEntry>) -> SysctlResult<Arc<Header>> {
    tree.register(group, path, table).map_err(|e| {
        tracing::warn!(error = %e, "registration rejected");
        SysctlError::Inval
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{Datum, Extra, Handler, TableEntry};

    fn sample_entry(name: &str) -> TableEntry {
        TableEntry::new(name, 8, 0o644, Handler::IntVec, Extra::none(), Datum::Ints(vec![0]))
    }

    #[tokio::test]
    async fn unseen_group_resolves_nothing() {
        use std::sync::Mutex;

        let tree = Arc::new(Tree::new());
        let group = Group::root();
        tree.register(&group, &["kernel"], vec![sample_entry("pid_max")]).unwrap();

        let unseen_group = Arc::new(Group {
            name: "unseen".to_string(),
            permissions: None,
            is_seen: Some(Arc::new(|| false)),
            has_correspondents: false,
            correspondents: Mutex::new(Vec::new()),
        });

        let fs = SysctlFs::new(tree);
        let root = fs.root_ino(unseen_group);
        assert_eq!(fs.lookup(&root, "kernel").await, Err(SysctlError::NoEnt));
        assert_eq!(fs.readdir(&root, 0).await.err(), Some(SysctlError::NoEnt));
    }

    #[tokio::test]
    async fn lookup_resolves_registered_entry() {
        let tree = Arc::new(Tree::new());
        let group = Group::root();
        tree.register(&group, &["kernel"], vec![sample_entry("pid_max")]).unwrap();

        let fs = SysctlFs::new(tree);
        let root = fs.root_ino(group.clone());
        let kernel = fs.lookup(&root, "kernel").await.unwrap();
        assert!(kernel.is_directory());
        let pid_max = fs.lookup(&kernel, "pid_max").await.unwrap();
        assert!(!pid_max.is_directory());
    }

    #[tokio::test]
    async fn lookup_missing_name_is_noent() {
        let tree = Arc::new(Tree::new());
        let fs = SysctlFs::new(tree);
        let root = fs.root_ino(Group::root());
        assert_eq!(fs.lookup(&root, "nope").await, Err(SysctlError::NoEnt));
    }

    #[tokio::test]
    async fn write_to_read_only_entry_is_denied() {
        let tree = Arc::new(Tree::new());
        let group = Group::root();
        let entry = TableEntry::new("ro", 8, 0o444, Handler::IntVec, Extra::none(), Datum::Ints(vec![0]));
        tree.register(&group, &["kernel"], vec![entry]).unwrap();

        let fs = SysctlFs::new(tree);
        let root = fs.root_ino(group.clone());
        let kernel = fs.lookup(&root, "kernel").await.unwrap();
        let ro = fs.lookup(&kernel, "ro").await.unwrap();
        assert_eq!(fs.write(&ro, 0, b"1\n").await, Err(SysctlError::Perm));
    }

    #[tokio::test]
    async fn readdir_lists_subdirs_and_tables() {
        let tree = Arc::new(Tree::new());
        let group = Group::root();
        tree.register(&group, &["kernel"], vec![sample_entry("pid_max"), sample_entry("threads_max")]).unwrap();

        let fs = SysctlFs::new(tree);
        let root = fs.root_ino(group.clone());
        let (entries, _) = fs.readdir(&root, 0).await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec![".", "..", "kernel"]);

        let kernel = fs.lookup(&root, "kernel").await.unwrap();
        let (entries, _) = fs.readdir(&kernel, 0).await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec![".", "..", "pid_max", "threads_max"]);
    }

    #[tokio::test]
    async fn readdir_cursor_resumes_past_dot_entries() {
        let tree = Arc::new(Tree::new());
        let group = Group::root();
        tree.register(&group, &["kernel"], vec![sample_entry("pid_max"), sample_entry("threads_max")]).unwrap();

        let fs = SysctlFs::new(tree);
        let root = fs.root_ino(group.clone());
        let kernel = fs.lookup(&root, "kernel").await.unwrap();
        let (first, cursor) = fs.readdir(&kernel, 0).await.unwrap();
        assert_eq!(first.iter().map(|e| e.name.as_str()).collect::<Vec<_>>(), vec![".", "..", "pid_max", "threads_max"]);
        assert_eq!(cursor, 4);

        let (resumed, _) = fs.readdir(&kernel, 2).await.unwrap();
        let names: Vec<_> = resumed.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["pid_max", "threads_max"]);
    }
}
