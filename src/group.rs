//! Groups: the visibility and policy domain a registration belongs to
//! (spec §3 "Group", §4.3 "Permission check").

use std::sync::{Arc, Mutex};

use crate::header::{Header, TableEntry};

/// Effective-mode policy hook (spec §3 "a permission-evaluation hook").
pub type PermissionHook = Arc<dyn Fn(&TableEntry) -> u16 + Send + Sync>;

/// Visibility hook (spec §3 "an is-seen hook"); `None` means "always seen".
pub type IsSeenHook = Arc<dyn Fn() -> bool + Send + Sync>;

/// A visibility and policy domain (spec §3 "Group"). The root group and the
/// read-only group always exist; every network namespace owns one more,
/// with correspondents enabled.
pub struct Group {
    pub name: String,
    pub permissions: Option<PermissionHook>,
    pub is_seen: Option<IsSeenHook>,
    pub has_correspondents: bool,
    /// Correspondent headers belonging to this group (spec §3, §4.4).
    pub correspondents: Mutex<Vec<Arc<Header>>>,
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("name", &self.name)
            .field("has_correspondents", &self.has_correspondents)
            .finish()
    }
}

impl Group {
    /// The root group: no correspondents, no permission masking.
    pub fn root() -> Arc<Group> {
        Arc::new(Group {
            name: "root".to_string(),
            permissions: None,
            is_seen: None,
            has_correspondents: false,
            correspondents: Mutex::new(Vec::new()),
        })
    }

    /// The read-only group: no correspondents, every mode masked to strip
    /// write bits (spec §3 "permissions masked to read-only outside the
    /// initial namespace").
    pub fn read_only() -> Arc<Group> {
        Arc::new(Group {
            name: "read-only".to_string(),
            permissions: Some(Arc::new(|entry: &TableEntry| entry.mode & !0o222)),
            is_seen: None,
            has_correspondents: false,
            correspondents: Mutex::new(Vec::new()),
        })
    }

    /// A per-namespace group: correspondents enabled, no permission masking
    /// by default.
    pub fn namespace(name: impl Into<String>) -> Arc<Group> {
        Arc::new(Group {
            name: name.into(),
            permissions: None,
            is_seen: None,
            has_correspondents: true,
            correspondents: Mutex::new(Vec::new()),
        })
    }

    /// Effective mode for a table entry: the group's permission hook if
    /// present, else the entry's own declared mode (spec §4.3).
    pub fn effective_mode(&self, entry: &TableEntry) -> u16 {
        match &self.permissions {
            Some(hook) => hook(entry),
            None => entry.mode,
        }
    }

    /// Whether this group's view is seen at all (spec §3 "is-seen hook").
    pub fn is_seen(&self) -> bool {
        match &self.is_seen {
            Some(hook) => hook(),
            None => true,
        }
    }
}
