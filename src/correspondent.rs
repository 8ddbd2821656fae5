//! The namespace correspondent engine (spec §4.4): per-namespace overlay
//! directories spliced into the shared tree during lookup/readdir/registration.

use std::sync::Arc;

use crate::group::Group;
use crate::header::Header;

/// Scan `group`'s correspondent list for an entry whose parent is
/// `shared_parent`. Used both to look one up (`find_correspondent`) and as
/// the first half of `find_or_create_correspondent`.
fn find(group: &Group, shared_parent: &Arc<Header>) -> Option<Arc<Header>> {
    let list = group.correspondents.lock().unwrap();
    list.iter()
        .find(|candidate| {
            candidate.parent().map(|p| Arc::ptr_eq(&p, shared_parent)).unwrap_or(false)
        })
        .cloned()
}

/// find-or-create correspondent(group, shared-parent, spare): reuse an
/// existing correspondent of `shared_parent` in `group`, bumping its
/// owner-refs (the registrant now shares ownership of it, exactly as it
/// would for any other reused directory header in the walk); otherwise
/// consume `spare`, attach it to `shared_parent` and register it in
/// `group`'s correspondent list.
///
/// Returns `None` only if an existing correspondent was found but is
/// concurrently unregistering (the caller should fail the registration and
/// let the registrant retry).
pub fn find_or_create(group: &Arc<Group>, shared_parent: &Arc<Header>, spare: Arc<Header>) -> Option<Arc<Header>> {
    if let Some(existing) = find(group, shared_parent) {
        return if !existing.refs.is_unregistering() {
            existing.refs.bump_owner();
            Some(existing)
        } else {
            None
        };
    }

    *spare.parent.lock().unwrap() = Some(Arc::downgrade(shared_parent));
    group.correspondents.lock().unwrap().push(spare.clone());
    tracing::debug!(parent = shared_parent.id, correspondent = spare.id, group = %group.name, "created namespace correspondent");
    Some(spare)
}

/// find correspondent(group): the read-only half of the lookup, used by
/// the filesystem adapter when a name isn't resolved in the shared view.
pub fn find_correspondent(group: &Arc<Group>, shared_parent: &Arc<Header>) -> Option<Arc<Header>> {
    find(group, shared_parent)
}
