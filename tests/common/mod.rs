use std::sync::Arc;
use sysctl_registry::header::{Datum, Extra, Handler};
use sysctl_registry::{Group, SysctlFs, TableEntry, Tree};

pub fn int_entry(name: &str) -> TableEntry {
    TableEntry::new(name, 8, 0o644, Handler::IntVec, Extra::none(), Datum::Ints(vec![0]))
}

pub fn int_minmax_entry(name: &str, min: i64, max: i64) -> TableEntry {
    TableEntry::new(name, 8, 0o644, Handler::IntMinMax, Extra::min_max(min, max), Datum::Ints(vec![0]))
}

pub fn fixture() -> (Arc<Tree>, SysctlFs) {
    let tree = Arc::new(Tree::new());
    let fs = SysctlFs::new(tree.clone());
    (tree, fs)
}

pub fn root_group() -> Arc<Group> {
    Group::root()
}
