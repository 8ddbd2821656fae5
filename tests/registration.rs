mod common;

use common::{fixture, int_entry, root_group};
use sysctl_registry::error::RegisterError;
use sysctl_registry::header::{Datum, Extra, Handler, TableEntry};

#[test]
fn duplicate_table_entry_at_same_level_is_rejected() {
    let (tree, _fs) = fixture();
    let group = root_group();

    tree.register(&group, &["kernel"], vec![int_entry("x")]).expect("first registration");
    let result = tree.register(&group, &["kernel"], vec![int_entry("x")]);

    assert!(matches!(result, Err(RegisterError::DuplicateName(_))));
}

#[test]
fn directory_name_colliding_with_table_entry_is_rejected() {
    let (tree, _fs) = fixture();
    let group = root_group();

    tree.register(&group, &["kernel"], vec![int_entry("foo")]).expect("register foo entry");
    let result = tree.register(&group, &["kernel", "foo"], vec![int_entry("bar")]);

    assert!(matches!(result, Err(RegisterError::DuplicateName(_))));
}

#[test]
fn ten_deep_path_unwinds_owner_refs_to_zero_on_unregister() {
    let (tree, _fs) = fixture();
    let group = root_group();
    let names: Vec<String> = (0..10).map(|i| format!("d{i}")).collect();

    let header = tree.register(&group, &path_refs(&names), vec![int_entry("leaf")]).expect("deep registration");

    let mut dirs = Vec::new();
    let mut current = header.parent().expect("table header has a parent");
    while let Some(parent) = current.parent() {
        dirs.push(current.clone());
        current = parent;
    }
    assert_eq!(dirs.len(), 10);

    tree.unregister(header);
    for dir in &dirs {
        assert_eq!(dir.refs.owner_count(), 0);
    }
}

fn path_refs(names: &[String]) -> Vec<&str> {
    names.iter().map(String::as_str).collect()
}

#[test]
fn register_dir_creates_intermediate_directories_only() {
    let (tree, _fs) = fixture();
    let group = root_group();

    let dir = tree.register_dir(&group, &["net", "ipv4"]).expect("register_dir");
    assert!(dir.is_directory());
    assert!(dir.table_entries().is_none());
}

#[test]
fn mode_above_0o777_is_rejected() {
    let (tree, _fs) = fixture();
    let group = root_group();
    let bad = TableEntry::new("bad", 8, 0o1000, Handler::IntVec, Extra::none(), Datum::Ints(vec![0]));

    let result = tree.register(&group, &["kernel"], vec![bad]);
    assert!(matches!(result, Err(RegisterError::ModeOutOfRange(_))));
}
