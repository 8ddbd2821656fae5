mod common;

use common::int_entry;
use std::sync::Arc;
use sysctl_registry::error::RegisterError;
use sysctl_registry::{FsAdapter, Group, SysctlFs, Tree};

#[tokio::test]
async fn namespace_overlay_is_visible_only_within_its_namespace() {
    let tree = Arc::new(Tree::new());
    let shared_group = Group::root();
    let ns_group = Group::namespace("ns0");

    tree.register_dir(&shared_group, &["net", "ipv4", "conf"]).expect("register shared conf dir");
    tree.register(&ns_group, &["net", "ipv4", "conf", "lo"], vec![int_entry("forwarding")]).expect("register ns overlay");

    let fs = SysctlFs::new(tree);
    let root = fs.root_ino(ns_group.clone());
    let net = fs.lookup(&root, "net").await.unwrap();
    let ipv4 = fs.lookup(&net, "ipv4").await.unwrap();
    let conf = fs.lookup(&ipv4, "conf").await.unwrap();

    let lo = fs.lookup(&conf, "lo").await.expect("namespace correspondent resolves lo");
    assert!(lo.is_directory());

    let (entries, _) = fs.readdir(&conf, 0).await.unwrap();
    assert!(entries.iter().any(|e| e.name == "lo"));

    // A different namespace's group has no correspondent under /net/ipv4/conf,
    // so it must neither resolve nor list "lo" (spec end-to-end scenario 4).
    let other_ns_group = Group::namespace("ns1");
    let other_root = fs.root_ino(other_ns_group);
    let other_net = fs.lookup(&other_root, "net").await.unwrap();
    let other_ipv4 = fs.lookup(&other_net, "ipv4").await.unwrap();
    let other_conf = fs.lookup(&other_ipv4, "conf").await.unwrap();

    assert_eq!(fs.lookup(&other_conf, "lo").await, Err(sysctl_registry::SysctlError::NoEnt));
    let (other_entries, _) = fs.readdir(&other_conf, 0).await.unwrap();
    assert!(!other_entries.iter().any(|e| e.name == "lo"));
}

#[test]
fn shared_directory_cannot_collide_with_existing_correspondent_name() {
    let tree = Arc::new(Tree::new());
    let shared_group = Group::root();
    let ns_group = Group::namespace("ns0");

    tree.register_dir(&shared_group, &["net", "ipv4"]).expect("register /net/ipv4 shared");
    tree.register(&ns_group, &["net", "ipv4", "conf", "lo"], vec![int_entry("forwarding")]).expect("register ns-specific conf/lo");

    let result = tree.register_dir(&shared_group, &["net", "ipv4", "conf"]);
    assert!(matches!(result, Err(RegisterError::CorrespondentNameCollision(_))));
}
