//! A small CLI exercising the registry with sample `kernel/*`-like tables:
//! registers a handful of entries, then lists and reads them back.

use clap::Parser;
use std::sync::Arc;
use sysctl_registry::header::{Datum, Extra, Handler};
use sysctl_registry::{config, FsAdapter, Group, SysctlFs, TableEntry, Tree};

#[derive(Parser)]
struct Args {
    /// Path to a TOML config file; falls back to defaults if omitted.
    #[arg(long)]
    config: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => config::Config::load(path).expect("could not load config"),
        None => config::Config::default(),
    };
    config::init_logging(&config.logging);

    let tree = Arc::new(Tree::new());
    let root_group = Group::root();

    tree.register(
        &root_group,
        &["kernel"],
        vec![
            TableEntry::new("pid_max", 4, 0o644, Handler::IntMinMax, Extra::min_max(300, 32768), Datum::Ints(vec![32768])),
            TableEntry::new("threads-max", 8, 0o644, Handler::IntVec, Extra::none(), Datum::Ints(vec![0])),
            TableEntry::new("core_pattern", 128, 0o644, Handler::String, Extra::none(), Datum::Bytes(vec![0; 128])),
        ],
    )
    .expect("registering kernel/* failed");

    for ns in &config.namespaces {
        let group = if ns.read_only { Group::read_only() } else { Group::namespace(ns.name.clone()) };
        println!("configured namespace group {:?} (read_only={})", group.name, ns.read_only);
    }

    let fs = SysctlFs::new(tree);
    let root = fs.root_ino(root_group.clone());
    let kernel = fs.lookup(&root, "kernel").await.expect("kernel directory must exist");
    let (entries, _) = fs.readdir(&kernel, 0).await.expect("readdir failed");
    for entry in entries {
        if entry.name == "." || entry.name == ".." {
            continue;
        }
        println!("kernel/{}", entry.name);
    }

    let pid_max = fs.lookup(&kernel, "pid_max").await.expect("pid_max must exist");
    let value = fs.read(&pid_max, 0, 16).await.expect("read failed");
    println!("kernel/pid_max = {}", String::from_utf8_lossy(&value).trim_end());
}
