//! An in-memory, hierarchical registry of runtime-mutable control entries
//! ("sysctls"), exposed to callers through a filesystem-shaped adapter.
//!
//! The crate is organised around the five cooperating components of the
//! registration graph: a [`cache`] that allocates header records, a
//! [`refcount`] engine coordinating unregistration with in-flight lookups,
//! a [`tree`] engine that builds and tears down the shared directory
//! structure, a [`correspondent`] engine splicing per-namespace overlays
//! into that structure, and an [`adapter`] exposing it all to a host
//! filesystem. [`handlers`] implements the per-entry text codecs; [`group`]
//! and [`header`] hold the shared data model; [`config`] and [`error`] are
//! the ambient configuration and error-handling layers.

pub mod adapter;
pub mod cache;
pub mod config;
pub mod correspondent;
pub mod error;
pub mod group;
pub mod handlers;
pub mod header;
pub mod refcount;
pub mod tree;

pub use adapter::{DirEntry, FsAdapter, Ino, SysctlFs};
pub use error::{RegisterError, SysctlError, SysctlResult};
pub use group::Group;
pub use header::{Datum, Extra, Handler, TableEntry};
pub use tree::Tree;
