//! Headers, table entries and the closed set of codec handlers (spec §3, §9
//! "Handler polymorphism").

use std::collections::HashSet;
use std::sync::{Arc, Mutex, RwLock, Weak};

use crate::group::Group;
use crate::refcount::RefState;

/// The closed set of codec variants a table entry can bind to (spec §9:
/// "a closed set of codec variants... is preferable to arbitrary indirect
/// dispatch; variants capture the min/max or unit-conversion parameters
/// statically").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    /// Free-form string, truncated at `maxlen` (spec §6).
    String,
    /// Whitespace-separated decimal integers, no bounds.
    IntVec,
    /// Whitespace-separated decimal integers with a `min`/`max` bound (spec §6).
    IntMinMax,
    /// Integer vector scaled by the system tick rate on read/write (spec §6).
    Jiffies,
    /// `a,b-c,d` range-list syntax over a fixed-width bitmap (spec §6).
    Bitmap,
}

/// Parameters a [`Handler`] needs beyond the raw datum (spec §3: "two
/// optional auxiliary pointers (min/max or codec-specific)").
#[derive(Debug, Clone, Copy, Default)]
pub struct Extra {
    pub min: Option<i64>,
    pub max: Option<i64>,
    /// Ticks-per-second used by the [`Handler::Jiffies`] codec.
    pub hz: i64,
}

impl Extra {
    pub fn none() -> Self {
        Self { min: None, max: None, hz: 1 }
    }

    pub fn min_max(min: i64, max: i64) -> Self {
        Self { min: Some(min), max: Some(max), hz: 1 }
    }

    pub fn jiffies(hz: i64) -> Self {
        Self { min: None, max: None, hz }
    }
}

/// The in-memory datum a table entry's handler reads and writes (spec §3:
/// "a raw datum pointer"). Modelled as an owned, typed buffer rather than a
/// raw pointer into caller memory — see DESIGN.md.
#[derive(Debug, Clone)]
pub enum Datum {
    Bytes(Vec<u8>),
    Ints(Vec<i64>),
    Bitmap(u64),
}

/// A single registered leaf (spec §3 "Table entry"). Immutable after
/// registration except for the shared datum, which the handler serialises
/// access to.
#[derive(Debug, Clone)]
pub struct TableEntry {
    pub procname: String,
    pub maxlen: usize,
    pub mode: u16,
    pub handler: Handler,
    pub extra: Extra,
    pub datum: Arc<Mutex<Datum>>,
}

impl TableEntry {
    pub fn new(procname: impl Into<String>, maxlen: usize, mode: u16, handler: Handler, extra: Extra, datum: Datum) -> Self {
        Self { procname: procname.into(), maxlen, mode, handler, extra, datum: Arc::new(Mutex::new(datum)) }
    }
}

/// A directory header's mutable child lists (spec §3 "Directory header").
#[derive(Debug, Default)]
pub struct DirectoryState {
    /// Empty string marks a namespace correspondent (spec §3, §4.4).
    pub name: String,
    pub subdirs: Vec<Arc<Header>>,
    pub tables: Vec<Arc<Header>>,
    /// Names claimed by one of this directory's namespace correspondents
    /// (spec §4.4 invariant 7); checked against new plain registrations.
    pub reserved: HashSet<String>,
}

/// The two kinds of header (spec §3 "Header").
#[derive(Debug)]
pub enum HeaderKind {
    Directory(DirectoryState),
    Table(Arc<Vec<TableEntry>>),
}

/// The unit of registration (spec §3 "Header").
#[derive(Debug)]
pub struct Header {
    pub id: u64,
    pub kind: RwLock<HeaderKind>,
    /// Back-reference only; ownership flows parent-to-child via list
    /// membership (spec §9 "Cyclic refs and back-pointers").
    pub parent: Mutex<Option<Weak<Header>>>,
    pub group: Arc<Group>,
    pub refs: RefState,
    /// Directories this registrant created while walking to this header's
    /// parent, recorded for symmetric teardown bookkeeping (spec §3).
    pub dirs_created: Mutex<usize>,
}

impl Header {
    pub fn is_directory(&self) -> bool {
        matches!(&*self.kind.read().unwrap(), HeaderKind::Directory(_))
    }

    pub fn directory_name(&self) -> Option<String> {
        match &*self.kind.read().unwrap() {
            HeaderKind::Directory(d) => Some(d.name.clone()),
            HeaderKind::Table(_) => None,
        }
    }

    /// A directory header whose directory-name is empty is a namespace
    /// correspondent (spec §3 invariant 1, §4.4).
    pub fn is_correspondent(&self) -> bool {
        matches!(&*self.kind.read().unwrap(), HeaderKind::Directory(d) if d.name.is_empty())
    }

    pub fn table_entries(&self) -> Option<Arc<Vec<TableEntry>>> {
        match &*self.kind.read().unwrap() {
            HeaderKind::Table(entries) => Some(entries.clone()),
            HeaderKind::Directory(_) => None,
        }
    }

    pub fn parent(&self) -> Option<Arc<Header>> {
        self.parent.lock().unwrap().as_ref().and_then(Weak::upgrade)
    }
}
