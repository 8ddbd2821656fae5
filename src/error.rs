//! User-visible and registration-time error types (spec §6, §7).

use thiserror::Error;

/// Convenience alias for operations that return a [`SysctlError`].
pub type SysctlResult<T> = Result<T, SysctlError>;

/// Errors surfaced to callers of the filesystem adapter (spec §6).
///
/// These map 1:1 onto the error codes named in the specification; the
/// adapter never translates or retries them (spec §7).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Error)]
pub enum SysctlError {
    /// ENOENT — the entry vanished (header unregistered concurrently).
    #[error("entry vanished")]
    NoEnt,
    /// EPERM — permission denied by the entry's mode.
    #[error("permission denied by mode")]
    Perm,
    /// EACCES — write attempted on a read-only entry, or exec on a regular entry.
    #[error("write to read-only entry, or exec on a regular entry")]
    Access,
    /// EINVAL — malformed input, an out-of-range value, or a misconfigured table.
    #[error("malformed input, out-of-range value, or misconfigured table")]
    Inval,
    /// ENOMEM — allocation failed.
    #[error("allocation failed")]
    NoMem,
    /// EFAULT — the caller's buffer could not be read or written.
    #[error("bad user buffer")]
    Fault,
    /// ECHILD — lookup attempted in lock-free walk mode; caller must retry
    /// under full locking.
    #[error("lookup attempted in lock-free walk mode; retry under full locking")]
    EChild,
}

/// Failures produced while registering a table or directory (spec §7,
/// the "programmer error" and "transient allocation failure" classes).
///
/// Registration always rolls back any directories it created before
/// returning one of these.
#[derive(Debug, Error)]
pub enum RegisterError {
    /// Invariant 2: a name collides with an existing sibling at this level.
    #[error("duplicate name {0:?} at this directory level")]
    DuplicateName(String),
    /// A table entry declared mode bits above 0o777.
    #[error("table entry {0:?} has mode bits above 0o777")]
    ModeOutOfRange(String),
    /// A path fragment (or the table array) was empty where a name was required.
    #[error("path fragment at depth {0} is empty")]
    EmptyPathFragment(usize),
    /// Invariant 7: a shared directory registration collides with a name
    /// already claimed by one of its namespace correspondents (or vice versa).
    #[error("registration collides with an existing namespace correspondent name {0:?}")]
    CorrespondentNameCollision(String),
    /// Two entries in the same table array share a procname.
    #[error("table array contains duplicate procname {0:?}")]
    DuplicateInTable(String),
    /// Pre-allocation of header storage failed.
    #[error("allocation failed while pre-allocating headers")]
    Allocation,
    /// The header an unregister/lookup was handed is concurrently unregistering.
    #[error("target header is concurrently unregistering")]
    Concurrent,
}
