//! Error kinds produced by the core. See `spec.md` §7.
//!
//! These map to POSIX errno values at the platform-adapter boundary, which
//! lives outside this crate (§1: permission/credential checks and the host
//! VFS are external collaborators). Each variant documents the conventional
//! errno an adapter would map it to.

use thiserror::Error;

/// The result type returned by every core operation.
pub type Result<T> = core::result::Result<T, OspfsError>;

/// An error produced by a core operation.
///
/// Every operation is all-or-nothing: a returned error means the operation
/// had no effect, except where explicitly noted (`Io` during a shrink may
/// leave the inode partially truncated, since an `Io` error already implies
/// the image is in an inconsistent state).
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum OspfsError {
    /// Directory entry absent. Conventionally `ENOENT`.
    #[error("no such file or directory")]
    NotFound,
    /// An entry with that name already exists in the directory. Conventionally `EEXIST`.
    #[error("file exists")]
    Exists,
    /// A name exceeds `MAXNAMELEN`, or a symlink target exceeds `MAXSYMLINKLEN`.
    /// Conventionally `ENAMETOOLONG`.
    #[error("name too long")]
    NameTooLong,
    /// The allocator found no free block, the inode table is full, or a file
    /// would grow past `ND + NI + NI^2` blocks. Conventionally `ENOSPC`.
    #[error("no space left on device")]
    NoSpace,
    /// A structural inconsistency: an expected indirect block is missing, the
    /// block map resolved to block 0 inside the file's bounds, or an offset
    /// computation overflowed. Conventionally `EIO`.
    #[error("I/O error")]
    Io,
    /// The operation isn't permitted on this kind of inode (e.g. truncating a
    /// directory). Conventionally `EPERM`.
    #[error("operation not permitted")]
    Permission,
    /// The host couldn't allocate an in-memory handle for the result.
    /// Conventionally `ENOMEM`. The core itself never allocates host memory
    /// (§1); this variant exists for adapters that do.
    #[error("cannot allocate memory")]
    NoMemory,
}
