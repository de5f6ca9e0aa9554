//! An in-memory, block-addressed, POSIX-style file system image.
//!
//! `ospfs` interprets a caller-owned `&mut [u8]` buffer as a sequence of
//! fixed-size blocks holding a superblock, a free-block bitmap, an inode
//! table, and data blocks, and exposes the traditional file-and-directory
//! interface (lookup, create, read, write, link, unlink, symlink,
//! follow-link, truncate, readdir) over it.
//!
//! The crate never allocates host memory for file contents, never spawns
//! threads, and never reads wall-clock time: callers own the buffer and
//! serialize all mutating operations on it (`SPEC_FULL.md` §5). The host
//! VFS, credential checks, process identity, and module loading are all
//! external collaborators this crate never touches.
//!
//! Start with [`Filesystem::format`] to build a fresh image, or
//! [`Filesystem::mount`] to reopen one.

mod bitmap;
mod dir;
mod error;
mod image;
mod inode;
mod ops;
mod size;

pub use error::{OspfsError, Result};
pub use image::{
    BLOCK_SIZE, DIRENT_SIZE, INODE_SIZE, MAXFILEBLOCKS, MAXNAMELEN, MAXSYMLINKLEN, ND, NI,
    ROOT_INODE,
};
pub use inode::FileType;
pub use ops::{DirEntryInfo, Filesystem, InodeNum};
