//! File operations: the public, caller-facing surface of the core.
//!
//! Grounded directly on `ospfs_read`/`ospfs_write`/`ospfs_unlink`/
//! `ospfs_link`/`ospfs_symlink`/`ospfs_follow_link`/`ospfs_dir_readdir`/
//! `ospfs_create`/`ospfs_notify_change` in `ospfsmod.c` — these are the
//! functions the original lab exercise asks you to complete. The wrapping
//! `Filesystem<'a>` struct borrowing an [`Image`] follows the teacher's
//! `Ext2Fs` struct shape in `file/fs/ext2/mod.rs`.

use crate::dir;
use crate::error::{OspfsError, Result};
use crate::image::{Image, MAXNAMELEN, ND, ROOT_INODE};
use crate::inode::{FileType, Inode};
use crate::size;

/// A thin newtype over the raw inode number, matching the teacher's `INode`
/// type-alias pattern in `file/mod.rs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InodeNum(pub u32);

impl InodeNum {
    /// The root directory's inode number. `spec.md` §3.
    pub const ROOT: InodeNum = InodeNum(ROOT_INODE);
}

/// One entry produced by [`Filesystem::readdir`].
#[derive(Debug, Clone)]
pub struct DirEntryInfo {
    pub ino: InodeNum,
    pub name: String,
    pub file_type: FileType,
}

/// The core's public, caller-facing API over a mounted image.
///
/// Owns an exclusive view of the caller's buffer for its entire lifetime
/// (`spec.md` §5): there is no internal locking because there is nothing to
/// lock against.
pub struct Filesystem<'a> {
    image: Image<'a>,
}

impl<'a> Filesystem<'a> {
    /// Mounts an existing, well-formed image.
    pub fn mount(buf: &'a mut [u8]) -> Result<Self> {
        Ok(Filesystem {
            image: Image::mount(buf)?,
        })
    }

    /// Formats a fresh image and mounts it. Supplemental "mkfs" operation;
    /// see `SPEC_FULL.md` §3.
    pub fn format(buf: &'a mut [u8], nblocks: u32, ninodes: u32) -> Result<Self> {
        Ok(Filesystem {
            image: Image::format(buf, nblocks, ninodes)?,
        })
    }

    fn dir_inode(&self, dir: InodeNum) -> Result<Inode> {
        let inode = self.image.read_inode(dir.0)?;
        if inode.ftype != FileType::Directory {
            return Err(OspfsError::Io);
        }
        Ok(inode)
    }

    /// Scans for the first free inode slot, starting at 1 (inode 0 is
    /// permanently reserved, `spec.md` §3). `ospfsmod.c`'s `find_free_inode`.
    fn find_free_inode(&self) -> Result<u32> {
        for i in 1..self.image.ninodes() {
            if self.image.read_inode(i)?.is_free() {
                return Ok(i);
            }
        }
        Err(OspfsError::NoSpace)
    }

    /// Looks up `name` inside `dir`. `spec.md` §4.6/§6.
    pub fn lookup(&self, dir: InodeNum, name: &str) -> Result<InodeNum> {
        let dir_inode = self.dir_inode(dir)?;
        dir::find(&self.image, &dir_inode, name)?
            .map(InodeNum)
            .ok_or(OspfsError::NotFound)
    }

    /// Produces directory entries in cursor order: `.` at cursor 0, `..` at
    /// cursor 1, then the live slots of `dir` from cursor 2 onward, skipping
    /// empties. `spec.md` §4.6.
    ///
    /// `..` always resolves to the root inode: this core's public API never
    /// creates a subdirectory (`spec.md` §4.7, Non-goals — no mkdir/rmdir),
    /// so the root is the only directory that ever exists, and the root's
    /// own parent is conventionally itself.
    pub fn readdir(&self, dir: InodeNum, cursor: u32) -> Result<Option<(DirEntryInfo, u32)>> {
        let dir_inode = self.dir_inode(dir)?;
        if cursor == 0 {
            return Ok(Some((
                DirEntryInfo {
                    ino: dir,
                    name: ".".to_string(),
                    file_type: FileType::Directory,
                },
                1,
            )));
        }
        if cursor == 1 {
            return Ok(Some((
                DirEntryInfo {
                    ino: InodeNum::ROOT,
                    name: "..".to_string(),
                    file_type: FileType::Directory,
                },
                2,
            )));
        }

        match dir::read_at(&self.image, &dir_inode, cursor - 2)? {
            None => Ok(None),
            Some((entry, next_slot)) => {
                let entry_inode = self.image.read_inode(entry.ino)?;
                Ok(Some((
                    DirEntryInfo {
                        ino: InodeNum(entry.ino),
                        name: entry.name,
                        file_type: entry_inode.ftype,
                    },
                    next_slot + 2,
                )))
            }
        }
    }

    /// Creates a regular file. `spec.md` §4.6.
    pub fn create(&mut self, dir: InodeNum, name: &str, mode: u32) -> Result<InodeNum> {
        if name.is_empty() || name.len() > MAXNAMELEN {
            return Err(OspfsError::NameTooLong);
        }
        let mut dir_inode = self.dir_inode(dir)?;
        if dir::find(&self.image, &dir_inode, name)?.is_some() {
            return Err(OspfsError::Exists);
        }

        let ino = self.find_free_inode()?;
        let file_inode = Inode {
            size: 0,
            ftype: FileType::Regular,
            nlink: 1,
            mode,
            direct: [0; ND],
            indirect: 0,
            indirect2: 0,
        };

        dir::create_blank(&mut self.image, dir.0, &mut dir_inode, ino, name)?;
        self.image.write_inode(ino, &file_inode)?;
        log::debug!("ops: created regular file {name:?} -> inode {ino} in directory {}", dir.0);
        Ok(InodeNum(ino))
    }

    /// Adds a hard link to an existing inode. `spec.md` §4.6.
    pub fn link(&mut self, dir: InodeNum, target: InodeNum, name: &str) -> Result<()> {
        if name.is_empty() || name.len() > MAXNAMELEN {
            return Err(OspfsError::NameTooLong);
        }
        let mut dir_inode = self.dir_inode(dir)?;
        let mut target_inode = self.image.read_inode(target.0)?;
        if target_inode.is_free() {
            return Err(OspfsError::Io);
        }
        if target_inode.nlink.checked_add(1).is_none() {
            return Err(OspfsError::Io);
        }
        if dir::find(&self.image, &dir_inode, name)?.is_some() {
            return Err(OspfsError::Exists);
        }

        dir::create_blank(&mut self.image, dir.0, &mut dir_inode, target.0, name)?;
        target_inode.nlink += 1;
        self.image.write_inode(target.0, &target_inode)?;
        log::debug!("ops: linked inode {} as {name:?} in directory {}", target.0, dir.0);
        Ok(())
    }

    /// Removes the entry `name` from `dir`, decrementing the target
    /// inode's `nlink` and freeing the slot / the inode's blocks if that
    /// was the last link. `spec.md` §4.6.
    pub fn unlink(&mut self, dir: InodeNum, name: &str) -> Result<()> {
        let dir_inode = self.dir_inode(dir)?;
        let target_ino = dir::mark_free(&mut self.image, &dir_inode, name)?;
        let mut inode = self.image.read_inode(target_ino)?;
        inode.nlink = inode.nlink.saturating_sub(1);

        if inode.nlink == 0 {
            if inode.ftype != FileType::Symlink {
                size::change_size(&mut self.image, &mut inode, 0)?;
            }
            inode = Inode {
                size: 0,
                ftype: FileType::Free,
                nlink: 0,
                mode: 0,
                direct: [0; ND],
                indirect: 0,
                indirect2: 0,
            };
        }
        self.image.write_inode(target_ino, &inode)?;

        #[cfg(feature = "legacy_dir_nlink")]
        {
            // `ospfsmod.c`'s `ospfs_unlink` unconditionally decrements the
            // parent directory's nlink on every unlink, even for regular
            // files — a non-POSIX bookkeeping quirk preserved here for
            // source fidelity (`spec.md` §9, `DESIGN.md`).
            let mut dir_inode = dir_inode;
            dir_inode.nlink = dir_inode.nlink.saturating_sub(1);
            self.image.write_inode(dir.0, &dir_inode)?;
        }

        log::debug!("ops: unlinked {name:?} (inode {target_ino}) from directory {}", dir.0);
        Ok(())
    }

    /// Creates a symlink, optionally conditional (`?root:other`). `spec.md` §4.6.
    pub fn symlink(&mut self, dir: InodeNum, name: &str, target: &str) -> Result<InodeNum> {
        if name.is_empty() || name.len() > MAXNAMELEN {
            return Err(OspfsError::NameTooLong);
        }
        let mut dir_inode = self.dir_inode(dir)?;
        if dir::find(&self.image, &dir_inode, name)?.is_some() {
            return Err(OspfsError::Exists);
        }

        let ino = self.find_free_inode()?;
        let mut link_inode = Inode {
            size: 0,
            ftype: FileType::Symlink,
            nlink: 1,
            mode: 0,
            direct: [0; ND],
            indirect: 0,
            indirect2: 0,
        };
        link_inode.set_symlink_target(target)?;

        dir::create_blank(&mut self.image, dir.0, &mut dir_inode, ino, name)?;
        self.image.write_inode(ino, &link_inode)?;

        #[cfg(feature = "legacy_dir_nlink")]
        {
            // `ospfsmod.c`'s `ospfs_symlink` increments the parent's nlink
            // (but `ospfs_create` does not) — preserved behind the feature
            // flag alongside the unlink-side quirk above.
            dir_inode.nlink += 1;
            self.image.write_inode(dir.0, &dir_inode)?;
        }

        log::debug!("ops: created symlink {name:?} -> {target:?} as inode {ino} in directory {}", dir.0);
        Ok(InodeNum(ino))
    }

    /// Resolves a symlink's target for the given caller. `spec.md` §4.6/§9.
    pub fn follow_link(&self, ino: InodeNum, is_root: bool) -> Result<String> {
        let inode = self.image.read_inode(ino.0)?;
        if inode.ftype != FileType::Symlink {
            return Err(OspfsError::Io);
        }
        inode.symlink_target(is_root)
    }

    /// Reads up to `buf.len()` bytes starting at `offset`, clamped to the
    /// file's size. Returns the number of bytes transferred. `spec.md` §4.6.
    pub fn read(&self, ino: InodeNum, offset: u32, buf: &mut [u8]) -> Result<usize> {
        let inode = self.image.read_inode(ino.0)?;
        if inode.ftype == FileType::Symlink {
            return Err(OspfsError::Io);
        }
        if offset.checked_add(buf.len() as u32).is_none() {
            return Err(OspfsError::Io);
        }

        let count = if offset >= inode.size {
            0
        } else {
            (inode.size - offset).min(buf.len() as u32)
        };

        let mut amount = 0u32;
        while amount < count {
            let pos = offset + amount;
            let blockno = inode.block_of(&self.image, pos / crate::image::BLOCK_SIZE)?;
            let data_offset = (pos % crate::image::BLOCK_SIZE) as usize;
            let bytes_left = count - amount;
            let n = (crate::image::BLOCK_SIZE - data_offset as u32).min(bytes_left);

            let block = self.image.block(blockno);
            buf[amount as usize..(amount + n) as usize]
                .copy_from_slice(&block[data_offset..data_offset + n as usize]);
            amount += n;
        }
        Ok(amount as usize)
    }

    /// Writes `buf` at `offset` (or at end-of-file if `append`), extending
    /// the file first if necessary. `spec.md` §4.6.
    pub fn write(&mut self, ino: InodeNum, offset: u32, buf: &[u8], append: bool) -> Result<usize> {
        let mut inode = self.image.read_inode(ino.0)?;
        if inode.ftype == FileType::Symlink {
            return Err(OspfsError::Io);
        }

        let offset = if append { inode.size } else { offset };
        let new_size = offset
            .checked_add(buf.len() as u32)
            .ok_or(OspfsError::Io)?;

        if new_size > inode.size {
            size::change_size(&mut self.image, &mut inode, new_size)?;
        }

        let mut amount = 0u32;
        let count = buf.len() as u32;
        while amount < count {
            let pos = offset + amount;
            let blockno = inode.block_of(&self.image, pos / crate::image::BLOCK_SIZE)?;
            let data_offset = (pos % crate::image::BLOCK_SIZE) as usize;
            let bytes_left = count - amount;
            let n = (crate::image::BLOCK_SIZE - data_offset as u32).min(bytes_left);

            let block = self.image.block_mut(blockno);
            block[data_offset..data_offset + n as usize]
                .copy_from_slice(&buf[amount as usize..(amount + n) as usize]);
            amount += n;
        }

        self.image.write_inode(ino.0, &inode)?;
        log::trace!("ops: wrote {amount} bytes to inode {} at offset {offset}", ino.0);
        Ok(amount as usize)
    }

    /// Changes a file's size and/or mode. `spec.md` §4.6/§6.
    ///
    /// Truncating a directory is rejected with `Permission`, matching
    /// `ospfsmod.c`'s `ospfs_notify_change`. Symlinks reject size changes
    /// outright (`Io`): their `direct`/`indirect`/`indirect2` fields hold
    /// inline payload bytes, not block pointers, so running them through
    /// the size manager would corrupt the target string (`spec.md` §4.7 —
    /// symlinks only ever leave `free` via unlink, never via truncation).
    pub fn setattr(&mut self, ino: InodeNum, new_size: Option<u32>, new_mode: Option<u32>) -> Result<()> {
        let mut inode = self.image.read_inode(ino.0)?;

        if let Some(size) = new_size {
            match inode.ftype {
                FileType::Directory => return Err(OspfsError::Permission),
                FileType::Symlink => return Err(OspfsError::Io),
                _ => {}
            }
            size::change_size(&mut self.image, &mut inode, size)?;
        }
        if let Some(mode) = new_mode {
            inode.mode = mode;
        }

        self.image.write_inode(ino.0, &inode)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::BLOCK_SIZE;

    fn mounted(nblocks: u32, ninodes: u32) -> Vec<u8> {
        vec![0u8; nblocks as usize * BLOCK_SIZE as usize]
    }

    #[test]
    fn create_write_read_round_trip() {
        let mut buf = mounted(64, 16);
        let mut fs = Filesystem::format(&mut buf, 64, 16).unwrap();
        let a = fs.create(InodeNum::ROOT, "a", 0o644).unwrap();
        let n = fs.write(a, 0, b"hello", false).unwrap();
        assert_eq!(n, 5);
        let mut out = [0u8; 5];
        let read = fs.read(a, 0, &mut out).unwrap();
        assert_eq!(read, 5);
        assert_eq!(&out, b"hello");
    }

    #[test]
    fn cross_block_write_and_read() {
        let mut buf = mounted(64, 16);
        let mut fs = Filesystem::format(&mut buf, 64, 16).unwrap();
        let b = fs.create(InodeNum::ROOT, "b", 0o644).unwrap();
        let payload = vec![b'x'; 2000];
        let n = fs.write(b, 0, &payload, false).unwrap();
        assert_eq!(n, 2000);

        let mut out = [0u8; 8];
        fs.read(b, 1020, &mut out).unwrap();
        assert_eq!(&out, b"xxxxxxxx");
    }

    #[test]
    fn append_extends_past_current_size() {
        let mut buf = mounted(64, 16);
        let mut fs = Filesystem::format(&mut buf, 64, 16).unwrap();
        let a = fs.create(InodeNum::ROOT, "a", 0o644).unwrap();
        fs.write(a, 0, b"hello", false).unwrap();
        fs.write(a, 0, b" world", true).unwrap();
        let mut out = [0u8; 11];
        fs.read(a, 0, &mut out).unwrap();
        assert_eq!(&out, b"hello world");
    }

    #[test]
    fn unlink_frees_blocks_and_inode() {
        let mut buf = mounted(64, 16);
        let mut fs = Filesystem::format(&mut buf, 64, 16).unwrap();
        let b = fs.create(InodeNum::ROOT, "b", 0o644).unwrap();
        fs.write(b, 0, &vec![b'x'; 2000], false).unwrap();
        fs.unlink(InodeNum::ROOT, "b").unwrap();
        assert_eq!(fs.lookup(InodeNum::ROOT, "b"), Err(OspfsError::NotFound));
        let inode = fs.image.read_inode(b.0).unwrap();
        assert_eq!(inode.nlink, 0);
    }

    #[test]
    fn hard_link_shares_inode_until_both_unlinked() {
        let mut buf = mounted(64, 16);
        let mut fs = Filesystem::format(&mut buf, 64, 16).unwrap();
        let a = fs.create(InodeNum::ROOT, "a", 0o644).unwrap();
        fs.write(a, 0, b"data", false).unwrap();
        fs.link(InodeNum::ROOT, a, "a2").unwrap();

        fs.unlink(InodeNum::ROOT, "a").unwrap();
        let mut out = [0u8; 4];
        let a2 = fs.lookup(InodeNum::ROOT, "a2").unwrap();
        fs.read(a2, 0, &mut out).unwrap();
        assert_eq!(&out, b"data");

        fs.unlink(InodeNum::ROOT, "a2").unwrap();
        assert_eq!(fs.lookup(InodeNum::ROOT, "a2"), Err(OspfsError::NotFound));
    }

    #[test]
    fn conditional_symlink_resolves_by_caller() {
        let mut buf = mounted(64, 16);
        let mut fs = Filesystem::format(&mut buf, 64, 16).unwrap();
        let cs = fs.symlink(InodeNum::ROOT, "cs", "?/root_path:/other_path").unwrap();
        assert_eq!(fs.follow_link(cs, true).unwrap(), "/root_path");
        assert_eq!(fs.follow_link(cs, false).unwrap(), "/other_path");
    }

    #[test]
    fn readdir_yields_dot_dotdot_then_entries() {
        let mut buf = mounted(64, 16);
        let mut fs = Filesystem::format(&mut buf, 64, 16).unwrap();
        fs.create(InodeNum::ROOT, "a", 0o644).unwrap();
        fs.create(InodeNum::ROOT, "b", 0o644).unwrap();

        let mut names = Vec::new();
        let mut cursor = 0;
        loop {
            match fs.readdir(InodeNum::ROOT, cursor).unwrap() {
                Some((entry, next)) => {
                    names.push(entry.name);
                    cursor = next;
                }
                None => break,
            }
        }
        assert_eq!(names, vec![".", "..", "a", "b"]);
    }

    #[test]
    fn readdir_skips_unlinked_slots() {
        let mut buf = mounted(64, 16);
        let mut fs = Filesystem::format(&mut buf, 64, 16).unwrap();
        fs.create(InodeNum::ROOT, "a", 0o644).unwrap();
        fs.create(InodeNum::ROOT, "b", 0o644).unwrap();
        fs.unlink(InodeNum::ROOT, "a").unwrap();

        let mut names = Vec::new();
        let mut cursor = 0;
        while let Some((entry, next)) = fs.readdir(InodeNum::ROOT, cursor).unwrap() {
            names.push(entry.name);
            cursor = next;
        }
        assert_eq!(names, vec![".", "..", "b"]);
    }

    #[test]
    fn create_rejects_duplicate_and_long_names() {
        let mut buf = mounted(64, 16);
        let mut fs = Filesystem::format(&mut buf, 64, 16).unwrap();
        fs.create(InodeNum::ROOT, "a", 0o644).unwrap();
        assert_eq!(
            fs.create(InodeNum::ROOT, "a", 0o644),
            Err(OspfsError::Exists)
        );
        let long = "x".repeat(MAXNAMELEN + 1);
        assert_eq!(
            fs.create(InodeNum::ROOT, &long, 0o644),
            Err(OspfsError::NameTooLong)
        );
    }

    #[test]
    fn setattr_rejects_directory_truncate() {
        let mut buf = mounted(64, 16);
        let mut fs = Filesystem::format(&mut buf, 64, 16).unwrap();
        assert_eq!(
            fs.setattr(InodeNum::ROOT, Some(0), None),
            Err(OspfsError::Permission)
        );
    }

    #[test]
    fn setattr_truncates_and_changes_mode() {
        let mut buf = mounted(64, 16);
        let mut fs = Filesystem::format(&mut buf, 64, 16).unwrap();
        let a = fs.create(InodeNum::ROOT, "a", 0o644).unwrap();
        fs.write(a, 0, &vec![b'x'; 2000], false).unwrap();
        fs.setattr(a, Some(10), Some(0o600)).unwrap();
        let inode = fs.image.read_inode(a.0).unwrap();
        assert_eq!(inode.size, 10);
        assert_eq!(inode.mode, 0o600);
    }

    /// Counts the data and scaffolding blocks currently attached to one
    /// inode: every non-zero `direct[]` slot, the indirect block (if any)
    /// plus its non-zero leaf slots, and the doubly-indirect block (if any)
    /// plus its non-zero outer/leaf slots. Symlinks and free slots hold no
    /// block pointers at all.
    fn blocks_referenced_by(image: &Image, inode: &Inode) -> u32 {
        if inode.is_free() || inode.ftype == FileType::Symlink {
            return 0;
        }
        let mut count = 0u32;
        for &d in inode.direct.iter() {
            if d != 0 {
                count += 1;
            }
        }
        if inode.indirect != 0 {
            count += 1;
            for slot in 0..crate::image::NI {
                if image.indirect_get(inode.indirect, slot) != 0 {
                    count += 1;
                }
            }
        }
        if inode.indirect2 != 0 {
            count += 1;
            for outer in 0..crate::image::NI {
                let outer_block = image.indirect_get(inode.indirect2, outer);
                if outer_block != 0 {
                    count += 1;
                    for inner in 0..crate::image::NI {
                        if image.indirect_get(outer_block, inner) != 0 {
                            count += 1;
                        }
                    }
                }
            }
        }
        count
    }

    /// Property 1 (`spec.md` §8): after a sequence of create/write/unlink
    /// operations, the number of free bitmap bits beyond `first_data_block`
    /// equals the total data/indirect/doubly-indirect blocks referenced by
    /// live inodes, subtracted from the total number of data blocks.
    #[test]
    fn bitmap_free_count_matches_live_inode_references() {
        let mut buf = mounted(2048, 32);
        let mut fs = Filesystem::format(&mut buf, 2048, 32).unwrap();

        let a = fs.create(InodeNum::ROOT, "a", 0o644).unwrap();
        fs.write(a, 0, &vec![b'a'; 3000], false).unwrap();
        let b = fs.create(InodeNum::ROOT, "b", 0o644).unwrap();
        fs.write(b, 0, &vec![b'b'; (ND as u32 + 5) * BLOCK_SIZE], false)
            .unwrap();
        fs.link(InodeNum::ROOT, a, "a2").unwrap();
        fs.unlink(InodeNum::ROOT, "a").unwrap();
        let c = fs.create(InodeNum::ROOT, "c", 0o644).unwrap();
        fs.write(c, 0, b"small", false).unwrap();
        fs.symlink(InodeNum::ROOT, "link", "/somewhere").unwrap();

        let first_data = fs.image.superblock().first_data_block();
        let nblocks = fs.image.nblocks();
        let mut free_bits = 0u32;
        for n in first_data..nblocks {
            if fs.image.bit_is_free(n) {
                free_bits += 1;
            }
        }

        let mut referenced = 0u32;
        for i in 1..fs.image.ninodes() {
            let inode = fs.image.read_inode(i).unwrap();
            referenced += blocks_referenced_by(&fs.image, &inode);
        }

        assert_eq!(free_bits + referenced, nblocks - first_data);
    }

    /// Property 2 (`spec.md` §8): for every live inode and every byte offset
    /// in `[0, size)`, the block the map resolves to is currently allocated
    /// (bit = 0) and outside the reserved range.
    #[test]
    fn every_live_byte_resolves_to_an_allocated_non_reserved_block() {
        let mut buf = mounted(2048, 32);
        let mut fs = Filesystem::format(&mut buf, 2048, 32).unwrap();

        let a = fs.create(InodeNum::ROOT, "a", 0o644).unwrap();
        fs.write(a, 0, &vec![b'a'; (ND as u32 + 3) * BLOCK_SIZE], false)
            .unwrap();
        let b = fs.create(InodeNum::ROOT, "b", 0o644).unwrap();
        fs.write(b, 0, b"tiny", false).unwrap();
        fs.unlink(InodeNum::ROOT, "b").unwrap();
        let c = fs.create(InodeNum::ROOT, "c", 0o644).unwrap();
        fs.write(c, 0, &vec![b'c'; 50], false).unwrap();

        let first_data = fs.image.superblock().first_data_block();
        for i in 1..fs.image.ninodes() {
            let inode = fs.image.read_inode(i).unwrap();
            if inode.is_free() || inode.ftype == FileType::Symlink {
                continue;
            }
            let nblocks = crate::image::size_to_nblocks(inode.size);
            for k in 0..nblocks {
                let blockno = inode.block_of(&fs.image, k).unwrap();
                assert!(blockno >= first_data, "block {blockno} is reserved");
                assert!(
                    !fs.image.bit_is_free(blockno),
                    "block {blockno} is marked free while still referenced"
                );
            }
        }
    }
}
