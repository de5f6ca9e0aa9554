//! Directory layer: fixed-size 128-byte slots, unlike ext2's variable-length
//! entries.
//!
//! Grounded on `find_direntry`/`create_blank_direntry` in `ospfsmod.c`. The
//! teacher's `DirectoryEntry` (`file/fs/ext2/directory_entry.rs`, read for
//! reference but not carried over) splits and merges variable-length
//! records as entries are added and removed; OSPFS has no such logic since
//! every slot is the same size and an empty slot is just `ino == 0`.

use crate::error::{OspfsError, Result};
use crate::image::{Image, DIRENT_SIZE, MAXNAMELEN};
use crate::inode::Inode;

/// One directory slot, decoded from its 128-byte on-disk record.
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub ino: u32,
    pub name: String,
}

const NAME_FIELD_LEN: usize = DIRENT_SIZE as usize - 4;

fn decode_slot(buf: &[u8]) -> Option<DirEntry> {
    let ino = u32::from_le_bytes(buf[0..4].try_into().unwrap());
    if ino == 0 {
        return None;
    }
    let name_bytes = &buf[4..4 + NAME_FIELD_LEN];
    let nul = name_bytes.iter().position(|&b| b == 0).unwrap_or(name_bytes.len());
    let name = core::str::from_utf8(&name_bytes[..nul])
        .ok()?
        .to_string();
    Some(DirEntry { ino, name })
}

fn encode_slot(buf: &mut [u8], ino: u32, name: &str) {
    buf[0..4].copy_from_slice(&ino.to_le_bytes());
    let name_field = &mut buf[4..4 + NAME_FIELD_LEN];
    name_field.fill(0);
    name_field[..name.len()].copy_from_slice(name.as_bytes());
}

fn slots_per_block() -> u32 {
    crate::image::BLOCK_SIZE / DIRENT_SIZE
}

/// Iterates every slot of `dir`'s data, calling `f(slot_index, block, offset_in_block)`
/// for each one. `slot_index` is a dense 0-based index across the whole
/// directory, independent of block boundaries.
fn for_each_slot<E>(
    image: &Image,
    dir: &Inode,
    mut f: impl FnMut(u32, &[u8]) -> core::result::Result<bool, E>,
) -> core::result::Result<(), E>
where
    E: From<OspfsError>,
{
    let nblocks = crate::image::size_to_nblocks(dir.size);
    let per_block = slots_per_block();
    let mut slot_index = 0u32;
    for b in 0..nblocks {
        let block_no = dir.block_of(image, b).map_err(E::from)?;
        let block = image.block(block_no);
        for s in 0..per_block {
            let off = (s * DIRENT_SIZE) as usize;
            let done = f(slot_index, &block[off..off + DIRENT_SIZE as usize])?;
            if done {
                return Ok(());
            }
            slot_index += 1;
        }
    }
    Ok(())
}

/// Looks up `name` in `dir`'s slots. `spec.md` §4.5.
pub fn find(image: &Image, dir: &Inode, name: &str) -> Result<Option<u32>> {
    let mut found = None;
    for_each_slot::<OspfsError>(image, dir, |_, slot| {
        if let Some(entry) = decode_slot(slot) {
            if entry.name == name {
                found = Some(entry.ino);
                return Ok(true);
            }
        }
        Ok(false)
    })?;
    Ok(found)
}

/// Returns the entry at dense slot index `cursor`, skipping empty slots,
/// along with the cursor to resume from. `spec.md` §4.5/§4.7 (`readdir`).
pub fn read_at(image: &Image, dir: &Inode, cursor: u32) -> Result<Option<(DirEntry, u32)>> {
    let mut result = None;
    for_each_slot::<OspfsError>(image, dir, |idx, slot| {
        if idx < cursor {
            return Ok(false);
        }
        if let Some(entry) = decode_slot(slot) {
            result = Some((entry, idx + 1));
            return Ok(true);
        }
        Ok(false)
    })?;
    Ok(result)
}

/// Finds the first empty slot (`ino == 0`) inside the directory's existing
/// blocks, returning its dense slot index. `None` if every existing block is
/// full and the directory must grow. `spec.md` §4.5 / `ospfsmod.c`'s
/// `create_blank_direntry`.
fn find_blank_slot(image: &Image, dir: &Inode) -> Result<Option<u32>> {
    let mut found = None;
    for_each_slot::<OspfsError>(image, dir, |idx, slot| {
        let ino = u32::from_le_bytes(slot[0..4].try_into().unwrap());
        if ino == 0 {
            found = Some(idx);
            return Ok(true);
        }
        Ok(false)
    })?;
    Ok(found)
}

fn write_slot(image: &mut Image, dir: &Inode, slot_index: u32, ino: u32, name: &str) -> Result<()> {
    let per_block = slots_per_block();
    let block_idx = slot_index / per_block;
    let in_block = slot_index % per_block;
    let block_no = dir.block_of(image, block_idx)?;
    let off = (in_block * DIRENT_SIZE) as usize;
    encode_slot(&mut image.block_mut(block_no)[off..off + DIRENT_SIZE as usize], ino, name);
    Ok(())
}

/// Allocates a blank slot for `name` -> `ino`, growing the directory by one
/// block if every existing slot is occupied. `spec.md` §4.5/§4.7.
pub fn create_blank(
    image: &mut Image,
    dir_ino_num: u32,
    dir: &mut Inode,
    ino: u32,
    name: &str,
) -> Result<()> {
    if name.is_empty() || name.len() > MAXNAMELEN {
        return Err(OspfsError::NameTooLong);
    }
    if find(image, dir, name)?.is_some() {
        return Err(OspfsError::Exists);
    }

    let slot = match find_blank_slot(image, dir)? {
        Some(idx) => idx,
        None => {
            let per_block = slots_per_block();
            let old_size = dir.size;
            let new_size = old_size + crate::image::BLOCK_SIZE;
            crate::size::change_size(image, dir, new_size)?;
            crate::image::size_to_nblocks(old_size) * per_block
        }
    };
    write_slot(image, dir, slot, ino, name)?;
    image.write_inode(dir_ino_num, dir)?;
    log::trace!("dir: created entry {name:?} -> inode {ino} in directory {dir_ino_num}");
    Ok(())
}

/// Clears the slot holding `name`, freeing it for reuse. `spec.md` §4.5/§4.7.
pub fn mark_free(image: &mut Image, dir: &Inode, name: &str) -> Result<u32> {
    let mut target: Option<(u32, u32)> = None;
    for_each_slot::<OspfsError>(image, dir, |idx, slot| {
        if let Some(entry) = decode_slot(slot) {
            if entry.name == name {
                target = Some((idx, entry.ino));
                return Ok(true);
            }
        }
        Ok(false)
    })?;

    let (idx, ino) = target.ok_or(OspfsError::NotFound)?;
    let per_block = slots_per_block();
    let block_idx = idx / per_block;
    let in_block = idx % per_block;
    let block_no = dir.block_of(image, block_idx)?;
    let off = (in_block * DIRENT_SIZE) as usize;
    image.block_mut(block_no)[off..off + 4].copy_from_slice(&0u32.to_le_bytes());
    log::trace!("dir: removed entry {name:?} (was inode {ino})");
    Ok(ino)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::BLOCK_SIZE;

    fn fresh_dir_setup(nblocks: u32, ninodes: u32) -> (Vec<u8>, u32) {
        let buf = vec![0u8; nblocks as usize * BLOCK_SIZE as usize];
        (buf, ninodes)
    }

    #[test]
    fn create_find_and_remove_round_trip() {
        let (mut buf, ninodes) = fresh_dir_setup(64, 16);
        let mut image = Image::format(&mut buf, 64, ninodes).unwrap();
        let mut dir = image.read_inode(crate::image::ROOT_INODE).unwrap();

        create_blank(&mut image, crate::image::ROOT_INODE, &mut dir, 5, "hello").unwrap();
        assert_eq!(find(&image, &dir, "hello").unwrap(), Some(5));

        let removed = mark_free(&mut image, &dir, "hello").unwrap();
        assert_eq!(removed, 5);
        assert_eq!(find(&image, &dir, "hello").unwrap(), None);
    }

    #[test]
    fn create_rejects_duplicate_name() {
        let (mut buf, ninodes) = fresh_dir_setup(64, 16);
        let mut image = Image::format(&mut buf, 64, ninodes).unwrap();
        let mut dir = image.read_inode(crate::image::ROOT_INODE).unwrap();
        create_blank(&mut image, crate::image::ROOT_INODE, &mut dir, 5, "a").unwrap();
        assert_eq!(
            create_blank(&mut image, crate::image::ROOT_INODE, &mut dir, 6, "a"),
            Err(OspfsError::Exists)
        );
    }

    #[test]
    fn create_grows_directory_when_block_full() {
        let (mut buf, ninodes) = fresh_dir_setup(2048, 32);
        let mut image = Image::format(&mut buf, 2048, ninodes).unwrap();
        let mut dir = image.read_inode(crate::image::ROOT_INODE).unwrap();

        let per_block = slots_per_block();
        for i in 0..per_block {
            create_blank(&mut image, crate::image::ROOT_INODE, &mut dir, i + 2, &format!("f{i}"))
                .unwrap();
        }
        assert_eq!(dir.size, BLOCK_SIZE);
        create_blank(&mut image, crate::image::ROOT_INODE, &mut dir, 999, "overflow").unwrap();
        assert_eq!(dir.size, BLOCK_SIZE * 2);
        assert_eq!(find(&image, &dir, "overflow").unwrap(), Some(999));
    }

    #[test]
    fn freed_slot_is_reused() {
        let (mut buf, ninodes) = fresh_dir_setup(64, 16);
        let mut image = Image::format(&mut buf, 64, ninodes).unwrap();
        let mut dir = image.read_inode(crate::image::ROOT_INODE).unwrap();
        create_blank(&mut image, crate::image::ROOT_INODE, &mut dir, 5, "a").unwrap();
        mark_free(&mut image, &dir, "a").unwrap();
        let size_before = dir.size;
        create_blank(&mut image, crate::image::ROOT_INODE, &mut dir, 6, "b").unwrap();
        assert_eq!(dir.size, size_before);
        assert_eq!(find(&image, &dir, "b").unwrap(), Some(6));
    }

    #[test]
    fn name_too_long_is_rejected() {
        let (mut buf, ninodes) = fresh_dir_setup(64, 16);
        let mut image = Image::format(&mut buf, 64, ninodes).unwrap();
        let mut dir = image.read_inode(crate::image::ROOT_INODE).unwrap();
        let long = "x".repeat(MAXNAMELEN + 1);
        assert_eq!(
            create_blank(&mut image, crate::image::ROOT_INODE, &mut dir, 5, &long),
            Err(OspfsError::NameTooLong)
        );
    }
}
