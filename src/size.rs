//! The size manager: grows and shrinks a file's block map, one block at a
//! time, with rollback of any freshly-allocated scaffolding on failure.
//!
//! Grounded on `ospfsmod.c`'s `add_block`/`remove_block`/`change_size`; the
//! rollback here is this crate's generalization of that C code's
//! `ERR_HANDLE` label cleanup (`spec.md` §4.4/§9).

use crate::bitmap;
use crate::error::{OspfsError, Result};
use crate::image::{size_to_nblocks, Image, MAXFILEBLOCKS};
use crate::inode::{locate, BlockLocation, Inode};

/// Appends logical block `idx` (the file's current block count) to `inode`,
/// allocating indirect/doubly-indirect scaffolding as needed. On failure,
/// any scaffolding block allocated *by this call* is freed before returning,
/// leaving `inode` exactly as it was on entry. `spec.md` §4.4.
fn add_block(image: &mut Image, inode: &mut Inode, idx: u32) -> Result<()> {
    match locate(idx) {
        BlockLocation::Direct(d) => {
            let blk = bitmap::allocate(image)?;
            image.zero_block(blk);
            inode.direct[d] = blk;
            log::trace!("size: attached direct block {blk} at index {idx}");
            Ok(())
        }
        BlockLocation::Indirect(slot) => {
            let allocated_indirect = inode.indirect == 0;
            if allocated_indirect {
                let ib = bitmap::allocate(image)?;
                image.zero_block(ib);
                inode.indirect = ib;
            }
            match bitmap::allocate(image) {
                Ok(blk) => {
                    image.zero_block(blk);
                    image.indirect_set(inode.indirect, slot, blk);
                    log::trace!("size: attached indirect block {blk} at index {idx}");
                    Ok(())
                }
                Err(e) => {
                    if allocated_indirect {
                        bitmap::free(image, inode.indirect);
                        inode.indirect = 0;
                    }
                    Err(e)
                }
            }
        }
        BlockLocation::Indirect2 { outer, inner } => {
            let allocated_indirect2 = inode.indirect2 == 0;
            if allocated_indirect2 {
                let b = match bitmap::allocate(image) {
                    Ok(b) => b,
                    Err(e) => return Err(e),
                };
                image.zero_block(b);
                inode.indirect2 = b;
            }

            let existing_outer = image.indirect_get(inode.indirect2, outer);
            let allocated_outer = existing_outer == 0;
            let outer_block = if allocated_outer {
                match bitmap::allocate(image) {
                    Ok(b) => {
                        image.zero_block(b);
                        image.indirect_set(inode.indirect2, outer, b);
                        b
                    }
                    Err(e) => {
                        if allocated_indirect2 {
                            bitmap::free(image, inode.indirect2);
                            inode.indirect2 = 0;
                        }
                        return Err(e);
                    }
                }
            } else {
                existing_outer
            };

            match bitmap::allocate(image) {
                Ok(blk) => {
                    image.zero_block(blk);
                    image.indirect_set(outer_block, inner, blk);
                    log::trace!("size: attached doubly-indirect block {blk} at index {idx}");
                    Ok(())
                }
                Err(e) => {
                    if allocated_outer {
                        bitmap::free(image, outer_block);
                        image.indirect_set(inode.indirect2, outer, 0);
                    }
                    if allocated_indirect2 {
                        bitmap::free(image, inode.indirect2);
                        inode.indirect2 = 0;
                    }
                    Err(e)
                }
            }
        }
        BlockLocation::OutOfRange => Err(OspfsError::NoSpace),
    }
}

/// Detaches logical block `idx` (the file's last block), freeing its data
/// block and, if it was the last occupant, the indirect/doubly-indirect
/// scaffolding that addressed it. `spec.md` §4.4.
fn remove_block(image: &mut Image, inode: &mut Inode, idx: u32) -> Result<()> {
    match locate(idx) {
        BlockLocation::Direct(d) => {
            let blk = inode.direct[d];
            if blk != 0 {
                bitmap::free(image, blk);
            }
            inode.direct[d] = 0;
            Ok(())
        }
        BlockLocation::Indirect(slot) => {
            if inode.indirect == 0 {
                return Err(OspfsError::Io);
            }
            let blk = image.indirect_get(inode.indirect, slot);
            if blk != 0 {
                bitmap::free(image, blk);
            }
            image.indirect_set(inode.indirect, slot, 0);
            if slot == 0 {
                bitmap::free(image, inode.indirect);
                inode.indirect = 0;
            }
            Ok(())
        }
        BlockLocation::Indirect2 { outer, inner } => {
            if inode.indirect2 == 0 {
                return Err(OspfsError::Io);
            }
            let outer_block = image.indirect_get(inode.indirect2, outer);
            if outer_block == 0 {
                return Err(OspfsError::Io);
            }
            let blk = image.indirect_get(outer_block, inner);
            if blk != 0 {
                bitmap::free(image, blk);
            }
            image.indirect_set(outer_block, inner, 0);
            if inner == 0 {
                bitmap::free(image, outer_block);
                image.indirect_set(inode.indirect2, outer, 0);
                if outer == 0 {
                    bitmap::free(image, inode.indirect2);
                    inode.indirect2 = 0;
                }
            }
            Ok(())
        }
        BlockLocation::OutOfRange => Err(OspfsError::Io),
    }
}

/// Grows or shrinks `inode` to `new_size` bytes, attaching or detaching
/// whole blocks one at a time. A growth failure rolls back every block this
/// call attached, restoring `inode` byte-for-byte; `inode.size` is only
/// updated once every block transfer has succeeded. `spec.md` §4.4.
pub fn change_size(image: &mut Image, inode: &mut Inode, new_size: u32) -> Result<()> {
    let old_nblocks = size_to_nblocks(inode.size);
    let new_nblocks = size_to_nblocks(new_size);

    if new_nblocks as u64 > MAXFILEBLOCKS {
        return Err(OspfsError::NoSpace);
    }

    if new_nblocks > old_nblocks {
        for idx in old_nblocks..new_nblocks {
            if let Err(e) = add_block(image, inode, idx) {
                for j in (old_nblocks..idx).rev() {
                    let _ = remove_block(image, inode, j);
                }
                log::debug!("size: change_size to {new_size} failed, rolled back");
                return Err(e);
            }
        }
    } else if new_nblocks < old_nblocks {
        for idx in (new_nblocks..old_nblocks).rev() {
            remove_block(image, inode, idx)?;
        }
    }

    inode.size = new_size;
    log::trace!("size: changed size to {new_size} ({new_nblocks} blocks)");
    Ok(())
}
