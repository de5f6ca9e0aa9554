//! Free-block allocator: first-fit ascending scan over the image's bitmap.
//!
//! Grounded on `allocate_block`/`free_block` in `ospfsmod.c` (scan forward
//! from the first data block, bit value 1 means free) and the teacher's
//! `search_bitmap`/`mark_block_used`/`free_block` in `ext2::Superblock`.

use crate::error::{OspfsError, Result};
use crate::image::Image;

/// Scans ascending from the first data block and returns the first free
/// block, marking it allocated. Returns `OspfsError::NoSpace` if none is
/// free. `spec.md` §4.2.
pub fn allocate(image: &mut Image) -> Result<u32> {
    let nblocks = image.nblocks();
    let first_data = image.superblock().first_data_block();
    for n in first_data..nblocks {
        if image.bit_is_free(n) {
            image.set_bit_free(n, false);
            log::trace!("bitmap: allocated block {n}");
            return Ok(n);
        }
    }
    log::debug!("bitmap: allocation failed, no free blocks");
    Err(OspfsError::NoSpace)
}

/// Marks block `n` free. A no-op if `n` falls in the reserved range (boot,
/// superblock, bitmap, inode table) or is out of range, matching
/// `ospfsmod.c`'s `free_block`, which just `return`s in those cases rather
/// than reporting an error. `spec.md` §4.2.
pub fn free(image: &mut Image, n: u32) {
    if n >= image.nblocks() || image.is_reserved(n) {
        log::trace!("bitmap: refusing to free reserved/out-of-range block {n}");
        return;
    }
    image.set_bit_free(n, true);
    log::trace!("bitmap: freed block {n}");
}
