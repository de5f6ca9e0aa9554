//! The image layer: typed, bounds-checked views over the backing byte buffer.
//!
//! Grounded on `Superblock::read`/`write` and `read_block`/`write_block` in
//! the teacher's `file/fs/ext2/mod.rs`, simplified from ext2's block-group
//! layout down to OSPFS's flat one: a single free-bitmap run starting at
//! block 2 and a single inode-table run starting at `firstinob` (`spec.md`
//! §3/§6 has no block groups).

use crate::error::{OspfsError, Result};

/// Fixed block size in bytes. `spec.md` §6.
pub const BLOCK_SIZE: u32 = 1024;
/// On-disk size of one inode record. `spec.md` §3/§6.
pub const INODE_SIZE: u32 = 64;
/// On-disk size of one directory slot. `spec.md` §3/§6.
pub const DIRENT_SIZE: u32 = 128;
/// Number of direct block slots per inode.
pub const ND: usize = 10;
/// Number of block numbers per indirect block (`B / 4`).
pub const NI: usize = (BLOCK_SIZE / 4) as usize;
/// Maximum length of a directory entry name, not counting the NUL terminator.
pub const MAXNAMELEN: usize = 58;
/// Maximum length of a symlink target, not counting the NUL terminator.
///
/// The payload shares the `direct[ND] + indirect + indirect2` region of the
/// inode (`spec.md` §9): with `ND = 10` that region is
/// `ND*4 + 4 + 4 = 48` bytes, one of which is reserved for the terminator.
/// `spec.md` §6 states `MAXSYMLINKLEN = 60`, which cannot fit in a 64-byte
/// inode alongside `ND = 10` direct slots; this implementation follows the
/// geometry (ND, 64-byte inode) rather than the conflicting literal, since
/// the geometry is load-bearing for the rest of the byte-exact layout. See
/// `DESIGN.md`.
pub const MAXSYMLINKLEN: usize = ND * 4 + 4 + 4 - 1;
/// Maximum number of blocks a file can address:
/// direct + single-indirect + doubly-indirect capacity.
pub const MAXFILEBLOCKS: u64 = ND as u64 + NI as u64 + (NI as u64) * (NI as u64);

/// The magic number stamped into a freshly formatted image's superblock.
pub const OSPFS_MAGIC: u32 = 0x4f53_5046; // "OSPF"

/// Block 0 is the (ignored) boot sector.
const BOOT_BLOCK: u32 = 0;
/// Block 1 holds the superblock.
const SUPERBLOCK_BLOCK: u32 = 1;
/// The free bitmap begins at block 2.
const FREEMAP_START_BLOCK: u32 = 2;
/// Inode 1 is always the root directory (`spec.md` §3).
pub const ROOT_INODE: u32 = 1;

/// Rounds `size` bytes up to a number of blocks. `spec.md` §4.1.
pub fn size_to_nblocks(size: u32) -> u32 {
    (size + BLOCK_SIZE - 1) / BLOCK_SIZE
}

/// The in-memory view of the fixed-offset superblock fields.
#[derive(Debug, Clone, Copy)]
pub struct Superblock {
    pub magic: u32,
    pub nblocks: u32,
    pub ninodes: u32,
    pub firstinob: u32,
}

impl Superblock {
    const MAGIC_OFF: usize = 0;
    const NBLOCKS_OFF: usize = 4;
    const NINODES_OFF: usize = 8;
    const FIRSTINOB_OFF: usize = 12;

    fn read_from(block: &[u8]) -> Self {
        Superblock {
            magic: read_u32(block, Self::MAGIC_OFF),
            nblocks: read_u32(block, Self::NBLOCKS_OFF),
            ninodes: read_u32(block, Self::NINODES_OFF),
            firstinob: read_u32(block, Self::FIRSTINOB_OFF),
        }
    }

    fn write_to(&self, block: &mut [u8]) {
        write_u32(block, Self::MAGIC_OFF, self.magic);
        write_u32(block, Self::NBLOCKS_OFF, self.nblocks);
        write_u32(block, Self::NINODES_OFF, self.ninodes);
        write_u32(block, Self::FIRSTINOB_OFF, self.firstinob);
    }

    /// Number of blocks occupied by the inode table.
    pub fn inode_table_blocks(&self) -> u32 {
        size_to_nblocks(self.ninodes * INODE_SIZE)
    }

    /// Number of blocks occupied by the free bitmap.
    pub fn bitmap_blocks(&self) -> u32 {
        let bitmap_bytes = (self.nblocks + 7) / 8;
        size_to_nblocks(bitmap_bytes)
    }

    /// The first block number a caller (or the allocator) may ever hand out.
    pub fn first_data_block(&self) -> u32 {
        self.firstinob + self.inode_table_blocks()
    }
}

fn read_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes(buf[off..off + 4].try_into().unwrap())
}

fn write_u32(buf: &mut [u8], off: usize, v: u32) {
    buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
}

/// A typed, bounds-checked view over the caller-owned backing buffer.
///
/// The core never allocates host memory for file contents (`spec.md` §1): it
/// borrows the buffer for the lifetime `'a` and writes through it directly.
pub struct Image<'a> {
    buf: &'a mut [u8],
    superblock: Superblock,
}

impl<'a> Image<'a> {
    /// Mounts an existing, well-formed image.
    pub fn mount(buf: &'a mut [u8]) -> Result<Self> {
        if buf.len() < (SUPERBLOCK_BLOCK as usize + 1) * BLOCK_SIZE as usize {
            return Err(OspfsError::Io);
        }
        let sb_off = SUPERBLOCK_BLOCK as usize * BLOCK_SIZE as usize;
        let superblock = Superblock::read_from(&buf[sb_off..sb_off + BLOCK_SIZE as usize]);
        if superblock.magic != OSPFS_MAGIC {
            return Err(OspfsError::Io);
        }
        if (superblock.nblocks as usize) * BLOCK_SIZE as usize > buf.len() {
            return Err(OspfsError::Io);
        }
        Ok(Image { buf, superblock })
    }

    /// Formats a fresh image in `buf`: writes the superblock, marks every
    /// reserved block allocated in the free bitmap, and initializes inode 1
    /// as an empty root directory. Supplemental to `spec.md` (§3 of
    /// `SPEC_FULL.md`): every Testable Property in `spec.md` §8 assumes a
    /// "fresh image" already exists, and nothing else in this crate can
    /// conjure one.
    pub fn format(buf: &'a mut [u8], nblocks: u32, ninodes: u32) -> Result<Self> {
        let min_len = (nblocks as u64) * (BLOCK_SIZE as u64);
        if (buf.len() as u64) < min_len || nblocks < FREEMAP_START_BLOCK + 1 || ninodes < 2 {
            return Err(OspfsError::Io);
        }
        for b in buf.iter_mut() {
            *b = 0;
        }

        let mut superblock = Superblock {
            magic: OSPFS_MAGIC,
            nblocks,
            ninodes,
            firstinob: 0,
        };
        let bitmap_blocks = superblock.bitmap_blocks();
        superblock.firstinob = FREEMAP_START_BLOCK + bitmap_blocks;
        let first_data = superblock.first_data_block();
        if first_data >= nblocks {
            return Err(OspfsError::Io);
        }

        let sb_off = SUPERBLOCK_BLOCK as usize * BLOCK_SIZE as usize;
        superblock.write_to(&mut buf[sb_off..sb_off + BLOCK_SIZE as usize]);

        let mut image = Image { buf, superblock };

        // Every block is free except the boot sector, superblock, bitmap
        // blocks, and inode table: mark the whole image free, then reserve
        // the prefix. A bit value of 1 means free (`spec.md` §3).
        for i in FREEMAP_START_BLOCK..nblocks {
            image.set_bitmap_bit(i, true);
        }
        for i in BOOT_BLOCK..first_data {
            image.set_bitmap_bit(i, false);
        }

        // Inode 0 is reserved and never used; leave it zeroed (ftype = Free,
        // nlink = 0). Inode 1 is the root directory.
        let root = crate::inode::Inode {
            size: 0,
            ftype: crate::inode::FileType::Directory,
            nlink: 1,
            mode: 0o755,
            direct: [0; ND],
            indirect: 0,
            indirect2: 0,
        };
        image.write_inode(ROOT_INODE, &root)?;

        log::debug!(
            "formatted image: nblocks={nblocks} ninodes={ninodes} firstinob={}",
            image.superblock.firstinob
        );
        Ok(image)
    }

    pub fn superblock(&self) -> &Superblock {
        &self.superblock
    }

    /// A bounds-checked immutable view of block `n`.
    ///
    /// Out-of-range `n` is a programming error (`spec.md` §4.1): the core
    /// never constructs an out-of-range block number itself, so this panics
    /// rather than threading an error through every block access.
    pub fn block(&self, n: u32) -> &[u8] {
        let off = n as usize * BLOCK_SIZE as usize;
        &self.buf[off..off + BLOCK_SIZE as usize]
    }

    /// A bounds-checked mutable view of block `n`. See [`Image::block`].
    pub fn block_mut(&mut self, n: u32) -> &mut [u8] {
        let off = n as usize * BLOCK_SIZE as usize;
        &mut self.buf[off..off + BLOCK_SIZE as usize]
    }

    pub fn zero_block(&mut self, n: u32) {
        self.block_mut(n).fill(0);
    }

    /// Reads a `u32` block pointer out of an indirect block at slot `idx`.
    pub fn indirect_get(&self, block: u32, idx: usize) -> u32 {
        read_u32(self.block(block), idx * 4)
    }

    /// Writes a `u32` block pointer into an indirect block at slot `idx`.
    pub fn indirect_set(&mut self, block: u32, idx: usize, value: u32) {
        write_u32(self.block_mut(block), idx * 4, value)
    }

    /// Bit `i` of the free bitmap: `true` means free. `spec.md` §3.
    fn bitmap_bit(&self, i: u32) -> bool {
        let byte = FREEMAP_START_BLOCK as usize * BLOCK_SIZE as usize + (i / 8) as usize;
        (self.buf[byte] & (1 << (i % 8))) != 0
    }

    fn set_bitmap_bit(&mut self, i: u32, free: bool) {
        let byte = FREEMAP_START_BLOCK as usize * BLOCK_SIZE as usize + (i / 8) as usize;
        if free {
            self.buf[byte] |= 1 << (i % 8);
        } else {
            self.buf[byte] &= !(1 << (i % 8));
        }
    }

    pub(crate) fn bit_is_free(&self, n: u32) -> bool {
        self.bitmap_bit(n)
    }

    pub(crate) fn set_bit_free(&mut self, n: u32, free: bool) {
        self.set_bitmap_bit(n, free)
    }

    /// Whether `n` falls in the layout's reserved range: boot sector,
    /// superblock, bitmap blocks, or inode-table blocks. `spec.md` §3/§4.2.
    pub(crate) fn is_reserved(&self, n: u32) -> bool {
        n < self.superblock.first_data_block()
    }

    /// Returns the byte offset of inode `i`'s record, or `None` if
    /// `i >= ninodes`. `spec.md` §4.1.
    fn inode_offset(&self, i: u32) -> Option<usize> {
        if i >= self.superblock.ninodes {
            return None;
        }
        let inode_byte = i as u64 * INODE_SIZE as u64;
        let block = self.superblock.firstinob as u64 + inode_byte / BLOCK_SIZE as u64;
        let in_block = inode_byte % BLOCK_SIZE as u64;
        Some((block * BLOCK_SIZE as u64 + in_block) as usize)
    }

    /// Reads inode `i`, or `None` if `i >= ninodes`. `spec.md` §4.1.
    pub fn read_inode(&self, i: u32) -> Result<crate::inode::Inode> {
        let off = self.inode_offset(i).ok_or(OspfsError::Io)?;
        Ok(crate::inode::Inode::read_from(&self.buf[off..off + INODE_SIZE as usize]))
    }

    pub fn write_inode(&mut self, i: u32, inode: &crate::inode::Inode) -> Result<()> {
        let off = self.inode_offset(i).ok_or(OspfsError::Io)?;
        inode.write_to(&mut self.buf[off..off + INODE_SIZE as usize]);
        Ok(())
    }

    pub fn ninodes(&self) -> u32 {
        self.superblock.ninodes
    }

    pub fn nblocks(&self) -> u32 {
        self.superblock.nblocks
    }
}
