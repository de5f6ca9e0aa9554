//! Inode model and block-map resolution.
//!
//! Grounded on `Ext2INode::get_content_block_off`/`alloc_content_block` for
//! the three-tier resolution shape (ext2 has a fourth, triply-indirect tier;
//! OSPFS has none, so it's dropped) and `ospfsmod.c`'s `indir2_index`/
//! `indir_index`/`direct_index`/`ospfs_inode_blockno` for the exact index
//! arithmetic. Symlink encode/decode follows `ospfsmod.c`'s `ospfs_symlink`/
//! `ospfs_follow_link` byte-for-byte.

use crate::error::{OspfsError, Result};
use crate::image::{Image, INODE_SIZE, ND, NI};

/// The kind of object an inode describes. `spec.md` §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Free,
    Regular,
    Directory,
    Symlink,
}

impl FileType {
    fn from_u32(v: u32) -> Result<Self> {
        match v {
            0 => Ok(FileType::Free),
            1 => Ok(FileType::Regular),
            2 => Ok(FileType::Directory),
            3 => Ok(FileType::Symlink),
            _ => Err(OspfsError::Io),
        }
    }

    fn as_u32(self) -> u32 {
        match self {
            FileType::Free => 0,
            FileType::Regular => 1,
            FileType::Directory => 2,
            FileType::Symlink => 3,
        }
    }
}

/// The fixed-size, 64-byte on-disk inode record. `spec.md` §3/§6.
#[derive(Debug, Clone, Copy)]
pub struct Inode {
    pub size: u32,
    pub ftype: FileType,
    pub nlink: u32,
    pub mode: u32,
    pub direct: [u32; ND],
    pub indirect: u32,
    pub indirect2: u32,
}

const OFF_SIZE: usize = 0;
const OFF_FTYPE: usize = 4;
const OFF_NLINK: usize = 8;
const OFF_MODE: usize = 12;
const OFF_DIRECT: usize = 16;
const OFF_INDIRECT: usize = OFF_DIRECT + ND * 4; // 56
const OFF_INDIRECT2: usize = OFF_INDIRECT + 4; // 60

/// Number of bytes in the symlink-payload region: `direct[]` + `indirect` +
/// `indirect2`, the same bytes a regular/directory inode uses for its block
/// map. See `image::MAXSYMLINKLEN` for why this is 48, not 61.
const SYMLINK_REGION: usize = ND * 4 + 4 + 4;

impl Inode {
    pub fn read_from(buf: &[u8]) -> Self {
        debug_assert_eq!(buf.len(), INODE_SIZE as usize);
        let size = read_u32(buf, OFF_SIZE);
        let ftype = FileType::from_u32(read_u32(buf, OFF_FTYPE)).unwrap_or(FileType::Free);
        let nlink = read_u32(buf, OFF_NLINK);
        let mode = read_u32(buf, OFF_MODE);
        let mut direct = [0u32; ND];
        for (i, slot) in direct.iter_mut().enumerate() {
            *slot = read_u32(buf, OFF_DIRECT + i * 4);
        }
        let indirect = read_u32(buf, OFF_INDIRECT);
        let indirect2 = read_u32(buf, OFF_INDIRECT2);
        Inode {
            size,
            ftype,
            nlink,
            mode,
            direct,
            indirect,
            indirect2,
        }
    }

    pub fn write_to(&self, buf: &mut [u8]) {
        debug_assert_eq!(buf.len(), INODE_SIZE as usize);
        write_u32(buf, OFF_SIZE, self.size);
        write_u32(buf, OFF_FTYPE, self.ftype.as_u32());
        write_u32(buf, OFF_NLINK, self.nlink);
        write_u32(buf, OFF_MODE, self.mode);
        for (i, slot) in self.direct.iter().enumerate() {
            write_u32(buf, OFF_DIRECT + i * 4, *slot);
        }
        write_u32(buf, OFF_INDIRECT, self.indirect);
        write_u32(buf, OFF_INDIRECT2, self.indirect2);
    }

    pub fn is_free(&self) -> bool {
        self.nlink == 0
    }

    /// Raw symlink-payload view, reinterpreting `direct[]`/`indirect`/
    /// `indirect2` as one 48-byte byte string.
    fn symlink_bytes(&self) -> [u8; SYMLINK_REGION] {
        let mut out = [0u8; SYMLINK_REGION];
        let mut tmp = [0u8; INODE_SIZE as usize];
        self.write_to(&mut tmp);
        out.copy_from_slice(&tmp[OFF_DIRECT..OFF_DIRECT + SYMLINK_REGION]);
        out
    }

    fn set_symlink_bytes(&mut self, bytes: &[u8; SYMLINK_REGION]) {
        let mut tmp = [0u8; INODE_SIZE as usize];
        self.write_to(&mut tmp);
        tmp[OFF_DIRECT..OFF_DIRECT + SYMLINK_REGION].copy_from_slice(bytes);
        *self = Inode::read_from(&tmp);
    }
}

fn read_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes(buf[off..off + 4].try_into().unwrap())
}

fn write_u32(buf: &mut [u8], off: usize, v: u32) {
    buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
}

/// Where logical block `i` of a file lives in the three-tier block map.
/// `spec.md` §4.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockLocation {
    Direct(usize),
    Indirect(usize),
    Indirect2 { outer: usize, inner: usize },
    OutOfRange,
}

/// Classifies logical block index `i` (`spec.md` §4.3, `ospfsmod.c`'s
/// `direct_index`/`indir_index`/`indir2_index`).
pub fn locate(i: u32) -> BlockLocation {
    let i = i as u64;
    let nd = ND as u64;
    let ni = NI as u64;
    if i < nd {
        BlockLocation::Direct(i as usize)
    } else if i < nd + ni {
        BlockLocation::Indirect((i - nd) as usize)
    } else if i < nd + ni + ni * ni {
        let j = i - nd - ni;
        BlockLocation::Indirect2 {
            outer: (j / ni) as usize,
            inner: (j % ni) as usize,
        }
    } else {
        BlockLocation::OutOfRange
    }
}

impl Inode {
    /// Resolves logical block `i` to a physical block number.
    ///
    /// `i` must be within `[0, size_to_nblocks(self.size))`; a missing
    /// indirect/doubly-indirect scaffolding block, or a pointer that
    /// resolves to block 0, is a structural inconsistency (`Io`) rather than
    /// a hole — OSPFS files have no sparse regions (`spec.md` §1 Non-goals).
    pub fn block_of(&self, image: &Image, i: u32) -> Result<u32> {
        match locate(i) {
            BlockLocation::Direct(d) => {
                let b = self.direct[d];
                if b == 0 {
                    return Err(OspfsError::Io);
                }
                Ok(b)
            }
            BlockLocation::Indirect(slot) => {
                if self.indirect == 0 {
                    return Err(OspfsError::Io);
                }
                let b = image.indirect_get(self.indirect, slot);
                if b == 0 {
                    return Err(OspfsError::Io);
                }
                Ok(b)
            }
            BlockLocation::Indirect2 { outer, inner } => {
                if self.indirect2 == 0 {
                    return Err(OspfsError::Io);
                }
                let outer_block = image.indirect_get(self.indirect2, outer);
                if outer_block == 0 {
                    return Err(OspfsError::Io);
                }
                let b = image.indirect_get(outer_block, inner);
                if b == 0 {
                    return Err(OspfsError::Io);
                }
                Ok(b)
            }
            BlockLocation::OutOfRange => Err(OspfsError::Io),
        }
    }
}

/// Encodes a symlink target for on-disk storage.
///
/// If `target` begins with `?` and contains a `:`, it's treated as a
/// conditional symlink (`spec.md` §9): the part before the first `:` is the
/// root-only path, the part after is the fallback, stored as
/// `?root\0:other\0`. Otherwise `target` is stored as a plain
/// NUL-terminated string. Matches `ospfsmod.c`'s `ospfs_symlink` byte for
/// byte.
///
/// Returns the encoded bytes alongside the payload length that
/// `ospfsmod.c` stores in `oi_size`: every byte written except the final
/// NUL terminator (`strlen(qmark) + 1` / `strlen(symname)` there).
pub fn encode_symlink(target: &str) -> Result<([u8; SYMLINK_REGION], u32)> {
    let bytes = target.as_bytes();
    let mut out = [0u8; SYMLINK_REGION];

    if bytes.first() == Some(&b'?') {
        if let Some(colon) = bytes.iter().position(|&b| b == b':') {
            let root = &bytes[1..colon];
            let other = &bytes[colon + 1..];
            // Stored form: '?' root '\0' ':' other '\0'
            let needed = 1 + root.len() + 1 + 1 + other.len() + 1;
            if needed > SYMLINK_REGION {
                return Err(OspfsError::NameTooLong);
            }
            let mut pos = 0;
            out[pos] = b'?';
            pos += 1;
            out[pos..pos + root.len()].copy_from_slice(root);
            pos += root.len();
            out[pos] = 0;
            pos += 1;
            out[pos] = b':';
            pos += 1;
            out[pos..pos + other.len()].copy_from_slice(other);
            pos += other.len();
            out[pos] = 0;
            return Ok((out, (needed - 1) as u32));
        }
    }

    if bytes.len() + 1 > SYMLINK_REGION {
        return Err(OspfsError::NameTooLong);
    }
    out[..bytes.len()].copy_from_slice(bytes);
    Ok((out, bytes.len() as u32))
}

/// Decodes a symlink payload per `is_root`. Validates structure rather than
/// panicking or reading out of bounds on a malformed payload (`Io` on
/// failure): the stored resolution of `spec.md` §9's open question.
pub fn decode_symlink(payload: &[u8; SYMLINK_REGION], is_root: bool) -> Result<String> {
    if payload.first() == Some(&b'?') {
        let rest = &payload[1..];
        let nul = rest.iter().position(|&b| b == 0).ok_or(OspfsError::Io)?;
        let root = &rest[..nul];
        let after_root = &rest[nul + 1..];
        if after_root.first() != Some(&b':') {
            return Err(OspfsError::Io);
        }
        let other_region = &after_root[1..];
        let nul2 = other_region
            .iter()
            .position(|&b| b == 0)
            .ok_or(OspfsError::Io)?;
        let other = &other_region[..nul2];
        let chosen = if is_root { root } else { other };
        return core::str::from_utf8(chosen)
            .map(|s| s.to_string())
            .map_err(|_| OspfsError::Io);
    }

    let nul = payload.iter().position(|&b| b == 0).unwrap_or(payload.len());
    core::str::from_utf8(&payload[..nul])
        .map(|s| s.to_string())
        .map_err(|_| OspfsError::Io)
}

impl Inode {
    pub fn symlink_target(&self, is_root: bool) -> Result<String> {
        decode_symlink(&self.symlink_bytes(), is_root)
    }

    pub fn set_symlink_target(&mut self, target: &str) -> Result<()> {
        let (bytes, len) = encode_symlink(target)?;
        self.set_symlink_bytes(&bytes);
        self.size = len;
        Ok(())
    }
}
