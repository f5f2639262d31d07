//! Read-only block filesystem.
//!
//! The on-disk image is one contiguous byte blob: a single 4 KiB boot block
//! (dentry count / inode count / data-block count, then up to 63 packed
//! directory entries), followed by one 4 KiB inode block per file
//! (`file_length` plus up to 1023 data-block indices), followed by one
//! 4 KiB data block per entry in the combined inode tables.
//!
//! Rather than overlay `#[repr(C, packed)]` structs on the raw image (the
//! original's approach, which needs unsafe pointer casts end to end), this
//! module parses fields out of a `&[u8]` with explicit little-endian
//! offsets. That keeps every lookup/read path plain, host-testable logic —
//! see DESIGN.md for why this diverges from a literal struct-overlay port.

pub mod file_ops;

use crate::error::{FsError, KernelResult};
use spin::Mutex;

pub const BLOCK_SIZE: usize = 4096;
pub const FILE_NAME_LENGTH: usize = 32;
pub const DENTRY_SIZE: usize = 64;
pub const MAX_DENTRIES: usize = 63;
pub const MAX_DBLOCKS_PER_INODE: usize = 1023;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Rtc,
    Directory,
    Regular,
}

impl FileType {
    fn from_raw(raw: u32) -> KernelResult<Self> {
        match raw {
            0 => Ok(FileType::Rtc),
            1 => Ok(FileType::Directory),
            2 => Ok(FileType::Regular),
            _ => Err(FsError::NotFound.into()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Dentry {
    pub name: [u8; FILE_NAME_LENGTH],
    pub name_len: usize,
    pub file_type: FileType,
    pub inode_idx: u32,
}

fn le_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
}

/// A mounted filesystem image: just a borrowed byte slice plus the header
/// counts read out of its first block.
pub struct Filesystem<'a> {
    image: &'a [u8],
    dentry_count: u32,
    inode_count: u32,
    dblock_count: u32,
}

impl<'a> Filesystem<'a> {
    pub fn mount(image: &'a [u8]) -> Self {
        let dentry_count = le_u32(image, 0);
        let inode_count = le_u32(image, 4);
        let dblock_count = le_u32(image, 8);
        Filesystem {
            image,
            dentry_count,
            inode_count,
            dblock_count,
        }
    }

    fn dentry_at(&self, index: u32) -> KernelResult<Dentry> {
        if index >= self.dentry_count {
            return Err(FsError::NotFound.into());
        }
        let base = DENTRY_SIZE + (index as usize) * DENTRY_SIZE;
        let mut name = [0u8; FILE_NAME_LENGTH];
        name.copy_from_slice(&self.image[base..base + FILE_NAME_LENGTH]);
        let name_len = name.iter().position(|&b| b == 0).unwrap_or(FILE_NAME_LENGTH);
        let file_type = FileType::from_raw(le_u32(self.image, base + FILE_NAME_LENGTH))?;
        let inode_idx = le_u32(self.image, base + FILE_NAME_LENGTH + 4);
        Ok(Dentry {
            name,
            name_len,
            file_type,
            inode_idx,
        })
    }

    pub fn read_dentry_by_index(&self, index: u32) -> KernelResult<Dentry> {
        self.dentry_at(index)
    }

    /// Exact-match scan by name, case-sensitive, capped at
    /// [`FILE_NAME_LENGTH`] bytes (names are never NUL-padded to compare
    /// equal to a longer search string, matching `strncmp`'s behavior).
    pub fn read_dentry_by_name(&self, name: &[u8]) -> KernelResult<Dentry> {
        if name.is_empty() || name.len() > FILE_NAME_LENGTH {
            return Err(FsError::NotFound.into());
        }
        for i in 0..self.dentry_count {
            let dentry = self.dentry_at(i)?;
            if &dentry.name[..dentry.name_len] == name {
                return Ok(dentry);
            }
        }
        Err(FsError::NotFound.into())
    }

    fn inode_block_offset(&self, inode_idx: u32) -> usize {
        (1 + inode_idx as usize) * BLOCK_SIZE
    }

    fn file_length(&self, inode_idx: u32) -> KernelResult<u32> {
        if inode_idx >= self.inode_count {
            return Err(FsError::NotFound.into());
        }
        Ok(le_u32(self.image, self.inode_block_offset(inode_idx)))
    }

    fn dblock_index(&self, inode_idx: u32, slot: usize) -> u32 {
        let base = self.inode_block_offset(inode_idx) + 4 + slot * 4;
        le_u32(self.image, base)
    }

    fn data_block_offset(&self, dblock_idx: u32) -> usize {
        let data_start = (1 + self.inode_count as usize) * BLOCK_SIZE;
        data_start + (dblock_idx as usize) * BLOCK_SIZE
    }

    /// Copy up to `buf.len()` bytes starting at `offset` within the file
    /// named by `inode_idx`. Returns the number of bytes copied, which is 0
    /// once `offset` reaches end of file.
    ///
    /// Data-block indices are required to be strictly less than the
    /// image's data-block count; the original C kernel's bounds check
    /// (`dblock_table[i] > dblock_num`) is off by one and would accept an
    /// index equal to the count, so this rejects `>=` instead (see
    /// DESIGN.md's resolved open question on this divergence).
    pub fn read_data(&self, inode_idx: u32, offset: u32, buf: &mut [u8]) -> KernelResult<usize> {
        let file_length = self.file_length(inode_idx)?;
        if offset >= file_length || buf.is_empty() {
            return Ok(0);
        }

        let length = buf.len() as u32;
        let pre_offset_bytes = (offset as usize) % BLOCK_SIZE;
        let pre_block_idx = (offset as usize) / BLOCK_SIZE;

        let last_byte = if offset + length >= file_length {
            file_length - 1
        } else {
            offset + length - 1
        };
        let post_offset_bytes = (last_byte as usize) % BLOCK_SIZE + 1;
        let post_block_idx = (last_byte as usize) / BLOCK_SIZE;

        let mut copied = 0usize;
        for i in pre_block_idx..=post_block_idx {
            let dblock_idx = self.dblock_index(inode_idx, i);
            if dblock_idx >= self.dblock_count {
                return Err(FsError::BadBlockIndex.into());
            }
            let block_off = self.data_block_offset(dblock_idx);

            let (start, end) = if i == pre_block_idx && i == post_block_idx {
                (pre_offset_bytes, post_offset_bytes)
            } else if i == pre_block_idx {
                (pre_offset_bytes, BLOCK_SIZE)
            } else if i == post_block_idx {
                (0, post_offset_bytes)
            } else {
                (0, BLOCK_SIZE)
            };

            let chunk_len = end - start;
            buf[copied..copied + chunk_len]
                .copy_from_slice(&self.image[block_off + start..block_off + end]);
            copied += chunk_len;
        }

        Ok(copied)
    }

    pub fn dentry_count(&self) -> u32 {
        self.dentry_count
    }
}

/// The module loader hands the kernel one filesystem image at boot, loaded
/// once, read-only, for the lifetime of the kernel; this holds the
/// `'static` slice backing every [`Filesystem`] lookup afterward.
static IMAGE: Mutex<Option<&'static [u8]>> = Mutex::new(None);

/// Record the boot-loaded filesystem image. Must be called exactly once,
/// before any task is executed.
pub fn init(image: &'static [u8]) {
    *IMAGE.lock() = Some(image);
    crate::klog::log(crate::klog::Level::Info, "fs", "filesystem image mounted");
}

/// Borrow the mounted filesystem. Panics if called before [`init`], which
/// would indicate a boot-ordering bug rather than a recoverable condition.
pub fn image() -> Filesystem<'static> {
    let guard = IMAGE.lock();
    Filesystem::mount(guard.expect("filesystem accessed before fs::init"))
}

#[cfg(test)]
mod tests {
    use super::*;

    // A one-dentry, one-inode, one-data-block image fits in three blocks;
    // built on the stack so these tests stay `alloc`-free.
    const TEST_IMAGE_BLOCKS: usize = 3;

    fn build_one_file_image(name: &[u8], file_length: u32, contents: &[u8]) -> [u8; BLOCK_SIZE * TEST_IMAGE_BLOCKS] {
        let mut image = [0u8; BLOCK_SIZE * TEST_IMAGE_BLOCKS];

        image[0..4].copy_from_slice(&1u32.to_le_bytes()); // dentry_num
        image[4..8].copy_from_slice(&1u32.to_le_bytes()); // inode_num
        image[8..12].copy_from_slice(&1u32.to_le_bytes()); // dblock_num

        let dentry_base = DENTRY_SIZE;
        image[dentry_base..dentry_base + name.len()].copy_from_slice(name);
        image[dentry_base + FILE_NAME_LENGTH..dentry_base + FILE_NAME_LENGTH + 4]
            .copy_from_slice(&2u32.to_le_bytes()); // FileType::Regular
        image[dentry_base + FILE_NAME_LENGTH + 4..dentry_base + FILE_NAME_LENGTH + 8]
            .copy_from_slice(&0u32.to_le_bytes()); // inode_idx = 0

        let inode_base = BLOCK_SIZE;
        image[inode_base..inode_base + 4].copy_from_slice(&file_length.to_le_bytes());
        image[inode_base + 4..inode_base + 8].copy_from_slice(&0u32.to_le_bytes()); // dblock 0

        let data_base = BLOCK_SIZE * 2;
        image[data_base..data_base + contents.len()].copy_from_slice(contents);

        image
    }

    #[test]
    fn finds_dentry_by_name_and_index() {
        let image = build_one_file_image(b"shell", 5, b"hello");
        let fs = Filesystem::mount(&image);
        let d = fs.read_dentry_by_name(b"shell").unwrap();
        assert_eq!(d.inode_idx, 0);
        assert_eq!(fs.read_dentry_by_index(0).unwrap().name_len, 5);
        assert!(fs.read_dentry_by_name(b"missing").is_err());
    }

    #[test]
    fn read_data_copies_within_one_block() {
        let image = build_one_file_image(b"f", 5, b"hello");
        let fs = Filesystem::mount(&image);
        let mut buf = [0u8; 5];
        let n = fs.read_data(0, 0, &mut buf).unwrap();
        assert_eq!(n, 5);
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn read_data_reports_eof_at_exact_length() {
        let image = build_one_file_image(b"f", 5, b"hello");
        let fs = Filesystem::mount(&image);
        let mut buf = [0u8; 5];
        let n = fs.read_data(0, 5, &mut buf).unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn read_data_rejects_dblock_index_at_count() {
        // inode 0's data block slot is rewritten below to equal dblock_count,
        // which the original's permissive `>` check would allow; this kernel
        // requires indices strictly less than the count, so it must fail.
        let mut image = build_one_file_image(b"f", 5, b"hello");
        let inode_base = BLOCK_SIZE;
        image[inode_base + 4..inode_base + 8].copy_from_slice(&1u32.to_le_bytes());
        let fs = Filesystem::mount(&image);
        let mut buf = [0u8; 5];
        assert!(fs.read_data(0, 0, &mut buf).is_err());
    }
}
