//! Minimal ELF-like header validation.
//!
//! `execute` doesn't need a general ELF loader: the whole file image is
//! copied verbatim to a fixed virtual address rather than laid out
//! segment-by-segment, so the only things this module checks
//! are the four magic bytes and the little-endian entry-point word at
//! offset 24 — exactly what `syscall.c`'s `execute()` reads before jumping
//! into a user image.

pub const MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];
const ENTRY_OFFSET: usize = 24;

/// `true` iff `data` starts with the four ELF magic bytes.
pub fn has_magic(data: &[u8]) -> bool {
    data.len() >= 4 && data[..4] == MAGIC
}

/// Read the 32-bit little-endian entry point at byte offset 24, the layout
/// every user image in this kernel is built with. Returns `None` if `data`
/// isn't even long enough to contain that field.
pub fn entry_point(data: &[u8]) -> Option<u32> {
    if data.len() < ENTRY_OFFSET + 4 {
        return None;
    }
    Some(u32::from_le_bytes([
        data[ENTRY_OFFSET],
        data[ENTRY_OFFSET + 1],
        data[ENTRY_OFFSET + 2],
        data[ENTRY_OFFSET + 3],
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_magic() {
        let mut image = [0u8; 32];
        image[..4].copy_from_slice(&MAGIC);
        assert!(has_magic(&image));
    }

    #[test]
    fn rejects_wrong_magic() {
        let image = [0u8; 32];
        assert!(!has_magic(&image));
    }

    #[test]
    fn reads_little_endian_entry_point() {
        let mut image = [0u8; 32];
        image[..4].copy_from_slice(&MAGIC);
        image[ENTRY_OFFSET..ENTRY_OFFSET + 4].copy_from_slice(&0x0804_8000u32.to_le_bytes());
        assert_eq!(entry_point(&image), Some(0x0804_8000));
    }

    #[test]
    fn rejects_truncated_image() {
        let image = [0u8; 10];
        assert_eq!(entry_point(&image), None);
    }
}
