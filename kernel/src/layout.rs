//! Address-space layout constants and the pure arithmetic built on them.
//!
//! Kept separate from [`crate::arch::x86::paging`] so the frame/pointer
//! math (the `(pid + 2) * 4 MiB` convention and the `vidmap` range check)
//! can run under the hosted `#[test]` harness without pulling in any inline
//! asm.

use crate::error::{KernelResult, PagingError};

pub const PAGE_SIZE: u32 = 4096;
pub const PAGE_SIZE_4M: u32 = 4 * 1024 * 1024;

/// Virtual address where every user task's flat image starts: the 128 MiB
/// user page, offset by the conventional 0x48000 load point within it.
pub const USER_IMAGE_VADDR: u32 = 0x0800_0000 + 0x0004_8000;
/// Start of the PDE[32] user page's virtual range.
pub const USER_MEM_START: u32 = 32 * PAGE_SIZE_4M;
pub const USER_MEM_END: u32 = USER_MEM_START + PAGE_SIZE_4M;
/// Virtual address a successful `vidmap` hands back to the caller.
pub const USER_VIDEO_VADDR: u32 = 33 * PAGE_SIZE_4M;

/// Physical frame a PCB's user page maps to: `(pid + 2) * 4MB` (frames 0
/// and 1 are reserved for the identity-mapped low memory and the kernel's
/// own 4 MiB page).
pub fn user_frame_for_pid(pid: u8) -> u32 {
    (pid as u32 + 2) * PAGE_SIZE_4M
}

/// Validate that a pointer a task handed to `vidmap` actually falls inside
/// its own 4 MiB user region. The original only checks the range, not
/// alignment, and that edge case is preserved verbatim (see DESIGN.md).
pub fn validate_user_pointer(ptr: u32) -> KernelResult<()> {
    if ptr < USER_MEM_START || ptr >= USER_MEM_END {
        return Err(PagingError::InvalidPde.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_formula_reserves_first_two_frames() {
        assert_eq!(user_frame_for_pid(0), 2 * PAGE_SIZE_4M);
        assert_eq!(user_frame_for_pid(1), 3 * PAGE_SIZE_4M);
        assert_eq!(user_frame_for_pid(15), 17 * PAGE_SIZE_4M);
    }

    #[test]
    fn pointer_validation_rejects_outside_range() {
        assert!(validate_user_pointer(USER_MEM_START).is_ok());
        assert!(validate_user_pointer(USER_MEM_END - 1).is_ok());
        assert!(validate_user_pointer(USER_MEM_END).is_err());
        assert!(validate_user_pointer(0).is_err());
    }
}
