//! File descriptor table.
//!
//! The original kernel dispatches `read`/`write`/`close` through a
//! function-pointer `file_op_table_t` stored in each descriptor. That
//! indirect-call hazard is replaced here with a tagged variant:
//! [`FileKind`] is the tag, [`crate::fs::file_ops`] supplies
//! one zero-sized implementation per kind, and dispatch is a `match` —
//! there is no function pointer anywhere in a [`FileDescriptor`].

use crate::error::{FsError, KernelResult};

/// Which four kinds of open file a descriptor can name. `Unused` marks a
/// free slot, matching the original's `op_table = NULL` sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Unused,
    RegularFile,
    Directory,
    Rtc,
    Terminal,
}

pub const FD_TABLE_SIZE: usize = 8;

#[derive(Debug, Clone, Copy)]
pub struct FileDescriptor {
    pub kind: FileKind,
    /// Directory-entry inode index backing a `RegularFile`/`Directory`
    /// descriptor; unused (and left at 0) for `Rtc`/`Terminal`.
    pub inode_idx: u32,
    /// Byte offset into the file for the next `read`; unused for
    /// `Rtc`/`Terminal` whose "position" is implicit in hardware/line state.
    pub file_position: u32,
}

impl FileDescriptor {
    const fn closed() -> Self {
        FileDescriptor {
            kind: FileKind::Unused,
            inode_idx: 0,
            file_position: 0,
        }
    }
}

/// Fixed 8-entry table, one per task, matching `MAX_TASK_NUM`'s sibling
/// constant `FD_ARRAY_SIZE` in the original kernel.
#[derive(Debug, Clone, Copy)]
pub struct FdTable {
    entries: [FileDescriptor; FD_TABLE_SIZE],
}

impl FdTable {
    pub const fn new() -> Self {
        FdTable {
            entries: [FileDescriptor::closed(); FD_TABLE_SIZE],
        }
    }

    /// Clear every slot, as `create_pcb`/`reset_pcb` does before fds 0/1 are
    /// wired up to the task's terminal.
    pub fn reset(&mut self) {
        self.entries = [FileDescriptor::closed(); FD_TABLE_SIZE];
    }

    pub fn get(&self, fd: usize) -> KernelResult<&FileDescriptor> {
        self.entries
            .get(fd)
            .filter(|d| d.kind != FileKind::Unused)
            .ok_or(FsError::BadFileDescriptor.into())
    }

    pub fn get_mut(&mut self, fd: usize) -> KernelResult<&mut FileDescriptor> {
        self.entries
            .get_mut(fd)
            .filter(|d| d.kind != FileKind::Unused)
            .ok_or(FsError::BadFileDescriptor.into())
    }

    /// The first free slot at index 2 or above: fds 0 and 1 are always
    /// pre-populated with the task's standard input/output terminal
    /// descriptors by `execute`, so `open` never hands those back out.
    pub fn first_free(&self) -> KernelResult<usize> {
        self.entries[2..]
            .iter()
            .position(|d| d.kind == FileKind::Unused)
            .map(|i| i + 2)
            .ok_or(FsError::TooManyOpenFiles.into())
    }

    pub fn install(&mut self, fd: usize, kind: FileKind, inode_idx: u32) {
        self.entries[fd] = FileDescriptor {
            kind,
            inode_idx,
            file_position: 0,
        };
    }

    pub fn close(&mut self, fd: usize) -> KernelResult<()> {
        let entry = self.get_mut(fd)?;
        *entry = FileDescriptor::closed();
        Ok(())
    }
}

impl Default for FdTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_table_has_no_open_slots_above_stdio() {
        let table = FdTable::new();
        assert_eq!(table.first_free().unwrap(), 2);
    }

    #[test]
    fn install_and_close_round_trip() {
        let mut table = FdTable::new();
        table.install(2, FileKind::RegularFile, 7);
        assert_eq!(table.get(2).unwrap().inode_idx, 7);
        table.close(2).unwrap();
        assert!(table.get(2).is_err());
    }

    #[test]
    fn close_rejects_already_closed_slot() {
        let mut table = FdTable::new();
        assert!(table.close(3).is_err());
    }

    #[test]
    fn first_free_skips_occupied_slots() {
        let mut table = FdTable::new();
        table.install(2, FileKind::Terminal, 0);
        table.install(3, FileKind::Rtc, 0);
        assert_eq!(table.first_free().unwrap(), 4);
    }
}
