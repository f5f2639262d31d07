//! `open`/`close`/`read`/`write` syscalls.
//!
//! Each takes at least one raw pointer straight out of a user register, so
//! every entry point here starts by turning that pointer into a checked
//! slice with [`user_slice`]/[`user_slice_mut`] before touching it, the same
//! null/range checks `syscall.c`'s `read`/`write`/`open` perform before ever
//! dereferencing their arguments.

use crate::error::{FsError, KernelResult, SyscallError};
use crate::layout::{USER_MEM_END, USER_MEM_START};
use crate::process::fd::FileKind;
use crate::{fs, process, terminal};

const FD_ARRAY_SIZE: usize = crate::process::fd::FD_TABLE_SIZE;

fn current_pid() -> KernelResult<u8> {
    process::current_pid(terminal::running_terminal()).ok_or(SyscallError::InvalidArgument.into())
}

/// Borrow `len` bytes starting at user virtual address `ptr`, after
/// checking the whole range falls inside the caller's 4 MiB user page.
///
/// # Safety
/// Valid only while the calling task's PDE[32] mapping (installed by the
/// scheduler before resuming it) is still the active one, which holds for
/// the entire duration of a syscall handler.
unsafe fn user_slice<'a>(ptr: u32, len: u32) -> KernelResult<&'a [u8]> {
    if ptr == 0 || len == 0 {
        return Err(SyscallError::InvalidPointer.into());
    }
    let end = ptr.checked_add(len).ok_or(SyscallError::InvalidPointer)?;
    if ptr < USER_MEM_START || end > USER_MEM_END {
        return Err(SyscallError::InvalidPointer.into());
    }
    // SAFETY: delegated to caller; range was just checked above.
    Ok(unsafe { core::slice::from_raw_parts(ptr as *const u8, len as usize) })
}

/// # Safety
/// Same contract as [`user_slice`].
unsafe fn user_slice_mut<'a>(ptr: u32, len: u32) -> KernelResult<&'a mut [u8]> {
    if ptr == 0 || len == 0 {
        return Err(SyscallError::InvalidPointer.into());
    }
    let end = ptr.checked_add(len).ok_or(SyscallError::InvalidPointer)?;
    if ptr < USER_MEM_START || end > USER_MEM_END {
        return Err(SyscallError::InvalidPointer.into());
    }
    // SAFETY: delegated to caller; range was just checked above.
    Ok(unsafe { core::slice::from_raw_parts_mut(ptr as *mut u8, len as usize) })
}

fn result(r: KernelResult<usize>) -> isize {
    match r {
        Ok(n) => n as isize,
        Err(e) => e.as_syscall_result(),
    }
}

/// `open(filename)`: the raw syscall ABI passes only a pointer, no explicit
/// length (the original took a NUL-terminated C string), so the name is
/// read as up to [`fs::FILE_NAME_LENGTH`] bytes and cut at the first NUL,
/// then looked up, and the matching fd kind installed into the first free
/// slot above stdio.
pub fn open(name_ptr: u32) -> isize {
    let outcome: KernelResult<usize> = (|| {
        // SAFETY: see `user_slice`.
        let raw = unsafe { user_slice(name_ptr, fs::FILE_NAME_LENGTH as u32) }?;
        let len = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        let name = &raw[..len];
        if name.is_empty() {
            return Err(FsError::NotFound.into());
        }
        let pid = current_pid()?;

        let dentry = fs::image().read_dentry_by_name(name)?;
        let kind = match dentry.file_type {
            fs::FileType::Rtc => FileKind::Rtc,
            fs::FileType::Directory => FileKind::Directory,
            fs::FileType::Regular => FileKind::RegularFile,
        };

        let fd = process::with_pcb_mut(pid, |pcb| pcb.fds.first_free())??;
        fs::file_ops::dispatch_open(kind, pid, name)?;
        process::with_pcb_mut(pid, |pcb| pcb.fds.install(fd, kind, dentry.inode_idx))?;
        Ok(fd)
    })();
    result(outcome)
}

pub fn close(fd: usize) -> isize {
    if fd < 2 || fd >= FD_ARRAY_SIZE {
        return crate::error::KernelError::from(SyscallError::InvalidArgument).as_syscall_result();
    }
    let outcome: KernelResult<()> = (|| {
        let pid = current_pid()?;
        let kind = process::with_pcb(pid, |pcb| pcb.fds.get(fd).map(|d| d.kind))??;
        fs::file_ops::dispatch_close(kind, pid)?;
        process::with_pcb_mut(pid, |pcb| pcb.fds.close(fd))??;
        Ok(())
    })();
    match outcome {
        Ok(()) => 0,
        Err(e) => e.as_syscall_result(),
    }
}

pub fn read(fd: usize, buf_ptr: u32, nbytes: u32) -> isize {
    if fd == 1 || fd >= FD_ARRAY_SIZE {
        return crate::error::KernelError::from(SyscallError::InvalidArgument).as_syscall_result();
    }
    let outcome: KernelResult<usize> = (|| {
        // SAFETY: see `user_slice_mut`.
        let buf = unsafe { user_slice_mut(buf_ptr, nbytes) }?;
        let pid = current_pid()?;
        let kind = process::with_pcb(pid, |pcb| pcb.fds.get(fd).map(|d| d.kind))??;
        fs::file_ops::dispatch_read(kind, pid, fd, buf)
    })();
    result(outcome)
}

pub fn write(fd: usize, buf_ptr: u32, nbytes: u32) -> isize {
    if fd == 0 || fd >= FD_ARRAY_SIZE {
        return crate::error::KernelError::from(SyscallError::InvalidArgument).as_syscall_result();
    }
    let outcome: KernelResult<usize> = (|| {
        // SAFETY: see `user_slice`.
        let buf = unsafe { user_slice(buf_ptr, nbytes) }?;
        let pid = current_pid()?;
        let kind = process::with_pcb(pid, |pcb| pcb.fds.get(fd).map(|d| d.kind))??;
        fs::file_ops::dispatch_write(kind, pid, fd, buf)
    })();
    result(outcome)
}
