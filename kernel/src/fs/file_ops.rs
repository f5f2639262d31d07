//! File-kind dispatch.
//!
//! The original kernel picks `read`/`write`/`open`/`close` behavior through
//! a `file_op_table_t` of function pointers stored in each descriptor,
//! reproduced here with the same four behaviors but no indirect call:
//! [`FileKind`] is the tag a descriptor actually carries,
//! [`FileOps`] names the four operations, and [`dispatch_read`] and its
//! siblings `match` on the tag to call one of the four zero-sized
//! implementations directly — there is no vtable and no function pointer to
//! corrupt.

use crate::error::{FsError, KernelResult};
use crate::process::fd::FileKind;

/// The behavior every file kind implements. Methods take the owning task's
/// pid and fd index rather than `&mut self` because the four implementors
/// are all zero-sized — the real per-descriptor state (position, inode)
/// lives in the task's [`crate::process::fd::FdTable`].
pub trait FileOps {
    fn open(&self, pid: u8, name: &[u8]) -> KernelResult<()>;
    fn close(&self, pid: u8) -> KernelResult<()>;
    fn read(&self, pid: u8, fd: usize, buf: &mut [u8]) -> KernelResult<usize>;
    fn write(&self, pid: u8, fd: usize, buf: &[u8]) -> KernelResult<usize>;
}

pub struct RegularFileOps;
pub struct DirectoryOps;
pub struct RtcOps;
pub struct TerminalOps;

impl FileOps for RegularFileOps {
    fn open(&self, _pid: u8, _name: &[u8]) -> KernelResult<()> {
        Ok(())
    }

    fn close(&self, _pid: u8) -> KernelResult<()> {
        Ok(())
    }

    fn read(&self, pid: u8, fd: usize, buf: &mut [u8]) -> KernelResult<usize> {
        let (inode_idx, position) =
            crate::process::with_pcb(pid, |pcb| {
                let d = pcb.fds.get(fd)?;
                Ok::<_, crate::error::KernelError>((d.inode_idx, d.file_position))
            })??;

        let n = crate::fs::image().read_data(inode_idx, position, buf)?;
        if n > 0 {
            crate::process::with_pcb_mut(pid, |pcb| {
                if let Ok(d) = pcb.fds.get_mut(fd) {
                    d.file_position += n as u32;
                }
            })?;
        }
        Ok(n)
    }

    fn write(&self, _pid: u8, _fd: usize, _buf: &[u8]) -> KernelResult<usize> {
        Err(FsError::NotAFile.into())
    }
}

impl FileOps for DirectoryOps {
    fn open(&self, _pid: u8, _name: &[u8]) -> KernelResult<()> {
        Ok(())
    }

    fn close(&self, _pid: u8) -> KernelResult<()> {
        Ok(())
    }

    fn read(&self, pid: u8, fd: usize, buf: &mut [u8]) -> KernelResult<usize> {
        let position =
            crate::process::with_pcb(pid, |pcb| pcb.fds.get(fd).map(|d| d.file_position))??;

        let fs = crate::fs::image();
        if position >= fs.dentry_count() {
            return Ok(0);
        }
        let dentry = fs.read_dentry_by_index(position)?;
        let name = &dentry.name[..dentry.name_len];
        let n = name.len().min(buf.len());
        buf[..n].copy_from_slice(&name[..n]);

        crate::process::with_pcb_mut(pid, |pcb| {
            if let Ok(d) = pcb.fds.get_mut(fd) {
                d.file_position += 1;
            }
        })?;
        Ok(n)
    }

    fn write(&self, _pid: u8, _fd: usize, _buf: &[u8]) -> KernelResult<usize> {
        Err(FsError::NotADirectory.into())
    }
}

impl FileOps for RtcOps {
    fn open(&self, pid: u8, _name: &[u8]) -> KernelResult<()> {
        crate::rtc::open(pid)
    }

    fn close(&self, pid: u8) -> KernelResult<()> {
        crate::rtc::close(pid)
    }

    fn read(&self, pid: u8, _fd: usize, _buf: &mut [u8]) -> KernelResult<usize> {
        crate::rtc::block_until_tick(pid);
        Ok(0)
    }

    fn write(&self, pid: u8, _fd: usize, buf: &[u8]) -> KernelResult<usize> {
        crate::rtc::set_frequency(pid, buf)?;
        Ok(4)
    }
}

impl FileOps for TerminalOps {
    fn open(&self, _pid: u8, _name: &[u8]) -> KernelResult<()> {
        Ok(())
    }

    fn close(&self, _pid: u8) -> KernelResult<()> {
        Ok(())
    }

    fn read(&self, pid: u8, _fd: usize, buf: &mut [u8]) -> KernelResult<usize> {
        crate::terminal::read_line(pid, buf)
    }

    fn write(&self, pid: u8, _fd: usize, buf: &[u8]) -> KernelResult<usize> {
        crate::terminal::write(pid, buf)
    }
}

pub fn dispatch_open(kind: FileKind, pid: u8, name: &[u8]) -> KernelResult<()> {
    match kind {
        FileKind::Unused => Err(FsError::BadFileDescriptor.into()),
        FileKind::RegularFile => RegularFileOps.open(pid, name),
        FileKind::Directory => DirectoryOps.open(pid, name),
        FileKind::Rtc => RtcOps.open(pid, name),
        FileKind::Terminal => TerminalOps.open(pid, name),
    }
}

pub fn dispatch_read(kind: FileKind, pid: u8, fd: usize, buf: &mut [u8]) -> KernelResult<usize> {
    match kind {
        FileKind::Unused => Err(FsError::BadFileDescriptor.into()),
        FileKind::RegularFile => RegularFileOps.read(pid, fd, buf),
        FileKind::Directory => DirectoryOps.read(pid, fd, buf),
        FileKind::Rtc => RtcOps.read(pid, fd, buf),
        FileKind::Terminal => TerminalOps.read(pid, fd, buf),
    }
}

pub fn dispatch_write(kind: FileKind, pid: u8, fd: usize, buf: &[u8]) -> KernelResult<usize> {
    match kind {
        FileKind::Unused => Err(FsError::BadFileDescriptor.into()),
        FileKind::RegularFile => RegularFileOps.write(pid, fd, buf),
        FileKind::Directory => DirectoryOps.write(pid, fd, buf),
        FileKind::Rtc => RtcOps.write(pid, fd, buf),
        FileKind::Terminal => TerminalOps.write(pid, fd, buf),
    }
}

pub fn dispatch_close(kind: FileKind, pid: u8) -> KernelResult<()> {
    match kind {
        FileKind::Unused => Err(FsError::BadFileDescriptor.into()),
        FileKind::RegularFile => RegularFileOps.close(pid),
        FileKind::Directory => DirectoryOps.close(pid),
        FileKind::Rtc => RtcOps.close(pid),
        FileKind::Terminal => TerminalOps.close(pid),
    }
}
