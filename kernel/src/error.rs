//! Internal kernel error type.
//!
//! Used for `?`-propagation and `klog` messages inside the kernel; every
//! path that crosses the syscall/file-op boundary collapses a `KernelError`
//! into a signed `isize` (0 or positive for success, negative for failure)
//! before it reaches a task, matching the original syscall ABI.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "kernel errors must be handled, not silently discarded"]
pub enum KernelError {
    /// No free PCB slot for `execute`, or the referenced pid isn't present.
    Process(ProcessError),
    /// Filesystem lookup or read failure.
    Fs(FsError),
    /// Page directory/table manipulation failure.
    Paging(PagingError),
    /// Hardware device didn't respond the way the driver expected.
    Hardware { device: &'static str },
    /// Malformed syscall argument.
    Syscall(SyscallError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessError {
    TableFull,
    NotFound,
    NotAnElf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    NotFound,
    NotADirectory,
    NotAFile,
    BadBlockIndex,
    TooManyOpenFiles,
    BadFileDescriptor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagingError {
    OutOfFrames,
    InvalidPde,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyscallError {
    InvalidArgument,
    InvalidPointer,
    BufferTooSmall,
}

pub type KernelResult<T> = Result<T, KernelError>;

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Process(e) => write!(f, "process error: {:?}", e),
            Self::Fs(e) => write!(f, "filesystem error: {:?}", e),
            Self::Paging(e) => write!(f, "paging error: {:?}", e),
            Self::Hardware { device } => write!(f, "hardware error on {}", device),
            Self::Syscall(e) => write!(f, "syscall error: {:?}", e),
        }
    }
}

impl From<ProcessError> for KernelError {
    fn from(e: ProcessError) -> Self {
        Self::Process(e)
    }
}

impl From<FsError> for KernelError {
    fn from(e: FsError) -> Self {
        Self::Fs(e)
    }
}

impl From<PagingError> for KernelError {
    fn from(e: PagingError) -> Self {
        Self::Paging(e)
    }
}

impl From<SyscallError> for KernelError {
    fn from(e: SyscallError) -> Self {
        Self::Syscall(e)
    }
}

impl KernelError {
    /// The ABI every syscall and file operation reports failure through:
    /// a negative `isize`, the way the original C kernel used `-1`.
    pub const fn as_syscall_result(self) -> isize {
        -1
    }
}
