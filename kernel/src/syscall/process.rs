//! `execute`/`halt`/`getargs`/`vidmap` and the shell-bootstrap helper the
//! scheduler calls.
//!
//! `execute` and `halt` mirror `syscall.c`'s pair almost step for step: a
//! new PCB is built, the image is copied verbatim to the fixed user load
//! address, the page directory and TSS are rewritten for the new task, and
//! control drops to ring 3 with [`crate::arch::x86::usermode::enter_user_mode`].
//! `halt` reverses all of it and resumes whichever kernel path was suspended
//! at the matching `execute` call, via
//! [`crate::arch::x86::context::return_to_parent`].

use crate::arch::x86;
use crate::elf;
use crate::error::{KernelResult, ProcessError, SyscallError};
use crate::layout::{validate_user_pointer, USER_IMAGE_VADDR, USER_MEM_END};
use crate::process::fd::FileKind;
use crate::process::{self, MAX_ARGUMENT_SIZE};
use crate::{fs, terminal};

/// Parse `syscall.c`'s combined `"fname arg..."` command line: the filename
/// is everything up to the first space (or the whole string), skipping any
/// leading spaces; the argument is everything after the filename's trailing
/// spaces.
fn parse_command(command: &[u8]) -> (&[u8], &[u8]) {
    let command = trim_leading_spaces(command);
    let split = command.iter().position(|&b| b == b' ').unwrap_or(command.len());
    let (fname, rest) = command.split_at(split);
    (fname, trim_leading_spaces(rest))
}

fn trim_leading_spaces(s: &[u8]) -> &[u8] {
    let start = s.iter().position(|&b| b != b' ').unwrap_or(s.len());
    &s[start..]
}

/// # Safety
/// Same contract as [`super::fileio::user_slice`]'s, informally: `ptr` must
/// be a valid user-space pointer for the currently mapped task.
unsafe fn read_command_line(ptr: u32) -> KernelResult<([u8; fs::FILE_NAME_LENGTH + MAX_ARGUMENT_SIZE], usize)> {
    const MAX_LEN: usize = fs::FILE_NAME_LENGTH + MAX_ARGUMENT_SIZE;
    if ptr == 0 {
        return Err(SyscallError::InvalidPointer.into());
    }
    // SAFETY: delegated to caller.
    let raw = unsafe { core::slice::from_raw_parts(ptr as *const u8, MAX_LEN) };
    let len = raw.iter().position(|&b| b == 0).unwrap_or(MAX_LEN);
    let mut buf = [0u8; MAX_LEN];
    buf[..len].copy_from_slice(&raw[..len]);
    Ok((buf, len))
}

/// `execute(command)`: allocate a PCB, load the named file, and drop to
/// ring 3. Returns a negative value only on a failure that happens before
/// any user code ever runs; on success this function's caller is only
/// "returned to" much later, when the child eventually `halt`s, through
/// [`crate::arch::x86::context::return_to_parent`] rather than an ordinary
/// return.
pub fn execute(command_ptr: u32) -> isize {
    let outcome: KernelResult<()> = (|| {
        // SAFETY: called from a syscall handler with the caller's page mapped.
        let (line, len) = unsafe { read_command_line(command_ptr) }?;
        execute_command(&line[..len])
    })();
    match outcome {
        Ok(()) => unreachable!("execute_command only returns on failure"),
        Err(e) => e.as_syscall_result(),
    }
}

#[cfg(target_arch = "x86")]
fn execute_command(command: &[u8]) -> KernelResult<()> {
    let (fname, argument) = parse_command(command);
    if fname.is_empty() {
        return Err(ProcessError::NotFound.into());
    }

    let dentry = fs::image().read_dentry_by_name(fname)?;
    if dentry.file_type != fs::FileType::Regular {
        return Err(ProcessError::NotAnElf.into());
    }

    let mut header = [0u8; 28];
    fs::image().read_data(dentry.inode_idx, 0, &mut header)?;
    if !elf::has_magic(&header) {
        return Err(ProcessError::NotAnElf.into());
    }
    let entry = elf::entry_point(&header).ok_or(ProcessError::NotAnElf)?;

    let terminal_id = terminal::running_terminal();
    let parent_pid = process::current_pid(terminal_id);
    let pid = process::allocate(parent_pid, terminal_id)?;

    // SAFETY: context switch critical section; this task's kernel stack and
    // user page are about to become the live ones.
    unsafe {
        x86::paging::map_user_page(pid);
    }
    load_image_to_user_space(&dentry)?;

    process::with_pcb_mut(pid, |pcb| {
        pcb.fds.install(0, FileKind::Terminal, 0);
        pcb.fds.install(1, FileKind::Terminal, 0);
        let n = argument.len().min(MAX_ARGUMENT_SIZE);
        pcb.argument[..n].copy_from_slice(&argument[..n]);
        pcb.argument_len = n;
    })?;

    terminal::bind_task(terminal_id, Some(pid));

    let (esp, ebp) = x86::context::capture();
    process::with_pcb_mut(pid, |pcb| {
        pcb.esp = esp;
        pcb.ebp = ebp;
    })?;
    process::set_current_pid(terminal_id, Some(pid));

    // SAFETY: interrupts are about to be re-enabled by the pushed EFLAGS in
    // `enter_user_mode`'s iret frame; the kernel stack swap below must
    // complete first so a trap immediately after iret lands somewhere live.
    unsafe {
        x86::gdt::set_kernel_stack(process::kernel_stack_top(pid));
    }

    let user_stack_top = USER_MEM_END - 4;
    // SAFETY: `entry` was read from a verified image already copied into
    // the page `map_user_page` just installed; `user_stack_top` lies inside
    // that same page.
    unsafe {
        x86::usermode::enter_user_mode(entry, user_stack_top);
    }
}

#[cfg(not(target_arch = "x86"))]
fn execute_command(_command: &[u8]) -> KernelResult<()> {
    Err(ProcessError::NotFound.into())
}

#[cfg(target_arch = "x86")]
fn load_image_to_user_space(dentry: &fs::Dentry) -> KernelResult<()> {
    let fs = fs::image();
    // SAFETY: PDE[32] was just rewritten by the caller to point at this
    // task's own frame, so USER_IMAGE_VADDR is now backed by fresh memory
    // exclusively owned by this task.
    let dest = unsafe {
        core::slice::from_raw_parts_mut(
            USER_IMAGE_VADDR as *mut u8,
            (USER_MEM_END - USER_IMAGE_VADDR) as usize,
        )
    };
    let mut offset = 0u32;
    loop {
        let chunk = &mut dest[offset as usize..(offset as usize + fs::BLOCK_SIZE).min(dest.len())];
        let n = fs.read_data(dentry.inode_idx, offset, chunk)?;
        if n == 0 {
            break;
        }
        offset += n as u32;
    }
    Ok(())
}

/// `halt(status)` for the currently running task: close its fds, notify its
/// parent (or respawn a shell if this was a terminal's top-level task), and
/// never return to the caller in the ordinary sense.
pub fn halt(status: u8) -> isize {
    let Some(pid) = process::current_pid(terminal::running_terminal()) else {
        return crate::error::KernelError::from(SyscallError::InvalidArgument).as_syscall_result();
    };
    halt_task(pid, status as u32)
}

/// Halt `pid` unconditionally, for Ctrl+C and fatal exceptions as well as a
/// task's own voluntary `halt` syscall. Never returns: either the parent's
/// suspended `execute` is resumed with `status` in EAX, or, for a terminal's
/// orphaned top-level task, a fresh shell is spawned in its place, matching
/// the original's "a terminal is never left with no task" invariant.
pub fn halt_task(pid: u8, status: u32) -> ! {
    let terminal_id = process::with_pcb(pid, |pcb| pcb.terminal_id).unwrap_or(terminal::running_terminal());
    let parent_pid = process::with_pcb(pid, |pcb| pcb.parent_pid).unwrap_or(None);

    close_all_fds(pid);

    #[cfg(target_arch = "x86")]
    // SAFETY: tearing down a vidmap mapping this task may have installed.
    unsafe {
        x86::paging::unmap_video_page();
    }

    let resume = process::with_pcb(pid, |pcb| (pcb.esp, pcb.ebp));
    process::free(pid);

    match parent_pid {
        Some(parent) => {
            process::set_current_pid(terminal_id, Some(parent));
            terminal::bind_task(terminal_id, Some(parent));

            #[cfg(target_arch = "x86")]
            // SAFETY: restoring the parent's own page/stack before resuming it.
            unsafe {
                x86::paging::map_user_page(parent);
                x86::gdt::set_kernel_stack(process::kernel_stack_top(parent));
            }

            let (esp, ebp) = resume.unwrap_or((0, 0));
            #[cfg(target_arch = "x86")]
            // SAFETY: `esp`/`ebp` were saved by that parent's own `execute`
            // call, satisfying `return_to_parent`'s contract.
            unsafe {
                x86::context::return_to_parent(esp, ebp, status);
            }
            #[cfg(not(target_arch = "x86"))]
            unreachable!("halt_task's hardware resume path is x86-only");
        }
        None => {
            process::set_current_pid(terminal_id, None);
            terminal::bind_task(terminal_id, None);
            spawn_shell(terminal_id);
        }
    }
}

fn close_all_fds(pid: u8) {
    for fd in 2..crate::process::fd::FD_TABLE_SIZE {
        let kind = process::with_pcb(pid, |pcb| pcb.fds.get(fd).map(|d| d.kind).ok());
        if let Ok(Some(kind)) = kind {
            let _ = fs::file_ops::dispatch_close(kind, pid);
            let _ = process::with_pcb_mut(pid, |pcb| pcb.fds.close(fd));
        }
    }
}

/// Spawn the shell as `terminal_id`'s task. Called by the scheduler the
/// first time it rotates onto a terminal with no task, and by `halt_task`
/// when an orphaned top-level task exits. Never returns: `execute` only
/// returns on failure, and a failure to launch the shell itself is
/// unrecoverable.
pub fn spawn_shell(terminal_id: u8) -> ! {
    terminal::set_running(terminal_id);
    process::set_current_pid(terminal_id, None);
    terminal::bind_task(terminal_id, None);

    let _ = execute_command(b"shell");
    x86::halt()
}

/// `getargs(buf, nbytes)`: fails if the current task never received an
/// argument (the original's `argument[0] == '\0'` sentinel) or if `nbytes`
/// is too small to hold the argument plus its terminating NUL.
pub fn getargs(buf_ptr: u32, nbytes: u32) -> isize {
    let outcome: KernelResult<usize> = (|| {
        let pid = process::current_pid(terminal::running_terminal())
            .ok_or::<crate::error::KernelError>(SyscallError::InvalidArgument.into())?;
        let (argument, len) = process::with_pcb(pid, |pcb| {
            let mut buf = [0u8; MAX_ARGUMENT_SIZE];
            buf[..pcb.argument_len].copy_from_slice(&pcb.argument[..pcb.argument_len]);
            (buf, pcb.argument_len)
        })?;

        if len == 0 {
            return Err(SyscallError::InvalidArgument.into());
        }
        if (len + 1) as u32 > nbytes {
            return Err(SyscallError::BufferTooSmall.into());
        }

        if buf_ptr == 0 {
            return Err(SyscallError::InvalidPointer.into());
        }
        // SAFETY: length was just checked against `nbytes`, and the caller
        // (a syscall handler) runs with the current task's page mapped.
        let dest = unsafe { core::slice::from_raw_parts_mut(buf_ptr as *mut u8, (len + 1) as usize) };
        dest[..len].copy_from_slice(&argument[..len]);
        dest[len] = 0;
        Ok(0)
    })();
    match outcome {
        Ok(n) => n as isize,
        Err(e) => e.as_syscall_result(),
    }
}

/// `vidmap(screen_start)`: map the caller's requested page onto the real
/// VGA buffer and write the mapped address into `*screen_start`. Only
/// checks that the pointer falls inside the caller's own 4 MiB user region,
/// not its alignment, matching the original's range-only validation.
pub fn vidmap(screen_start_ptr: u32) -> isize {
    let outcome: KernelResult<()> = (|| {
        validate_user_pointer(screen_start_ptr).map_err(|_| SyscallError::InvalidPointer)?;

        #[cfg(target_arch = "x86")]
        // SAFETY: interrupts are disabled for the duration of the page-table
        // rewrite by the caller's syscall-gate DPL3 trap (traps don't
        // auto-disable IF on this kernel's IDT, so this brief window relies
        // on no other CPU touching the directory, true on this uniprocessor
        // target).
        let mapped = unsafe { x86::paging::map_video_page()? };
        #[cfg(not(target_arch = "x86"))]
        let mapped = crate::layout::USER_VIDEO_VADDR;

        // SAFETY: `screen_start_ptr` was just range-checked above.
        unsafe {
            *(screen_start_ptr as *mut u32) = mapped;
        }
        Ok(())
    })();
    match outcome {
        Ok(()) => 0,
        Err(e) => e.as_syscall_result(),
    }
}
