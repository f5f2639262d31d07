//! Process table.
//!
//! Each of the (at most) 16 tasks the kernel will ever run concurrently has
//! a fixed-slot [`Pcb`] — no allocation, no growth. The original locates a
//! task's PCB by masking the current ESP down to its enclosing 8 KiB kernel
//! stack region, exactly the kind of pointer arithmetic idiomatic Rust
//! should not reproduce. Instead, [`current_pid`] is an explicit field
//! threaded through context switches:
//! the scheduler, `execute`, and `halt` are the only three places that ever
//! write it. The 8 KiB-per-task stack convention survives only as the
//! layout [`kernel_stack_top`] hands to the GDT's TSS.esp0 and to the
//! context-switch code in [`crate::arch::x86::context`].

pub mod fd;

use crate::error::{KernelResult, ProcessError};
use fd::FdTable;
use spin::Mutex;

pub const MAX_TASKS: usize = 16;
pub const MAX_ARGUMENT_SIZE: usize = 127;

/// Base of the kernel stack region; task `pid`'s 8 KiB stack occupies
/// `[STACK_BASE - (pid+1)*STACK_SIZE, STACK_BASE - pid*STACK_SIZE)`.
pub const STACK_BASE: u32 = 0x0080_0000;
pub const STACK_SIZE: u32 = 0x2000;

/// Top-of-stack value (minus one word, so the first push lands in-bounds)
/// to load into TSS.esp0 whenever `pid` becomes the running task.
pub const fn kernel_stack_top(pid: u8) -> u32 {
    STACK_BASE - (pid as u32) * STACK_SIZE - 4
}

#[derive(Debug, Clone, Copy)]
pub struct Pcb {
    pub pid: u8,
    pub present: bool,
    pub parent_pid: Option<u8>,
    /// Kernel ESP/EBP saved at the moment this task's caller (`execute`'s
    /// invoker) suspended, restored by `halt`'s return-to-parent trick.
    pub esp: u32,
    pub ebp: u32,
    pub fds: FdTable,
    pub argument: [u8; MAX_ARGUMENT_SIZE],
    pub argument_len: usize,
    /// Raw requested RTC frequency in Hz; `-1` (via `None`) means the task
    /// never opened the RTC.
    pub virtual_freq: Option<u32>,
    /// Counts down from `virtual_freq` on every real 1024 Hz tick; a
    /// blocked `rtc_read` wakes when this reaches zero.
    pub tick_count: i32,
    pub rtc_interrupt_pending: bool,
    pub terminal_id: u8,
}

impl Pcb {
    const fn empty(pid: u8) -> Self {
        Pcb {
            pid,
            present: false,
            parent_pid: None,
            esp: 0,
            ebp: 0,
            fds: FdTable::new(),
            argument: [0; MAX_ARGUMENT_SIZE],
            argument_len: 0,
            virtual_freq: None,
            tick_count: 0,
            rtc_interrupt_pending: false,
            terminal_id: 0,
        }
    }

    fn reset(&mut self, parent_pid: Option<u8>, terminal_id: u8) {
        let pid = self.pid;
        *self = Pcb::empty(pid);
        self.present = true;
        self.parent_pid = parent_pid;
        self.terminal_id = terminal_id;
    }
}

struct ProcessTable {
    pcbs: [Pcb; MAX_TASKS],
}

impl ProcessTable {
    const fn new() -> Self {
        // `Pcb::empty` is only `const` per-call, so build the array by hand.
        let mut pcbs = [Pcb::empty(0); MAX_TASKS];
        let mut i = 0;
        while i < MAX_TASKS {
            pcbs[i] = Pcb::empty(i as u8);
            i += 1;
        }
        ProcessTable { pcbs }
    }
}

static PROCESS_TABLE: Mutex<ProcessTable> = Mutex::new(ProcessTable::new());

/// Allocate and reset a PCB for a new task, spawned as a child of
/// `parent_pid` on `terminal_id`. Mirrors `allocate_pid` + `create_pcb`.
pub fn allocate(parent_pid: Option<u8>, terminal_id: u8) -> KernelResult<u8> {
    let mut table = PROCESS_TABLE.lock();
    let slot = table
        .pcbs
        .iter()
        .position(|p| !p.present)
        .ok_or(ProcessError::TableFull)?;
    table.pcbs[slot].reset(parent_pid, terminal_id);
    Ok(slot as u8)
}

/// Mark `pid`'s PCB free again. Called by `halt` after its fds are closed.
pub fn free(pid: u8) {
    PROCESS_TABLE.lock().pcbs[pid as usize].present = false;
}

pub fn with_pcb<R>(pid: u8, f: impl FnOnce(&Pcb) -> R) -> KernelResult<R> {
    let table = PROCESS_TABLE.lock();
    let pcb = &table.pcbs[pid as usize];
    if !pcb.present {
        return Err(ProcessError::NotFound.into());
    }
    Ok(f(pcb))
}

pub fn with_pcb_mut<R>(pid: u8, f: impl FnOnce(&mut Pcb) -> R) -> KernelResult<R> {
    let mut table = PROCESS_TABLE.lock();
    let pcb = &mut table.pcbs[pid as usize];
    if !pcb.present {
        return Err(ProcessError::NotFound.into());
    }
    Ok(f(pcb))
}

/// Per-terminal "currently running task" pointer, the idiomatic stand-in
/// for the original's ESP-masking PCB lookup. `None` means the terminal has
/// no task running yet (it's waiting for its first lazily-spawned shell).
static CURRENT_PID: Mutex<[Option<u8>; super::terminal::TERMINAL_COUNT]> =
    Mutex::new([None; super::terminal::TERMINAL_COUNT]);

pub fn current_pid(terminal_id: u8) -> Option<u8> {
    CURRENT_PID.lock()[terminal_id as usize]
}

pub fn set_current_pid(terminal_id: u8, pid: Option<u8>) {
    CURRENT_PID.lock()[terminal_id as usize] = pid;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_top_formula_matches_layout_convention() {
        assert_eq!(kernel_stack_top(0), STACK_BASE - 4);
        assert_eq!(kernel_stack_top(1), STACK_BASE - STACK_SIZE - 4);
    }

    #[test]
    fn allocate_and_free_round_trip() {
        let pid = allocate(None, 0).unwrap();
        assert!(with_pcb(pid, |p| p.present).unwrap());
        free(pid);
        assert!(with_pcb(pid, |_| ()).is_err());
    }

    #[test]
    fn table_full_once_all_sixteen_taken() {
        let mut pids = [0u8; MAX_TASKS];
        for pid in pids.iter_mut() {
            *pid = allocate(None, 0).unwrap();
        }
        assert!(allocate(None, 0).is_err());
        for pid in pids {
            free(pid);
        }
    }
}
