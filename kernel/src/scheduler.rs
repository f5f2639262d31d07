//! Round-robin scheduler over terminals, not tasks.
//!
//! Exactly [`crate::terminal::TERMINAL_COUNT`] kernel contexts ever compete
//! for CPU time; every ~100 Hz PIT tick, [`on_timer_tick`] rotates the
//! *running* terminal forward by one and performs the context switch
//! `scheduler.c`'s `switch_running_terminal` does: save the outgoing
//! terminal's kernel ESP/EBP, rewrite PDE[32] and TSS.esp0 for the incoming
//! terminal's task, and resume it with the `leave; ret` trick in
//! [`crate::arch::x86::context`]. A terminal with no task yet (the lazy
//! bootstrap for terminals 1 and 2) gets a shell spawned for it the first
//! time the scheduler rotates onto it.

use crate::arch::x86;
use crate::process;
use crate::terminal;

/// Entered once, from `main`, to hand control to terminal 0's first shell.
/// Never returns in the ordinary sense: the very first `execute` drops to
/// user mode, and every later resumption happens through an interrupt
/// return, not a call/return back into this function.
pub fn run() -> ! {
    terminal::set_running(0);
    crate::syscall::process::spawn_shell(0);
    unreachable!("spawn_shell never returns");
}

/// Called from the PIT interrupt handler. Checks for a deferred Ctrl+C on
/// the terminal about to be suspended, then rotates to the next terminal.
pub fn on_timer_tick() {
    crate::klog::tick();

    let current = terminal::running_terminal();
    if terminal::take_deferred_halt(current) {
        if let Some(pid) = process::current_pid(current) {
            // `halt_task` never returns; it resumes the parent (or, if this
            // was terminal 0's top-level shell, respawns a fresh shell)
            // through the same suspended-context trick the scheduler itself
            // uses below, so the rotation below never runs for this path.
            crate::syscall::process::halt_task(pid, 255);
        }
    }

    let next = (current + 1) % terminal::TERMINAL_COUNT as u8;
    switch_running_terminal(next);
}

/// Suspend `running_terminal()`'s task (if any) and resume `next`'s,
/// spawning a shell for `next` first if it has never run one.
///
/// Only meaningful on the real target: it rewrites the live page directory
/// and TSS and performs a raw stack-switch, none of which exist under the
/// hosted test target (see [`crate::arch::x86::paging`]'s doc comment).
#[cfg(target_arch = "x86")]
fn switch_running_terminal(next: u8) {
    let current = terminal::running_terminal();
    if current == next {
        return;
    }

    // SAFETY: the PDE[32]/TSS rewrite below must not race a concurrent
    // interrupt observing half-updated state.
    let _guard = x86::disable_interrupts();

    let (esp, ebp) = x86::context::capture();
    terminal::save_context(current, esp, ebp);

    terminal::set_running(next);

    match process::current_pid(next) {
        Some(pid) => {
            // SAFETY: `pid` is present and was suspended by a previous call
            // to this same function (or never started, handled above).
            unsafe {
                x86::paging::map_user_page(pid);
                x86::gdt::set_kernel_stack(process::kernel_stack_top(pid));
            }
            let (esp, ebp) = terminal::saved_context(next);
            drop(_guard);
            // SAFETY: `esp`/`ebp` were saved by this same function's
            // `capture` the last time `next` was suspended.
            unsafe {
                x86::context::switch_to(esp, ebp);
            }
        }
        None => {
            drop(_guard);
            crate::syscall::process::spawn_shell(next);
        }
    }
}

#[cfg(not(target_arch = "x86"))]
fn switch_running_terminal(next: u8) {
    terminal::set_running(next);
}
