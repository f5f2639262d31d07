//! Ring 0 → ring 3 transition.
//!
//! `execute`'s final step is a single `iret` into the freshly loaded user
//! image, built exactly the way `syscall.c`'s `execute()` builds it: reload
//! only DS (not ES/FS/GS — the original never touches them either, and
//! nothing in this kernel relies on them pointing at the user data
//! selector), then push the five-word `iret` frame — SS, ESP, EFLAGS (with
//! IF forced on), CS, EIP — and `iret`.

use super::{USER_CS, USER_DS};

/// Drop to user mode at `entry`, running on `user_stack_top` with
/// `user_ds`/`user_cs` as the data/code selectors. Never returns: the only
/// way back to kernel mode from here is an interrupt (syscall, exception,
/// or a device IRQ), which resumes this task's kernel stack independently
/// of this function's own frame.
///
/// # Safety
/// `entry` must be a valid user-mode instruction pointer inside the page
/// mapped by the caller's most recent [`super::paging::map_user_page`], and
/// `user_stack_top` must lie inside that same mapped user page. Interrupts
/// must be enabled (or about to be, via the pushed EFLAGS) before this
/// runs, and the TSS's `esp0`/`ss0` must already be set for this task so a
/// later interrupt has a valid kernel stack to land on.
#[unsafe(naked)]
pub unsafe extern "C" fn enter_user_mode(entry: u32, user_stack_top: u32) -> ! {
    core::arch::naked_asm!(
        "mov eax, [esp + 4]",   // entry
        "mov ecx, [esp + 8]",   // user_stack_top
        "mov ebx, {user_ds}",
        "and ebx, 0xFF",
        "mov ds, bx",
        "push {user_ds}",       // SS
        "push ecx",             // ESP
        "pushfd",
        "pop ebx",
        "or ebx, 0x200",        // force IF
        "push ebx",             // EFLAGS
        "push {user_cs}",       // CS
        "push eax",             // EIP
        "iretd",
        user_ds = const USER_DS as u32,
        user_cs = const USER_CS as u32,
    )
}
