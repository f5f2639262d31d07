//! Architecture boundary.
//!
//! Everything that depends on the concrete CPU — segmentation, interrupt
//! gates, device register layouts — lives under [`x86`]. Most of that
//! module is ordinary 32-bit-register asm (`in`/`out`/`cli`/`sti`/`hlt`,
//! `lgdt`/`lidt`/`ltr`, `iretd`) that assembles identically whether the
//! compiler's target word size is 32 or 64 bits, so `x86` is built for both
//! the real kernel target (`x86`) and the hosted test target (`x86_64`) —
//! only [`x86::paging`], which issues bare `mov cr0/cr3/cr4` (invalid in
//! long mode the way this module writes them), is gated to the real target
//! alone within its own file. The rest of the kernel talks to this module's
//! re-exports, never to `x86` directly, so the platform-specific details
//! stay isolated to one place (per the scheduler and paging designs in
//! spec.md §4.1/§4.3).

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub mod x86;

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub use x86::{disable_interrupts, halt, idle, inb, outb};
