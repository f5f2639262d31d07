//! Rust-side bodies for the naked asm stubs in [`crate::arch::x86::idt`].
//!
//! Each stub saves registers, builds a pointer to the frame below, and calls
//! straight into one of these functions with normal `extern "C"` calling
//! convention. Keeping the actual logic here (rather than inline in the
//! naked blocks) means it can borrow ordinary Rust control flow, match
//! arms, and `klog` calls instead of more asm.

use crate::arch::x86;
use crate::klog::{self, Level};

/// Layout pushed by the common exception stub, read back as a pointer.
/// Matches `pusha` order (EDI first in memory) followed by the vector,
/// hardware/dummy error code, and the CPU-pushed EIP/CS/EFLAGS.
#[repr(C)]
struct ExceptionFrame {
    edi: u32,
    esi: u32,
    ebp: u32,
    esp_dummy: u32,
    ebx: u32,
    edx: u32,
    ecx: u32,
    eax: u32,
    vector: u32,
    error_code: u32,
    eip: u32,
    cs: u32,
    eflags: u32,
}

const EXCEPTION_NAMES: [&str; 20] = [
    "divide-error",
    "debug",
    "nmi",
    "breakpoint",
    "overflow",
    "bound-range",
    "invalid-opcode",
    "device-not-available",
    "double-fault",
    "coprocessor-segment-overrun",
    "invalid-tss",
    "segment-not-present",
    "stack-segment-fault",
    "general-protection-fault",
    "page-fault",
    "reserved",
    "x87-fpu-error",
    "alignment-check",
    "machine-check",
    "simd-fp-error",
];

/// # Safety
/// Only called by the naked exception stubs with a valid frame pointer.
#[unsafe(no_mangle)]
extern "C" fn exception_entry(frame: *const u32) {
    // SAFETY: `frame` was constructed by the stub's own `push esp` right
    // after `pusha`, so it points at a live `ExceptionFrame` on the
    // current kernel stack.
    let frame = unsafe { &*(frame as *const ExceptionFrame) };
    let name = EXCEPTION_NAMES
        .get(frame.vector as usize)
        .copied()
        .unwrap_or("unknown-exception");

    if frame.vector == x86::idt::VEC_PAGE_FAULT as u32 {
        let fault_addr = x86::read_cr2();
        klog::log(
            Level::Error,
            "idt",
            "page fault",
        );
        let _ = fault_addr;
    } else {
        klog::log(Level::Error, "idt", name);
    }

    // An exception delivered to a running user task halts just that task
    // with status 256, the same sentinel `exception_halt` in the original
    // kernel uses to distinguish a fault from a task's own voluntary
    // `halt(status)` call; one delivered with no task running (still early
    // in boot) is fatal to the whole system.
    let _ = name;
    let terminal = crate::terminal::running_terminal();
    match crate::process::current_pid(terminal) {
        Some(pid) => crate::syscall::process::halt_task(pid, 256),
        None => x86::halt(),
    }
}

#[unsafe(no_mangle)]
extern "C" fn pit_entry() {
    x86::pic::eoi(x86::pic::Irq::Timer);
    crate::scheduler::on_timer_tick();
}

#[unsafe(no_mangle)]
extern "C" fn keyboard_entry() {
    let scancode = unsafe { x86::inb(0x60) };
    x86::pic::eoi(x86::pic::Irq::Keyboard);
    crate::keyboard::on_scancode(scancode);
}

#[unsafe(no_mangle)]
extern "C" fn rtc_entry() {
    x86::cmos_rtc::acknowledge();
    x86::pic::eoi(x86::pic::Irq::Rtc);
    crate::rtc::on_tick();
}

/// # Safety
/// Only called by the syscall naked stub, which has pushed EAX/EBX/ECX/EDX
/// in that order immediately before the call.
#[unsafe(no_mangle)]
extern "C" fn syscall_entry(eax: u32, ebx: u32, ecx: u32, edx: u32) -> u32 {
    crate::syscall::dispatch(eax, ebx, ecx, edx) as u32
}
