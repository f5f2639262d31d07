//! 32-bit Interrupt Descriptor Table.
//!
//! Exception vectors 0x00-0x13 are trap gates at DPL 0 (a user-mode
//! exception still traps into ring 0 to be handled); IRQ vectors are
//! interrupt gates at DPL 0 (so one IRQ can't be interrupted while its
//! handler is assembling a response); vector 0x80 is a trap gate at DPL 3,
//! the only vector a ring 3 task may invoke directly (`int 0x80`). This
//! mirrors the gate-privilege table in spec.md §4.2 and the old long-mode
//! `idt.rs`'s handler-registration shape, rebuilt on raw 8-byte gate
//! descriptors since the `x86_64` crate's `InterruptDescriptorTable` type is
//! long-mode only.

use core::mem::size_of;
use lazy_static::lazy_static;

use super::KERNEL_CS;

const GATE_PRESENT: u8 = 1 << 7;
const GATE_DPL0: u8 = 0 << 5;
const GATE_DPL3: u8 = 3 << 5;
const GATE_TYPE_INTERRUPT32: u8 = 0xE;
const GATE_TYPE_TRAP32: u8 = 0xF;

#[repr(C, packed)]
#[derive(Clone, Copy)]
struct IdtEntry {
    offset_low: u16,
    selector: u16,
    zero: u8,
    type_attr: u8,
    offset_high: u16,
}

impl IdtEntry {
    const fn missing() -> Self {
        IdtEntry {
            offset_low: 0,
            selector: 0,
            zero: 0,
            type_attr: 0,
            offset_high: 0,
        }
    }

    fn new(handler: u32, gate_type: u8, dpl: u8) -> Self {
        IdtEntry {
            offset_low: (handler & 0xFFFF) as u16,
            selector: KERNEL_CS,
            zero: 0,
            type_attr: GATE_PRESENT | dpl | gate_type,
            offset_high: ((handler >> 16) & 0xFFFF) as u16,
        }
    }
}

#[repr(C, packed)]
struct IdtPointer {
    limit: u16,
    base: u32,
}

const IDT_ENTRIES: usize = 256;

/// Vector at which our exception and IRQ stubs are registered.
pub const VEC_DIVIDE_ERROR: u8 = 0x00;
pub const VEC_PAGE_FAULT: u8 = 0x0E;
pub const VEC_GENERAL_PROTECTION: u8 = 0x0D;
/// 8259 is remapped so IRQ0..7 land at 0x20..0x27 and IRQ8..15 at 0x28..0x2F.
pub const VEC_PIT: u8 = 0x20;
pub const VEC_KEYBOARD: u8 = 0x21;
pub const VEC_RTC: u8 = 0x28;
pub const VEC_SYSCALL: u8 = 0x80;

lazy_static! {
    static ref IDT: [IdtEntry; IDT_ENTRIES] = {
        let mut entries = [IdtEntry::missing(); IDT_ENTRIES];

        macro_rules! exception_gate {
            ($vec:literal, $stub:ident) => {
                entries[$vec] = IdtEntry::new($stub as u32, GATE_TYPE_TRAP32, GATE_DPL0);
            };
        }
        exception_gate!(0x00, exc_stub_00);
        exception_gate!(0x01, exc_stub_01);
        exception_gate!(0x02, exc_stub_02);
        exception_gate!(0x03, exc_stub_03);
        exception_gate!(0x04, exc_stub_04);
        exception_gate!(0x05, exc_stub_05);
        exception_gate!(0x06, exc_stub_06);
        exception_gate!(0x07, exc_stub_07);
        exception_gate!(0x08, exc_stub_08);
        exception_gate!(0x09, exc_stub_09);
        exception_gate!(0x0A, exc_stub_0a);
        exception_gate!(0x0B, exc_stub_0b);
        exception_gate!(0x0C, exc_stub_0c);
        exception_gate!(0x0D, exc_stub_0d);
        exception_gate!(0x0E, exc_stub_0e);
        exception_gate!(0x0F, exc_stub_0f);
        exception_gate!(0x10, exc_stub_10);
        exception_gate!(0x11, exc_stub_11);
        exception_gate!(0x12, exc_stub_12);
        exception_gate!(0x13, exc_stub_13);

        entries[VEC_PIT as usize] = IdtEntry::new(pit_stub as u32, GATE_TYPE_INTERRUPT32, GATE_DPL0);
        entries[VEC_KEYBOARD as usize] =
            IdtEntry::new(keyboard_stub as u32, GATE_TYPE_INTERRUPT32, GATE_DPL0);
        entries[VEC_RTC as usize] = IdtEntry::new(rtc_stub as u32, GATE_TYPE_INTERRUPT32, GATE_DPL0);
        entries[VEC_SYSCALL as usize] =
            IdtEntry::new(syscall_stub as u32, GATE_TYPE_TRAP32, GATE_DPL3);

        entries
    };
}

/// Vectors 8, 10-14 and 17 push a hardware error code before the gate fires;
/// the rest don't. Padding the ones that don't with a dummy zero keeps the
/// stack shape the same for every vector, so one common trampoline can pop
/// "vector, error code" in a fixed order regardless of which gate fired.
macro_rules! has_error_code {
    (0x08) => { true };
    (0x0A) => { true };
    (0x0B) => { true };
    (0x0C) => { true };
    (0x0D) => { true };
    (0x0E) => { true };
    (0x11) => { true };
    ($_:tt) => { false };
}

macro_rules! define_exception_stub {
    ($name:ident, $vec:tt) => {
        #[unsafe(naked)]
        extern "C" fn $name() {
            if has_error_code!($vec) {
                core::arch::naked_asm!(
                    "push {vec}",
                    "pusha",
                    "push esp",
                    "call {handler}",
                    "add esp, 4",
                    "popa",
                    "add esp, 8", // drop vector and hardware error code
                    "iretd",
                    vec = const $vec,
                    handler = sym crate::idt_handlers::exception_entry,
                )
            } else {
                core::arch::naked_asm!(
                    "push 0",
                    "push {vec}",
                    "pusha",
                    "push esp",
                    "call {handler}",
                    "add esp, 4",
                    "popa",
                    "add esp, 8",
                    "iretd",
                    vec = const $vec,
                    handler = sym crate::idt_handlers::exception_entry,
                )
            }
        }
    };
}

define_exception_stub!(exc_stub_00, 0x00);
define_exception_stub!(exc_stub_01, 0x01);
define_exception_stub!(exc_stub_02, 0x02);
define_exception_stub!(exc_stub_03, 0x03);
define_exception_stub!(exc_stub_04, 0x04);
define_exception_stub!(exc_stub_05, 0x05);
define_exception_stub!(exc_stub_06, 0x06);
define_exception_stub!(exc_stub_07, 0x07);
define_exception_stub!(exc_stub_08, 0x08);
define_exception_stub!(exc_stub_09, 0x09);
define_exception_stub!(exc_stub_0a, 0x0A);
define_exception_stub!(exc_stub_0b, 0x0B);
define_exception_stub!(exc_stub_0c, 0x0C);
define_exception_stub!(exc_stub_0d, 0x0D);
define_exception_stub!(exc_stub_0e, 0x0E);
define_exception_stub!(exc_stub_0f, 0x0F);
define_exception_stub!(exc_stub_10, 0x10);
define_exception_stub!(exc_stub_11, 0x11);
define_exception_stub!(exc_stub_12, 0x12);
define_exception_stub!(exc_stub_13, 0x13);

#[unsafe(naked)]
extern "C" fn pit_stub() {
    core::arch::naked_asm!(
        "pusha",
        "call {handler}",
        "popa",
        "iretd",
        handler = sym crate::idt_handlers::pit_entry,
    )
}

#[unsafe(naked)]
extern "C" fn keyboard_stub() {
    core::arch::naked_asm!(
        "pusha",
        "call {handler}",
        "popa",
        "iretd",
        handler = sym crate::idt_handlers::keyboard_entry,
    )
}

#[unsafe(naked)]
extern "C" fn rtc_stub() {
    core::arch::naked_asm!(
        "pusha",
        "call {handler}",
        "popa",
        "iretd",
        handler = sym crate::idt_handlers::rtc_entry,
    )
}

/// The syscall stub is the one gate reachable from ring 3, so unlike the
/// others it preserves EAX/EBX/ECX/EDX across the call (the syscall
/// convention reads args from EBX/ECX/EDX and returns through EAX) instead of
/// blindly popping whatever `handle_syscall` left behind.
#[unsafe(naked)]
extern "C" fn syscall_stub() {
    core::arch::naked_asm!(
        "push edx",
        "push ecx",
        "push ebx",
        "push eax",
        "call {handler}",
        "add esp, 12", // drop saved ebx/ecx/edx, eax is overwritten with the result
        "add esp, 4",
        "iretd",
        handler = sym crate::idt_handlers::syscall_entry,
    )
}

/// Load the IDT. Must run after [`super::gdt::init`] so `KERNEL_CS` is valid.
pub fn init() {
    let pointer = IdtPointer {
        limit: (size_of::<IdtEntry>() * IDT_ENTRIES - 1) as u16,
        base: IDT.as_ptr() as u32,
    };

    // SAFETY: `pointer` references a `lazy_static` table that outlives the
    // kernel, and every gate's selector (`KERNEL_CS`) was loaded by
    // `gdt::init`, which runs first.
    unsafe {
        core::arch::asm!(
            "lidt [{0}]",
            in(reg) &pointer,
            options(readonly, nostack, preserves_flags)
        );
    }

    crate::klog::log(crate::klog::Level::Info, "idt", "loaded 32-bit IDT");
}
