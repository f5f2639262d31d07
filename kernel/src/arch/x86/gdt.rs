//! 32-bit Global Descriptor Table and Task State Segment.
//!
//! The `x86_64` crate's GDT builder only emits long-mode descriptors, so the
//! table here is hand-rolled: six raw 8-byte entries (null, kernel code,
//! kernel data, user code, user data, TSS) loaded with `lgdt`/`ltr`. The
//! overall shape — a `lazy_static!` table plus a `set_kernel_stack` accessor
//! used by the scheduler on every context switch — follows
//! `doublegate-VeridianOS/kernel/src/arch/x86_64/gdt.rs`.

use core::mem::size_of;
use lazy_static::lazy_static;
use spin::Mutex;

use super::{KERNEL_DS, USER_DS};

const ACCESS_PRESENT: u8 = 1 << 7;
const ACCESS_CODE_DATA: u8 = 1 << 4;
const ACCESS_EXECUTABLE: u8 = 1 << 3;
const ACCESS_RW: u8 = 1 << 1;
const ACCESS_DPL3: u8 = 3 << 5;
const ACCESS_TSS: u8 = 0x9;

const FLAGS_GRANULARITY_4K: u8 = 1 << 3;
const FLAGS_32BIT: u8 = 1 << 2;

#[repr(C, packed)]
#[derive(Clone, Copy)]
struct GdtEntry {
    limit_low: u16,
    base_low: u16,
    base_mid: u8,
    access: u8,
    limit_high_flags: u8,
    base_high: u8,
}

impl GdtEntry {
    const fn null() -> Self {
        GdtEntry {
            limit_low: 0,
            base_low: 0,
            base_mid: 0,
            access: 0,
            limit_high_flags: 0,
            base_high: 0,
        }
    }

    const fn new(base: u32, limit: u32, access: u8, flags: u8) -> Self {
        GdtEntry {
            limit_low: (limit & 0xFFFF) as u16,
            base_low: (base & 0xFFFF) as u16,
            base_mid: ((base >> 16) & 0xFF) as u8,
            access,
            limit_high_flags: (((limit >> 16) & 0x0F) as u8) | (flags << 4),
            base_high: ((base >> 24) & 0xFF) as u8,
        }
    }
}

#[repr(C, packed)]
struct GdtPointer {
    limit: u16,
    base: u32,
}

/// 32-bit TSS. Only `ss0`/`esp0` matter to us (they give the CPU the kernel
/// stack to load on a ring 3 -> ring 0 transition); the rest of the fields
/// exist because the CPU reads the whole structure as a fixed layout.
#[repr(C, packed)]
struct Tss {
    prev_task_link: u32,
    esp0: u32,
    ss0: u32,
    esp1: u32,
    ss1: u32,
    esp2: u32,
    ss2: u32,
    cr3: u32,
    eip: u32,
    eflags: u32,
    eax: u32,
    ecx: u32,
    edx: u32,
    ebx: u32,
    esp: u32,
    ebp: u32,
    esi: u32,
    edi: u32,
    es: u32,
    cs: u32,
    ss: u32,
    ds: u32,
    fs: u32,
    gs: u32,
    ldtr: u32,
    trap: u16,
    iomap_base: u16,
}

impl Tss {
    const fn new() -> Self {
        Tss {
            prev_task_link: 0,
            esp0: 0,
            ss0: KERNEL_DS as u32,
            esp1: 0,
            ss1: 0,
            esp2: 0,
            ss2: 0,
            cr3: 0,
            eip: 0,
            eflags: 0,
            eax: 0,
            ecx: 0,
            edx: 0,
            ebx: 0,
            esp: 0,
            ebp: 0,
            esi: 0,
            edi: 0,
            es: 0,
            cs: 0,
            ss: 0,
            ds: 0,
            fs: 0,
            gs: 0,
            ldtr: 0,
            trap: 0,
            iomap_base: size_of::<Tss>() as u16,
        }
    }
}

const GDT_ENTRIES: usize = 6;

struct GdtTable {
    entries: [GdtEntry; GDT_ENTRIES],
}

// SAFETY: the TSS is only ever mutated with interrupts disabled (the
// scheduler calls `set_kernel_stack` inside a context-switch critical
// section), and the CPU's own reads of it are hardware-serialized.
unsafe impl Send for Tss {}

lazy_static! {
    static ref TSS: Mutex<Tss> = Mutex::new(Tss::new());
    static ref GDT: GdtTable = {
        let tss_addr = {
            let tss = TSS.lock();
            &*tss as *const Tss as u32
        };
        GdtTable {
            entries: [
                GdtEntry::null(),
                // Kernel code: base 0, limit 4G, present, ring 0, executable+readable
                GdtEntry::new(
                    0,
                    0xFFFFF,
                    ACCESS_PRESENT | ACCESS_CODE_DATA | ACCESS_EXECUTABLE | ACCESS_RW,
                    FLAGS_GRANULARITY_4K | FLAGS_32BIT,
                ),
                // Kernel data: base 0, limit 4G, present, ring 0, writable
                GdtEntry::new(
                    0,
                    0xFFFFF,
                    ACCESS_PRESENT | ACCESS_CODE_DATA | ACCESS_RW,
                    FLAGS_GRANULARITY_4K | FLAGS_32BIT,
                ),
                // User code: base 0, limit 4G, present, ring 3, executable+readable
                GdtEntry::new(
                    0,
                    0xFFFFF,
                    ACCESS_PRESENT | ACCESS_DPL3 | ACCESS_CODE_DATA | ACCESS_EXECUTABLE | ACCESS_RW,
                    FLAGS_GRANULARITY_4K | FLAGS_32BIT,
                ),
                // User data: base 0, limit 4G, present, ring 3, writable
                GdtEntry::new(
                    0,
                    0xFFFFF,
                    ACCESS_PRESENT | ACCESS_DPL3 | ACCESS_CODE_DATA | ACCESS_RW,
                    FLAGS_GRANULARITY_4K | FLAGS_32BIT,
                ),
                // TSS: base = &TSS, limit = size_of::<Tss>(), byte granularity
                GdtEntry::new(tss_addr, (size_of::<Tss>() - 1) as u32, ACCESS_PRESENT | ACCESS_TSS, 0),
            ],
        }
    };
}

/// GDT selector for the TSS descriptor (index 5, RPL 0).
const TSS_SELECTOR: u16 = 5 * 8;

/// Load the GDT, reload segment registers, and load the task register.
///
/// # Safety
/// Must run once, early in boot, before any interrupt or far jump relies on
/// segment selectors matching this layout.
pub fn init() {
    let pointer = GdtPointer {
        limit: (size_of::<GdtEntry>() * GDT_ENTRIES - 1) as u16,
        base: GDT.entries.as_ptr() as u32,
    };

    // SAFETY: `pointer` describes a table that outlives the kernel (it is a
    // `lazy_static`), and the segment reloads below match the descriptor
    // layout built above (selectors 0x08/0x10 for code/data).
    unsafe {
        core::arch::asm!(
            "lgdt [{0}]",
            in(reg) &pointer,
            options(readonly, nostack, preserves_flags)
        );
        reload_segments();
        core::arch::asm!(
            "ltr {0:x}",
            in(reg) TSS_SELECTOR,
            options(nostack, preserves_flags)
        );
    }

    crate::klog::log(crate::klog::Level::Info, "gdt", "loaded 32-bit GDT and TSS");
}

/// # Safety
/// Must only be called once `lgdt` has loaded a table with kernel code/data
/// selectors 0x08/0x10 at the expected indices.
unsafe fn reload_segments() {
    // SAFETY: far-jumps to a known-good code selector and reloads of the
    // data selectors the GDT above defines at indices 1 and 2.
    unsafe {
        core::arch::asm!(
            "push {cs}",
            "lea eax, [2f]",
            "push eax",
            "retf",
            "2:",
            "mov ax, {ds}",
            "mov ds, ax",
            "mov es, ax",
            "mov fs, ax",
            "mov gs, ax",
            "mov ss, ax",
            cs = const 0x08u32,
            ds = const 0x10u32,
            out("eax") _,
            options(nostack)
        );
    }
}

/// Set the stack the CPU switches to on a ring 3 -> ring 0 transition
/// (interrupt, exception, or `int 0x80`). Called by the scheduler on every
/// context switch so the incoming task's kernel stack is the one the CPU
/// will use the next time it traps back into ring 0.
///
/// # Safety
/// Must be called with interrupts disabled; `stack_top` must point to the
/// top of a valid, live kernel stack for the task about to run.
pub unsafe fn set_kernel_stack(stack_top: u32) {
    let mut tss = TSS.lock();
    tss.esp0 = stack_top;
}

pub fn kernel_stack() -> u32 {
    let tss = TSS.lock();
    tss.esp0
}
