//! Bare-metal entry point.
//!
//! `_start` is the Multiboot1-compliant boot target a GRUB-class loader
//! jumps to in 32-bit protected mode with paging still off, EAX holding the
//! Multiboot magic and EBX pointing at the `multiboot_info_t` structure.
//! The loader's one job here is to hand the kernel image the filesystem
//! blob: the boot CD/disk carries it as the first (and only) Multiboot
//! module, and `module_image` reads that module's `[mod_start, mod_end)`
//! pair straight out of the info structure before anything else runs. The
//! rest of bring-up — GDT/IDT/PIC/PIT/RTC/paging, then the three terminal
//! records, then handing off to the scheduler — follows the same order
//! `kernel.c`'s `entry()` uses.

#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(target_os = "none")]
use core::panic::PanicInfo;

#[cfg(target_os = "none")]
use veridian_kernel::{arch, fs, klog, scheduler, serial_println, terminal};

/// Layout of the subset of `multiboot_info_t` this kernel reads: the flags
/// word (bit 3 marks the module fields valid) and the module count/address,
/// each module entry being `{mod_start, mod_end, string, reserved}`.
#[cfg(target_os = "none")]
#[repr(C)]
struct MultibootInfo {
    flags: u32,
    _mem: [u32; 2],
    _boot_device: u32,
    _cmdline: u32,
    mods_count: u32,
    mods_addr: u32,
}

#[cfg(target_os = "none")]
#[repr(C)]
struct MultibootModule {
    mod_start: u32,
    mod_end: u32,
    _string: u32,
    _reserved: u32,
}

const MULTIBOOT_FLAG_MODS: u32 = 1 << 3;

/// Read the first Multiboot module's bounds as the filesystem image. Halts
/// the system outright if the loader didn't hand us one: there is no
/// filesystem without it, and every terminal's first shell depends on one
/// existing.
///
/// # Safety
/// `info_ptr` must be the EBX value the Multiboot loader passed to `_start`,
/// untouched.
#[cfg(target_os = "none")]
unsafe fn module_image(info_ptr: u32) -> &'static [u8] {
    // SAFETY: `info_ptr` is the loader-supplied Multiboot info pointer,
    // valid for the kernel's entire lifetime per the Multiboot contract.
    let info = unsafe { &*(info_ptr as *const MultibootInfo) };
    if info.flags & MULTIBOOT_FLAG_MODS == 0 || info.mods_count == 0 {
        serial_println!("no multiboot filesystem module supplied");
        arch::halt();
    }
    // SAFETY: `mods_addr` points at `mods_count` contiguous module entries,
    // guaranteed valid by the same contract as `info` itself.
    let module = unsafe { &*(info.mods_addr as *const MultibootModule) };
    // SAFETY: the module descriptor's bounds name a region the loader
    // placed in memory before paging's identity map took over; `fs::init`
    // borrows it for the kernel's whole lifetime.
    unsafe {
        core::slice::from_raw_parts(
            module.mod_start as *const u8,
            (module.mod_end - module.mod_start) as usize,
        )
    }
}

#[cfg(target_os = "none")]
#[no_mangle]
pub extern "C" fn _start(_multiboot_magic: u32, multiboot_info: u32) -> ! {
    serial::init_early();
    serial_println!("veridian-kernel booting");

    arch::x86::init();

    // SAFETY: called once, before any task exists, with `multiboot_info`
    // fresh off the loader handoff.
    let image = unsafe { module_image(multiboot_info) };
    fs::init(image);

    terminal::init();
    arch::x86::enable_devices();

    klog::log(klog::Level::Info, "boot", "handing off to scheduler");
    scheduler::run();
}

#[cfg(target_os = "none")]
mod serial {
    pub fn init_early() {
        veridian_kernel::serial::init();
    }
}

#[cfg(target_os = "none")]
#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    serial_println!("[KERNEL PANIC] {}", info);
    arch::halt();
}

// `cargo test`/`cargo build` against the hosted target builds this crate
// too (it's the `[[bin]]` target); give it an ordinary `fn main` so host
// builds succeed without requiring the bare-metal target's linker script.
#[cfg(not(target_os = "none"))]
fn main() {}
