//! 8253/8254 Programmable Interval Timer, programmed for the ~100 Hz
//! scheduler tick spec.md §4.3 calls for. Adapted from the teacher's
//! `arch/x86_64/timer.rs`, which already expressed this as "compute a
//! divisor from a target frequency and program channel 0 in mode 3".

use super::outb;

const PIT_FREQUENCY_HZ: u32 = 1_193_182;
const TARGET_HZ: u32 = 100;

const CHANNEL0_DATA: u16 = 0x40;
const COMMAND: u16 = 0x43;

/// Channel 0, lobyte/hibyte access, mode 3 (square wave generator).
const COMMAND_BYTE: u8 = 0b0011_0110;

pub fn init() {
    let divisor = (PIT_FREQUENCY_HZ / TARGET_HZ) as u16;
    // SAFETY: 0x40/0x43 are the PIT's documented data/command ports; this
    // sequence (command byte, low byte, high byte) is the standard PIT
    // programming protocol.
    unsafe {
        outb(COMMAND, COMMAND_BYTE);
        outb(CHANNEL0_DATA, (divisor & 0xFF) as u8);
        outb(CHANNEL0_DATA, (divisor >> 8) as u8);
    }
    crate::klog::log(crate::klog::Level::Info, "pit", "programmed for 100 Hz");
}

pub const fn ticks_per_second() -> u32 {
    TARGET_HZ
}
