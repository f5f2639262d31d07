//! CMOS Real-Time Clock chip programming.
//!
//! This is the hardware layer only: setting the periodic interrupt rate to
//! its fastest supported value (1024 Hz) and acknowledging each IRQ8 by
//! reading register C (required or the chip stops firing). The per-task
//! frequency division that turns this fixed 1024 Hz source into the 2-1024
//! Hz range a task can request lives in [`crate::rtc`], matching spec.md
//! §4.6.4's split between "one real periodic device" and "many virtual
//! rates".

use super::{inb, outb};

const CMOS_ADDRESS: u16 = 0x70;
const CMOS_DATA: u16 = 0x71;

const REG_A: u8 = 0x0A;
const REG_B: u8 = 0x0B;
const REG_C: u8 = 0x0C;

/// Rate 6 = 1024 Hz (the fastest rate the spec's terminals ever request).
const RATE_1024HZ: u8 = 0x06;
/// Bit 0x80 disables NMI while we select a CMOS register, matching the
/// standard CMOS access convention.
const NMI_DISABLE: u8 = 0x80;

fn read_reg(reg: u8) -> u8 {
    // SAFETY: 0x70/0x71 are the documented CMOS index/data ports.
    unsafe {
        outb(CMOS_ADDRESS, reg | NMI_DISABLE);
        inb(CMOS_DATA)
    }
}

fn write_reg(reg: u8, value: u8) {
    // SAFETY: 0x70/0x71 are the documented CMOS index/data ports.
    unsafe {
        outb(CMOS_ADDRESS, reg | NMI_DISABLE);
        outb(CMOS_DATA, value);
    }
}

pub fn init() {
    let prev_a = read_reg(REG_A);
    write_reg(REG_A, (prev_a & 0xF0) | RATE_1024HZ);

    let prev_b = read_reg(REG_B);
    write_reg(REG_B, prev_b | 0x40);

    // Clear any pending interrupt flag left over from before we took over
    // register B, so the first real tick isn't swallowed by a stale status.
    acknowledge();

    crate::klog::log(crate::klog::Level::Info, "cmos_rtc", "periodic rate set to 1024 Hz");
}

/// Read register C to acknowledge the interrupt. Until this happens the
/// RTC won't raise IRQ8 again.
pub fn acknowledge() {
    read_reg(REG_C);
}
