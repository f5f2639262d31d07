//! Virtualized real-time clock.
//!
//! There is exactly one hardware RTC, ticking at a fixed 1024 Hz
//! ([`crate::arch::x86::cmos_rtc`]); every task that opens it gets its own
//! much slower virtual frequency, implemented the way `rtc.c`'s
//! `rtc_handler` does it: each tick, a present task's `tick_count`
//! decrements by its requested frequency until it goes non-positive, at
//! which point its interrupt flag latches until `rtc_read` observes and
//! clears it. `rtc_open` always resets a task to 2 Hz; `rtc_write` can
//! raise or lower that to any power of two up to the real 1024 Hz rate.

use crate::error::{KernelResult, SyscallError};
use crate::process::MAX_TASKS;

/// The real hardware tick rate the virtual frequencies are divided out of.
const REAL_FREQ: i32 = 1024;

/// Valid virtual frequencies: powers of two from 2 through 1024 inclusive,
/// matching `get_rate`'s exhaustive switch in the original driver.
fn is_valid_frequency(hz: u32) -> bool {
    matches!(hz, 2 | 4 | 8 | 16 | 32 | 64 | 128 | 256 | 512 | 1024)
}

/// Advance every present task's virtual divider by one real tick. Called
/// from the RTC interrupt handler.
pub fn on_tick() {
    for pid in 0..MAX_TASKS as u8 {
        let _ = crate::process::with_pcb_mut(pid, |pcb| {
            let Some(freq) = pcb.virtual_freq else {
                return;
            };
            if pcb.tick_count > 0 {
                pcb.tick_count -= freq as i32;
            } else {
                pcb.rtc_interrupt_pending = true;
            }
        });
    }
}

/// `rtc_open`: always starts a task at 2 Hz, matching the original's fixed
/// default regardless of what the caller might later request.
pub fn open(pid: u8) -> KernelResult<()> {
    crate::process::with_pcb_mut(pid, |pcb| {
        pcb.virtual_freq = Some(2);
        pcb.tick_count = REAL_FREQ;
        pcb.rtc_interrupt_pending = false;
    })
}

pub fn close(pid: u8) -> KernelResult<()> {
    crate::process::with_pcb_mut(pid, |pcb| {
        pcb.virtual_freq = None;
        pcb.tick_count = 0;
        pcb.rtc_interrupt_pending = false;
    })
}

/// Busy-wait (yielding the CPU via `arch::x86::idle` between checks,
/// rather than the original's pure spin) until `pid`'s virtual interrupt
/// flag latches, then clear it and reload `tick_count`.
pub fn block_until_tick(pid: u8) {
    loop {
        let fired = crate::process::with_pcb(pid, |pcb| pcb.rtc_interrupt_pending).unwrap_or(true);
        if fired {
            break;
        }
        crate::arch::x86::idle();
    }
    let _ = crate::process::with_pcb_mut(pid, |pcb| {
        pcb.rtc_interrupt_pending = false;
        pcb.tick_count = REAL_FREQ;
    });
}

/// `rtc_write`: the 4-byte buffer holds a little-endian `u32` requested
/// frequency; anything other than a power of two from 2 to 1024 is
/// rejected without touching the task's state.
pub fn set_frequency(pid: u8, buf: &[u8]) -> KernelResult<()> {
    if buf.len() < 4 {
        return Err(SyscallError::InvalidArgument.into());
    }
    let hz = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
    if !is_valid_frequency(hz) {
        return Err(SyscallError::InvalidArgument.into());
    }
    crate::process::with_pcb_mut(pid, |pcb| {
        pcb.virtual_freq = Some(hz);
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_power_of_two_and_out_of_range() {
        assert!(!is_valid_frequency(3));
        assert!(!is_valid_frequency(2048));
        assert!(!is_valid_frequency(0));
        assert!(is_valid_frequency(1024));
        assert!(is_valid_frequency(2));
    }

    #[test]
    fn open_resets_to_2hz_and_full_tick_budget() {
        let pid = crate::process::allocate(None, 0).unwrap();
        open(pid).unwrap();
        crate::process::with_pcb(pid, |pcb| {
            assert_eq!(pcb.virtual_freq, Some(2));
            assert_eq!(pcb.tick_count, REAL_FREQ);
        })
        .unwrap();
        crate::process::free(pid);
    }

    #[test]
    fn on_tick_latches_flag_once_budget_exhausted() {
        let pid = crate::process::allocate(None, 0).unwrap();
        open(pid).unwrap();
        crate::process::with_pcb_mut(pid, |pcb| pcb.tick_count = 1).unwrap();
        on_tick();
        let pending = crate::process::with_pcb(pid, |pcb| pcb.rtc_interrupt_pending).unwrap();
        assert!(pending);
        crate::process::free(pid);
    }
}
