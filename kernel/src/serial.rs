//! COM1 debug channel.
//!
//! Hand-rolled 16550 UART driver over [`crate::arch::x86::{inb, outb}`]
//! rather than the `uart_16550` crate: that crate's `SerialPort` is built on
//! the `x86_64` crate's `Port`, gated `#[cfg(target_arch = "x86_64")]`
//! internally, and so cannot be linked into the real `target_arch = "x86"`
//! kernel binary (see DESIGN.md). `serial_print!`/`serial_println!` are the
//! only debug-output channel used from inside tests (`klog` also routes its
//! warn/error entries here) since the VGA-backed `print!` macro needs a live
//! terminal to exist first.

use core::fmt;

const COM1: u16 = 0x3F8;

struct SerialPort;

impl SerialPort {
    /// Program the 16550 for 38400 baud, 8N1, and enable its FIFOs.
    ///
    /// # Safety
    /// Must only run once; concurrent initialization from two contexts
    /// would race on the line-control/divisor-latch registers.
    unsafe fn init() {
        // SAFETY: COM1's register block at 0x3F8..0x3FF is the documented
        // 16550 layout; this is the standard baud/format/FIFO bring-up
        // sequence.
        unsafe {
            use crate::arch::x86::outb;
            outb(COM1 + 1, 0x00); // disable interrupts
            outb(COM1 + 3, 0x80); // enable DLAB (set baud rate divisor)
            outb(COM1, 0x03); // divisor low byte (38400 baud)
            outb(COM1 + 1, 0x00); // divisor high byte
            outb(COM1 + 3, 0x03); // 8 bits, no parity, one stop bit
            outb(COM1 + 2, 0xC7); // enable FIFO, clear, 14-byte threshold
            outb(COM1 + 4, 0x0B); // IRQs disabled, RTS/DSR set
        }
    }

    fn write_byte(&mut self, byte: u8) {
        use crate::arch::x86::{inb, outb};
        // SAFETY: 0x3F8..0x3FD are COM1's documented data/line-status
        // registers; spinning on the "transmit holding register empty" bit
        // before writing is the standard polled-UART send sequence.
        unsafe {
            while inb(COM1 + 5) & 0x20 == 0 {
                core::hint::spin_loop();
            }
            outb(COM1, byte);
        }
    }
}

impl fmt::Write for SerialPort {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            self.write_byte(byte);
        }
        Ok(())
    }
}

/// Bring up COM1. Safe to call more than once; each call reprograms the
/// same fixed baud/format, so repeated init is a no-op in effect.
pub fn init() {
    // SAFETY: called once from boot before any other CPU context touches
    // COM1.
    unsafe {
        SerialPort::init();
    }
}

#[doc(hidden)]
pub fn _serial_print(args: fmt::Arguments) {
    use fmt::Write;
    let _guard = crate::arch::x86::disable_interrupts();
    let mut port = SerialPort;
    let _ = port.write_fmt(args);
}

#[macro_export]
macro_rules! serial_print {
    ($($arg:tt)*) => {
        $crate::serial::_serial_print(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! serial_println {
    () => ($crate::serial_print!("\n"));
    ($($arg:tt)*) => {
        $crate::serial_print!("{}\n", format_args!($($arg)*))
    };
}
