//! `print!`/`println!` over the running terminal's VGA screen.
//!
//! Unlike `serial_print!` (always COM1, regardless of terminal state),
//! these macros are for kernel-to-user-visible output: boot milestones and
//! the panic handler's final message, written via [`crate::terminal::kprint`]
//! so they land wherever the currently-running terminal's screen is (live
//! VGA if it's also active, its off-screen buffer otherwise).

use core::fmt;

struct TerminalWriter;

impl fmt::Write for TerminalWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        crate::terminal::kprint(s.as_bytes());
        Ok(())
    }
}

#[doc(hidden)]
pub fn _print(args: fmt::Arguments) {
    use fmt::Write;
    let _ = TerminalWriter.write_fmt(args);
}

#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => ($crate::print::_print(format_args!($($arg)*)));
}

#[macro_export]
macro_rules! println {
    () => ($crate::print!("\n"));
    ($($arg:tt)*) => ($crate::print!("{}\n", format_args!($($arg)*)));
}
