//! Fixed-capacity structured log ring buffer.
//!
//! Grounded on `doublegate-VeridianOS/kernel/src/log_service.rs`'s shape
//! (a ring buffer of leveled, tagged entries) but without that module's
//! `alloc::String` fields: this kernel never allocates, so the subsystem
//! tag and message are fixed-size byte arrays, and a full buffer overwrites
//! its oldest entry instead of growing.

use spin::Mutex;

const CAPACITY: usize = 256;
const TAG_LEN: usize = 12;
const MSG_LEN: usize = 64;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum Level {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Level {
    fn as_str(self) -> &'static str {
        match self {
            Level::Error => "ERROR",
            Level::Warn => "WARN",
            Level::Info => "INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        }
    }
}

#[derive(Clone, Copy)]
struct Entry {
    tick: u64,
    level: Level,
    tag: [u8; TAG_LEN],
    tag_len: u8,
    msg: [u8; MSG_LEN],
    msg_len: u8,
}

impl Entry {
    const fn empty() -> Self {
        Entry {
            tick: 0,
            level: Level::Trace,
            tag: [0; TAG_LEN],
            tag_len: 0,
            msg: [0; MSG_LEN],
            msg_len: 0,
        }
    }
}

fn copy_into(dst: &mut [u8], src: &str) -> u8 {
    let bytes = src.as_bytes();
    let n = bytes.len().min(dst.len());
    dst[..n].copy_from_slice(&bytes[..n]);
    n as u8
}

struct RingBuffer {
    entries: [Entry; CAPACITY],
    next: usize,
    len: usize,
    ticks: u64,
}

static LOG: Mutex<RingBuffer> = Mutex::new(RingBuffer {
    entries: [Entry::empty(); CAPACITY],
    next: 0,
    len: 0,
    ticks: 0,
});

/// Record a structured log entry. Safe to call from interrupt context: the
/// lock is only ever held for the duration of the array write.
pub fn log(level: Level, tag: &str, msg: &str) {
    let mut guard = LOG.lock();
    let tick = guard.ticks;
    let idx = guard.next;
    let entry = &mut guard.entries[idx];
    entry.tick = tick;
    entry.level = level;
    entry.tag_len = copy_into(&mut entry.tag, tag);
    entry.msg_len = copy_into(&mut entry.msg, msg);
    guard.next = (idx + 1) % CAPACITY;
    if guard.len < CAPACITY {
        guard.len += 1;
    }

    if level <= Level::Warn {
        let tag_str = core::str::from_utf8(&entry.tag[..entry.tag_len as usize]).unwrap_or("?");
        let msg_str = core::str::from_utf8(&entry.msg[..entry.msg_len as usize]).unwrap_or("?");
        crate::serial_println!("[{}] {}: {}", level.as_str(), tag_str, msg_str);
    }
}

/// Advance the internal tick counter. Called once per PIT interrupt so log
/// entries carry a coarse, monotonic timestamp without reading any hardware
/// clock from inside the logger itself.
pub fn tick() {
    LOG.lock().ticks += 1;
}

/// Number of entries currently stored (for tests and diagnostics).
pub fn len() -> usize {
    LOG.lock().len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_wraps() {
        for i in 0..CAPACITY + 10 {
            log(Level::Info, "test", "entry");
            let _ = i;
        }
        assert_eq!(len(), CAPACITY);
    }

    #[test]
    fn truncates_long_fields() {
        log(Level::Debug, "a-very-long-subsystem-tag-name", "x");
        assert!(len() >= 1);
    }
}
