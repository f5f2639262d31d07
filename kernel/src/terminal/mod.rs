//! Terminal multiplexing.
//!
//! Three terminals exist for the whole life of the kernel. Each owns a line discipline
//! (a 128-byte input buffer filled by the keyboard handler and drained a
//! line at a time by `terminal_read`) and a screen — terminal 0's screen
//! is the live VGA buffer; terminals 1 and 2 keep their screen in an
//! off-screen [`arch::x86::vga::Cell`] array and only get copied onto the
//! real hardware while they're the *active* (foreground) terminal.
//!
//! "Active" and "running" are independent, matching `scheduler.c`:
//! *active* is whichever terminal currently owns the keyboard and the
//! physical screen (switched by Alt+F1/F2/F3); *running* is whichever
//! terminal the round-robin scheduler is currently giving CPU time to.
//! A terminal not currently running can still be seen on screen (its
//! output keeps arriving, it's just not making progress), and a running
//! terminal not currently active keeps executing with its output going to
//! its off-screen buffer.

use crate::arch::x86::vga::{self, Cell};
use crate::error::{KernelResult, SyscallError};
use spin::Mutex;

pub const TERMINAL_COUNT: usize = 3;
const LINE_BUFFER_SIZE: usize = 128;

/// Scrollback depth: roughly 10 screens worth of rows.
const HISTORY_SCREENS: usize = 10;
const HISTORY_CAPACITY: usize = HISTORY_SCREENS * vga::VGA_HEIGHT;

type Row = [Cell; vga::VGA_WIDTH];
const BLANK_ROW: Row = [Cell::BLANK; vga::VGA_WIDTH];

struct Terminal {
    cursor_row: usize,
    cursor_col: usize,
    screen: [Cell; vga::VGA_BUFFER_CELLS],
    curr_pid: Option<u8>,
    line_buf: [u8; LINE_BUFFER_SIZE],
    line_len: usize,
    /// Set by the keyboard handler on Enter, cleared once `terminal_read`
    /// drains the line. A blocked `terminal_read` polls this with
    /// `arch::x86::idle()`, matching the original's busy-wait-on-hlt loop.
    line_ready: bool,
    /// Kernel ESP/EBP this terminal's task was suspended at, restored by
    /// the scheduler on the next rotation back to it.
    saved_esp: u32,
    saved_ebp: u32,
    /// Ctrl+C arrived while this terminal wasn't active; the timer handler
    /// checks this and halts the task on the next tick, since halting
    /// directly from inside the keyboard ISR while the terminal is merely
    /// running, not active, isn't otherwise safe.
    deferred_halt: bool,
    /// Rows scrolled off the top of [`Terminal::screen`], oldest first, a
    /// ring buffer of capacity [`HISTORY_CAPACITY`].
    history: [Row; HISTORY_CAPACITY],
    history_head: usize,
    history_len: usize,
    /// Rows currently scrolled back by Arrow Up/Down, 0 meaning "viewing
    /// live output". Any new output snaps this back to 0.
    view_offset: usize,
}

impl Terminal {
    const fn new() -> Self {
        Terminal {
            cursor_row: 0,
            cursor_col: 0,
            screen: [Cell::BLANK; vga::VGA_BUFFER_CELLS],
            curr_pid: None,
            line_buf: [0; LINE_BUFFER_SIZE],
            line_len: 0,
            line_ready: false,
            saved_esp: 0,
            saved_ebp: 0,
            deferred_halt: false,
            history: [BLANK_ROW; HISTORY_CAPACITY],
            history_head: 0,
            history_len: 0,
            view_offset: 0,
        }
    }

    fn push_history_row(&mut self, row: Row) {
        self.history[self.history_head] = row;
        self.history_head = (self.history_head + 1) % HISTORY_CAPACITY;
        if self.history_len < HISTORY_CAPACITY {
            self.history_len += 1;
        }
    }

    /// `logical_idx` 0 is the oldest row still retained.
    fn history_row(&self, logical_idx: usize) -> Row {
        let start = (self.history_head + HISTORY_CAPACITY - self.history_len) % HISTORY_CAPACITY;
        self.history[(start + logical_idx) % HISTORY_CAPACITY]
    }
}

struct TerminalState {
    terminals: [Terminal; TERMINAL_COUNT],
    active: u8,
    running: u8,
}

static STATE: Mutex<TerminalState> = Mutex::new(TerminalState {
    terminals: [Terminal::new(), Terminal::new(), Terminal::new()],
    active: 0,
    running: 0,
});

/// Bring up all three terminal records and start terminal 0's shell
/// immediately; terminals 1 and 2 get theirs lazily, the first time the
/// scheduler rotates onto them and finds no task running.
pub fn init() {
    let blank = [Cell::BLANK; vga::VGA_BUFFER_CELLS];
    // SAFETY: paging identity-maps the VGA buffer for the kernel's whole
    // lifetime; called once during single-threaded boot.
    unsafe {
        vga::present(&blank);
    }
    vga::set_cursor(0, 0);
    crate::klog::log(crate::klog::Level::Info, "terminal", "3 terminals initialized");
}

/// Ctrl+L: clear the active terminal's screen and home the cursor.
pub fn clear_active() {
    let mut state = STATE.lock();
    let active = state.active as usize;
    vga::clear(&mut state.terminals[active].screen);
    state.terminals[active].cursor_row = 0;
    state.terminals[active].cursor_col = 0;
    state.terminals[active].view_offset = 0;
    // SAFETY: paging identity-maps VGA for the kernel's lifetime.
    unsafe {
        vga::present(&state.terminals[active].screen);
    }
    vga::set_cursor(0, 0);
}

pub fn active_terminal() -> u8 {
    STATE.lock().active
}

pub fn running_terminal() -> u8 {
    STATE.lock().running
}

pub fn terminal_of_pid(pid: u8) -> Option<u8> {
    let state = STATE.lock();
    state
        .terminals
        .iter()
        .position(|t| t.curr_pid == Some(pid))
        .map(|i| i as u8)
}

/// Mark `terminal_id` as owning `pid`, called once by `execute` right
/// after a new PCB is allocated.
pub fn bind_task(terminal_id: u8, pid: Option<u8>) {
    STATE.lock().terminals[terminal_id as usize].curr_pid = pid;
}

pub fn task_of(terminal_id: u8) -> Option<u8> {
    STATE.lock().terminals[terminal_id as usize].curr_pid
}

/// Save the suspended kernel SP/BP for `terminal_id`'s currently running
/// task, called by the scheduler right before rotating away from it.
pub fn save_context(terminal_id: u8, esp: u32, ebp: u32) {
    let mut state = STATE.lock();
    state.terminals[terminal_id as usize].saved_esp = esp;
    state.terminals[terminal_id as usize].saved_ebp = ebp;
}

pub fn saved_context(terminal_id: u8) -> (u32, u32) {
    let state = STATE.lock();
    (
        state.terminals[terminal_id as usize].saved_esp,
        state.terminals[terminal_id as usize].saved_ebp,
    )
}

pub fn set_running(terminal_id: u8) {
    STATE.lock().running = terminal_id;
}

/// Swap the physical screen to `terminal_id`'s screen, for Alt+F1/F2/F3.
/// Copies the outgoing terminal's live content into its off-screen buffer
/// and the incoming terminal's off-screen buffer onto the real hardware.
pub fn switch_active(terminal_id: u8) {
    let mut state = STATE.lock();
    if state.active == terminal_id {
        return;
    }

    let outgoing = state.active as usize;
    let incoming = terminal_id as usize;

    // SAFETY: paging identity-maps VGA for the kernel's lifetime; the
    // terminal lock serializes concurrent screen swaps.
    unsafe {
        vga::capture(&mut state.terminals[outgoing].screen);
        vga::present(&state.terminals[incoming].screen);
    }

    state.active = terminal_id;
    state.terminals[incoming].view_offset = 0;
    let (row, col) = (state.terminals[incoming].cursor_row, state.terminals[incoming].cursor_col);
    drop(state);
    vga::set_cursor(row, col);
}

/// Append a byte the keyboard handler decoded as a plain printable
/// character to the active terminal's line buffer and echo it to screen.
pub fn on_char(ch: u8) {
    let mut state = STATE.lock();
    let active = state.active as usize;
    if state.terminals[active].line_len >= LINE_BUFFER_SIZE - 1 {
        return;
    }
    let len = state.terminals[active].line_len;
    state.terminals[active].line_buf[len] = ch;
    state.terminals[active].line_len += 1;
    echo_byte(&mut state, active, ch);
}

pub fn on_backspace() {
    let mut state = STATE.lock();
    let active = state.active as usize;
    if state.terminals[active].line_len == 0 {
        return;
    }
    state.terminals[active].line_len -= 1;
    let (row, col) = cursor_back(&mut state, active);
    drop(state);
    vga::set_cursor(row, col);
}

pub fn on_enter() {
    let mut state = STATE.lock();
    let active = state.active as usize;
    let len = state.terminals[active].line_len;
    if len < LINE_BUFFER_SIZE {
        state.terminals[active].line_buf[len] = b'\n';
        state.terminals[active].line_len += 1;
    }
    state.terminals[active].line_ready = true;
    newline(&mut state, active);
}

/// Ctrl+C: halt the foreground task directly if it's also the one
/// currently running; otherwise defer to the next timer tick.
pub fn on_interrupt_signal() {
    let mut state = STATE.lock();
    if state.active == state.running {
        let pid = state.terminals[state.active as usize].curr_pid;
        drop(state);
        if let Some(pid) = pid {
            crate::syscall::process::halt_task(pid, 255);
        }
    } else {
        state.terminals[state.active as usize].deferred_halt = true;
    }
}

/// Called once per timer tick by the scheduler; halts a task whose
/// terminal received a deferred Ctrl+C while it wasn't in the foreground.
pub fn take_deferred_halt(terminal_id: u8) -> bool {
    let mut state = STATE.lock();
    let pending = state.terminals[terminal_id as usize].deferred_halt;
    state.terminals[terminal_id as usize].deferred_halt = false;
    pending
}

/// Block (spinning on `arch::x86::idle`) until `pid`'s terminal has a
/// ready line, then copy at most `buf.len()` bytes of it out, including
/// the trailing newline, and reset the line buffer.
pub fn read_line(pid: u8, buf: &mut [u8]) -> KernelResult<usize> {
    let terminal_id = terminal_of_pid(pid).ok_or(SyscallError::InvalidArgument)?;

    loop {
        {
            let mut state = STATE.lock();
            let t = &mut state.terminals[terminal_id as usize];
            if t.line_ready {
                let n = t.line_len.min(buf.len());
                buf[..n].copy_from_slice(&t.line_buf[..n]);
                buf[n..].fill(0);
                t.line_len = 0;
                t.line_ready = false;
                return Ok(n);
            }
        }
        crate::arch::x86::idle();
    }
}

/// Write `buf` to `pid`'s owning terminal's screen, scrolling as needed.
pub fn write(pid: u8, buf: &[u8]) -> KernelResult<usize> {
    let terminal_id = terminal_of_pid(pid).ok_or(SyscallError::InvalidArgument)?;
    let mut state = STATE.lock();
    let idx = terminal_id as usize;
    for &byte in buf {
        if byte == b'\n' {
            newline(&mut state, idx);
        } else if byte != 0 {
            echo_byte(&mut state, idx, byte);
        }
    }
    Ok(buf.len())
}

/// Write `buf` to the *running* terminal's screen directly, with no owning
/// pid required. Used by [`crate::print`]'s `print!`/`println!` for kernel
/// diagnostics (boot milestones, panics) that happen outside any task's own
/// `write` syscall.
pub fn kprint(buf: &[u8]) {
    let mut state = STATE.lock();
    let idx = state.running as usize;
    for &byte in buf {
        if byte == b'\n' {
            newline(&mut state, idx);
        } else {
            echo_byte(&mut state, idx, byte);
        }
    }
}

fn echo_byte(state: &mut TerminalState, idx: usize, ch: u8) {
    let (row, col) = (state.terminals[idx].cursor_row, state.terminals[idx].cursor_col);
    vga::putc_at(&mut state.terminals[idx].screen, row, col, ch, vga::DEFAULT_COLOR);

    let mut col = col + 1;
    let mut row = row;
    if col >= vga::VGA_WIDTH {
        col = 0;
        row += 1;
        if row >= vga::VGA_HEIGHT {
            scroll_with_history(state, idx);
            row = vga::VGA_HEIGHT - 1;
        }
    }
    state.terminals[idx].cursor_row = row;
    state.terminals[idx].cursor_col = col;

    if idx == state.active as usize && state.terminals[idx].view_offset == 0 {
        // SAFETY: paging identity-maps VGA for the kernel's lifetime.
        unsafe {
            vga::present(&state.terminals[idx].screen);
        }
        vga::set_cursor(row, col);
    }
}

fn newline(state: &mut TerminalState, idx: usize) {
    let mut row = state.terminals[idx].cursor_row + 1;
    if row >= vga::VGA_HEIGHT {
        scroll_with_history(state, idx);
        row = vga::VGA_HEIGHT - 1;
    }
    state.terminals[idx].cursor_row = row;
    state.terminals[idx].cursor_col = 0;

    if idx == state.active as usize && state.terminals[idx].view_offset == 0 {
        // SAFETY: paging identity-maps VGA for the kernel's lifetime.
        unsafe {
            vga::present(&state.terminals[idx].screen);
        }
        vga::set_cursor(row, 0);
    }
}

/// Scroll `idx`'s screen up one row, remembering the row that falls off the
/// top in its history ring, and snap its scrollback view back to live (new
/// output arriving is the conventional reason a terminal jumps back to the
/// bottom of its scrollback).
fn scroll_with_history(state: &mut TerminalState, idx: usize) {
    let mut top = BLANK_ROW;
    top.copy_from_slice(&state.terminals[idx].screen[..vga::VGA_WIDTH]);
    state.terminals[idx].push_history_row(top);
    vga::scroll_up(&mut state.terminals[idx].screen);
    state.terminals[idx].view_offset = 0;
}

/// Arrow Up (`delta > 0`) / Arrow Down (`delta < 0`): move the active
/// terminal's scrollback view and redraw it if it's also the live VGA
/// frame. Does not touch the underlying screen buffer or line discipline,
/// purely a viewport change.
pub fn scroll_history(delta: i32) {
    let mut state = STATE.lock();
    let active = state.active as usize;
    let max = state.terminals[active].history_len;
    let offset = state.terminals[active].view_offset;
    let new_offset = if delta > 0 {
        (offset + delta as usize).min(max)
    } else {
        offset.saturating_sub((-delta) as usize)
    };
    if new_offset == offset {
        return;
    }
    state.terminals[active].view_offset = new_offset;
    render_scrollback_view(&mut state, active);
}

/// Compose a full-screen frame from `idx`'s history ring and live screen at
/// its current `view_offset`, and present it if `idx` owns the hardware
/// screen. The virtual row sequence is `[oldest history row .. newest
/// history row, live row 0 .. live row VGA_HEIGHT-1]`; offset 0 windows
/// exactly the live rows, offset N starts the window N rows earlier.
fn render_scrollback_view(state: &mut TerminalState, idx: usize) {
    if idx != state.active as usize {
        return;
    }
    let history_len = state.terminals[idx].history_len;
    let offset = state.terminals[idx].view_offset;
    let start = history_len - offset;

    let mut frame = [Cell::BLANK; vga::VGA_BUFFER_CELLS];
    for row in 0..vga::VGA_HEIGHT {
        let virtual_row = start + row;
        let cells = if virtual_row < history_len {
            state.terminals[idx].history_row(virtual_row)
        } else {
            let live_row = virtual_row - history_len;
            let mut cells = BLANK_ROW;
            let base = live_row * vga::VGA_WIDTH;
            cells.copy_from_slice(&state.terminals[idx].screen[base..base + vga::VGA_WIDTH]);
            cells
        };
        let base = row * vga::VGA_WIDTH;
        frame[base..base + vga::VGA_WIDTH].copy_from_slice(&cells);
    }

    // SAFETY: paging identity-maps VGA for the kernel's lifetime.
    unsafe {
        vga::present(&frame);
    }
}

fn cursor_back(state: &mut TerminalState, idx: usize) -> (usize, usize) {
    let mut col = state.terminals[idx].cursor_col;
    let mut row = state.terminals[idx].cursor_row;
    if col == 0 {
        if row > 0 {
            row -= 1;
            col = vga::VGA_WIDTH - 1;
        }
    } else {
        col -= 1;
    }
    vga::putc_at(&mut state.terminals[idx].screen, row, col, b' ', vga::DEFAULT_COLOR);
    state.terminals[idx].cursor_row = row;
    state.terminals[idx].cursor_col = col;
    if idx == state.active as usize && state.terminals[idx].view_offset == 0 {
        // SAFETY: paging identity-maps VGA for the kernel's lifetime.
        unsafe {
            vga::present(&state.terminals[idx].screen);
        }
    }
    (row, col)
}
