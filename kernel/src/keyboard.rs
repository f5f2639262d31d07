//! Scancode decoding and dispatch to the active terminal's line discipline.
//!
//! Grounded on `original_source/student-distrib/keyboard.c`: a flat
//! `scancodes_table[90][2]` indexed by make-code scancode, modifier state
//! tracked as a handful of flags set/cleared by the matching press/release
//! codes, and the decoded byte (or a synthetic control signal) handed to the
//! terminal layer. The original's separate `dir_up_f`/`dir_down_f`/
//! `function_f` bit-vector is replaced here with one `Modifiers` bitflags
//! value, but the scancode values themselves — including the non-standard
//! plain (non-`0xE0`-prefixed) arrow codes this teaching kernel's target
//! emulator actually sends — are preserved verbatim.

use bitflags::bitflags;
use spin::Mutex;

const MAX_SCANCODES: usize = 0x5A;

const CODE_BACKSPACE: u8 = 0x0E;
const CODE_TAB: u8 = 0x0F;
const CODE_ENTER: u8 = 0x1C;
const CODE_CTRL_PRESS: u8 = 0x1D;
const CODE_CTRL_RELEASE: u8 = 0x9D;
const CODE_LSHIFT_PRESS: u8 = 0x2A;
const CODE_LSHIFT_RELEASE: u8 = 0xAA;
const CODE_RSHIFT_PRESS: u8 = 0x36;
const CODE_RSHIFT_RELEASE: u8 = 0xB6;
const CODE_ALT_PRESS: u8 = 0x38;
const CODE_ALT_RELEASE: u8 = 0xB8;
const CODE_CAPSLOCK_PRESS: u8 = 0x3A;
const CODE_F1_PRESS: u8 = 0x3B;
const CODE_F2_PRESS: u8 = 0x3C;
const CODE_F3_PRESS: u8 = 0x3D;
const CODE_F1_RELEASE: u8 = 0xBB;
const CODE_F2_RELEASE: u8 = 0xBC;
const CODE_F3_RELEASE: u8 = 0xBD;
const CODE_DIR_UP: u8 = 0x48;
const CODE_DIR_DOWN: u8 = 0x50;
const CODE_DIR_UP_RELEASE: u8 = 0xC8;
const CODE_DIR_DOWN_RELEASE: u8 = 0xD0;

bitflags! {
    #[derive(Clone, Copy, Default)]
    struct Modifiers: u16 {
        const LSHIFT   = 1 << 0;
        const RSHIFT   = 1 << 1;
        const CTRL     = 1 << 2;
        const ALT      = 1 << 3;
        const CAPSLOCK = 1 << 4;
    }
}

/// `(base, shifted)` ASCII pair per scancode, 0 meaning "no printable
/// character" (unused key, modifier, or reserved slot).
#[rustfmt::skip]
const SCANCODE_TABLE: [(u8, u8); MAX_SCANCODES] = [
    (0, 0), (0x1B, 0x1B),
    (b'1', b'!'), (b'2', b'@'), (b'3', b'#'), (b'4', b'$'),
    (b'5', b'%'), (b'6', b'^'), (b'7', b'&'), (b'8', b'*'),
    (b'9', b'('), (b'0', b')'), (b'-', b'_'), (b'=', b'+'),
    (0, 0) /* backspace */, (0, 0) /* tab */,
    (b'q', b'Q'), (b'w', b'W'), (b'e', b'E'), (b'r', b'R'),
    (b't', b'T'), (b'y', b'Y'), (b'u', b'U'), (b'i', b'I'),
    (b'o', b'O'), (b'p', b'P'), (b'[', b'{'), (b']', b'}'),
    (0, 0) /* enter */, (0, 0) /* ctrl */,
    (b'a', b'A'), (b's', b'S'), (b'd', b'D'), (b'f', b'F'),
    (b'g', b'G'), (b'h', b'H'), (b'j', b'J'), (b'k', b'K'),
    (b'l', b'L'), (b';', b':'), (b'\'', b'"'), (b'`', b'~'),
    (0, 0) /* lshift */, (b'\\', b'|'),
    (b'z', b'Z'), (b'x', b'X'), (b'c', b'C'), (b'v', b'V'),
    (b'b', b'B'), (b'n', b'N'), (b'm', b'M'), (b',', b'<'),
    (b'.', b'>'), (b'/', b'?'), (0, 0) /* rshift */, (0, 0),
    (0, 0) /* alt */, (b' ', b' '), (0, 0) /* capslock */,
    (0, 0) /* f1 */, (0, 0) /* f2 */, (0, 0) /* f3 */,
    (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0),
    (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0),
    (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0), (0, 0),
];

static MODIFIERS: Mutex<Modifiers> = Mutex::new(Modifiers::empty());

/// Plain (non-modifier, non-arrow) scancode for a pressed key that doesn't
/// decode to a printable character and isn't one of the control codes
/// handled explicitly below. Set-1 press codes' high bit is clear; release
/// codes set it, which is the make/break distinction this table relies on
/// without needing a second lookup table.
fn is_release(scancode: u8) -> bool {
    scancode & 0x80 != 0
}

/// Called from [`crate::idt_handlers::keyboard_entry`] with the raw byte
/// read from port `0x60`. Updates modifier state, then either services a
/// control key directly or decodes and dispatches a printable byte to
/// whichever terminal currently has the keyboard.
pub fn on_scancode(scancode: u8) {
    {
        let mut mods = MODIFIERS.lock();
        match scancode {
            CODE_LSHIFT_PRESS => mods.insert(Modifiers::LSHIFT),
            CODE_LSHIFT_RELEASE => mods.remove(Modifiers::LSHIFT),
            CODE_RSHIFT_PRESS => mods.insert(Modifiers::RSHIFT),
            CODE_RSHIFT_RELEASE => mods.remove(Modifiers::RSHIFT),
            CODE_CTRL_PRESS => mods.insert(Modifiers::CTRL),
            CODE_CTRL_RELEASE => mods.remove(Modifiers::CTRL),
            CODE_ALT_PRESS => mods.insert(Modifiers::ALT),
            CODE_ALT_RELEASE => mods.remove(Modifiers::ALT),
            CODE_CAPSLOCK_PRESS => mods.toggle(Modifiers::CAPSLOCK),
            _ => {}
        }
    }

    match scancode {
        CODE_LSHIFT_PRESS | CODE_LSHIFT_RELEASE | CODE_RSHIFT_PRESS | CODE_RSHIFT_RELEASE
        | CODE_CTRL_PRESS | CODE_CTRL_RELEASE | CODE_ALT_PRESS | CODE_ALT_RELEASE
        | CODE_CAPSLOCK_PRESS => return,
        _ => {}
    }

    if scancode as usize >= MAX_SCANCODES && !matches!(
        scancode,
        CODE_F1_PRESS | CODE_F2_PRESS | CODE_F3_PRESS
            | CODE_F1_RELEASE | CODE_F2_RELEASE | CODE_F3_RELEASE
            | CODE_DIR_UP | CODE_DIR_DOWN | CODE_DIR_UP_RELEASE | CODE_DIR_DOWN_RELEASE
    ) {
        return;
    }

    let mods = *MODIFIERS.lock();

    match scancode {
        CODE_F1_PRESS if mods.contains(Modifiers::ALT) => return crate::terminal::switch_active(0),
        CODE_F2_PRESS if mods.contains(Modifiers::ALT) => return crate::terminal::switch_active(1),
        CODE_F3_PRESS if mods.contains(Modifiers::ALT) => return crate::terminal::switch_active(2),
        CODE_F1_RELEASE | CODE_F2_RELEASE | CODE_F3_RELEASE => return,
        CODE_DIR_UP => return crate::terminal::scroll_history(1),
        CODE_DIR_DOWN => return crate::terminal::scroll_history(-1),
        CODE_DIR_UP_RELEASE | CODE_DIR_DOWN_RELEASE => return,
        _ => {}
    }

    if is_release(scancode) {
        return;
    }

    if scancode == CODE_BACKSPACE {
        return crate::terminal::on_backspace();
    }
    if scancode == CODE_ENTER {
        return crate::terminal::on_enter();
    }
    if scancode == CODE_TAB {
        return;
    }

    let (base, shifted) = SCANCODE_TABLE[scancode as usize];
    if base == 0 {
        return;
    }
    let is_letter = base.is_ascii_lowercase();
    let shift_down = mods.contains(Modifiers::LSHIFT) || mods.contains(Modifiers::RSHIFT);
    let use_shifted = if is_letter {
        mods.contains(Modifiers::CAPSLOCK) ^ shift_down
    } else {
        shift_down
    };
    let ch = if use_shifted { shifted } else { base };

    if mods.contains(Modifiers::CTRL) {
        match ch.to_ascii_uppercase() {
            b'L' => crate::terminal::clear_active(),
            b'C' => crate::terminal::on_interrupt_signal(),
            _ => {}
        }
        return;
    }

    crate::terminal::on_char(ch);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_has_no_entries_past_reserved_range() {
        // Letter 'a' (scancode 0x1E) decodes to lowercase by default.
        assert_eq!(SCANCODE_TABLE[0x1E], (b'a', b'A'));
        assert_eq!(SCANCODE_TABLE[0x02], (b'1', b'!'));
    }

    #[test]
    fn release_codes_have_high_bit_set() {
        assert!(is_release(CODE_LSHIFT_RELEASE));
        assert!(!is_release(CODE_LSHIFT_PRESS));
    }
}
