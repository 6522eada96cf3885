//! Published instruction T-state costs, indexed by opcode byte.

/// Extra T-states consumed when a conditional CALL or RET is taken.
pub const CONDITIONAL_TAKEN_EXTRA: u64 = 6;

/// Base T-state cost per opcode.
///
/// Documented 8080 opcodes carry the published 8080 tally; the twelve
/// 8085-extension slots carry their published 8085 costs. Conditional
/// CALL/RET entries are the untaken cost; [`CONDITIONAL_TAKEN_EXTRA`] is
/// added when the condition holds.
#[rustfmt::skip]
pub const TSTATES: [u8; 256] = [
    //  0   1   2   3   4   5   6   7    8   9   A   B   C   D   E   F
        4, 10,  7,  5,  5,  5,  7,  4,  10, 10,  7,  5,  5,  5,  7,  4, // 0x00
        7, 10,  7,  5,  5,  5,  7,  4,  10, 10,  7,  5,  5,  5,  7,  4, // 0x10
        4, 10, 16,  5,  5,  5,  7,  4,  10, 10, 16,  5,  5,  5,  7,  4, // 0x20
        4, 10, 13,  5, 10, 10, 10,  4,  10, 10, 13,  5,  5,  5,  7,  4, // 0x30
        5,  5,  5,  5,  5,  5,  7,  5,   5,  5,  5,  5,  5,  5,  7,  5, // 0x40
        5,  5,  5,  5,  5,  5,  7,  5,   5,  5,  5,  5,  5,  5,  7,  5, // 0x50
        5,  5,  5,  5,  5,  5,  7,  5,   5,  5,  5,  5,  5,  5,  7,  5, // 0x60
        7,  7,  7,  7,  7,  7,  7,  7,   5,  5,  5,  5,  5,  5,  7,  5, // 0x70
        4,  4,  4,  4,  4,  4,  7,  4,   4,  4,  4,  4,  4,  4,  7,  4, // 0x80
        4,  4,  4,  4,  4,  4,  7,  4,   4,  4,  4,  4,  4,  4,  7,  4, // 0x90
        4,  4,  4,  4,  4,  4,  7,  4,   4,  4,  4,  4,  4,  4,  7,  4, // 0xA0
        4,  4,  4,  4,  4,  4,  7,  4,   4,  4,  4,  4,  4,  4,  7,  4, // 0xB0
        5, 10, 10, 10, 11, 11,  7, 11,   5, 10, 10,  6, 11, 17,  7, 11, // 0xC0
        5, 10, 10, 10, 11, 11,  7, 11,   5, 10, 10, 10, 11, 10,  7, 11, // 0xD0
        5, 10, 10, 18, 11, 11,  7, 11,   5,  5, 10,  4, 11, 10,  7, 11, // 0xE0
        5, 10, 10,  4, 11, 11,  7, 11,   5,  5, 10,  4, 11, 10,  7, 11, // 0xF0
];

/// Base T-state cost for one opcode byte.
#[must_use]
pub const fn tstates(opcode: u8) -> u64 {
    TSTATES[opcode as usize] as u64
}
