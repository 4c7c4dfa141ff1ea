//! Byte and word helpers shared by the CPU and the peripherals.

#[inline]
pub fn get_msb(word: u16) -> u8 {
    (word >> 8) as u8
}

#[inline]
pub fn get_lsb(word: u16) -> u8 {
    (word & 0xff) as u8
}

#[inline]
pub fn to_word(msb: u8, lsb: u8) -> u16 {
    ((msb as u16) << 8) | lsb as u16
}

/// Little-endian word from a two-byte operand buffer.
#[inline]
pub fn to_word_le(bytes: [u8; 2]) -> u16 {
    to_word(bytes[1], bytes[0])
}

#[inline]
pub fn get_bit(value: u8, position: u8) -> bool {
    value & (1 << position) != 0
}

#[inline]
pub fn set_bit(value: u8, position: u8) -> u8 {
    value | (1 << position)
}

#[inline]
pub fn clear_bit(value: u8, position: u8) -> u8 {
    value & !(1 << position)
}

#[inline]
pub fn set_bit_to(value: u8, position: u8, on: bool) -> u8 {
    if on {
        set_bit(value, position)
    } else {
        clear_bit(value, position)
    }
}

/// Two's complement interpretation of a byte.
#[inline]
pub fn to_signed(value: u8) -> i32 {
    value as i8 as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signed_conversion() {
        assert_eq!(to_signed(0x7f), 127);
        assert_eq!(to_signed(0x80), -128);
        assert_eq!(to_signed(0xfe), -2);
    }

    #[test]
    fn word_helpers() {
        assert_eq!(to_word(0x12, 0x34), 0x1234);
        assert_eq!(to_word_le([0x34, 0x12]), 0x1234);
        assert_eq!(get_msb(0xabcd), 0xab);
        assert_eq!(get_lsb(0xabcd), 0xcd);
        assert_eq!(set_bit_to(0b1010, 0, true), 0b1011);
        assert_eq!(set_bit_to(0b1010, 1, false), 0b1000);
    }
}
