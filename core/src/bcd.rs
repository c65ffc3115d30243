//! Packed BCD conversion for calendar fields
//!
//! Inputs are not validated: nibbles above 9 decode to whatever the
//! arithmetic gives. Range checks happen before encoding, in the calendar
//! layer.

/// Binary 0-99 to two packed BCD digits
pub const fn to_bcd(value: u8) -> u8 {
    ((value / 10) << 4) | (value % 10)
}

/// Two packed BCD digits to binary
pub const fn from_bcd(bcd: u8) -> u8 {
    (bcd >> 4) * 10 + (bcd & 0x0F)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_values() {
        assert_eq!(to_bcd(0), 0x00);
        assert_eq!(to_bcd(9), 0x09);
        assert_eq!(to_bcd(10), 0x10);
        assert_eq!(to_bcd(59), 0x59);
        assert_eq!(to_bcd(99), 0x99);
        assert_eq!(from_bcd(0x31), 31);
        assert_eq!(from_bcd(0x12), 12);
    }

    #[test]
    fn test_reversible_over_full_range() {
        for x in 0..=99u8 {
            assert_eq!(from_bcd(to_bcd(x)), x, "BCD round trip failed for {}", x);
        }
    }
}
