//! Smooth calibration: parts-per-billion <-> CALP/CALM pulse counts
//!
//! The hardware adds or masks RTC clock pulses over a 2^20 cycle window:
//!
//! ```text
//! pulses = ppb * 2^20 / 10^9 = ppb * 2^11 / 5^9 = ppb * 2048 / 1953125
//! ppb    = pulses * 5^9 / 2^11
//! ```
//!
//! CALP is a single bit worth +512 pulses and CALM masks 0-511 pulses, so
//! the effective count is `(CALP ? 512 : 0) - CALM`, giving an asymmetric
//! range of -511..=+512 pulses.
//!
//! The value is applied to the clock period with the opposite sign of a
//! frequency correction.
//!
//! Both conversions round to nearest, ties away from zero. With these
//! constants a tie never occurs for in-range inputs: 5^9 is odd, and
//! `pulses * 5^9` only lands on a half of 2048 when `pulses` is an odd
//! multiple of 1024.

use rtc_hal_abstractions::CalibrationRegister;

use crate::Error;

/// Pulses per 2^20 cycles represented by CALP
pub const MAX_CALP: i32 = 512;
/// Largest CALM value
pub const MAX_CALM: i32 = 511;

/// Largest accepted calibration (+512 pulses), 488281 ppb
pub const MAX_PPB: i32 = pulses_to_ppb(MAX_CALP);
/// Smallest accepted calibration (-511 pulses), -487328 ppb
pub const MIN_PPB: i32 = -pulses_to_ppb(MAX_CALM);

const PULSE_SCALE: i64 = 2048; // 2^11
const PPB_SCALE: i64 = 1_953_125; // 5^9

/// Integer division rounding half away from zero; `d` must be positive
const fn div_round_closest(n: i64, d: i64) -> i64 {
    if n >= 0 {
        (n + d / 2) / d
    } else {
        (n - d / 2) / d
    }
}

/// Pulse count to ppb
pub const fn pulses_to_ppb(pulses: i32) -> i32 {
    div_round_closest(pulses as i64 * PPB_SCALE, PULSE_SCALE) as i32
}

/// ppb to pulse count
///
/// Requests outside `MIN_PPB..=MAX_PPB` are rejected, never clamped.
pub fn ppb_to_pulses(ppb: i32) -> Result<i32, Error> {
    if !(MIN_PPB..=MAX_PPB).contains(&ppb) {
        return Err(Error::InvalidArgument);
    }
    Ok(div_round_closest(ppb as i64 * PULSE_SCALE, PPB_SCALE) as i32)
}

/// CALP/CALM pair as stored in RTC_CALR
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SmoothCalibration {
    /// CALP
    pub insert_pulse: bool,
    /// CALM, 0-511
    pub subtract: u16,
}

impl SmoothCalibration {
    /// Encode a pulse count in `-MAX_CALM..=MAX_CALP`
    pub fn from_pulses(pulses: i32) -> Result<Self, Error> {
        if !(-MAX_CALM..=MAX_CALP).contains(&pulses) {
            return Err(Error::InvalidArgument);
        }
        Ok(if pulses > 0 {
            Self {
                insert_pulse: true,
                subtract: (MAX_CALP - pulses) as u16,
            }
        } else {
            Self {
                insert_pulse: false,
                subtract: (-pulses) as u16,
            }
        })
    }

    pub fn from_ppb(ppb: i32) -> Result<Self, Error> {
        Self::from_pulses(ppb_to_pulses(ppb)?)
    }

    /// Effective pulses added per 2^20 cycles
    pub const fn pulses(self) -> i32 {
        let base = if self.insert_pulse { MAX_CALP } else { 0 };
        base - self.subtract as i32
    }

    pub const fn ppb(self) -> i32 {
        pulses_to_ppb(self.pulses())
    }

    pub const fn from_register(calr: CalibrationRegister) -> Self {
        Self {
            insert_pulse: calr.insert_pulse(),
            subtract: calr.subtract(),
        }
    }

    /// Merge into an existing register image, leaving the window bits alone
    pub const fn apply(self, calr: CalibrationRegister) -> CalibrationRegister {
        calr.with_smooth(self.insert_pulse, self.subtract)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// ppb represented by one pulse, 953.67
    const PPB_PER_PULSE: i32 = 954;

    #[test]
    fn test_range_limits() {
        assert_eq!(MAX_PPB, 488_281);
        assert_eq!(MIN_PPB, -487_328);
        assert_eq!(ppb_to_pulses(MAX_PPB), Ok(512));
        assert_eq!(ppb_to_pulses(MIN_PPB), Ok(-511));
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert_eq!(ppb_to_pulses(MAX_PPB + 1), Err(Error::InvalidArgument));
        assert_eq!(ppb_to_pulses(MIN_PPB - 1), Err(Error::InvalidArgument));
        assert_eq!(ppb_to_pulses(i32::MAX), Err(Error::InvalidArgument));
        assert_eq!(ppb_to_pulses(i32::MIN), Err(Error::InvalidArgument));
        assert_eq!(SmoothCalibration::from_pulses(513), Err(Error::InvalidArgument));
        assert_eq!(SmoothCalibration::from_pulses(-512), Err(Error::InvalidArgument));
    }

    #[test]
    fn test_rounding_is_symmetric() {
        assert_eq!(ppb_to_pulses(0), Ok(0));
        assert_eq!(ppb_to_pulses(476), Ok(0));
        assert_eq!(ppb_to_pulses(477), Ok(1));
        assert_eq!(ppb_to_pulses(-476), Ok(0));
        assert_eq!(ppb_to_pulses(-477), Ok(-1));
        assert_eq!(pulses_to_ppb(1), 954);
        assert_eq!(pulses_to_ppb(-1), -954);
        assert_eq!(pulses_to_ppb(256), 244_141);
        assert_eq!(pulses_to_ppb(-256), -244_141);
    }

    #[test]
    fn test_register_encoding() {
        let add_one = SmoothCalibration::from_pulses(1).unwrap();
        assert!(add_one.insert_pulse);
        assert_eq!(add_one.subtract, 511);

        let max = SmoothCalibration::from_pulses(512).unwrap();
        assert!(max.insert_pulse);
        assert_eq!(max.subtract, 0);

        let zero = SmoothCalibration::from_pulses(0).unwrap();
        assert!(!zero.insert_pulse);
        assert_eq!(zero.subtract, 0);

        let min = SmoothCalibration::from_pulses(-511).unwrap();
        assert!(!min.insert_pulse);
        assert_eq!(min.subtract, 511);
    }

    #[test]
    fn test_register_decoding_is_inverse() {
        for pulses in -MAX_CALM..=MAX_CALP {
            let cal = SmoothCalibration::from_pulses(pulses).unwrap();
            let calr = cal.apply(CalibrationRegister::default());
            assert_eq!(SmoothCalibration::from_register(calr).pulses(), pulses);
        }
    }

    #[test]
    fn test_ppb_round_trip_within_one_pulse() {
        let mut ppb = MIN_PPB;
        while ppb <= MAX_PPB {
            let back = SmoothCalibration::from_ppb(ppb).unwrap().ppb();
            assert!(
                (back - ppb).abs() < PPB_PER_PULSE,
                "ppb {} came back as {}",
                ppb,
                back
            );
            ppb += 997;
        }
        assert_eq!(SmoothCalibration::from_ppb(MAX_PPB).unwrap().ppb(), MAX_PPB);
        assert_eq!(SmoothCalibration::from_ppb(MIN_PPB).unwrap().ppb(), MIN_PPB);
    }
}
