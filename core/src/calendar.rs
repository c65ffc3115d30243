//! Calendar time representation and hardware field translation
//!
//! The counter stores two-digit years relative to [`EPOCH_YEAR`], BCD
//! fields, and numbers weekdays 1 (Monday) to 7 (Sunday). The public
//! representation uses full years, binary fields, and 0 for Sunday.
//!
//! Civil-date arithmetic uses Howard Hinnant's O(1) `days_from_civil` /
//! `civil_from_days` algorithms.
//! Reference: http://howardhinnant.github.io/date_algorithms.html

use rtc_hal_abstractions::{DateRegister, Prescaler, TimeRegister};

use crate::bcd::{from_bcd, to_bcd};
use crate::Error;

/// Year the hardware counter is zeroed against
pub const EPOCH_YEAR: u16 = 2000;

/// Last year the two-digit counter can hold
pub const MAX_YEAR: u16 = EPOCH_YEAR + 99;

const SECONDS_PER_DAY: i64 = 86_400;
const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Day of the week, Sunday first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Weekday {
    Sunday = 0,
    Monday = 1,
    Tuesday = 2,
    Wednesday = 3,
    Thursday = 4,
    Friday = 5,
    Saturday = 6,
}

impl Weekday {
    /// 0 = Sunday .. 6 = Saturday
    pub const fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::Sunday),
            1 => Some(Self::Monday),
            2 => Some(Self::Tuesday),
            3 => Some(Self::Wednesday),
            4 => Some(Self::Thursday),
            5 => Some(Self::Friday),
            6 => Some(Self::Saturday),
            _ => None,
        }
    }

    pub const fn index(self) -> u8 {
        self as u8
    }

    /// Hardware weekday code; Sunday is 7, the other days keep their index
    pub const fn to_hardware(self) -> u8 {
        match self {
            Self::Sunday => 7,
            day => day as u8,
        }
    }

    /// Decode a hardware weekday code; 0 is forbidden by the peripheral
    pub const fn from_hardware(code: u8) -> Option<Self> {
        match code {
            7 => Some(Self::Sunday),
            1..=6 => Self::from_index(code),
            _ => None,
        }
    }

    /// Weekday of a Gregorian date
    pub fn from_date(year: u16, month: u8, day: u8) -> Self {
        // 1970-01-01 was a Thursday
        let days = days_from_civil(year as i32, month, day);
        match Self::from_index((days + 4).rem_euclid(7) as u8) {
            Some(weekday) => weekday,
            None => Self::Sunday,
        }
    }
}

/// Broken-down calendar time as read from or written to the counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalendarTime {
    /// Full Gregorian year, `EPOCH_YEAR..=MAX_YEAR` on the hardware
    pub year: u16,
    /// 1-12
    pub month: u8,
    /// 1-31
    pub day: u8,
    /// Required when writing; `None` on read only if the hardware holds
    /// the forbidden code 0
    pub weekday: Option<Weekday>,
    /// 0-23
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    /// Fraction of the current second, at prescaler resolution
    pub nanosecond: u32,
    /// Not tracked by the hardware; always `None` on read
    pub year_day: Option<u16>,
    /// Not tracked by the hardware; always `None` on read
    pub is_dst: Option<bool>,
}

impl CalendarTime {
    /// Whole-second time with the weekday derived from the date
    pub fn new(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Self {
        Self {
            year,
            month,
            day,
            weekday: Some(Weekday::from_date(year, month, day)),
            hour,
            minute,
            second,
            nanosecond: 0,
            year_day: None,
            is_dst: None,
        }
    }

    /// Check that every field fits the hardware counter
    ///
    /// The weekday is not cross-checked against the date.
    pub fn validate(&self) -> Result<(), Error> {
        if self.year < EPOCH_YEAR || self.year > MAX_YEAR {
            return Err(Error::InvalidArgument);
        }
        if self.weekday.is_none() {
            return Err(Error::InvalidArgument);
        }
        if !(1..=12).contains(&self.month) {
            return Err(Error::InvalidArgument);
        }
        if self.day == 0 || self.day > days_in_month(self.year, self.month) {
            return Err(Error::InvalidArgument);
        }
        if self.hour > 23 || self.minute > 59 || self.second > 59 {
            return Err(Error::InvalidArgument);
        }
        Ok(())
    }

    /// Encode into date and time register images
    pub fn to_registers(&self) -> Result<(DateRegister, TimeRegister), Error> {
        self.validate()?;
        let weekday = self.weekday.ok_or(Error::InvalidArgument)?;

        let date = DateRegister::new(
            to_bcd((self.year - EPOCH_YEAR) as u8),
            to_bcd(self.month),
            to_bcd(self.day),
            weekday.to_hardware(),
        );
        let time = TimeRegister::new(to_bcd(self.hour), to_bcd(self.minute), to_bcd(self.second));
        Ok((date, time))
    }

    /// Decode a consistent register snapshot
    ///
    /// The subsecond register counts down from the synchronous prescaler,
    /// so the elapsed fraction is `(PREDIV_S - SSR) / (PREDIV_S + 1)`.
    pub fn from_registers(
        date: DateRegister,
        time: TimeRegister,
        subsecond: u32,
        prescaler: Prescaler,
    ) -> Self {
        let divisor = prescaler.synchronous as u64 + 1;
        let elapsed = (prescaler.synchronous as u64).saturating_sub(subsecond as u64);
        let nanosecond = (elapsed * NANOS_PER_SECOND + divisor / 2) / divisor;

        Self {
            year: EPOCH_YEAR + from_bcd(date.year()) as u16,
            month: from_bcd(date.month()),
            day: from_bcd(date.day()),
            weekday: Weekday::from_hardware(date.weekday()),
            hour: from_bcd(time.hours()),
            minute: from_bcd(time.minutes()),
            second: from_bcd(time.seconds()),
            nanosecond: nanosecond as u32,
            year_day: None,
            is_dst: None,
        }
    }

    /// Convert from seconds since 1970-01-01 00:00:00 UTC
    pub fn from_unix_secs(unix_secs: u64) -> Self {
        let days = (unix_secs / SECONDS_PER_DAY as u64) as i64;
        let secs_today = unix_secs % SECONDS_PER_DAY as u64;
        let (year, month, day) = civil_from_days(days);

        Self::new(
            year as u16,
            month,
            day,
            (secs_today / 3600) as u8,
            ((secs_today % 3600) / 60) as u8,
            (secs_today % 60) as u8,
        )
    }

    /// Seconds since 1970-01-01 00:00:00 UTC; the fraction is dropped
    pub fn to_unix_secs(&self) -> u64 {
        let days = days_from_civil(self.year as i32, self.month, self.day);
        (days * SECONDS_PER_DAY
            + self.hour as i64 * 3600
            + self.minute as i64 * 60
            + self.second as i64) as u64
    }
}

/// Gregorian leap year rule
pub const fn is_leap_year(year: u16) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Length of `month` (1-12) in `year`; 0 for an invalid month
pub const fn days_in_month(year: u16, month: u8) -> u8 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

/// Days since 1970-01-01 for a civil date
fn days_from_civil(year: i32, month: u8, day: u8) -> i64 {
    let (y, m) = if month <= 2 {
        (year as i64 - 1, month as i64 + 9)
    } else {
        (year as i64, month as i64 - 3)
    };

    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400; // [0, 399]
    let doy = (153 * m + 2) / 5 + day as i64 - 1; // [0, 365]
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy; // [0, 146096]

    era * 146_097 + doe - 719_468 // 0000-03-01 to 1970-01-01
}

/// Civil date for a count of days since 1970-01-01
fn civil_from_days(days: i64) -> (i32, u8, u8) {
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = z - era * 146_097; // [0, 146096]
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365; // [0, 399]
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100); // [0, 365]
    let mp = (5 * doy + 2) / 153; // March = 0
    let day = (doy - (153 * mp + 2) / 5 + 1) as u8;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u8;
    let year = yoe + era * 400 + if month <= 2 { 1 } else { 0 };

    (year as i32, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leap_year() {
        assert!(is_leap_year(2000));
        assert!(is_leap_year(2024));
        assert!(!is_leap_year(1900));
        assert!(!is_leap_year(2023));
        assert!(!is_leap_year(2100));
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2023, 2), 28);
        assert_eq!(days_in_month(2023, 4), 30);
        assert_eq!(days_in_month(2023, 12), 31);
        assert_eq!(days_in_month(2023, 13), 0);
    }

    #[test]
    fn test_weekday_hardware_codes() {
        assert_eq!(Weekday::Sunday.to_hardware(), 7);
        assert_eq!(Weekday::Monday.to_hardware(), 1);
        assert_eq!(Weekday::Saturday.to_hardware(), 6);
        assert_eq!(Weekday::from_hardware(7), Some(Weekday::Sunday));
        assert_eq!(Weekday::from_hardware(3), Some(Weekday::Wednesday));
        assert_eq!(Weekday::from_hardware(0), None);
        assert_eq!(Weekday::Sunday.index(), 0);
    }

    #[test]
    fn test_weekday_from_date() {
        assert_eq!(Weekday::from_date(1970, 1, 1), Weekday::Thursday);
        assert_eq!(Weekday::from_date(2000, 1, 1), Weekday::Saturday);
        assert_eq!(Weekday::from_date(2024, 2, 29), Weekday::Thursday);
        assert_eq!(Weekday::from_date(2024, 12, 29), Weekday::Sunday);
    }

    #[test]
    fn test_validate_rejects_unrepresentable() {
        let ok = CalendarTime::new(2024, 2, 29, 12, 0, 0);
        assert_eq!(ok.validate(), Ok(()));

        let before_epoch = CalendarTime::new(1999, 12, 31, 23, 59, 59);
        assert_eq!(before_epoch.validate(), Err(Error::InvalidArgument));

        let past_century = CalendarTime::new(2100, 1, 1, 0, 0, 0);
        assert_eq!(past_century.validate(), Err(Error::InvalidArgument));

        let no_weekday = CalendarTime {
            weekday: None,
            ..ok
        };
        assert_eq!(no_weekday.validate(), Err(Error::InvalidArgument));

        let not_leap = CalendarTime::new(2023, 2, 29, 0, 0, 0);
        assert_eq!(not_leap.validate(), Err(Error::InvalidArgument));

        let bad_hour = CalendarTime { hour: 24, ..ok };
        assert_eq!(bad_hour.validate(), Err(Error::InvalidArgument));

        let bad_month = CalendarTime { month: 0, ..ok };
        assert_eq!(bad_month.validate(), Err(Error::InvalidArgument));
    }

    #[test]
    fn test_register_encoding() {
        let t = CalendarTime::new(2024, 12, 29, 23, 59, 58);
        let (date, time) = t.to_registers().unwrap();
        assert_eq!(date, DateRegister::new(0x24, 0x12, 0x29, 7));
        assert_eq!(time, TimeRegister::new(0x23, 0x59, 0x58));
    }

    #[test]
    fn test_register_decoding() {
        let date = DateRegister::new(0x24, 0x12, 0x29, 7);
        let time = TimeRegister::new(0x23, 0x59, 0x58);

        let t = CalendarTime::from_registers(date, time, 255, Prescaler::LSE);
        assert_eq!(t.year, 2024);
        assert_eq!(t.month, 12);
        assert_eq!(t.day, 29);
        assert_eq!(t.weekday, Some(Weekday::Sunday));
        assert_eq!((t.hour, t.minute, t.second), (23, 59, 58));
        assert_eq!(t.nanosecond, 0);
        assert_eq!(t.year_day, None);
        assert_eq!(t.is_dst, None);
    }

    #[test]
    fn test_subsecond_fraction() {
        let date = DateRegister::new(0x00, 0x01, 0x01, 6);
        let time = TimeRegister::default();

        let half = CalendarTime::from_registers(date, time, 127, Prescaler::LSE);
        assert_eq!(half.nanosecond, 500_000_000);

        let last_tick = CalendarTime::from_registers(date, time, 0, Prescaler::LSE);
        assert_eq!(last_tick.nanosecond, 996_093_750);

        let lsi = CalendarTime::from_registers(date, time, 0, Prescaler::LSI);
        assert_eq!(lsi.nanosecond, 996_000_000);
    }

    #[test]
    fn test_unix_round_trip() {
        let test_dates = [
            0u64,       // 1970-01-01 00:00:00
            946684800,  // 2000-01-01 00:00:00
            951782400,  // 2000-02-29 00:00:00
            1704067200, // 2024-01-01 00:00:00
            2147483647, // 2038-01-19 03:14:07
            4102444799, // 2099-12-31 23:59:59
        ];
        for &unix_secs in &test_dates {
            let t = CalendarTime::from_unix_secs(unix_secs);
            assert_eq!(t.to_unix_secs(), unix_secs, "round trip failed for {}", unix_secs);
        }

        let t = CalendarTime::from_unix_secs(4102444799);
        assert_eq!((t.year, t.month, t.day), (2099, 12, 31));
        assert_eq!((t.hour, t.minute, t.second), (23, 59, 59));
        assert_eq!(t.weekday, Some(Weekday::Thursday));
    }
}
