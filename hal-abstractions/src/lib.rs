//! Hardware abstraction traits for the STM32 calendar RTC
//!
//! This crate defines the register-level capability the RTC core drives,
//! plus the clock-tree collaborators it calls once during bring-up. BSPs
//! implement these traits; host tests implement them with a simulated
//! register file.
//!
//! ## Register images
//!
//! The calendar lives in two packed BCD words that the hardware latches
//! independently:
//!
//! ```text
//! DR: | YT[23:20] | YU[19:16] | WDU[15:13] | MT[12] | MU[11:8] | DT[5:4] | DU[3:0] |
//! TR: | PM[22] | HT[21:20] | HU[19:16] | MNT[14:12] | MNU[11:8] | ST[6:4] | SU[3:0] |
//! ```
//!
//! The newtypes below only pack and unpack fields. They never interpret
//! BCD; that belongs to the core.

#![no_std]
#![deny(unsafe_code)]

/// Calendar date register image (RTC_DR)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DateRegister(pub u32);

impl DateRegister {
    /// Bits that carry date fields; everything else reads as zero
    pub const MASK: u32 = 0x00FF_FF3F;

    /// Pack BCD fields and a hardware weekday code (1 = Monday .. 7 = Sunday)
    pub const fn new(year: u8, month: u8, day: u8, weekday: u8) -> Self {
        Self(
            ((year as u32) << 16)
                | (((weekday as u32) & 0x7) << 13)
                | (((month as u32) & 0x1F) << 8)
                | ((day as u32) & 0x3F),
        )
    }

    /// Two BCD digits of the year within the century
    pub const fn year(self) -> u8 {
        ((self.0 >> 16) & 0xFF) as u8
    }

    /// BCD month, 0x01-0x12
    pub const fn month(self) -> u8 {
        ((self.0 >> 8) & 0x1F) as u8
    }

    /// BCD day of month
    pub const fn day(self) -> u8 {
        (self.0 & 0x3F) as u8
    }

    /// Hardware weekday code; 0 is forbidden by the peripheral
    pub const fn weekday(self) -> u8 {
        ((self.0 >> 13) & 0x7) as u8
    }
}

/// Time-of-day register image (RTC_TR)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimeRegister(pub u32);

impl TimeRegister {
    /// Bits that carry time fields
    pub const MASK: u32 = 0x007F_7F7F;

    /// Pack BCD fields in 24-hour notation (PM bit clear)
    pub const fn new(hours: u8, minutes: u8, seconds: u8) -> Self {
        Self(
            (((hours as u32) & 0x3F) << 16)
                | (((minutes as u32) & 0x7F) << 8)
                | ((seconds as u32) & 0x7F),
        )
    }

    pub const fn hours(self) -> u8 {
        ((self.0 >> 16) & 0x3F) as u8
    }

    pub const fn minutes(self) -> u8 {
        ((self.0 >> 8) & 0x7F) as u8
    }

    pub const fn seconds(self) -> u8 {
        (self.0 & 0x7F) as u8
    }

    /// AM/PM flag, only meaningful in 12-hour format
    pub const fn pm(self) -> bool {
        self.0 & (1 << 22) != 0
    }
}

/// Smooth calibration register image (RTC_CALR)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationRegister(pub u32);

impl CalibrationRegister {
    const CALP: u32 = 1 << 15;
    const CALM_MASK: u32 = 0x1FF;

    /// CALP: one extra pulse every 2^11 cycles, i.e. 512 pulses per 2^20
    pub const fn insert_pulse(self) -> bool {
        self.0 & Self::CALP != 0
    }

    /// CALM: pulses masked out per 2^20 cycles (0-511)
    pub const fn subtract(self) -> u16 {
        (self.0 & Self::CALM_MASK) as u16
    }

    /// Replace CALP and CALM, keeping the calibration window bits
    pub const fn with_smooth(self, insert_pulse: bool, subtract: u16) -> Self {
        let mut bits = self.0 & !(Self::CALP | Self::CALM_MASK);
        if insert_pulse {
            bits |= Self::CALP;
        }
        bits |= (subtract as u32) & Self::CALM_MASK;
        Self(bits)
    }
}

/// Hour notation of the calendar counter (RTC_CR.FMT)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HourFormat {
    /// 0-23
    TwentyFourHour,
    /// 1-12 with AM/PM flag
    AmPm,
}

/// Prescaler dividers turning the RTC clock into a 1 Hz tick
///
/// `f_ck_spre = f_rtcclk / ((asynchronous + 1) * (synchronous + 1))`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Prescaler {
    /// PREDIV_A, 7 bits
    pub asynchronous: u8,
    /// PREDIV_S, 15 bits; also the subsecond counter reload value
    pub synchronous: u16,
}

impl Prescaler {
    /// LSI @ 32 kHz
    pub const LSI: Self = Self {
        asynchronous: 0x7F,
        synchronous: 0x00F9,
    };

    /// LSE @ 32.768 kHz
    pub const LSE: Self = Self {
        asynchronous: 0x7F,
        synchronous: 0x00FF,
    };
}

/// Low-speed oscillator feeding the RTC
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockSource {
    /// Low-speed internal RC (~32 kHz)
    Lsi,
    /// Low-speed external crystal (32.768 kHz)
    #[default]
    Lse,
}

impl ClockSource {
    /// Prescaler profile producing 1 Hz from this source
    pub const fn prescaler(self) -> Prescaler {
        match self {
            Self::Lsi => Prescaler::LSI,
            Self::Lse => Prescaler::LSE,
        }
    }
}

/// Register-level access to one RTC peripheral
///
/// Methods take `&mut self` so that simulated register files can react to
/// reads. Implementations perform exactly the access named; sequencing
/// (write protection, init mode, retry on rollover) is the caller's job.
pub trait RtcRegisters {
    /// Read RTC_DR
    fn date(&mut self) -> DateRegister;

    /// Read RTC_TR
    fn time(&mut self) -> TimeRegister;

    /// Read RTC_SSR (counts down from the synchronous prescaler)
    fn subsecond(&mut self) -> u32;

    /// Write RTC_DR; only effective in init mode
    fn set_date(&mut self, date: DateRegister);

    /// Write RTC_TR; only effective in init mode
    fn set_time(&mut self, time: TimeRegister);

    fn hour_format(&mut self) -> HourFormat;

    fn set_hour_format(&mut self, format: HourFormat);

    fn prescaler(&mut self) -> Prescaler;

    /// Write both dividers; only effective in init mode
    fn set_prescaler(&mut self, prescaler: Prescaler);

    /// Set or clear the INIT request bit
    fn set_init_request(&mut self, requested: bool);

    /// INITF: the calendar is stopped and writable
    fn is_init_active(&mut self) -> bool;

    /// Write the WPR key sequence that locks (`true`) or unlocks (`false`)
    /// the protected registers
    fn set_write_protection(&mut self, enabled: bool);

    /// Read calendar registers directly instead of through shadow copies.
    /// Variants without BYPSHAD keep the default.
    fn enable_shadow_bypass(&mut self) {}

    fn calibration(&mut self) -> CalibrationRegister;

    fn set_calibration(&mut self, calibration: CalibrationRegister);

    /// RECALPF: a previous calibration write is still being applied
    fn is_recalibration_pending(&mut self) -> bool;
}

/// Clock-tree operation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockError {
    /// Bus clock gate could not be enabled
    BusClock,
    /// Requested oscillator did not start or could not be selected
    Source,
}

impl core::fmt::Display for ClockError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::BusClock => write!(f, "bus clock enable failed"),
            Self::Source => write!(f, "RTC clock source configuration failed"),
        }
    }
}

impl core::error::Error for ClockError {}

/// Reset and clock control, as seen by the RTC
pub trait ClockControl {
    /// Clock controller is up and accepting requests
    fn is_ready(&self) -> bool;

    /// Open the RTC APB bus clock gate
    fn enable_bus_clock(&mut self) -> Result<(), ClockError>;

    /// Start the oscillator and route it to the RTC (RCC_BDCR.RTCSEL)
    fn configure_source(&mut self, source: ClockSource) -> Result<(), ClockError>;

    /// RCC_BDCR.RTCEN
    fn enable_rtc_clock(&mut self);
}

/// Backup domain access control (PWR DBP)
pub trait BackupDomain {
    /// Allow writes to the backup domain. Idempotent.
    fn enable_write_access(&mut self);
}

/// Inter-core hardware semaphore guarding shared RCC registers
///
/// Single-core parts implement both methods as no-ops.
pub trait HardwareSemaphore {
    /// Spin until semaphore `id` is owned by this core
    fn lock(&mut self, id: u32);

    fn unlock(&mut self, id: u32);
}
