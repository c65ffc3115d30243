//! Platform-agnostic driver core for the STM32 calendar RTC
//!
//! This crate contains everything between the register-level capability in
//! `rtc-hal-abstractions` and the public time API. It has NO hardware
//! dependencies: boards inject registers, a delay and the clock-tree
//! collaborators.
//!
//! ## Modules
//!
//! - [`bcd`]: packed BCD codec for calendar fields
//! - [`calibration`]: ppb <-> smooth-calibration pulse conversion
//! - [`calendar`]: [`CalendarTime`] and hardware field translation
//! - [`init_mode`]: write-protection and init-mode guards
//! - [`snapshot`]: torn-free reads of the calendar registers
//! - [`Rtc`]: the transaction engine behind the public operations

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

// This mod MUST go first, so that the others see its macros.
mod fmt;

pub mod bcd;
pub mod calendar;
pub mod calibration;
mod config;
mod error;
pub mod init_mode;
mod rtc;
#[cfg(any(test, feature = "sim"))]
pub mod sim;
pub mod snapshot;

pub use calendar::{CalendarTime, Weekday, EPOCH_YEAR, MAX_YEAR};
pub use calibration::{MAX_PPB, MIN_PPB};
pub use config::{RtcConfig, RCC_SEMAPHORE};
pub use error::Error;
pub use rtc::{Rtc, RECALIBRATION_TIMEOUT_US};
pub use rtc_hal_abstractions::{
    BackupDomain, CalibrationRegister, ClockControl, ClockError, ClockSource, DateRegister,
    HardwareSemaphore, HourFormat, Prescaler, RtcRegisters, TimeRegister,
};
