//! Time transaction engine
//!
//! [`Rtc`] owns the register handle and the delay behind a per-instance
//! mutex. Every public operation is one transaction that takes the mutex
//! with `try_lock`: a caller that finds it held gets [`Error::Busy`]
//! immediately instead of waiting, so the driver can be used from
//! contexts that must not block.
//!
//! ## Usage
//!
//! ```ignore
//! static RTC: StaticCell<Rtc<CriticalSectionRawMutex, Stm32Rtc, Delay>> = StaticCell::new();
//!
//! let rtc = RTC.init(Rtc::init(regs, Delay, RtcConfig::default(), &mut platform)?);
//! rtc.set_time(&CalendarTime::new(2025, 6, 1, 12, 0, 0))?;
//! let now = rtc.get_time()?;
//! ```

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::{Mutex, MutexGuard};
use embedded_hal::delay::DelayNs;
use rtc_hal_abstractions::{BackupDomain, ClockControl, HardwareSemaphore, Prescaler, RtcRegisters};

#[cfg(feature = "smooth-calibration")]
use crate::calibration::SmoothCalibration;
use crate::calendar::CalendarTime;
use crate::config::{bring_up, configure, RtcConfig};
#[cfg(feature = "smooth-calibration")]
use crate::init_mode::wait_for;
use crate::init_mode::{InitMode, WriteUnlocked};
use crate::snapshot::read_snapshot;
use crate::Error;

/// Upper bound for a previous calibration write to be applied
pub const RECALIBRATION_TIMEOUT_US: u32 = 100_000;

struct Peripheral<R, D> {
    regs: R,
    delay: D,
}

/// Calendar RTC driver instance
pub struct Rtc<M: RawMutex, R: RtcRegisters, D: DelayNs> {
    peripheral: Mutex<M, Peripheral<R, D>>,
    prescaler: Prescaler,
}

impl<M, R, D> Rtc<M, R, D>
where
    M: RawMutex,
    R: RtcRegisters,
    D: DelayNs,
{
    /// Configure an already clocked peripheral
    ///
    /// The counter keeps running when its hour format and prescalers
    /// already match `config`.
    pub fn new(mut regs: R, mut delay: D, config: RtcConfig) -> Result<Self, Error> {
        configure(&mut regs, &mut delay, &config)?;

        Ok(Self {
            peripheral: Mutex::new(Peripheral { regs, delay }),
            prescaler: config.prescaler(),
        })
    }

    /// Clock the peripheral from `config.clock_source`, then configure it
    pub fn init<P>(regs: R, delay: D, config: RtcConfig, platform: &mut P) -> Result<Self, Error>
    where
        P: ClockControl + BackupDomain + HardwareSemaphore,
    {
        bring_up(platform, &config)?;
        let rtc = Self::new(regs, delay, config)?;
        info!("RTC ready");
        Ok(rtc)
    }

    /// Prescalers the counter runs with
    pub fn prescaler(&self) -> Prescaler {
        self.prescaler
    }

    fn lock(&self) -> Result<MutexGuard<'_, M, Peripheral<R, D>>, Error> {
        self.peripheral.try_lock().map_err(|_| {
            warn!("RTC busy");
            Error::Busy
        })
    }

    /// Read the current calendar time
    ///
    /// `nanosecond` carries the elapsed fraction of the current second;
    /// `year_day` and `is_dst` are always `None`.
    pub fn get_time(&self) -> Result<CalendarTime, Error> {
        let snapshot = {
            let mut peripheral = self.lock()?;
            read_snapshot(&mut peripheral.regs)?
        };

        Ok(CalendarTime::from_registers(
            snapshot.date,
            snapshot.time,
            snapshot.subsecond,
            self.prescaler,
        ))
    }

    /// Load a new calendar time into the counter
    ///
    /// `time.weekday` must be set; `nanosecond`, `year_day` and `is_dst`
    /// are ignored. The subsecond counter restarts from zero.
    pub fn set_time(&self, time: &CalendarTime) -> Result<(), Error> {
        let (date, time_of_day) = time.to_registers()?;

        let mut guard = self.lock()?;
        let Peripheral { regs, delay } = &mut *guard;

        info!(
            "Setting clock to {}-{}-{} {}:{}:{}",
            time.year,
            time.month,
            time.day,
            time.hour,
            time.minute,
            time.second
        );

        let mut unlocked = WriteUnlocked::new(regs);
        let mut init = InitMode::enter(&mut unlocked, delay)?;
        init.set_date(date);
        init.set_time(time_of_day);

        Ok(())
    }

    /// Current calibration in parts per billion
    #[cfg(feature = "smooth-calibration")]
    pub fn get_calibration(&self) -> Result<i32, Error> {
        let mut peripheral = self.lock()?;
        let calr = peripheral.regs.calibration();
        Ok(SmoothCalibration::from_register(calr).ppb())
    }

    #[cfg(not(feature = "smooth-calibration"))]
    pub fn get_calibration(&self) -> Result<i32, Error> {
        Err(Error::InvalidArgument)
    }

    /// Apply a calibration in parts per billion
    ///
    /// Values outside `MIN_PPB..=MAX_PPB` are rejected. Waits up to
    /// [`RECALIBRATION_TIMEOUT_US`] for a previous calibration to be
    /// applied.
    #[cfg(feature = "smooth-calibration")]
    pub fn set_calibration(&self, ppb: i32) -> Result<(), Error> {
        let setting = SmoothCalibration::from_ppb(ppb)?;

        let mut guard = self.lock()?;
        let Peripheral { regs, delay } = &mut *guard;

        if !wait_for(delay, RECALIBRATION_TIMEOUT_US, || {
            !regs.is_recalibration_pending()
        }) {
            error!("RTC recalibration still pending after {} us", RECALIBRATION_TIMEOUT_US);
            return Err(Error::Timeout);
        }

        let mut unlocked = WriteUnlocked::new(regs);
        let calr = unlocked.calibration();
        unlocked.set_calibration(setting.apply(calr));

        info!("RTC calibration set to {} ppb ({} pulses)", ppb, setting.pulses());
        Ok(())
    }

    #[cfg(not(feature = "smooth-calibration"))]
    pub fn set_calibration(&self, _ppb: i32) -> Result<(), Error> {
        Err(Error::InvalidArgument)
    }

    /// Release the register handle and delay
    pub fn free(self) -> (R, D) {
        let Peripheral { regs, delay } = self.peripheral.into_inner();
        (regs, delay)
    }
}
