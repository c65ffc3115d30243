//! One-time RTC configuration and clock bring-up
//!
//! Entering init mode stops the calendar and resets the prescaler chain,
//! which would make the clock lose up to a second on every reset. The
//! configuration step therefore compares the hour format and both
//! prescalers against the target first and only enters init mode when one
//! of them differs.

use core::ops::{Deref, DerefMut};

use embedded_hal::delay::DelayNs;
use rtc_hal_abstractions::{
    BackupDomain, ClockControl, ClockSource, HardwareSemaphore, HourFormat, Prescaler,
    RtcRegisters,
};

use crate::init_mode::{InitMode, WriteUnlocked};
use crate::Error;

/// Hardware semaphore protecting RCC registers shared between cores
pub const RCC_SEMAPHORE: u32 = 3;

/// RTC configuration, fixed for the lifetime of the instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RtcConfig {
    /// Oscillator clocking the RTC; selects the prescaler profile
    pub clock_source: ClockSource,
}

impl RtcConfig {
    pub const fn new(clock_source: ClockSource) -> Self {
        Self { clock_source }
    }

    /// Prescalers giving a 1 Hz tick from the configured source
    pub const fn prescaler(&self) -> Prescaler {
        self.clock_source.prescaler()
    }
}

/// Bring the counter to 24-hour format and the configured prescalers
///
/// Also enables shadow register bypass, so calendar reads always see the
/// live counter. An init-mode timeout is returned after write protection
/// has been restored.
pub(crate) fn configure<R, D>(regs: &mut R, delay: &mut D, config: &RtcConfig) -> Result<(), Error>
where
    R: RtcRegisters,
    D: DelayNs,
{
    let target = config.prescaler();
    let hour_format = regs.hour_format();
    let prescaler = regs.prescaler();

    let mut unlocked = WriteUnlocked::new(regs);
    let mut result = Ok(());

    if hour_format != HourFormat::TwentyFourHour || prescaler != target {
        info!(
            "Reconfiguring RTC: prescaler {}/{} -> {}/{}",
            prescaler.asynchronous,
            prescaler.synchronous,
            target.asynchronous,
            target.synchronous
        );
        match InitMode::enter(&mut unlocked, delay) {
            Ok(mut init) => {
                init.set_hour_format(HourFormat::TwentyFourHour);
                init.set_prescaler(target);
            }
            Err(e) => result = Err(e),
        }
    } else {
        debug!("RTC configuration unchanged, counter left running");
    }

    unlocked.enable_shadow_bypass();

    result
}

/// Holds an inter-core hardware semaphore; released on drop
struct SemaphoreGuard<'a, P: HardwareSemaphore> {
    platform: &'a mut P,
    id: u32,
}

impl<'a, P: HardwareSemaphore> SemaphoreGuard<'a, P> {
    fn lock(platform: &'a mut P, id: u32) -> Self {
        platform.lock(id);
        Self { platform, id }
    }
}

impl<P: HardwareSemaphore> Deref for SemaphoreGuard<'_, P> {
    type Target = P;

    fn deref(&self) -> &P {
        self.platform
    }
}

impl<P: HardwareSemaphore> DerefMut for SemaphoreGuard<'_, P> {
    fn deref_mut(&mut self) -> &mut P {
        self.platform
    }
}

impl<P: HardwareSemaphore> Drop for SemaphoreGuard<'_, P> {
    fn drop(&mut self) {
        self.platform.unlock(self.id);
    }
}

/// Clock the peripheral and route the oscillator to it
///
/// Any clock failure is fatal to bringing the RTC online.
pub(crate) fn bring_up<P>(platform: &mut P, config: &RtcConfig) -> Result<(), Error>
where
    P: ClockControl + BackupDomain + HardwareSemaphore,
{
    if !platform.is_ready() {
        error!("Clock control not ready");
        return Err(Error::DeviceNotReady);
    }

    platform.enable_bus_clock().map_err(|e| {
        error!("RTC bus clock enable failed: {:?}", e);
        Error::DeviceNotReady
    })?;

    let mut rcc = SemaphoreGuard::lock(platform, RCC_SEMAPHORE);
    rcc.enable_write_access();
    rcc.configure_source(config.clock_source).map_err(|e| {
        error!("RTC clock source configuration failed: {:?}", e);
        Error::DeviceNotReady
    })?;
    rcc.enable_rtc_clock();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{CountingDelay, PlatformCall, SimPlatform, SimRegisters};

    #[test]
    fn test_matching_configuration_skips_init_mode() {
        let mut sim = SimRegisters::new();
        let mut delay = CountingDelay::default();

        configure(&mut sim, &mut delay, &RtcConfig::default()).unwrap();

        assert_eq!(sim.init_entries, 0);
        assert!(sim.shadow_bypass);
        assert!(sim.write_protected);
        assert_eq!(delay.elapsed_us(), 0);
    }

    #[test]
    fn test_hour_format_mismatch_reconfigures() {
        let mut sim = SimRegisters::new();
        sim.hour_format = HourFormat::AmPm;
        let mut delay = CountingDelay::default();

        configure(&mut sim, &mut delay, &RtcConfig::default()).unwrap();

        assert_eq!(sim.init_entries, 1);
        assert_eq!(sim.hour_format, HourFormat::TwentyFourHour);
        assert!(!sim.init_requested);
        assert!(sim.write_protected);
        assert_eq!(sim.rejected_writes, 0);
    }

    #[test]
    fn test_prescaler_mismatch_reconfigures() {
        let mut sim = SimRegisters::new();
        let mut delay = CountingDelay::default();

        configure(&mut sim, &mut delay, &RtcConfig::new(ClockSource::Lsi)).unwrap();

        assert_eq!(sim.init_entries, 1);
        assert_eq!(sim.prescaler, Prescaler::LSI);

        // Second boot with the same target leaves the counter alone
        configure(&mut sim, &mut delay, &RtcConfig::new(ClockSource::Lsi)).unwrap();
        assert_eq!(sim.init_entries, 1);
    }

    #[test]
    fn test_init_timeout_is_reported() {
        let mut sim = SimRegisters::new().with_init_latency(None);
        sim.prescaler = Prescaler::LSI;
        let mut delay = CountingDelay::default();

        let result = configure(&mut sim, &mut delay, &RtcConfig::default());

        assert_eq!(result, Err(Error::Timeout));
        assert_eq!(sim.prescaler, Prescaler::LSI);
        assert!(sim.write_protected);
        assert!(!sim.init_requested);
        assert!(sim.shadow_bypass);
    }

    #[test]
    fn test_bring_up_sequence() {
        let mut platform = SimPlatform::default();

        bring_up(&mut platform, &RtcConfig::default()).unwrap();

        assert_eq!(
            platform.calls.as_slice(),
            &[
                PlatformCall::EnableBusClock,
                PlatformCall::SemaphoreLock(RCC_SEMAPHORE),
                PlatformCall::BackupUnlock,
                PlatformCall::ConfigureSource(ClockSource::Lse),
                PlatformCall::EnableRtcClock,
                PlatformCall::SemaphoreUnlock(RCC_SEMAPHORE),
            ]
        );
    }

    #[test]
    fn test_bring_up_clock_not_ready() {
        let mut platform = SimPlatform {
            ready: false,
            ..Default::default()
        };

        assert_eq!(
            bring_up(&mut platform, &RtcConfig::default()),
            Err(Error::DeviceNotReady)
        );
        assert!(platform.calls.is_empty());
    }

    #[test]
    fn test_bring_up_bus_clock_failure() {
        let mut platform = SimPlatform {
            fail_bus_clock: true,
            ..Default::default()
        };

        assert_eq!(
            bring_up(&mut platform, &RtcConfig::default()),
            Err(Error::DeviceNotReady)
        );
        assert_eq!(platform.calls.as_slice(), &[PlatformCall::EnableBusClock]);
    }

    #[test]
    fn test_bring_up_source_failure_releases_semaphore() {
        let mut platform = SimPlatform {
            fail_source: true,
            ..Default::default()
        };

        assert_eq!(
            bring_up(&mut platform, &RtcConfig::new(ClockSource::Lsi)),
            Err(Error::DeviceNotReady)
        );
        assert_eq!(
            platform.calls.last(),
            Some(&PlatformCall::SemaphoreUnlock(RCC_SEMAPHORE))
        );
        assert!(!platform.calls.contains(&PlatformCall::EnableRtcClock));
    }
}
