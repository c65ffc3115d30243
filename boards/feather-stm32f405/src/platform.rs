//! Clock tree and backup domain access for RTC bring-up
//!
//! The F405 is single-core, so the inter-core semaphore is a no-op.

use defmt::{debug, warn};
use embassy_stm32::pac::{PWR, RCC};
use rtc_core::{BackupDomain, ClockControl, ClockError, ClockSource, HardwareSemaphore};

// RCC_CR
const CR_HSIRDY: u32 = 1 << 1;
const CR_HSERDY: u32 = 1 << 17;

// RCC_BDCR
const BDCR_LSEON: u32 = 1 << 0;
const BDCR_LSERDY: u32 = 1 << 1;
const BDCR_RTCSEL_SHIFT: u32 = 8;
const BDCR_RTCSEL_MASK: u32 = 0b11 << BDCR_RTCSEL_SHIFT;
const BDCR_RTCEN: u32 = 1 << 15;

// RCC_CSR
const CSR_LSION: u32 = 1 << 0;
const CSR_LSIRDY: u32 = 1 << 1;

// RTCSEL encodings
const RTCSEL_LSE: u32 = 0b01;
const RTCSEL_LSI: u32 = 0b10;

/// Oscillator ready polls; LSE crystals can take up to ~2 s to start
const OSC_READY_POLLS: u32 = 2_000;
/// Core cycles between polls, ~1 ms at 84 MHz
const OSC_POLL_CYCLES: u32 = 84_000;

/// RCC and PWR collaborators
pub struct Stm32Platform;

impl Stm32Platform {
    fn wait_ready(ready: impl Fn() -> bool) -> Result<(), ClockError> {
        for _ in 0..OSC_READY_POLLS {
            if ready() {
                return Ok(());
            }
            cortex_m::asm::delay(OSC_POLL_CYCLES);
        }
        Err(ClockError::Source)
    }
}

impl ClockControl for Stm32Platform {
    fn is_ready(&self) -> bool {
        RCC.cr().read().0 & (CR_HSIRDY | CR_HSERDY) != 0
    }

    fn enable_bus_clock(&mut self) -> Result<(), ClockError> {
        // RTC registers sit in the backup domain; the PWR interface is the
        // bus-side gate for them
        RCC.apb1enr().modify(|w| w.set_pwren(true));
        if RCC.apb1enr().read().pwren() {
            Ok(())
        } else {
            Err(ClockError::BusClock)
        }
    }

    fn configure_source(&mut self, source: ClockSource) -> Result<(), ClockError> {
        let rtcsel = match source {
            ClockSource::Lse => {
                RCC.bdcr().modify(|w| w.0 |= BDCR_LSEON);
                Self::wait_ready(|| RCC.bdcr().read().0 & BDCR_LSERDY != 0)?;
                RTCSEL_LSE
            }
            ClockSource::Lsi => {
                RCC.csr().modify(|w| w.0 |= CSR_LSION);
                Self::wait_ready(|| RCC.csr().read().0 & CSR_LSIRDY != 0)?;
                RTCSEL_LSI
            }
        };

        let current = (RCC.bdcr().read().0 & BDCR_RTCSEL_MASK) >> BDCR_RTCSEL_SHIFT;
        if current == rtcsel {
            debug!("RTC clock source already selected");
            return Ok(());
        }
        if current != 0 {
            // Changing RTCSEL needs a backup domain reset, which would wipe
            // the calendar
            warn!("RTC clocked from another source (RTCSEL={})", current);
            return Err(ClockError::Source);
        }

        RCC.bdcr()
            .modify(|w| w.0 = (w.0 & !BDCR_RTCSEL_MASK) | (rtcsel << BDCR_RTCSEL_SHIFT));
        Ok(())
    }

    fn enable_rtc_clock(&mut self) {
        RCC.bdcr().modify(|w| w.0 |= BDCR_RTCEN);
    }
}

impl BackupDomain for Stm32Platform {
    fn enable_write_access(&mut self) {
        PWR.cr1().modify(|w| w.set_dbp(true));
    }
}

impl HardwareSemaphore for Stm32Platform {
    fn lock(&mut self, _id: u32) {}

    fn unlock(&mut self, _id: u32) {}
}
