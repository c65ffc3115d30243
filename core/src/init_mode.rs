//! Write protection and initialization mode
//!
//! Calendar and prescaler registers only accept writes while the counter
//! is stopped in init mode, and INIT itself is behind the write-protection
//! key. Both are modelled as guards so that every exit path, including a
//! timeout, restores the locked, running state:
//!
//! ```text
//! Normal --WriteUnlocked::new--> Unlocked --InitMode::enter--> Init
//!   ^                               ^   |                       |
//!   |                               |   +--Timeout (INIT clr)   |
//!   +---------drop (WPR key)--------+-----drop (INIT clear)-----+
//! ```

use core::ops::{Deref, DerefMut};

use embedded_hal::delay::DelayNs;
use rtc_hal_abstractions::RtcRegisters;

use crate::Error;

/// Upper bound for INITF to assert after requesting init mode
pub const INIT_TIMEOUT_US: u32 = 1_000_000;

/// Sleep between flag polls
pub const POLL_INTERVAL_US: u32 = 1_000;

/// Poll `condition` until it holds or `timeout_us` has been slept
///
/// The condition is evaluated once more after the final sleep, so a flag
/// that asserts right at the deadline still counts.
pub(crate) fn wait_for<D: DelayNs>(
    delay: &mut D,
    timeout_us: u32,
    mut condition: impl FnMut() -> bool,
) -> bool {
    let mut waited_us: u32 = 0;
    loop {
        if condition() {
            return true;
        }
        if waited_us >= timeout_us {
            return false;
        }
        delay.delay_us(POLL_INTERVAL_US);
        waited_us = waited_us.saturating_add(POLL_INTERVAL_US);
    }
}

/// Register access with write protection lifted; re-protects on drop
pub struct WriteUnlocked<'a, R: RtcRegisters> {
    regs: &'a mut R,
}

impl<'a, R: RtcRegisters> WriteUnlocked<'a, R> {
    pub fn new(regs: &'a mut R) -> Self {
        regs.set_write_protection(false);
        Self { regs }
    }
}

impl<R: RtcRegisters> Deref for WriteUnlocked<'_, R> {
    type Target = R;

    fn deref(&self) -> &R {
        self.regs
    }
}

impl<R: RtcRegisters> DerefMut for WriteUnlocked<'_, R> {
    fn deref_mut(&mut self) -> &mut R {
        self.regs
    }
}

impl<R: RtcRegisters> Drop for WriteUnlocked<'_, R> {
    fn drop(&mut self) {
        self.regs.set_write_protection(true);
    }
}

/// Calendar stopped and writable; leaves init mode on drop
///
/// Only constructible from an unlocked register handle, since the INIT
/// bit itself is write protected.
pub struct InitMode<'a, 'r, R: RtcRegisters> {
    regs: &'a mut WriteUnlocked<'r, R>,
}

impl<'a, 'r, R: RtcRegisters> InitMode<'a, 'r, R> {
    /// Request init mode and wait, bounded by [`INIT_TIMEOUT_US`], for the
    /// hardware to confirm it
    ///
    /// On timeout the request is withdrawn before returning, and nothing
    /// may be written.
    pub fn enter<D: DelayNs>(
        regs: &'a mut WriteUnlocked<'r, R>,
        delay: &mut D,
    ) -> Result<Self, Error> {
        regs.set_init_request(true);

        if !wait_for(delay, INIT_TIMEOUT_US, || regs.is_init_active()) {
            regs.set_init_request(false);
            error!("RTC init mode not entered within {} us", INIT_TIMEOUT_US);
            return Err(Error::Timeout);
        }

        trace!("RTC in init mode");
        Ok(Self { regs })
    }
}

impl<R: RtcRegisters> Deref for InitMode<'_, '_, R> {
    type Target = R;

    fn deref(&self) -> &R {
        self.regs
    }
}

impl<R: RtcRegisters> DerefMut for InitMode<'_, '_, R> {
    fn deref_mut(&mut self) -> &mut R {
        self.regs
    }
}

impl<R: RtcRegisters> Drop for InitMode<'_, '_, R> {
    fn drop(&mut self) {
        // Leaving is unconditional and needs no wait
        self.regs.set_init_request(false);
    }
}
