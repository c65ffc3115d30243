//! RTC register access for the STM32F405
//!
//! Implements the register-level capability over the raw PAC. Field
//! packing is shared with `rtc-core` through the register newtypes, so
//! this module only moves words in and out.

use embassy_stm32::pac::rtc::regs;
use embassy_stm32::pac::RTC;
use embassy_stm32::{peripherals, Peri};
use rtc_core::{
    CalibrationRegister, DateRegister, HourFormat, Prescaler, RtcRegisters, TimeRegister,
};

// RTC_CR
const CR_FMT: u32 = 1 << 6;
const CR_BYPSHAD: u32 = 1 << 5;

// RTC_ISR
const ISR_INIT: u32 = 1 << 7;
const ISR_INITF: u32 = 1 << 6;
const ISR_RECALPF: u32 = 1 << 16;

// RTC_WPR key sequence
const WPR_KEY1: u32 = 0xCA;
const WPR_KEY2: u32 = 0x53;
const WPR_LOCK: u32 = 0xFF;

const PRER_S_MASK: u32 = 0x7FFF;
const PRER_A_MASK: u32 = 0x7F;
const SSR_MASK: u32 = 0xFFFF;

/// Owns the RTC peripheral singleton
pub struct Stm32Rtc {
    _rtc: Peri<'static, peripherals::RTC>,
}

impl Stm32Rtc {
    pub fn new(rtc: Peri<'static, peripherals::RTC>) -> Self {
        Self { _rtc: rtc }
    }
}

impl RtcRegisters for Stm32Rtc {
    fn date(&mut self) -> DateRegister {
        DateRegister(RTC.dr().read().0 & DateRegister::MASK)
    }

    fn time(&mut self) -> TimeRegister {
        TimeRegister(RTC.tr().read().0 & TimeRegister::MASK)
    }

    fn subsecond(&mut self) -> u32 {
        RTC.ssr().read().0 & SSR_MASK
    }

    fn set_date(&mut self, date: DateRegister) {
        RTC.dr().write_value(regs::Dr(date.0 & DateRegister::MASK));
    }

    fn set_time(&mut self, time: TimeRegister) {
        RTC.tr().write_value(regs::Tr(time.0 & TimeRegister::MASK));
    }

    fn hour_format(&mut self) -> HourFormat {
        if RTC.cr().read().0 & CR_FMT != 0 {
            HourFormat::AmPm
        } else {
            HourFormat::TwentyFourHour
        }
    }

    fn set_hour_format(&mut self, format: HourFormat) {
        RTC.cr().modify(|w| match format {
            HourFormat::AmPm => w.0 |= CR_FMT,
            HourFormat::TwentyFourHour => w.0 &= !CR_FMT,
        });
    }

    fn prescaler(&mut self) -> Prescaler {
        let prer = RTC.prer().read().0;
        Prescaler {
            asynchronous: ((prer >> 16) & PRER_A_MASK) as u8,
            synchronous: (prer & PRER_S_MASK) as u16,
        }
    }

    fn set_prescaler(&mut self, prescaler: Prescaler) {
        // RM0090: two separate writes, synchronous divider first
        let sync = prescaler.synchronous as u32 & PRER_S_MASK;
        let asynchronous = (prescaler.asynchronous as u32 & PRER_A_MASK) << 16;
        RTC.prer().write_value(regs::Prer(sync));
        RTC.prer().write_value(regs::Prer(asynchronous | sync));
    }

    fn set_init_request(&mut self, requested: bool) {
        RTC.isr().modify(|w| {
            if requested {
                w.0 |= ISR_INIT;
            } else {
                w.0 &= !ISR_INIT;
            }
        });
    }

    fn is_init_active(&mut self) -> bool {
        RTC.isr().read().0 & ISR_INITF != 0
    }

    fn set_write_protection(&mut self, enabled: bool) {
        if enabled {
            RTC.wpr().write_value(regs::Wpr(WPR_LOCK));
        } else {
            RTC.wpr().write_value(regs::Wpr(WPR_KEY1));
            RTC.wpr().write_value(regs::Wpr(WPR_KEY2));
        }
    }

    fn enable_shadow_bypass(&mut self) {
        RTC.cr().modify(|w| w.0 |= CR_BYPSHAD);
    }

    fn calibration(&mut self) -> CalibrationRegister {
        CalibrationRegister(RTC.calr().read().0)
    }

    fn set_calibration(&mut self, calibration: CalibrationRegister) {
        RTC.calr().write_value(regs::Calr(calibration.0));
    }

    fn is_recalibration_pending(&mut self) -> bool {
        RTC.isr().read().0 & ISR_RECALPF != 0
    }
}
