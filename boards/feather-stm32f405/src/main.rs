#![deny(unsafe_code)]
#![no_main]
#![no_std]

use defmt_rtt as _; // global logger
use panic_probe as _;
use rtic::app;
use rtic_monotonics::stm32::prelude::*;

mod platform;
mod registers;

stm32_tim2_monotonic!(Mono, 1_000_000);

#[app(device = embassy_stm32, peripherals = true, dispatchers = [USART1, USART2])]
mod app {
    use super::*;
    use defmt::{error, info, warn};
    use embassy_stm32::gpio::{Level, Output, Speed};
    use embassy_stm32::rcc::{Hse, HseMode, LsConfig};
    use embassy_stm32::time::Hertz;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
    use embassy_time::Delay;
    use rtc_core::{CalendarTime, ClockSource, Error, Rtc, RtcConfig, EPOCH_YEAR};
    use static_cell::StaticCell;

    use platform::Stm32Platform;
    use registers::Stm32Rtc;

    type BoardRtc = Rtc<CriticalSectionRawMutex, Stm32Rtc, Delay>;

    static RTC: StaticCell<BoardRtc> = StaticCell::new();

    /// Loaded when the counter still holds its reset date
    const DEFAULT_TIME: CalendarTime = CalendarTime {
        year: 2025,
        month: 1,
        day: 1,
        weekday: Some(rtc_core::Weekday::Wednesday),
        hour: 0,
        minute: 0,
        second: 0,
        nanosecond: 0,
        year_day: None,
        is_dst: None,
    };

    /// Crystal trim, parts per billion
    const LSE_CALIBRATION_PPB: i32 = 0;

    #[shared]
    struct Shared {}

    #[local]
    struct Local {
        led: Output<'static>,
    }

    #[init]
    fn init(_cx: init::Context) -> (Shared, Local) {
        info!("RTC demo starting...");

        // Adafruit Feather STM32F405: 12 MHz HSE, 32.768 kHz LSE (PC14/PC15)
        let mut config = embassy_stm32::Config::default();
        config.rcc.hse = Some(Hse {
            freq: Hertz(12_000_000),
            mode: HseMode::Oscillator,
        });

        // HSE (12 MHz) / PREDIV(6) = 2 MHz, * MUL(168) = 336 MHz (VCO),
        // / DIVP(4) = 84 MHz (SYSCLK)
        config.rcc.pll_src = embassy_stm32::rcc::PllSource::HSE;
        config.rcc.pll = Some(embassy_stm32::rcc::Pll {
            prediv: embassy_stm32::rcc::PllPreDiv::DIV6,
            mul: embassy_stm32::rcc::PllMul::MUL168,
            divp: Some(embassy_stm32::rcc::PllPDiv::DIV4),
            divq: None,
            divr: None,
        });
        config.rcc.sys = embassy_stm32::rcc::Sysclk::PLL1_P;
        config.rcc.ahb_pre = embassy_stm32::rcc::AHBPrescaler::DIV1; // 84 MHz
        config.rcc.apb1_pre = embassy_stm32::rcc::APBPrescaler::DIV2; // 42 MHz
        config.rcc.apb2_pre = embassy_stm32::rcc::APBPrescaler::DIV1; // 84 MHz

        // Low-speed clocks are brought up by the RTC driver itself
        config.rcc.ls = LsConfig::off();

        let p = embassy_stm32::init(config);

        // TIM2 on APB1: timer clock = 2*APB1 when prescaler != 1
        Mono::start(84_000_000);
        info!("TIM2 monotonic timer initialized at 1 MHz");

        let rtc_config = RtcConfig::new(ClockSource::Lse);
        match Rtc::init(Stm32Rtc::new(p.RTC), Delay, rtc_config, &mut Stm32Platform) {
            Ok(rtc) => {
                let rtc: &'static BoardRtc = RTC.init(rtc);
                clock::spawn(rtc).ok();
            }
            Err(e) => error!("RTC bring-up failed: {}", e),
        }

        let led = Output::new(p.PC1, Level::High, Speed::Low);
        heartbeat::spawn().ok();

        (Shared {}, Local { led })
    }

    /// Heartbeat task
    #[task(priority = 1, local = [led])]
    async fn heartbeat(cx: heartbeat::Context) {
        info!("Heartbeat task started");
        loop {
            cx.local.led.set_high();
            Mono::delay(100.millis()).await;
            cx.local.led.set_low();
            Mono::delay(4900.millis()).await;
        }
    }

    /// Seeds the calendar after a backup domain reset, then logs it
    #[task(priority = 1)]
    async fn clock(_cx: clock::Context, rtc: &'static BoardRtc) {
        match rtc.get_time() {
            Ok(now) if now.year == EPOCH_YEAR => {
                warn!("RTC holds its reset date, loading default time");
                if let Err(e) = rtc.set_time(&DEFAULT_TIME) {
                    error!("Setting RTC failed: {}", e);
                }
            }
            Ok(_) => {}
            Err(e) => error!("Reading RTC failed: {}", e),
        }

        match rtc.set_calibration(LSE_CALIBRATION_PPB) {
            Ok(()) => {}
            Err(e) => warn!("RTC calibration not applied: {}", e),
        }

        loop {
            match rtc.get_time() {
                Ok(t) => info!(
                    "{}-{:02}-{:02} {:02}:{:02}:{:02}.{:09} (unix {})",
                    t.year,
                    t.month,
                    t.day,
                    t.hour,
                    t.minute,
                    t.second,
                    t.nanosecond,
                    t.to_unix_secs()
                ),
                Err(Error::Busy) => warn!("RTC busy, skipping"),
                Err(e) => error!("Reading RTC failed: {}", e),
            }
            Mono::delay(10.secs()).await;
        }
    }

    /// RTIC idle task - WFI sleep mode when no tasks active
    #[idle]
    fn idle(_cx: idle::Context) -> ! {
        info!("Idle task started - entering WFI loop");
        loop {
            cortex_m::asm::wfi();
        }
    }
}
