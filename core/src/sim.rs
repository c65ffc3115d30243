//! Simulated RTC peripheral for host tests
//!
//! Models what the driver relies on: write protection, init-mode latency,
//! writes that only land in init mode, registers that change between two
//! reads, and the recalibration pending flag. Register state is public so
//! tests can set up and inspect it directly.

use embedded_hal::delay::DelayNs;
use heapless::Vec;
use rtc_hal_abstractions::{
    BackupDomain, CalibrationRegister, ClockControl, ClockError, ClockSource, DateRegister,
    HardwareSemaphore, HourFormat, Prescaler, RtcRegisters, TimeRegister,
};

/// Register values to latch at a given calendar read
#[derive(Debug, Clone, Copy)]
struct ScheduledChange {
    /// 1-based index over date, time and subsecond reads
    at_read: u32,
    date: DateRegister,
    time: TimeRegister,
    subsecond: u32,
}

/// In-memory RTC register file
#[derive(Debug)]
pub struct SimRegisters {
    pub date: DateRegister,
    pub time: TimeRegister,
    pub subsecond: u32,
    pub hour_format: HourFormat,
    pub prescaler: Prescaler,
    pub calibration: CalibrationRegister,
    pub write_protected: bool,
    pub init_requested: bool,
    pub shadow_bypass: bool,
    /// Polls of RECALPF that still report pending; `u32::MAX` never clears
    pub recalibration_busy_polls: u32,
    /// Time word advances on every read, so consecutive reads never agree
    pub free_running: bool,
    /// Called on every INITF poll
    pub init_poll_hook: Option<fn()>,
    /// Writes dropped because of write protection or missing init mode
    pub rejected_writes: u32,
    /// Number of times init mode was requested
    pub init_entries: u32,
    /// Polls before INITF asserts; `None` never asserts
    init_latency: Option<u32>,
    init_polls: u32,
    reads: u32,
    changes: Vec<ScheduledChange, 8>,
}

impl Default for SimRegisters {
    fn default() -> Self {
        Self::new()
    }
}

impl SimRegisters {
    /// Reset state: 2000-01-01 (DR reset value has weekday Monday),
    /// 00:00:00, LSE prescalers, 24-hour format, write protected
    pub fn new() -> Self {
        Self {
            date: DateRegister(0x0000_2101),
            time: TimeRegister(0),
            subsecond: Prescaler::LSE.synchronous as u32,
            hour_format: HourFormat::TwentyFourHour,
            prescaler: Prescaler::LSE,
            calibration: CalibrationRegister(0),
            write_protected: true,
            init_requested: false,
            shadow_bypass: false,
            recalibration_busy_polls: 0,
            free_running: false,
            init_poll_hook: None,
            rejected_writes: 0,
            init_entries: 0,
            init_latency: Some(2),
            init_polls: 0,
            reads: 0,
            changes: Vec::new(),
        }
    }

    pub fn with_init_latency(mut self, polls: Option<u32>) -> Self {
        self.init_latency = polls;
        self
    }

    pub fn with_calendar(mut self, date: DateRegister, time: TimeRegister, subsecond: u32) -> Self {
        self.date = date;
        self.time = time;
        self.subsecond = subsecond;
        self
    }

    /// Latch new register values right before calendar read number `at_read`
    /// (1-based, counting date, time and subsecond reads) returns
    pub fn schedule_change(
        &mut self,
        at_read: u32,
        date: DateRegister,
        time: TimeRegister,
        subsecond: u32,
    ) -> bool {
        self.changes
            .push(ScheduledChange {
                at_read,
                date,
                time,
                subsecond,
            })
            .is_ok()
    }

    /// Calendar reads so far
    pub fn reads(&self) -> u32 {
        self.reads
    }

    fn in_init(&self) -> bool {
        self.init_requested && self.init_latency.is_some_and(|latency| self.init_polls >= latency)
    }

    fn writable(&mut self) -> bool {
        if self.write_protected || !self.in_init() {
            self.rejected_writes += 1;
            return false;
        }
        true
    }

    fn on_read(&mut self) {
        self.reads += 1;
        let reads = self.reads;
        if let Some(change) = self.changes.iter().find(|c| c.at_read == reads) {
            self.date = change.date;
            self.time = change.time;
            self.subsecond = change.subsecond;
        }
    }
}

impl RtcRegisters for SimRegisters {
    fn date(&mut self) -> DateRegister {
        self.on_read();
        self.date
    }

    fn time(&mut self) -> TimeRegister {
        self.on_read();
        if self.free_running {
            self.time = TimeRegister((self.time.0 + 1) & TimeRegister::MASK);
        }
        self.time
    }

    fn subsecond(&mut self) -> u32 {
        self.on_read();
        self.subsecond
    }

    fn set_date(&mut self, date: DateRegister) {
        if self.writable() {
            self.date = DateRegister(date.0 & DateRegister::MASK);
        }
    }

    fn set_time(&mut self, time: TimeRegister) {
        if self.writable() {
            self.time = TimeRegister(time.0 & TimeRegister::MASK);
            // Init mode restarts the prescaler chain
            self.subsecond = self.prescaler.synchronous as u32;
        }
    }

    fn hour_format(&mut self) -> HourFormat {
        self.hour_format
    }

    fn set_hour_format(&mut self, format: HourFormat) {
        if self.writable() {
            self.hour_format = format;
        }
    }

    fn prescaler(&mut self) -> Prescaler {
        self.prescaler
    }

    fn set_prescaler(&mut self, prescaler: Prescaler) {
        if self.writable() {
            self.prescaler = prescaler;
        }
    }

    fn set_init_request(&mut self, requested: bool) {
        if self.write_protected {
            self.rejected_writes += 1;
            return;
        }
        if requested && !self.init_requested {
            self.init_entries += 1;
            self.init_polls = 0;
        }
        self.init_requested = requested;
    }

    fn is_init_active(&mut self) -> bool {
        if let Some(hook) = self.init_poll_hook {
            hook();
        }
        if !self.init_requested {
            return false;
        }
        match self.init_latency {
            Some(latency) if self.init_polls >= latency => true,
            _ => {
                self.init_polls = self.init_polls.saturating_add(1);
                false
            }
        }
    }

    fn set_write_protection(&mut self, enabled: bool) {
        self.write_protected = enabled;
    }

    fn enable_shadow_bypass(&mut self) {
        if self.write_protected {
            self.rejected_writes += 1;
            return;
        }
        self.shadow_bypass = true;
    }

    fn calibration(&mut self) -> CalibrationRegister {
        self.calibration
    }

    fn set_calibration(&mut self, calibration: CalibrationRegister) {
        if self.write_protected {
            self.rejected_writes += 1;
            return;
        }
        self.calibration = calibration;
    }

    fn is_recalibration_pending(&mut self) -> bool {
        match self.recalibration_busy_polls {
            0 => false,
            u32::MAX => true,
            _ => {
                self.recalibration_busy_polls -= 1;
                true
            }
        }
    }
}

/// Delay that returns immediately and records how long it was asked to wait
#[derive(Debug, Default)]
pub struct CountingDelay {
    elapsed_ns: u64,
}

impl CountingDelay {
    pub fn elapsed_us(&self) -> u64 {
        self.elapsed_ns / 1_000
    }
}

impl DelayNs for CountingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns += ns as u64;
    }
}

/// Collaborator call recorded by [`SimPlatform`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformCall {
    EnableBusClock,
    SemaphoreLock(u32),
    SemaphoreUnlock(u32),
    BackupUnlock,
    ConfigureSource(ClockSource),
    EnableRtcClock,
}

/// Clock tree, backup domain and semaphore stand-in
#[derive(Debug)]
pub struct SimPlatform {
    pub ready: bool,
    pub fail_bus_clock: bool,
    pub fail_source: bool,
    pub calls: Vec<PlatformCall, 16>,
}

impl Default for SimPlatform {
    fn default() -> Self {
        Self {
            ready: true,
            fail_bus_clock: false,
            fail_source: false,
            calls: Vec::new(),
        }
    }
}

impl SimPlatform {
    fn record(&mut self, call: PlatformCall) {
        // Tests never make more calls than the log holds
        let _ = self.calls.push(call);
    }
}

impl ClockControl for SimPlatform {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn enable_bus_clock(&mut self) -> Result<(), ClockError> {
        self.record(PlatformCall::EnableBusClock);
        if self.fail_bus_clock {
            return Err(ClockError::BusClock);
        }
        Ok(())
    }

    fn configure_source(&mut self, source: ClockSource) -> Result<(), ClockError> {
        self.record(PlatformCall::ConfigureSource(source));
        if self.fail_source {
            return Err(ClockError::Source);
        }
        Ok(())
    }

    fn enable_rtc_clock(&mut self) {
        self.record(PlatformCall::EnableRtcClock);
    }
}

impl BackupDomain for SimPlatform {
    fn enable_write_access(&mut self) {
        self.record(PlatformCall::BackupUnlock);
    }
}

impl HardwareSemaphore for SimPlatform {
    fn lock(&mut self, id: u32) {
        self.record(PlatformCall::SemaphoreLock(id));
    }

    fn unlock(&mut self, id: u32) {
        self.record(PlatformCall::SemaphoreUnlock(id));
    }
}
