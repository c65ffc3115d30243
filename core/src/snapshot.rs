//! Torn-free sampling of the calendar registers
//!
//! Date, time and subsecond registers latch independently, so a rollover
//! between two reads can pair the old date with the new time (or the old
//! second with the new subsecond count). Each level is read until a
//! re-read of its leading word agrees with the sampled one:
//!
//! ```text
//! outer: date, inner(...), date again     -> retry everything on mismatch
//! inner: time, subsecond, time again      -> retry time+subsecond on mismatch
//! ```
//!
//! Rollover windows last microseconds, so agreement is normally reached on
//! the first or second pass. A register that never settles is treated as a
//! hardware fault after [`MAX_SETTLE_ATTEMPTS`] passes per level.

use rtc_hal_abstractions::{DateRegister, RtcRegisters, TimeRegister};

use crate::Error;

/// Passes per level before giving up with [`Error::Inconsistent`]
pub const MAX_SETTLE_ATTEMPTS: u32 = 16;

/// Date, time and subsecond values that belong to the same instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Snapshot {
    pub date: DateRegister,
    pub time: TimeRegister,
    pub subsecond: u32,
}

/// Run `sample` until `reread` returns the same leading word it latched
fn settle<R, W, T>(
    regs: &mut R,
    mut sample: impl FnMut(&mut R) -> Result<(W, T), Error>,
    mut reread: impl FnMut(&mut R) -> W,
) -> Result<(W, T), Error>
where
    W: PartialEq,
{
    for _ in 0..MAX_SETTLE_ATTEMPTS {
        let (word, rest) = sample(regs)?;
        if reread(regs) == word {
            return Ok((word, rest));
        }
    }
    error!("RTC registers did not settle after {} reads", MAX_SETTLE_ATTEMPTS);
    Err(Error::Inconsistent)
}

/// Time and subsecond from within the same second
pub fn read_time_of_day<R: RtcRegisters>(regs: &mut R) -> Result<(TimeRegister, u32), Error> {
    settle(regs, |r| Ok((r.time(), r.subsecond())), |r| r.time())
}

/// Date, time and subsecond from the same instant
pub fn read_snapshot<R: RtcRegisters>(regs: &mut R) -> Result<Snapshot, Error> {
    let (date, (time, subsecond)) = settle(
        regs,
        |r| {
            let date = r.date();
            Ok((date, read_time_of_day(r)?))
        },
        |r| r.date(),
    )?;

    Ok(Snapshot {
        date,
        time,
        subsecond,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimRegisters;

    // Saturday 2024-12-28 23:59:59, last subsecond tick
    const SAT_DATE: DateRegister = DateRegister::new(0x24, 0x12, 0x28, 6);
    const SAT_TIME: TimeRegister = TimeRegister::new(0x23, 0x59, 0x59);
    // Sunday 2024-12-29 00:00:00, counter reloaded
    const SUN_DATE: DateRegister = DateRegister::new(0x24, 0x12, 0x29, 7);
    const SUN_TIME: TimeRegister = TimeRegister::new(0x00, 0x00, 0x00);

    fn saturday_night() -> SimRegisters {
        SimRegisters::new().with_calendar(SAT_DATE, SAT_TIME, 0)
    }

    #[test]
    fn test_stable_read_takes_one_pass() {
        let mut sim = saturday_night();
        let snapshot = read_snapshot(&mut sim).unwrap();
        assert_eq!(
            snapshot,
            Snapshot {
                date: SAT_DATE,
                time: SAT_TIME,
                subsecond: 0
            }
        );
        // date, time, subsecond, time, date
        assert_eq!(sim.reads(), 5);
    }

    #[test]
    fn test_second_rollover_retries_inner_only() {
        let mut sim = SimRegisters::new().with_calendar(SAT_DATE, TimeRegister::new(0x12, 0x00, 0x05), 0);
        // Second ticks right before the confirming time read
        sim.schedule_change(4, SAT_DATE, TimeRegister::new(0x12, 0x00, 0x06), 255);

        let snapshot = read_snapshot(&mut sim).unwrap();
        assert_eq!(snapshot.time, TimeRegister::new(0x12, 0x00, 0x06));
        assert_eq!(snapshot.subsecond, 255);
        assert_eq!(snapshot.date, SAT_DATE);
        // date, (time, ss, time) x2, date
        assert_eq!(sim.reads(), 8);
    }

    #[test]
    fn test_rollover_at_subsecond_read_is_not_torn() {
        let mut sim = saturday_night();
        // Subsecond reload observed together with the old time word
        sim.schedule_change(3, SUN_DATE, SUN_TIME, 255);

        let snapshot = read_snapshot(&mut sim).unwrap();
        assert_eq!(
            snapshot,
            Snapshot {
                date: SUN_DATE,
                time: SUN_TIME,
                subsecond: 255
            }
        );
    }

    #[test]
    fn test_day_rollover_retries_whole_snapshot() {
        let mut sim = saturday_night();
        // Midnight passes right before the confirming date read
        sim.schedule_change(5, SUN_DATE, SUN_TIME, 255);

        let snapshot = read_snapshot(&mut sim).unwrap();
        assert_eq!(
            snapshot,
            Snapshot {
                date: SUN_DATE,
                time: SUN_TIME,
                subsecond: 255
            }
        );
        assert_eq!(sim.reads(), 10);
    }

    #[test]
    fn test_inner_level_in_isolation() {
        let mut sim = saturday_night();
        sim.schedule_change(3, SAT_DATE, TimeRegister::new(0x23, 0x59, 0x58), 17);

        let (time, subsecond) = read_time_of_day(&mut sim).unwrap();
        assert_eq!(time, TimeRegister::new(0x23, 0x59, 0x58));
        assert_eq!(subsecond, 17);
    }

    #[test]
    fn test_registers_that_never_settle() {
        let mut sim = saturday_night();
        sim.free_running = true;
        assert_eq!(read_snapshot(&mut sim), Err(Error::Inconsistent));
    }
}
