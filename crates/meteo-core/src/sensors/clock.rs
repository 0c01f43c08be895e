use core::fmt;

use thiserror_no_std::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockError {
    #[error("clock bus error")]
    Bus,
    #[error("clock is halted")]
    Halted,
    #[error("clock returned an invalid time")]
    InvalidTime,
}

/// Time of day as set by the `CLOCK` command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

/// Calendar date as set by the `DATE` command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarDate {
    pub month: u8,
    pub day: u8,
    /// Full year, 2000..=2099
    pub year: u16,
}

/// Wall-clock reading of the real-time clock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateTime {
    pub date: CalendarDate,
    pub time: TimeOfDay,
    /// 1..=7
    pub weekday: u8,
}

impl DateTime {
    pub const fn new(date: CalendarDate, time: TimeOfDay, weekday: u8) -> Self {
        Self {
            date,
            time,
            weekday,
        }
    }
}

/// Renders the record timestamp field, `H:M:S-M/D/YYYY` without padding.
impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}-{}/{}/{}",
            self.time.hour,
            self.time.minute,
            self.time.second,
            self.date.month,
            self.date.day,
            self.date.year
        )
    }
}

/// Battery-backed real-time clock
pub trait RealTimeClock {
    fn now(&mut self) -> Result<DateTime, ClockError>;

    fn set_time(&mut self, time: TimeOfDay) -> Result<(), ClockError>;

    fn set_date(&mut self, date: CalendarDate) -> Result<(), ClockError>;

    /// `weekday` is 1..=7
    fn set_weekday(&mut self, weekday: u8) -> Result<(), ClockError>;
}
