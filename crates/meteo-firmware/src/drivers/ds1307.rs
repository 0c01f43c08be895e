//! DS1307 real-time clock
//!
//! Registers 0x00..=0x06 hold seconds, minutes, hours, weekday, date, month
//! and year, all BCD. Bit 7 of the seconds register halts the oscillator.

use embedded_hal::i2c::I2c;
use log::error;

use meteo_core::sensors::{CalendarDate, ClockError, DateTime, RealTimeClock, TimeOfDay};

const ADDRESS: u8 = 0x68;

const REG_SECONDS: u8 = 0x00;
const REG_WEEKDAY: u8 = 0x03;
const REG_DATE: u8 = 0x04;

const CLOCK_HALT: u8 = 0x80;
const HOUR_12H: u8 = 0x40;

const fn to_bcd(value: u8) -> u8 {
    ((value / 10) << 4) | (value % 10)
}

const fn from_bcd(value: u8) -> u8 {
    (value >> 4) * 10 + (value & 0x0F)
}

pub struct Ds1307<I> {
    i2c: I,
}

impl<I: I2c> Ds1307<I> {
    pub fn new(i2c: I) -> Self {
        Self { i2c }
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), ClockError> {
        self.i2c.write(ADDRESS, bytes).map_err(|e| {
            error!("DS1307 write failed: {:?}", e);
            ClockError::Bus
        })
    }
}

impl<I: I2c> RealTimeClock for Ds1307<I> {
    fn now(&mut self) -> Result<DateTime, ClockError> {
        let mut regs = [0u8; 7];
        self.i2c
            .write_read(ADDRESS, &[REG_SECONDS], &mut regs)
            .map_err(|e| {
                error!("DS1307 read failed: {:?}", e);
                ClockError::Bus
            })?;

        if regs[0] & CLOCK_HALT != 0 {
            return Err(ClockError::Halted);
        }
        if regs[2] & HOUR_12H != 0 {
            return Err(ClockError::InvalidTime);
        }

        let now = DateTime::new(
            CalendarDate {
                month: from_bcd(regs[5] & 0x1F),
                day: from_bcd(regs[4] & 0x3F),
                year: 2000 + from_bcd(regs[6]) as u16,
            },
            TimeOfDay {
                hour: from_bcd(regs[2] & 0x3F),
                minute: from_bcd(regs[1] & 0x7F),
                second: from_bcd(regs[0] & 0x7F),
            },
            regs[3] & 0x07,
        );

        let valid = now.time.hour < 24
            && now.time.minute < 60
            && now.time.second < 60
            && (1..=12).contains(&now.date.month)
            && (1..=31).contains(&now.date.day);
        if !valid {
            return Err(ClockError::InvalidTime);
        }
        Ok(now)
    }

    fn set_time(&mut self, time: TimeOfDay) -> Result<(), ClockError> {
        // Writing the seconds register also clears the halt bit.
        self.write(&[
            REG_SECONDS,
            to_bcd(time.second),
            to_bcd(time.minute),
            to_bcd(time.hour),
        ])
    }

    fn set_date(&mut self, date: CalendarDate) -> Result<(), ClockError> {
        let year = date.year.checked_sub(2000).ok_or(ClockError::InvalidTime)? as u8;
        self.write(&[REG_DATE, to_bcd(date.day), to_bcd(date.month), to_bcd(year)])
    }

    fn set_weekday(&mut self, weekday: u8) -> Result<(), ClockError> {
        self.write(&[REG_WEEKDAY, weekday])
    }
}
