//! AT24C32 I2C EEPROM (4 KiB, 32-byte pages)

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use embedded_storage::{ReadStorage, Storage};
use log::error;
use thiserror_no_std::Error;

const ADDRESS: u8 = 0x50;
const CAPACITY: usize = 4096;
const PAGE_SIZE: usize = 32;
/// Self-timed write cycle
const WRITE_CYCLE_MS: u32 = 5;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EepromError {
    #[error("access past the end of the EEPROM")]
    OutOfBounds,
    #[error("EEPROM bus error")]
    Bus,
}

pub struct At24c32<I, D> {
    i2c: I,
    delay: D,
}

impl<I, D> At24c32<I, D>
where
    I: I2c,
    D: DelayNs,
{
    pub fn new(i2c: I, delay: D) -> Self {
        Self { i2c, delay }
    }

    fn check_bounds(offset: u32, len: usize) -> Result<usize, EepromError> {
        let start = offset as usize;
        match start.checked_add(len) {
            Some(end) if end <= CAPACITY => Ok(start),
            _ => Err(EepromError::OutOfBounds),
        }
    }
}

impl<I, D> ReadStorage for At24c32<I, D>
where
    I: I2c,
    D: DelayNs,
{
    type Error = EepromError;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), EepromError> {
        let start = Self::check_bounds(offset, bytes.len())?;
        let address = (start as u16).to_be_bytes();
        self.i2c.write_read(ADDRESS, &address, bytes).map_err(|e| {
            error!("EEPROM read failed: {:?}", e);
            EepromError::Bus
        })
    }

    fn capacity(&self) -> usize {
        CAPACITY
    }
}

impl<I, D> Storage for At24c32<I, D>
where
    I: I2c,
    D: DelayNs,
{
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), EepromError> {
        let mut address = Self::check_bounds(offset, bytes.len())?;
        let mut remaining = bytes;

        // A page write wraps around inside its page, so never cross a boundary.
        while !remaining.is_empty() {
            let room = PAGE_SIZE - address % PAGE_SIZE;
            let (chunk, rest) = remaining.split_at(room.min(remaining.len()));

            let mut frame = [0u8; PAGE_SIZE + 2];
            frame[..2].copy_from_slice(&(address as u16).to_be_bytes());
            frame[2..2 + chunk.len()].copy_from_slice(chunk);
            self.i2c
                .write(ADDRESS, &frame[..2 + chunk.len()])
                .map_err(|e| {
                    error!("EEPROM write failed: {:?}", e);
                    EepromError::Bus
                })?;
            self.delay.delay_ms(WRITE_CYCLE_MS);

            address += chunk.len();
            remaining = rest;
        }
        Ok(())
    }
}
