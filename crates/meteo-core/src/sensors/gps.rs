use embassy_time::Duration;
use heapless::String;
use log::debug;
use thiserror_no_std::Error;

use crate::constants::{GPS_FIX_PREFIX, GPS_LINE_CAPACITY, GPS_MAX_LINES};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionError {
    #[error("GPS link is down")]
    NoLink,
    #[error("GPS read timed out")]
    Timeout,
    #[error("GPS line exceeds buffer")]
    LineTooLong,
    #[error("no fix sentence received")]
    NoFix,
}

pub type GpsLine = String<GPS_LINE_CAPACITY>;

/// Serial GPS receiver emitting NMEA sentences
pub trait GpsReceiver {
    /// True once the receiver has sent anything on its link.
    fn is_ready(&mut self) -> bool;

    /// Read one newline-terminated sentence into `line`, without the
    /// terminator. Gives up with [`PositionError::Timeout`] after `timeout`.
    fn read_line(&mut self, line: &mut GpsLine, timeout: Duration) -> Result<(), PositionError>;
}

/// Read sentences until a fix sentence shows up and return it trimmed.
///
/// At most [`GPS_MAX_LINES`] sentences are inspected. Each one is bounded by
/// `timeout`.
pub fn read_fix<G: GpsReceiver>(gps: &mut G, timeout: Duration) -> Result<GpsLine, PositionError> {
    let mut line = GpsLine::new();
    for _ in 0..GPS_MAX_LINES {
        line.clear();
        gps.read_line(&mut line, timeout)?;

        let trimmed = line.trim();
        if trimmed.starts_with(GPS_FIX_PREFIX) {
            let mut fix = GpsLine::new();
            // Cannot overflow: trimmed is a slice of a line of the same capacity
            fix.push_str(trimmed).map_err(|_| PositionError::LineTooLong)?;
            return Ok(fix);
        }
        debug!("Skipping GPS sentence: {}", trimmed);
    }
    Err(PositionError::NoFix)
}
