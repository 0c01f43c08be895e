//! Drivers for the station's peripherals

mod at24c32;
mod bme280;
mod console;
mod ds1307;
mod gps;
mod light;
mod p9813;

pub use at24c32::*;
pub use bme280::*;
pub use console::*;
pub use ds1307::*;
pub use gps::*;
pub use light::*;
pub use p9813::*;

use embedded_sdmmc::{TimeSource, Timestamp};

/// Timestamp source for FAT directory entries.
///
/// Log files carry their date in their path, so entries get a fixed stamp.
pub struct FixedTime;

impl TimeSource for FixedTime {
    fn get_timestamp(&self) -> Timestamp {
        Timestamp {
            year_since_1970: 55,
            zero_indexed_month: 0,
            zero_indexed_day: 0,
            hours: 0,
            minutes: 0,
            seconds: 0,
        }
    }
}
