//! Hardware collaborators of the station

use embedded_io::{Read, ReadReady, Write};

use crate::indicator::Indicator;
use crate::sensors::{ClimateSensor, GpsReceiver, LightSensor, RealTimeClock};
use crate::storage::LogVolume;

/// Everything the station talks to besides the configuration memory.
///
/// Implemented once per platform: the ESP32-S3 firmware and the desktop
/// simulator each provide their own board.
pub trait Board {
    type Climate: ClimateSensor;
    type Light: LightSensor;
    type Gps: GpsReceiver;
    type Clock: RealTimeClock;
    type Volume: LogVolume;
    type Indicator: Indicator;
    /// Operator console, also receives every record
    type Serial: Read + ReadReady + Write;

    fn climate(&mut self) -> &mut Self::Climate;
    fn light(&mut self) -> &mut Self::Light;
    fn gps(&mut self) -> &mut Self::Gps;
    fn clock(&mut self) -> &mut Self::Clock;
    fn volume(&mut self) -> &mut Self::Volume;
    fn indicator(&mut self) -> &mut Self::Indicator;
    fn serial(&mut self) -> &mut Self::Serial;
}
