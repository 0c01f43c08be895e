//! Sensor collaborator traits
//!
//! Every sensor exposes a pull-based "read now" operation. The concrete
//! drivers live in the firmware and simulator crates; the sampling routine in
//! [`crate::app_state`] only depends on these traits.

mod clock;
mod gps;

pub use clock::*;
pub use gps::*;

use thiserror_no_std::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    #[error("{sensor}: {operation} failed ({details})")]
    ReadFailed {
        sensor: &'static str,
        operation: &'static str,
        details: &'static str,
    },
    #[error("{sensor} is not responding")]
    NotResponding { sensor: &'static str },
}

/// One forced measurement of the climate sensor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateReading {
    /// Degrees Celsius
    pub temperature: f32,
    /// Relative humidity in percent
    pub humidity: f32,
    /// Hectopascal
    pub pressure: f32,
}

/// Temperature, humidity and pressure sensor
pub trait ClimateSensor {
    fn measure(&mut self) -> Result<ClimateReading, SensorError>;
}

/// Ambient light sensor reporting a 10-bit level (0..=1023)
pub trait LightSensor {
    fn read_level(&mut self) -> Result<u16, SensorError>;
}
