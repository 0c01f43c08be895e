use bme280::i2c::BME280;
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::error;

use meteo_core::sensors::{ClimateReading, ClimateSensor, SensorError};

/// BME280 in forced mode: one measurement per call
pub struct Bme280Climate<I, D> {
    sensor: BME280<I>,
    delay: D,
}

impl<I, D> Bme280Climate<I, D>
where
    I: I2c,
    D: DelayNs,
{
    /// Sensor at the primary address (0x76)
    pub fn new(i2c: I, delay: D) -> Self {
        Self {
            sensor: BME280::new_primary(i2c),
            delay,
        }
    }

    /// Load the calibration data. Must succeed before the first measurement.
    pub fn init(&mut self) -> Result<(), SensorError> {
        self.sensor.init(&mut self.delay).map_err(|e| {
            error!("BME280 init failed: {:?}", e);
            SensorError::NotResponding { sensor: "BME280" }
        })
    }
}

impl<I, D> ClimateSensor for Bme280Climate<I, D>
where
    I: I2c,
    D: DelayNs,
{
    fn measure(&mut self) -> Result<ClimateReading, SensorError> {
        let measurements = self.sensor.measure(&mut self.delay).map_err(|e| {
            error!("BME280 measurement failed: {:?}", e);
            SensorError::ReadFailed {
                sensor: "BME280",
                operation: "forced measurement",
                details: "I2C communication error or sensor not responding",
            }
        })?;

        Ok(ClimateReading {
            temperature: measurements.temperature,
            humidity: measurements.humidity,
            // Pa to hPa
            pressure: measurements.pressure / 100.0,
        })
    }
}
