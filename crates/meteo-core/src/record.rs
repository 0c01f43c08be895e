//! Log record assembly
//!
//! A record is one line of fields joined by [`FIELD_SEPARATOR`]:
//! timestamp, GPS fix sentence, light level, temperature, humidity and
//! pressure. Sensor fields are only present when the sensor is enabled and the
//! reading lies within its configured bounds.

use core::fmt::Write;

use heapless::String;
use thiserror_no_std::Error;

use crate::config::{Configuration, within};
use crate::constants::{FIELD_SEPARATOR, GPS_ERROR_FIELD, RECORD_CAPACITY};
use crate::metrics::LightLevel;
use crate::sensors::{ClimateReading, DateTime};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordError {
    #[error("record exceeds its buffer")]
    Overflow,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogRecord {
    line: String<RECORD_CAPACITY>,
}

impl LogRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        self.line.as_str()
    }

    pub fn len(&self) -> usize {
        self.line.len()
    }

    pub fn is_empty(&self) -> bool {
        self.line.is_empty()
    }

    fn push_field(&mut self, args: core::fmt::Arguments<'_>) -> Result<(), RecordError> {
        self.line.write_fmt(args).map_err(|_| RecordError::Overflow)?;
        self.line
            .push_str(FIELD_SEPARATOR)
            .map_err(|_| RecordError::Overflow)
    }

    pub fn push_timestamp(&mut self, now: &DateTime) -> Result<(), RecordError> {
        self.push_field(format_args!("{}", now))
    }

    /// Append the fix sentence, or the GPS error marker when there is none.
    pub fn push_position(&mut self, fix: Option<&str>) -> Result<(), RecordError> {
        self.push_field(format_args!("{}", fix.unwrap_or(GPS_ERROR_FIELD)))
    }

    pub fn push_light(&mut self, raw: u16, config: &Configuration) -> Result<(), RecordError> {
        if !config.luminosity_enabled {
            return Ok(());
        }
        let level = LightLevel::assess(raw, config.luminosity_low, config.luminosity_high);
        self.push_field(format_args!("{}", level.label()))
    }

    pub fn push_climate(
        &mut self,
        reading: &ClimateReading,
        config: &Configuration,
    ) -> Result<(), RecordError> {
        let temperature = reading.temperature;

        if config.thermometer_enabled
            && within(
                config.temperature_min as f32,
                config.temperature_max as f32,
                temperature,
            )
        {
            self.push_field(format_args!("{:.2}", temperature))?;
        }

        // Humidity readings are only trusted inside their temperature window.
        if config.hygrometry_enabled
            && within(
                config.hygrometry_temperature_min as f32,
                config.hygrometry_temperature_max as f32,
                temperature,
            )
        {
            self.push_field(format_args!("{:.2}", reading.humidity))?;
        }

        if config.pressure_enabled
            && within(
                config.pressure_min as f32,
                config.pressure_max as f32,
                reading.pressure,
            )
        {
            // Last field, no trailing separator
            write!(self.line, "{:.2}", reading.pressure).map_err(|_| RecordError::Overflow)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Param;
    use crate::sensors::{CalendarDate, TimeOfDay};

    fn timestamp() -> DateTime {
        DateTime::new(
            CalendarDate {
                month: 3,
                day: 7,
                year: 2024,
            },
            TimeOfDay {
                hour: 9,
                minute: 5,
                second: 0,
            },
            4,
        )
    }

    fn only_light() -> Configuration {
        let mut config = Configuration::default();
        config.set(Param::TempAir, 0).unwrap();
        config.set(Param::Hygr, 0).unwrap();
        config.set(Param::Pressure, 0).unwrap();
        config
    }

    #[test]
    fn test_timestamp_is_unpadded() {
        let mut record = LogRecord::new();
        record.push_timestamp(&timestamp()).unwrap();
        assert_eq!(record.as_str(), "9:5:0-3/7/2024 ; ");
    }

    #[test]
    fn test_low_light_record() {
        let config = only_light();
        let mut record = LogRecord::new();
        record.push_timestamp(&timestamp()).unwrap();
        let prefix = record.len();

        record.push_light(200, &config).unwrap();
        record.push_climate(
            &ClimateReading {
                temperature: 20.0,
                humidity: 40.0,
                pressure: 1000.0,
            },
            &config,
        )
        .unwrap();
        assert_eq!(&record.as_str()[prefix..], "LOW ; ");
    }

    #[test]
    fn test_disabled_light_is_omitted() {
        let mut config = only_light();
        config.set(Param::Lumin, 0).unwrap();
        let mut record = LogRecord::new();
        record.push_light(900, &config).unwrap();
        assert!(record.is_empty());
    }

    #[test]
    fn test_gps_error_marker() {
        let mut record = LogRecord::new();
        record.push_position(None).unwrap();
        record.push_position(Some("$GPGGA,1")).unwrap();
        assert_eq!(record.as_str(), "GPS error ; $GPGGA,1 ; ");
    }

    #[test]
    fn test_climate_fields() {
        let config = Configuration::default();
        let mut record = LogRecord::new();
        record
            .push_climate(
                &ClimateReading {
                    temperature: 21.5,
                    humidity: 45.25,
                    pressure: 1013.1,
                },
                &config,
            )
            .unwrap();
        assert_eq!(record.as_str(), "21.50 ; 45.25 ; 1013.10");
    }

    #[test]
    fn test_out_of_range_values_are_dropped() {
        let config = Configuration::default();
        let mut record = LogRecord::new();
        // Too hot for the hygrometer window (0..=50) but valid for the thermometer
        record
            .push_climate(
                &ClimateReading {
                    temperature: 55.0,
                    humidity: 10.0,
                    pressure: 700.0,
                },
                &config,
            )
            .unwrap();
        assert_eq!(record.as_str(), "55.00 ; ");
    }

    #[test]
    fn test_overflow_is_reported() {
        let bytes = [b'x'; RECORD_CAPACITY];
        let long = core::str::from_utf8(&bytes).unwrap();
        let mut record = LogRecord::new();
        assert_eq!(record.push_position(Some(long)), Err(RecordError::Overflow));
    }
}
