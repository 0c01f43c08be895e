//! Operating parameters and their persisted record
//!
//! [`Configuration`] is the single source of truth read by every sampling
//! routine. Its fields can only be changed through [`Configuration::set`],
//! which validates the value against the range declared by [`Param::range`],
//! so an out-of-range value never reaches the store.
//!
//! The whole configuration is persisted as one fixed-size postcard record in
//! byte-addressed non-volatile memory (see [`ConfigStore`]).

use embassy_time::Duration;
use embedded_storage::Storage;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

use crate::constants::{
    CONFIG_RECORD_SIZE, EEPROM_CONFIGURATION, EEPROM_FIRST_BOOT_FLAG, FIRST_BOOT_DONE,
};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{param} out of range: {value}")]
    OutOfRange { param: &'static str, value: i32 },
    #[error("failed to encode configuration record")]
    Encode,
    #[error("failed to decode configuration record")]
    Decode,
    #[error("non-volatile memory {operation} failed")]
    Storage { operation: &'static str },
}

/// Accepted values for a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueRange {
    /// Exactly 0 or 1
    Flag,
    Inclusive { low: i32, high: i32 },
}

impl ValueRange {
    pub const fn inclusive(low: i32, high: i32) -> Self {
        Self::Inclusive { low, high }
    }

    pub fn accepts(self, value: i32) -> bool {
        match self {
            Self::Flag => value == 0 || value == 1,
            Self::Inclusive { low, high } => within(low, high, value),
        }
    }
}

/// Inclusive range check shared by the command validators and the record
/// validity checks.
pub(crate) fn within<T: PartialOrd>(low: T, high: T, value: T) -> bool {
    low <= value && value <= high
}

/// Every persisted parameter, in command table order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param {
    Lumin,
    LuminLow,
    LuminHigh,
    TempAir,
    MinTempAir,
    MaxTempAir,
    Hygr,
    HygrMinT,
    HygrMaxT,
    Pressure,
    PressureMin,
    PressureMax,
    LogInterval,
    FileMaxSize,
    Timeout,
}

impl Param {
    pub const ALL: [Param; 15] = [
        Self::Lumin,
        Self::LuminLow,
        Self::LuminHigh,
        Self::TempAir,
        Self::MinTempAir,
        Self::MaxTempAir,
        Self::Hygr,
        Self::HygrMinT,
        Self::HygrMaxT,
        Self::Pressure,
        Self::PressureMin,
        Self::PressureMax,
        Self::LogInterval,
        Self::FileMaxSize,
        Self::Timeout,
    ];

    /// Command name used on the serial link
    pub const fn name(self) -> &'static str {
        match self {
            Self::Lumin => "LUMIN",
            Self::LuminLow => "LUMIN_LOW",
            Self::LuminHigh => "LUMIN_HIGH",
            Self::TempAir => "TEMP_AIR",
            Self::MinTempAir => "MIN_TEMP_AIR",
            Self::MaxTempAir => "MAX_TEMP_AIR",
            Self::Hygr => "HYGR",
            Self::HygrMinT => "HYGR_MINT",
            Self::HygrMaxT => "HYGR_MAXT",
            Self::Pressure => "PRESSURE",
            Self::PressureMin => "PRESSURE_MIN",
            Self::PressureMax => "PRESSURE_MAX",
            Self::LogInterval => "LOG_INTERVALL",
            Self::FileMaxSize => "FILE_MAX_SIZE",
            Self::Timeout => "TIMEOUT",
        }
    }

    pub const fn range(self) -> ValueRange {
        match self {
            Self::Lumin | Self::TempAir | Self::Hygr | Self::Pressure => ValueRange::Flag,
            Self::LuminLow | Self::LuminHigh => ValueRange::inclusive(0, 1023),
            Self::MinTempAir | Self::MaxTempAir | Self::HygrMinT | Self::HygrMaxT => {
                ValueRange::inclusive(-40, 85)
            }
            Self::PressureMin | Self::PressureMax => ValueRange::inclusive(300, 1100),
            Self::LogInterval => ValueRange::inclusive(1, 254),
            Self::FileMaxSize => ValueRange::inclusive(101, 65534),
            Self::Timeout => ValueRange::inclusive(0, 254),
        }
    }
}

/// Validated operating parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    pub(crate) luminosity_enabled: bool,
    pub(crate) luminosity_low: u16,
    pub(crate) luminosity_high: u16,
    pub(crate) thermometer_enabled: bool,
    pub(crate) temperature_min: i8,
    pub(crate) temperature_max: i8,
    pub(crate) hygrometry_enabled: bool,
    pub(crate) hygrometry_temperature_min: i8,
    pub(crate) hygrometry_temperature_max: i8,
    pub(crate) pressure_enabled: bool,
    pub(crate) pressure_min: u16,
    pub(crate) pressure_max: u16,
    pub(crate) log_interval_minutes: u8,
    pub(crate) timeout_secs: u8,
    pub(crate) file_max_size: u16,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            luminosity_enabled: true,
            luminosity_low: 255,
            luminosity_high: 768,
            thermometer_enabled: true,
            temperature_min: -10,
            temperature_max: 60,
            hygrometry_enabled: true,
            hygrometry_temperature_min: 0,
            hygrometry_temperature_max: 50,
            pressure_enabled: true,
            pressure_min: 850,
            pressure_max: 1080,
            log_interval_minutes: 10,
            timeout_secs: 30,
            file_max_size: 4096,
        }
    }
}

impl Configuration {
    pub fn get(&self, param: Param) -> i32 {
        match param {
            Param::Lumin => self.luminosity_enabled as i32,
            Param::LuminLow => self.luminosity_low as i32,
            Param::LuminHigh => self.luminosity_high as i32,
            Param::TempAir => self.thermometer_enabled as i32,
            Param::MinTempAir => self.temperature_min as i32,
            Param::MaxTempAir => self.temperature_max as i32,
            Param::Hygr => self.hygrometry_enabled as i32,
            Param::HygrMinT => self.hygrometry_temperature_min as i32,
            Param::HygrMaxT => self.hygrometry_temperature_max as i32,
            Param::Pressure => self.pressure_enabled as i32,
            Param::PressureMin => self.pressure_min as i32,
            Param::PressureMax => self.pressure_max as i32,
            Param::LogInterval => self.log_interval_minutes as i32,
            Param::FileMaxSize => self.file_max_size as i32,
            Param::Timeout => self.timeout_secs as i32,
        }
    }

    /// Validate `value` against the declared range of `param` and store it.
    /// Nothing is modified when validation fails.
    pub fn set(&mut self, param: Param, value: i32) -> Result<(), ConfigError> {
        if !param.range().accepts(value) {
            return Err(ConfigError::OutOfRange {
                param: param.name(),
                value,
            });
        }

        // Narrowing casts are lossless once the range check passed.
        match param {
            Param::Lumin => self.luminosity_enabled = value == 1,
            Param::LuminLow => self.luminosity_low = value as u16,
            Param::LuminHigh => self.luminosity_high = value as u16,
            Param::TempAir => self.thermometer_enabled = value == 1,
            Param::MinTempAir => self.temperature_min = value as i8,
            Param::MaxTempAir => self.temperature_max = value as i8,
            Param::Hygr => self.hygrometry_enabled = value == 1,
            Param::HygrMinT => self.hygrometry_temperature_min = value as i8,
            Param::HygrMaxT => self.hygrometry_temperature_max = value as i8,
            Param::Pressure => self.pressure_enabled = value == 1,
            Param::PressureMin => self.pressure_min = value as u16,
            Param::PressureMax => self.pressure_max = value as u16,
            Param::LogInterval => self.log_interval_minutes = value as u8,
            Param::FileMaxSize => self.file_max_size = value as u16,
            Param::Timeout => self.timeout_secs = value as u8,
        }
        Ok(())
    }

    /// Check every field against its declared range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for param in Param::ALL {
            let value = self.get(param);
            if !param.range().accepts(value) {
                return Err(ConfigError::OutOfRange {
                    param: param.name(),
                    value,
                });
            }
        }
        Ok(())
    }

    /// Time between two standard-mode samples
    pub fn log_interval(&self) -> Duration {
        Duration::from_secs(self.log_interval_minutes as u64 * 60)
    }

    /// Upper bound on one GPS read
    pub fn sensor_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs as u64)
    }

    /// Largest size a log file may reach, in bytes
    pub fn file_max_size(&self) -> u32 {
        self.file_max_size as u32
    }

    pub fn climate_enabled(&self) -> bool {
        self.thermometer_enabled || self.hygrometry_enabled || self.pressure_enabled
    }

    fn encode(&self) -> Result<[u8; CONFIG_RECORD_SIZE], ConfigError> {
        let mut record = [0u8; CONFIG_RECORD_SIZE];
        postcard::to_slice(self, &mut record).map_err(|_| ConfigError::Encode)?;
        Ok(record)
    }

    fn decode(record: &[u8; CONFIG_RECORD_SIZE]) -> Result<Self, ConfigError> {
        postcard::from_bytes(record).map_err(|_| ConfigError::Decode)
    }
}

/// Persists the [`Configuration`] in byte-addressed non-volatile memory.
///
/// Layout:
/// - [`EEPROM_FIRST_BOOT_FLAG`]: one byte, [`FIRST_BOOT_DONE`] once defaults were written
/// - [`EEPROM_CONFIGURATION`]: the configuration record, always rewritten whole
pub struct ConfigStore<S> {
    storage: S,
}

impl<S> ConfigStore<S>
where
    S: Storage,
    S::Error: core::fmt::Debug,
{
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Load the stored configuration.
    ///
    /// On first boot, or when the stored record is unreadable, defaults are
    /// written back before being returned.
    pub fn load_or_init(&mut self) -> Result<Configuration, ConfigError> {
        let mut flag = [0u8; 1];
        self.storage
            .read(EEPROM_FIRST_BOOT_FLAG, &mut flag)
            .map_err(|e| {
                warn!("Failed to read first-boot flag: {:?}", e);
                ConfigError::Storage { operation: "read" }
            })?;

        if flag[0] == FIRST_BOOT_DONE {
            match self.load() {
                Ok(config) => {
                    info!("Configuration loaded: {:?}", config);
                    return Ok(config);
                }
                Err(ConfigError::Storage { operation }) => {
                    return Err(ConfigError::Storage { operation });
                }
                Err(e) => warn!("Stored configuration rejected ({}), restoring defaults", e),
            }
        } else {
            info!("First boot, writing default configuration");
        }

        let config = Configuration::default();
        self.persist(&config)?;
        self.storage
            .write(EEPROM_FIRST_BOOT_FLAG, &[FIRST_BOOT_DONE])
            .map_err(|e| {
                warn!("Failed to write first-boot flag: {:?}", e);
                ConfigError::Storage { operation: "write" }
            })?;
        Ok(config)
    }

    /// Read and validate the stored record.
    pub fn load(&mut self) -> Result<Configuration, ConfigError> {
        let mut record = [0u8; CONFIG_RECORD_SIZE];
        self.storage
            .read(EEPROM_CONFIGURATION, &mut record)
            .map_err(|e| {
                warn!("Failed to read configuration record: {:?}", e);
                ConfigError::Storage { operation: "read" }
            })?;
        let config = Configuration::decode(&record)?;
        config.validate()?;
        Ok(config)
    }

    /// Rewrite the whole configuration record.
    pub fn persist(&mut self, config: &Configuration) -> Result<(), ConfigError> {
        let record = config.encode()?;
        self.storage
            .write(EEPROM_CONFIGURATION, &record)
            .map_err(|e| {
                warn!("Failed to write configuration record: {:?}", e);
                ConfigError::Storage { operation: "write" }
            })
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }
}
