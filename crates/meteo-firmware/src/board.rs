//! Concrete ESP32-S3 board wiring

use core::cell::RefCell;

use embassy_time::Delay;
use embedded_hal_bus::i2c::RefCellDevice;
use embedded_hal_bus::spi::ExclusiveDevice;
use embedded_sdmmc::SdCard;
use esp_hal::Blocking;
use esp_hal::gpio::Output;
use esp_hal::i2c::master::I2c;
use esp_hal::spi::master::Spi;

use meteo_core::app_state::Board;
use meteo_core::storage::sd_card::SdCardVolume;

use crate::drivers::{
    AnalogLight, At24c32, Bme280Climate, Ds1307, FixedTime, P9813, UartConsole, UartGps,
};

pub type I2cBus = I2c<'static, Blocking>;
/// One device on the shared I2C bus
pub type I2cDevice = RefCellDevice<'static, I2cBus>;
pub type SdSpi = ExclusiveDevice<Spi<'static, Blocking>, Output<'static>, Delay>;

pub type Climate = Bme280Climate<I2cDevice, Delay>;
pub type Clock = Ds1307<I2cDevice>;
pub type Eeprom = At24c32<I2cDevice, Delay>;
pub type Volume = SdCardVolume<SdCard<SdSpi, Delay>, FixedTime>;
pub type Led = P9813<Output<'static>, Output<'static>, Delay>;

/// Share the I2C bus between the BME280, the RTC and the EEPROM.
pub fn share_i2c(bus: &'static RefCell<I2cBus>) -> (I2cDevice, I2cDevice, I2cDevice) {
    (
        RefCellDevice::new(bus),
        RefCellDevice::new(bus),
        RefCellDevice::new(bus),
    )
}

pub struct FirmwareBoard {
    pub climate: Climate,
    pub light: AnalogLight,
    pub gps: UartGps,
    pub clock: Clock,
    pub volume: Volume,
    pub led: Led,
    pub console: UartConsole,
}

impl Board for FirmwareBoard {
    type Climate = Climate;
    type Light = AnalogLight;
    type Gps = UartGps;
    type Clock = Clock;
    type Volume = Volume;
    type Indicator = Led;
    type Serial = UartConsole;

    fn climate(&mut self) -> &mut Climate {
        &mut self.climate
    }

    fn light(&mut self) -> &mut AnalogLight {
        &mut self.light
    }

    fn gps(&mut self) -> &mut UartGps {
        &mut self.gps
    }

    fn clock(&mut self) -> &mut Clock {
        &mut self.clock
    }

    fn volume(&mut self) -> &mut Volume {
        &mut self.volume
    }

    fn indicator(&mut self) -> &mut Led {
        &mut self.led
    }

    fn serial(&mut self) -> &mut UartConsole {
        &mut self.console
    }
}
