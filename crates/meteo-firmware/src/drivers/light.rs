use esp_hal::Blocking;
use esp_hal::analog::adc::{Adc, AdcPin};
use esp_hal::peripherals::{ADC1, GPIO1};

use meteo_core::sensors::{LightSensor, SensorError};

/// Conversions normally finish within a handful of polls.
const MAX_POLLS: u32 = 10_000;

/// Photoresistor divider on GPIO1, sampled by ADC1
pub struct AnalogLight {
    adc: Adc<'static, ADC1<'static>, Blocking>,
    pin: AdcPin<GPIO1<'static>, ADC1<'static>>,
}

impl AnalogLight {
    pub fn new(
        adc: Adc<'static, ADC1<'static>, Blocking>,
        pin: AdcPin<GPIO1<'static>, ADC1<'static>>,
    ) -> Self {
        Self { adc, pin }
    }
}

impl LightSensor for AnalogLight {
    fn read_level(&mut self) -> Result<u16, SensorError> {
        for _ in 0..MAX_POLLS {
            if let Ok(raw) = self.adc.read_oneshot(&mut self.pin) {
                // 12-bit conversion scaled down to the 10-bit level range
                return Ok(raw >> 2);
            }
        }
        Err(SensorError::NotResponding {
            sensor: "light sensor",
        })
    }
}
