//! P9813 chainable RGB LED driver, bit-banged over two GPIOs

use core::convert::Infallible;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{OutputPin, PinState};

use meteo_core::indicator::{Indicator, Rgb};

const HALF_PERIOD_US: u32 = 20;

/// A single P9813 LED on a clock/data pair
pub struct P9813<C, D, T> {
    clock: C,
    data: D,
    delay: T,
}

impl<C, D, T> P9813<C, D, T>
where
    C: OutputPin<Error = Infallible>,
    D: OutputPin<Error = Infallible>,
    T: DelayNs,
{
    pub fn new(clock: C, data: D, delay: T) -> Self {
        Self { clock, data, delay }
    }

    fn send_bit(&mut self, bit: bool) {
        let Ok(()) = self.data.set_state(PinState::from(bit));
        let Ok(()) = self.clock.set_low();
        self.delay.delay_us(HALF_PERIOD_US);
        let Ok(()) = self.clock.set_high();
        self.delay.delay_us(HALF_PERIOD_US);
    }

    fn send_byte(&mut self, byte: u8) {
        for i in (0..8).rev() {
            self.send_bit(byte & (1 << i) != 0);
        }
    }

    fn send_frame(&mut self, color: Rgb) {
        // Flag byte: two ones, then the inverted top two bits of B, G and R.
        let flag = 0xC0
            | ((!color.b & 0xC0) >> 2)
            | ((!color.g & 0xC0) >> 4)
            | ((!color.r & 0xC0) >> 6);

        for _ in 0..4 {
            self.send_byte(0);
        }
        self.send_byte(flag);
        self.send_byte(color.b);
        self.send_byte(color.g);
        self.send_byte(color.r);
        for _ in 0..4 {
            self.send_byte(0);
        }
    }
}

impl<C, D, T> Indicator for P9813<C, D, T>
where
    C: OutputPin<Error = Infallible>,
    D: OutputPin<Error = Infallible>,
    T: DelayNs,
{
    fn set_color(&mut self, color: Rgb) {
        self.send_frame(color);
    }
}
