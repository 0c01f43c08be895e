//! Tri-color status indicator and fatal alarm patterns

use embedded_hal::delay::DelayNs;

/// 24-bit color sent to the status LED
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub const OFF: Self = Self::new(0, 0, 0);
    pub const RED: Self = Self::new(255, 0, 0);
    pub const GREEN: Self = Self::new(0, 255, 0);
    pub const BLUE: Self = Self::new(0, 0, 255);
    pub const YELLOW: Self = Self::new(225, 234, 0);
    pub const ORANGE: Self = Self::new(255, 69, 0);
    pub const WHITE: Self = Self::new(255, 255, 255);
}

/// Driver for the status LED
pub trait Indicator {
    fn set_color(&mut self, color: Rgb);
}

/// Two-color blink used to signal a fatal fault.
///
/// One full cycle lasts one second. The second color shines `multiplier`
/// times longer than the first, which is how faults sharing the same pair of
/// colors are told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmPattern {
    pub first: Rgb,
    pub second: Rgb,
    pub multiplier: u32,
}

impl AlarmPattern {
    pub const fn new(first: Rgb, second: Rgb, multiplier: u32) -> Self {
        Self {
            first,
            second,
            multiplier,
        }
    }

    pub const fn first_ms(&self) -> u32 {
        1000 / (self.multiplier + 1)
    }

    pub const fn second_ms(&self) -> u32 {
        (1000 * self.multiplier) / (self.multiplier + 1)
    }

    /// Show a single one-second cycle of the pattern.
    pub fn blink_once<I: Indicator, D: DelayNs>(&self, indicator: &mut I, delay: &mut D) {
        indicator.set_color(self.first);
        delay.delay_ms(self.first_ms());
        indicator.set_color(self.second);
        delay.delay_ms(self.second_ms());
    }
}

/// Blink `pattern` forever. Recovery requires a manual reset.
pub fn run_alarm<I: Indicator, D: DelayNs>(
    indicator: &mut I,
    delay: &mut D,
    pattern: AlarmPattern,
) -> ! {
    loop {
        pattern.blink_once(indicator, delay);
    }
}
