use embassy_time::{Duration, Instant};
use esp_hal::Blocking;
use esp_hal::uart::Uart;
use log::warn;

use meteo_core::sensors::{GpsLine, GpsReceiver, PositionError};

/// NMEA receiver on a 9600 baud UART
pub struct UartGps {
    uart: Uart<'static, Blocking>,
}

impl UartGps {
    pub fn new(uart: Uart<'static, Blocking>) -> Self {
        Self { uart }
    }
}

impl GpsReceiver for UartGps {
    fn is_ready(&mut self) -> bool {
        self.uart.read_ready()
    }

    fn read_line(&mut self, line: &mut GpsLine, timeout: Duration) -> Result<(), PositionError> {
        let deadline = Instant::now() + timeout;
        let mut byte = [0u8; 1];

        loop {
            if !self.uart.read_ready() {
                if Instant::now() >= deadline {
                    return Err(PositionError::Timeout);
                }
                continue;
            }

            match self.uart.read(&mut byte) {
                Ok(0) => continue,
                Ok(_) => {}
                Err(e) => {
                    warn!("GPS UART error: {:?}", e);
                    return Err(PositionError::NoLink);
                }
            }

            match byte[0] {
                b'\n' => return Ok(()),
                b'\r' => {}
                b => line.push(b as char).map_err(|_| PositionError::LineTooLong)?,
            }
        }
    }
}
