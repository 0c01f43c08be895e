use embedded_io::{ErrorKind, ErrorType, Read, ReadReady, Write};
use esp_hal::Blocking;
use esp_hal::uart::Uart;
use thiserror_no_std::Error;

/// Operator console on UART0 (USB bridge)
pub struct UartConsole {
    uart: Uart<'static, Blocking>,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("console UART error")]
pub struct SerialError;

impl embedded_io::Error for SerialError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

impl UartConsole {
    pub fn new(uart: Uart<'static, Blocking>) -> Self {
        Self { uart }
    }
}

impl ErrorType for UartConsole {
    type Error = SerialError;
}

impl Read for UartConsole {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        self.uart.read(buf).map_err(|_| SerialError)
    }
}

impl ReadReady for UartConsole {
    fn read_ready(&mut self) -> Result<bool, SerialError> {
        Ok(self.uart.read_ready())
    }
}

impl Write for UartConsole {
    fn write(&mut self, buf: &[u8]) -> Result<usize, SerialError> {
        self.uart.write(buf).map_err(|_| SerialError)
    }

    fn flush(&mut self) -> Result<(), SerialError> {
        self.uart.flush().map_err(|_| SerialError)
    }
}
