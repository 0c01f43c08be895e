//! Line-oriented access to the serial link

use core::fmt;

use embedded_io::{Read, ReadReady, Write};
use heapless::{String, Vec};
use log::warn;

use crate::constants::{COMMAND_LINE_CAPACITY, LINE_ENDING, REPLY_CAPACITY};

/// One line received on the serial link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputLine {
    Text(String<COMMAND_LINE_CAPACITY>),
    /// Too long for the buffer, or not UTF-8. Already discarded.
    Garbled,
}

/// Assembles input lines without blocking and writes CRLF-terminated output.
///
/// A line ends at `\n` and every `\r` is dropped, so a terminal sending bare
/// CR never completes a command.
///
/// Serial errors are logged and otherwise ignored; losing console output must
/// never stop the station.
#[derive(Debug, Default)]
pub struct Console {
    pending: Vec<u8, COMMAND_LINE_CAPACITY>,
    overflowed: bool,
}

impl Console {
    pub const fn new() -> Self {
        Self {
            pending: Vec::new(),
            overflowed: false,
        }
    }

    /// Consume whatever input is available and return the first complete line.
    pub fn poll_line<S: Read + ReadReady>(&mut self, serial: &mut S) -> Option<InputLine> {
        loop {
            match serial.read_ready() {
                Ok(true) => {}
                Ok(false) => return None,
                Err(e) => {
                    warn!("Serial read failed: {:?}", e);
                    return None;
                }
            }

            let mut byte = [0u8; 1];
            match serial.read(&mut byte) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => {
                    warn!("Serial read failed: {:?}", e);
                    return None;
                }
            }

            match byte[0] {
                b'\n' => return Some(self.finish_line()),
                b'\r' => {}
                b => {
                    if self.pending.push(b).is_err() {
                        self.overflowed = true;
                    }
                }
            }
        }
    }

    fn finish_line(&mut self) -> InputLine {
        let overflowed = core::mem::replace(&mut self.overflowed, false);
        let bytes = core::mem::take(&mut self.pending);
        if overflowed {
            return InputLine::Garbled;
        }
        match String::from_utf8(bytes) {
            Ok(text) => InputLine::Text(text),
            Err(_) => InputLine::Garbled,
        }
    }

    /// Write a short formatted line.
    pub fn reply<S: Write>(&mut self, serial: &mut S, args: fmt::Arguments<'_>) {
        let mut line: String<REPLY_CAPACITY> = String::new();
        if fmt::write(&mut line, args).is_err() {
            warn!("Reply truncated");
        }
        self.write_line(serial, line.as_str());
    }

    pub fn write_line<S: Write>(&mut self, serial: &mut S, line: &str) {
        let result = serial
            .write_all(line.as_bytes())
            .and_then(|()| serial.write_all(LINE_ENDING.as_bytes()))
            .and_then(|()| serial.flush());
        if let Err(e) = result {
            warn!("Serial write failed: {:?}", e);
        }
    }
}
