//! Log file storage
//!
//! Records are appended to date-named files. [`RotatingLog`] picks the
//! revision to write to, a [`LogVolume`] does the actual I/O. The volume opens
//! a file only for the duration of one call.

mod rotating;
pub mod sd_card;

pub use rotating::*;

use core::fmt;

use heapless::String;
use thiserror_no_std::Error;

use crate::constants::FILE_NAME_CAPACITY;
use crate::sensors::CalendarDate;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage {operation} failed")]
    Io { operation: &'static str },
    #[error("volume is full")]
    VolumeFull,
    #[error("invalid log file name")]
    Name,
    #[error("no log file revision left")]
    RevisionsExhausted,
}

impl StorageError {
    /// True when the volume cannot take more data, as opposed to failing I/O
    pub const fn is_full(&self) -> bool {
        matches!(self, Self::VolumeFull | Self::RevisionsExhausted)
    }
}

/// Name of one log file: calendar date plus revision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogFileName {
    pub date: CalendarDate,
    /// Starts at 1
    pub revision: u16,
}

impl LogFileName {
    pub const fn new(date: CalendarDate, revision: u16) -> Self {
        Self { date, revision }
    }

    /// Long name, `YYYY-M-D-<revision>.txt`
    pub fn long_name(&self) -> Result<String<FILE_NAME_CAPACITY>, StorageError> {
        let mut name = String::new();
        fmt::write(&mut name, format_args!("{}", self)).map_err(|_| StorageError::Name)?;
        Ok(name)
    }

    /// FAT short directory name, `YYYYMMDD`
    pub fn short_dir(&self) -> Result<String<8>, StorageError> {
        let mut name = String::new();
        fmt::write(
            &mut name,
            format_args!("{:04}{:02}{:02}", self.date.year, self.date.month, self.date.day),
        )
        .map_err(|_| StorageError::Name)?;
        Ok(name)
    }

    /// FAT short file name inside [`LogFileName::short_dir`], `<revision>.TXT`
    pub fn short_file(&self) -> Result<String<12>, StorageError> {
        let mut name = String::new();
        fmt::write(&mut name, format_args!("{}.TXT", self.revision)).map_err(|_| StorageError::Name)?;
        Ok(name)
    }
}

impl fmt::Display for LogFileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{}.txt",
            self.date.year, self.date.month, self.date.day, self.revision
        )
    }
}

/// Append-only file storage
pub trait LogVolume {
    /// Make sure the medium is present and readable.
    fn check(&mut self) -> Result<(), StorageError>;

    /// Size of `name` in bytes, 0 when it does not exist yet.
    fn size_of(&mut self, name: &LogFileName) -> Result<u32, StorageError>;

    /// Append `line` followed by [`crate::constants::LINE_ENDING`], creating
    /// the file if needed.
    fn append_line(&mut self, name: &LogFileName, line: &str) -> Result<(), StorageError>;
}
