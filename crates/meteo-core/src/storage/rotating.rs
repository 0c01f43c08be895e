use log::info;

use crate::constants::LINE_ENDING;
use crate::sensors::CalendarDate;

use super::{LogFileName, LogVolume, StorageError};

/// Chooses the file each record goes to.
///
/// Files are named after the record date. Within a date, the revision only
/// ever grows: a record that would push the current revision past the size
/// limit goes to the next one. Full revisions left over from before a reboot
/// are skipped, never overwritten.
#[derive(Debug, Default)]
pub struct RotatingLog {
    current: Option<LogFileName>,
}

impl RotatingLog {
    pub const fn new() -> Self {
        Self { current: None }
    }

    /// File the last record went to
    pub fn current(&self) -> Option<LogFileName> {
        self.current
    }

    /// Append `line` to the first revision of `date` that can hold it.
    ///
    /// A line too long for any file goes alone into an empty revision.
    pub fn append<V: LogVolume>(
        &mut self,
        volume: &mut V,
        date: CalendarDate,
        line: &str,
        max_size: u32,
    ) -> Result<LogFileName, StorageError> {
        let mut name = match self.current {
            Some(current) if current.date == date => current,
            _ => LogFileName::new(date, 1),
        };
        let needed = (line.len() + LINE_ENDING.len()) as u32;

        loop {
            let size = volume.size_of(&name)?;
            if size == 0 || size.saturating_add(needed) <= max_size {
                volume.append_line(&name, line)?;
                if self.current != Some(name) {
                    info!("Logging to {} ({} bytes)", name, size);
                }
                self.current = Some(name);
                return Ok(name);
            }
            name.revision = name
                .revision
                .checked_add(1)
                .ok_or(StorageError::RevisionsExhausted)?;
        }
    }
}
