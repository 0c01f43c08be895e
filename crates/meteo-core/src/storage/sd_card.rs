use core::fmt::Debug;

use embedded_sdmmc::{BlockDevice, Error, Mode, TimeSource, VolumeIdx, VolumeManager};
use log::warn;

use crate::constants::LINE_ENDING;

use super::{LogFileName, LogVolume, StorageError};

/// [`LogVolume`] on the first FAT volume of a block device.
///
/// FAT short names only, so each date gets a `YYYYMMDD` directory holding
/// one `<revision>.TXT` file per revision.
///
/// All operations are blocking. Every call opens the volume, directory and
/// file it needs and closes them again before returning.
pub struct SdCardVolume<D, T>
where
    D: BlockDevice,
    T: TimeSource,
{
    volume_mgr: VolumeManager<D, T, 4, 4, 1>,
}

fn io_error<E: Debug>(operation: &'static str) -> impl Fn(Error<E>) -> StorageError {
    move |e| {
        warn!("SD card {} failed: {:?}", operation, e);
        match e {
            Error::DiskFull | Error::NotEnoughSpace => StorageError::VolumeFull,
            Error::FilenameError(_) => StorageError::Name,
            _ => StorageError::Io { operation },
        }
    }
}

impl<D, T> SdCardVolume<D, T>
where
    D: BlockDevice,
    T: TimeSource,
{
    pub fn new(block_device: D, ts: T) -> Self {
        let volume_mgr = VolumeManager::new(block_device, ts);

        Self { volume_mgr }
    }
}

impl<D, T> LogVolume for SdCardVolume<D, T>
where
    D: BlockDevice,
    T: TimeSource,
{
    fn check(&mut self) -> Result<(), StorageError> {
        let volume0 = self
            .volume_mgr
            .open_volume(VolumeIdx(0))
            .map_err(io_error("open volume"))?;
        let root_dir = volume0.open_root_dir().map_err(io_error("open root"))?;

        root_dir.close().map_err(io_error("close root"))?;
        volume0.close().map_err(io_error("close volume"))?;

        Ok(())
    }

    fn size_of(&mut self, name: &LogFileName) -> Result<u32, StorageError> {
        let dir_name = name.short_dir()?;
        let file_name = name.short_file()?;

        let volume0 = self
            .volume_mgr
            .open_volume(VolumeIdx(0))
            .map_err(io_error("open volume"))?;
        let root_dir = volume0.open_root_dir().map_err(io_error("open root"))?;

        // Handles dropped on early return are closed by their destructors.
        let date_dir = match root_dir.open_dir(dir_name.as_str()) {
            Ok(dir) => dir,
            Err(Error::NotFound) => return Ok(0),
            Err(e) => return Err(io_error("open directory")(e)),
        };
        let file = match date_dir.open_file_in_dir(file_name.as_str(), Mode::ReadOnly) {
            Ok(file) => file,
            Err(Error::NotFound) => return Ok(0),
            Err(e) => return Err(io_error("open file")(e)),
        };
        let size = file.length();

        file.close().map_err(io_error("close file"))?;
        date_dir.close().map_err(io_error("close directory"))?;
        root_dir.close().map_err(io_error("close root"))?;
        volume0.close().map_err(io_error("close volume"))?;

        Ok(size)
    }

    fn append_line(&mut self, name: &LogFileName, line: &str) -> Result<(), StorageError> {
        let dir_name = name.short_dir()?;
        let file_name = name.short_file()?;

        let volume0 = self
            .volume_mgr
            .open_volume(VolumeIdx(0))
            .map_err(io_error("open volume"))?;
        let root_dir = volume0.open_root_dir().map_err(io_error("open root"))?;

        match root_dir.make_dir_in_dir(dir_name.as_str()) {
            Ok(()) | Err(Error::DirAlreadyExists) => {}
            Err(e) => return Err(io_error("create directory")(e)),
        }
        let date_dir = root_dir
            .open_dir(dir_name.as_str())
            .map_err(io_error("open directory"))?;

        let file = date_dir
            .open_file_in_dir(file_name.as_str(), Mode::ReadWriteCreateOrAppend)
            .map_err(io_error("open file"))?;
        file.write(line.as_bytes()).map_err(io_error("write"))?;
        file.write(LINE_ENDING.as_bytes()).map_err(io_error("write"))?;

        file.close().map_err(io_error("close file"))?;
        date_dir.close().map_err(io_error("close directory"))?;
        root_dir.close().map_err(io_error("close root"))?;
        volume0.close().map_err(io_error("close volume"))?;

        Ok(())
    }
}
