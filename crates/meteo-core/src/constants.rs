//! Compile-time constants shared by the firmware and the simulator

use embassy_time::Duration;

/// How long a button must stay held before its mode change is committed.
pub const LONG_PRESS: Duration = Duration::from_secs(5);

/// Idle time after which config mode falls back to standard mode.
pub const CONFIG_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Upper bound on waiting for the GPS link while booting.
pub const GPS_BOOT_TIMEOUT: Duration = Duration::from_secs(10);

/// Reported by the `VERSION` command.
pub const DEVICE_ID: u16 = 69;
pub const FIRMWARE_VERSION: u16 = 420;

/// Placed between the fields of a log record.
pub const FIELD_SEPARATOR: &str = " ; ";

/// Terminates every record written to a log file.
pub const LINE_ENDING: &str = "\r\n";

/// Text substituted for the position field when the receiver fails.
pub const GPS_ERROR_FIELD: &str = "GPS error";

/// Only fix lines carrying this sentence id are logged.
pub const GPS_FIX_PREFIX: &str = "$GPGGA";

/// Lines inspected per read before giving up on finding a fix sentence.
pub const GPS_MAX_LINES: usize = 20;

// Fixed buffer capacities
pub const RECORD_CAPACITY: usize = 192;
pub const GPS_LINE_CAPACITY: usize = 96;
pub const COMMAND_LINE_CAPACITY: usize = 48;
pub const REPLY_CAPACITY: usize = 64;
pub const FILE_NAME_CAPACITY: usize = 24;

// Non-volatile memory layout
pub const EEPROM_FIRST_BOOT_FLAG: u32 = 1;
pub const EEPROM_CONFIGURATION: u32 = 2;
pub const CONFIG_RECORD_SIZE: usize = 32;

/// Written to the first-boot flag once defaults have been persisted.
/// Erased EEPROM reads back 0xFF, so a plain boolean is not used.
pub const FIRST_BOOT_DONE: u8 = 0x5A;
