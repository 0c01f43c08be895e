//! Serial configuration command interpreter
//!
//! Config mode reads one `COMMAND=VALUE` line at a time from the serial link.
//! The command name is matched case-insensitively against [`COMMANDS`], the
//! value is parsed and validated, and accepted changes are committed with
//! [`execute`]:
//!
//! - parameter commands and `RESET` change the [`Configuration`] and rewrite
//!   the persisted record before the in-memory copy is replaced, so a failed
//!   write leaves both untouched
//! - `CLOCK`, `DATE` and `DAY` go straight to the real-time clock
//! - `VERSION` only reports the firmware version and device id

use core::fmt;

use embedded_storage::Storage;
use log::{info, warn};
use thiserror_no_std::Error;

use crate::config::{ConfigError, ConfigStore, Configuration, Param, within};
use crate::constants::{DEVICE_ID, FIRMWARE_VERSION};
use crate::sensors::{CalendarDate, RealTimeClock, TimeOfDay};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    Param(Param),
    Reset,
    Clock,
    Date,
    Day,
    Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub kind: CommandKind,
}

const fn param(param: Param) -> CommandSpec {
    CommandSpec {
        name: param.name(),
        kind: CommandKind::Param(param),
    }
}

/// Every supported command, in lookup order
pub const COMMANDS: [CommandSpec; 20] = [
    param(Param::Lumin),
    param(Param::LuminLow),
    param(Param::LuminHigh),
    param(Param::TempAir),
    param(Param::MinTempAir),
    param(Param::MaxTempAir),
    param(Param::Hygr),
    param(Param::HygrMinT),
    param(Param::HygrMaxT),
    param(Param::Pressure),
    param(Param::PressureMin),
    param(Param::PressureMax),
    param(Param::LogInterval),
    param(Param::FileMaxSize),
    CommandSpec {
        name: "RESET",
        kind: CommandKind::Reset,
    },
    param(Param::Timeout),
    CommandSpec {
        name: "CLOCK",
        kind: CommandKind::Clock,
    },
    CommandSpec {
        name: "DATE",
        kind: CommandKind::Date,
    },
    CommandSpec {
        name: "DAY",
        kind: CommandKind::Day,
    },
    CommandSpec {
        name: "VERSION",
        kind: CommandKind::Version,
    },
];

/// A parsed command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Set { param: Param, value: i32 },
    Reset,
    SetClock(TimeOfDay),
    SetDate(CalendarDate),
    SetWeekday(u8),
    Version,
}

impl Command {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Set { param, .. } => param.name(),
            Self::Reset => "RESET",
            Self::SetClock(_) => "CLOCK",
            Self::SetDate(_) => "DATE",
            Self::SetWeekday(_) => "DAY",
            Self::Version => "VERSION",
        }
    }
}

/// Why a command line was refused. `Display` renders the reply sent back on
/// the serial link.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown cmd")]
    Unknown,
    #[error("Unsupported value - {command} : {value}")]
    Value { command: &'static str, value: i32 },
    #[error("err")]
    Malformed { command: &'static str },
    #[error("{command} failed")]
    Failed { command: &'static str },
}

/// Reply to an accepted command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Altered(&'static str),
    Version { version: u16, device_id: u16 },
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Altered(command) => write!(f, "{} altered", command),
            Self::Version { version, device_id } => write!(f, "{}, ID {}", version, device_id),
        }
    }
}

pub fn lookup(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS
        .iter()
        .find(|spec| spec.name.eq_ignore_ascii_case(name))
}

/// Parse one `COMMAND=VALUE` line.
///
/// Surrounding whitespace is ignored on both sides of `=`. `RESET` and
/// `VERSION` take no value; anything after `=` is discarded.
pub fn parse(line: &str) -> Result<Command, CommandError> {
    let (name, value) = match line.split_once('=') {
        Some((name, value)) => (name.trim(), value.trim()),
        None => (line.trim(), ""),
    };
    let spec = lookup(name).ok_or(CommandError::Unknown)?;
    let malformed = CommandError::Malformed { command: spec.name };

    match spec.kind {
        CommandKind::Param(param) => {
            let value = value.parse::<i32>().map_err(|_| malformed)?;
            Ok(Command::Set { param, value })
        }
        CommandKind::Reset => Ok(Command::Reset),
        CommandKind::Version => Ok(Command::Version),
        CommandKind::Day => {
            let day = value.parse::<i32>().map_err(|_| malformed)?;
            Ok(Command::SetWeekday(checked("DAY", day, 1, 7)? as u8))
        }
        CommandKind::Clock => {
            let [hour, minute, second] = triple(value).ok_or(malformed)?;
            Ok(Command::SetClock(TimeOfDay {
                hour: checked("hr", hour, 0, 23)? as u8,
                minute: checked("min", minute, 0, 59)? as u8,
                second: checked("sec", second, 0, 59)? as u8,
            }))
        }
        CommandKind::Date => {
            let [month, day, year] = triple(value).ok_or(malformed)?;
            Ok(Command::SetDate(CalendarDate {
                month: checked("mth", month, 1, 12)? as u8,
                day: checked("dy", day, 1, 31)? as u8,
                year: checked("yr", year, 2000, 2099)? as u16,
            }))
        }
    }
}

fn checked(label: &'static str, value: i32, low: i32, high: i32) -> Result<i32, CommandError> {
    if within(low, high, value) {
        Ok(value)
    } else {
        Err(CommandError::Value {
            command: label,
            value,
        })
    }
}

/// Split `a:b:c` into three integers.
fn triple(value: &str) -> Option<[i32; 3]> {
    let mut parts = value.split(':').map(|part| part.trim().parse::<i32>());
    let triple = [
        parts.next()?.ok()?,
        parts.next()?.ok()?,
        parts.next()?.ok()?,
    ];
    match parts.next() {
        Some(_) => None,
        None => Some(triple),
    }
}

/// Apply `command`.
///
/// Configuration changes are validated and persisted on a copy first; `config`
/// is only replaced once the record is written.
pub fn execute<S, C>(
    command: Command,
    config: &mut Configuration,
    store: &mut ConfigStore<S>,
    clock: &mut C,
) -> Result<Reply, CommandError>
where
    S: Storage,
    S::Error: fmt::Debug,
    C: RealTimeClock,
{
    let name = command.name();
    let failed = CommandError::Failed { command: name };

    match command {
        Command::Set { param, value } => {
            let mut updated = *config;
            updated.set(param, value).map_err(|e| match e {
                ConfigError::OutOfRange { param, value } => CommandError::Value {
                    command: param,
                    value,
                },
                _ => failed,
            })?;
            commit(updated, config, store).map_err(|_| failed)?;
        }
        Command::Reset => {
            commit(Configuration::default(), config, store).map_err(|_| failed)?;
        }
        Command::SetClock(time) => clock.set_time(time).map_err(|e| {
            warn!("Failed to set clock: {}", e);
            failed
        })?,
        Command::SetDate(date) => clock.set_date(date).map_err(|e| {
            warn!("Failed to set date: {}", e);
            failed
        })?,
        Command::SetWeekday(day) => clock.set_weekday(day).map_err(|e| {
            warn!("Failed to set weekday: {}", e);
            failed
        })?,
        Command::Version => {
            return Ok(Reply::Version {
                version: FIRMWARE_VERSION,
                device_id: DEVICE_ID,
            });
        }
    }

    info!("{} altered", name);
    Ok(Reply::Altered(name))
}

fn commit<S>(
    updated: Configuration,
    config: &mut Configuration,
    store: &mut ConfigStore<S>,
) -> Result<(), ConfigError>
where
    S: Storage,
    S::Error: fmt::Debug,
{
    store.persist(&updated)?;
    *config = updated;
    Ok(())
}
