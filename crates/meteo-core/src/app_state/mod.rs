//! Application-wide state and fault types for meteo
//!
//! [`Station`] owns every collaborator and is driven by the platform main
//! loop: call [`Station::start`] once, then [`Station::poll`] on every pass.
//! A returned [`Fault`] is fatal; hand it to [`Station::halt`].

mod board;
mod console;

pub use board::*;
pub use console::*;

use core::fmt::Debug;

use embassy_time::Instant;
use embedded_hal::delay::DelayNs;
use embedded_storage::Storage;
use log::{error, info, warn};
use thiserror_no_std::Error;

use crate::buttons::ButtonSignals;
use crate::command::{self, CommandError};
use crate::config::{ConfigError, ConfigStore, Configuration};
use crate::constants::GPS_BOOT_TIMEOUT;
use crate::indicator::{AlarmPattern, Rgb, run_alarm};
use crate::mode::{ModeMachine, OperatingMode, TransitionPoll};
use crate::record::{LogRecord, RecordError};
use crate::sampling::{Cadence, SamplingPlan};
use crate::sensors::{
    ClimateSensor, ClockError, GpsReceiver, LightSensor, PositionError, RealTimeClock,
    SensorError, read_fix,
};
use crate::storage::{RotatingLog, StorageError};

/// Fatal error. The station stops sampling and blinks the matching alarm.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    #[error("clock fault: {0}")]
    Clock(ClockError),
    #[error("position fault: {0}")]
    Position(PositionError),
    #[error("sensor fault: {0}")]
    Sensor(SensorError),
    #[error("record fault: {0}")]
    Record(RecordError),
    #[error("configuration fault: {0}")]
    Config(ConfigError),
    #[error("storage fault: {0}")]
    Storage(StorageError),
}

impl From<ClockError> for Fault {
    fn from(e: ClockError) -> Self {
        Self::Clock(e)
    }
}

impl From<PositionError> for Fault {
    fn from(e: PositionError) -> Self {
        Self::Position(e)
    }
}

impl From<SensorError> for Fault {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

impl From<RecordError> for Fault {
    fn from(e: RecordError) -> Self {
        Self::Record(e)
    }
}

impl From<ConfigError> for Fault {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<StorageError> for Fault {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

/// Fault taxonomy shown to the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    Clock,
    Position,
    Sensor,
    Data,
    StorageFull,
    StorageRead,
}

impl FaultKind {
    pub const fn alarm(self) -> AlarmPattern {
        match self {
            Self::Clock => AlarmPattern::new(Rgb::RED, Rgb::BLUE, 1),
            Self::Position => AlarmPattern::new(Rgb::RED, Rgb::YELLOW, 1),
            Self::Sensor => AlarmPattern::new(Rgb::RED, Rgb::GREEN, 1),
            Self::Data => AlarmPattern::new(Rgb::RED, Rgb::GREEN, 2),
            Self::StorageFull => AlarmPattern::new(Rgb::RED, Rgb::WHITE, 1),
            Self::StorageRead => AlarmPattern::new(Rgb::RED, Rgb::WHITE, 2),
        }
    }
}

impl Fault {
    pub const fn kind(&self) -> FaultKind {
        match self {
            Self::Clock(_) => FaultKind::Clock,
            Self::Position(_) => FaultKind::Position,
            Self::Sensor(_) => FaultKind::Sensor,
            Self::Record(_) | Self::Config(_) => FaultKind::Data,
            Self::Storage(e) if e.is_full() => FaultKind::StorageFull,
            Self::Storage(_) => FaultKind::StorageRead,
        }
    }
}

/// The data logger: mode state machine, configuration and collaborators
pub struct Station<'s, B, S>
where
    B: Board,
    S: Storage,
    S::Error: Debug,
{
    board: B,
    modes: ModeMachine<'s>,
    config: Configuration,
    store: ConfigStore<S>,
    log: RotatingLog,
    console: Console,
    /// Economic mode reads the GPS every other sample
    gps_turn: bool,
}

impl<'s, B, S> Station<'s, B, S>
where
    B: Board,
    S: Storage,
    S::Error: Debug,
{
    pub fn new(board: B, storage: S, signals: &'s ButtonSignals) -> Self {
        Self {
            board,
            modes: ModeMachine::new(signals),
            config: Configuration::default(),
            store: ConfigStore::new(storage),
            log: RotatingLog::new(),
            console: Console::new(),
            gps_turn: true,
        }
    }

    /// Load the persisted configuration, check the log volume and enter
    /// `boot_mode`.
    pub fn start(&mut self, boot_mode: OperatingMode, now: Instant) -> Result<(), Fault> {
        self.config = self.store.load_or_init()?;
        self.board.volume().check()?;
        info!("Log volume ready");
        // Entering a concrete mode cannot fail
        let _ = self.modes.enter(boot_mode, now, self.board.indicator());
        Ok(())
    }

    /// Wait until the GPS receiver shows signs of life, at most
    /// [`GPS_BOOT_TIMEOUT`].
    pub fn await_gps_link(&mut self, mut now: impl FnMut() -> Instant) -> Result<(), Fault> {
        let deadline = now() + GPS_BOOT_TIMEOUT;
        while !self.board.gps().is_ready() {
            if now() >= deadline {
                return Err(PositionError::NoLink.into());
            }
        }
        info!("GPS link up");
        Ok(())
    }

    pub fn mode(&self) -> OperatingMode {
        self.modes.current()
    }

    pub fn modes(&self) -> &ModeMachine<'s> {
        &self.modes
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn board(&self) -> &B {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut B {
        &mut self.board
    }

    pub fn log(&self) -> &RotatingLog {
        &self.log
    }

    pub fn store(&self) -> &ConfigStore<S> {
        &self.store
    }

    /// One pass of the main loop.
    ///
    /// A due transition is committed first. Per-mode work only runs when no
    /// transition is pending, so a record is never split across two modes.
    pub fn poll(&mut self, now: Instant) -> Result<(), Fault> {
        match self.modes.poll_transition(now, self.board.indicator()) {
            TransitionPoll::Idle => {}
            TransitionPoll::Waiting | TransitionPoll::Committed(_) | TransitionPoll::Rejected => {
                return Ok(());
            }
        }

        let mode = self.modes.current();
        match Cadence::for_mode(mode, &self.config) {
            Cadence::Interval(interval) => {
                if self.modes.sample_due(now, interval) {
                    let plan = SamplingPlan::for_mode(mode, self.gps_turn);
                    if mode == OperatingMode::Economic {
                        self.gps_turn = !self.gps_turn;
                    }
                    self.sample(plan)?;
                }
            }
            Cadence::EveryPass => self.sample(SamplingPlan::for_mode(mode, true))?,
            Cadence::Never => self.poll_config(now),
        }
        Ok(())
    }

    /// Take one record, echo it to the console and store it if `plan` says so.
    ///
    /// Missing sensor readings only drop their field. Clock and storage
    /// errors are fatal.
    pub fn sample(&mut self, plan: SamplingPlan) -> Result<LogRecord, Fault> {
        let timestamp = self.board.clock().now()?;
        let mut record = LogRecord::new();
        record.push_timestamp(&timestamp)?;

        if plan.read_gps {
            match read_fix(self.board.gps(), self.config.sensor_timeout()) {
                Ok(fix) => record.push_position(Some(fix.as_str()))?,
                Err(e) => {
                    warn!("GPS read failed: {}", e);
                    record.push_position(None)?;
                }
            }
        }

        if self.config.luminosity_enabled {
            match self.board.light().read_level() {
                Ok(raw) => record.push_light(raw, &self.config)?,
                Err(e) => warn!("Light sensor read failed: {}", e),
            }
        }

        if self.config.climate_enabled() {
            match self.board.climate().measure() {
                Ok(reading) => record.push_climate(&reading, &self.config)?,
                Err(e) => warn!("Climate sensor read failed: {}", e),
            }
        }

        if plan.store {
            self.log.append(
                self.board.volume(),
                timestamp.date,
                record.as_str(),
                self.config.file_max_size(),
            )?;
        }

        self.console.write_line(self.board.serial(), record.as_str());
        Ok(record)
    }

    fn poll_config(&mut self, now: Instant) {
        if self.modes.config_expired(now) {
            info!("Config session timed out");
            let _ = self
                .modes
                .enter(OperatingMode::Standard, now, self.board.indicator());
            return;
        }

        let Some(line) = self.console.poll_line(self.board.serial()) else {
            return;
        };

        let result = match line {
            InputLine::Text(text) => command::parse(text.as_str()).and_then(|cmd| {
                command::execute(cmd, &mut self.config, &mut self.store, self.board.clock())
            }),
            InputLine::Garbled => Err(CommandError::Malformed { command: "" }),
        };

        match result {
            Ok(reply) => self
                .console
                .reply(self.board.serial(), format_args!("{}", reply)),
            Err(e) => {
                warn!("Command rejected: {:?}", e);
                self.console
                    .reply(self.board.serial(), format_args!("{}", e));
            }
        }
        self.modes.rearm_config_deadline(now);
    }

    /// Stop for good and blink the alarm matching `fault`.
    pub fn halt<D: DelayNs>(&mut self, fault: Fault, delay: &mut D) -> ! {
        error!("Fatal fault: {}", fault);
        self.modes.signals().disable();
        run_alarm(self.board.indicator(), delay, fault.kind().alarm())
    }
}
