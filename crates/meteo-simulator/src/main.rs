//! Desktop simulator for the meteo environmental data logger.
//!
//! Runs the meteo-core station against synthetic sensors, a directory-backed
//! log volume and a file-backed configuration EEPROM. The console is stdin
//! and stdout; records are printed as they are taken.
//!
//! # Usage
//!
//! ```text
//! meteo-simulator [--time-scale N] [--config-mode] [--gps-down] [DATA_DIR]
//! ```
//!
//! # Console input
//!
//! | Input             | Action                                 |
//! |-------------------|----------------------------------------|
//! | `:press green`    | Press the green button                 |
//! | `:release green`  | Release the green button               |
//! | `:press red`      | Press the red button                   |
//! | `:release red`    | Release the red button                 |
//! | `:quit`           | Exit                                   |
//! | anything else     | Sent to the station's serial console   |

use std::collections::VecDeque;
use std::convert::Infallible;
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, ErrorKind, Write as _};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeDelta, Timelike, Utc};

use embassy_time::Instant;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType as PinErrorType, InputPin};
use embedded_storage::{ReadStorage, Storage};
use log::{error, info, warn};

use meteo_core::app_state::{Board, Station};
use meteo_core::buttons::{Button, ButtonSignals, detect_boot_mode};
use meteo_core::indicator::{Indicator, Rgb};
use meteo_core::sensors::{
    CalendarDate, ClimateReading, ClimateSensor, ClockError, DateTime, GpsLine, GpsReceiver,
    LightSensor, PositionError, RealTimeClock, SensorError, TimeOfDay,
};
use meteo_core::storage::{LogFileName, LogVolume, StorageError};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Real time between two station polls.
const POLL_PERIOD: Duration = Duration::from_millis(50);

/// Size of the emulated AT24C32.
const EEPROM_SIZE: usize = 4096;

const DEFAULT_DATA_DIR: &str = "meteo-data";

static SIGNALS: ButtonSignals = ButtonSignals::new();
static QUIT: AtomicBool = AtomicBool::new(false);

// ---------------------------------------------------------------------------
// Simulated time
// ---------------------------------------------------------------------------

/// Monotonic station time, optionally running faster than wall time.
#[derive(Debug, Clone, Copy)]
struct SimTime {
    start: std::time::Instant,
    scale: u64,
}

impl SimTime {
    fn new(scale: u64) -> Self {
        Self {
            start: std::time::Instant::now(),
            scale: scale.max(1),
        }
    }

    fn now(&self) -> Instant {
        let elapsed = self.start.elapsed().as_micros() as u64;
        Instant::from_micros(elapsed.saturating_mul(self.scale))
    }
}

/// Blocking delay that honours the time scale.
struct SimDelay {
    scale: u64,
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(u64::from(ns) / self.scale));
    }
}

// ---------------------------------------------------------------------------
// Simulated peripherals
// ---------------------------------------------------------------------------

/// Real-time clock that keeps ticking from whatever it was last set to.
struct SimClock {
    time: SimTime,
    /// Calendar time at `set_at`
    base: NaiveDateTime,
    set_at: Instant,
    weekday: Option<u8>,
}

impl SimClock {
    fn from_system(time: SimTime) -> Self {
        Self {
            time,
            base: Utc::now().naive_utc(),
            set_at: time.now(),
            weekday: None,
        }
    }

    fn current(&self) -> Result<NaiveDateTime, ClockError> {
        let elapsed = self.time.now().duration_since(self.set_at).as_secs();
        i64::try_from(elapsed)
            .ok()
            .and_then(|secs| self.base.checked_add_signed(TimeDelta::seconds(secs)))
            .ok_or(ClockError::InvalidTime)
    }

    fn rebase(&mut self, at: NaiveDateTime) {
        self.base = at;
        self.set_at = self.time.now();
    }
}

impl RealTimeClock for SimClock {
    fn now(&mut self) -> Result<DateTime, ClockError> {
        let now = self.current()?;
        let year = u16::try_from(now.year()).map_err(|_| ClockError::InvalidTime)?;
        Ok(DateTime::new(
            CalendarDate {
                month: now.month() as u8,
                day: now.day() as u8,
                year,
            },
            TimeOfDay {
                hour: now.hour() as u8,
                minute: now.minute() as u8,
                second: now.second() as u8,
            },
            self.weekday
                .unwrap_or_else(|| now.weekday().number_from_monday() as u8),
        ))
    }

    fn set_time(&mut self, time: TimeOfDay) -> Result<(), ClockError> {
        let at = self
            .current()?
            .date()
            .and_hms_opt(
                u32::from(time.hour),
                u32::from(time.minute),
                u32::from(time.second),
            )
            .ok_or(ClockError::InvalidTime)?;
        self.rebase(at);
        Ok(())
    }

    fn set_date(&mut self, date: CalendarDate) -> Result<(), ClockError> {
        let of_day = self.current()?.time();
        let day = NaiveDate::from_ymd_opt(
            i32::from(date.year),
            u32::from(date.month),
            u32::from(date.day),
        )
        .ok_or(ClockError::InvalidTime)?;
        self.rebase(day.and_time(of_day));
        Ok(())
    }

    fn set_weekday(&mut self, weekday: u8) -> Result<(), ClockError> {
        self.weekday = Some(weekday);
        Ok(())
    }
}

/// Climate readings drifting along slow sine waves.
struct SimClimate {
    time: SimTime,
}

impl ClimateSensor for SimClimate {
    fn measure(&mut self) -> Result<ClimateReading, SensorError> {
        let t = self.time.now().as_secs() as f64;
        Ok(ClimateReading {
            temperature: (18.0 + 6.0 * (t / 3600.0).sin() + 0.5 * (t / 97.0).cos()) as f32,
            humidity: (55.0 + 15.0 * (t / 5400.0).sin() + 2.0 * (t / 61.0).cos()) as f32,
            pressure: (1013.0 + 8.0 * (t / 7200.0).sin()) as f32,
        })
    }
}

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Light level following a day/night cycle.
struct SimLight {
    time: SimTime,
}

impl LightSensor for SimLight {
    fn read_level(&mut self) -> Result<u16, SensorError> {
        let t = self.time.now().as_secs() as f64;
        let level = 512.0 + 511.0 * (t * core::f64::consts::TAU / SECONDS_PER_DAY).sin();
        Ok(level.clamp(0.0, 1023.0) as u16)
    }
}

/// Replays a fixed burst of NMEA sentences.
struct SimGps {
    linked: bool,
    next: usize,
}

const NMEA_BURST: [&str; 4] = [
    "$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A",
    "$GPGSA,A,3,04,05,,09,12,,,24,,,,,2.5,1.3,2.1*39",
    "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47",
    "$GPGSV,2,1,08,01,40,083,46,02,17,308,41,12,07,344,39,14,22,228,45*75",
];

impl GpsReceiver for SimGps {
    fn is_ready(&mut self) -> bool {
        self.linked
    }

    fn read_line(
        &mut self,
        line: &mut GpsLine,
        _timeout: embassy_time::Duration,
    ) -> Result<(), PositionError> {
        if !self.linked {
            return Err(PositionError::Timeout);
        }
        let sentence = NMEA_BURST[self.next % NMEA_BURST.len()];
        self.next += 1;
        line
            .push_str(sentence)
            .map_err(|_| PositionError::LineTooLong)
    }
}

/// Log volume backed by a host directory, using long file names.
struct DirVolume {
    root: PathBuf,
}

impl DirVolume {
    fn path(&self, name: &LogFileName) -> Result<PathBuf, StorageError> {
        Ok(self.root.join(name.long_name()?.as_str()))
    }
}

fn io_error(operation: &'static str) -> impl Fn(io::Error) -> StorageError {
    move |e| {
        warn!("Log volume {} failed: {}", operation, e);
        match e.kind() {
            ErrorKind::StorageFull => StorageError::VolumeFull,
            _ => StorageError::Io { operation },
        }
    }
}

impl LogVolume for DirVolume {
    fn check(&mut self) -> Result<(), StorageError> {
        let meta = fs::metadata(&self.root).map_err(io_error("open volume"))?;
        if !meta.is_dir() {
            warn!("{} is not a directory", self.root.display());
            return Err(StorageError::Io {
                operation: "open volume",
            });
        }
        Ok(())
    }

    fn size_of(&mut self, name: &LogFileName) -> Result<u32, StorageError> {
        match fs::metadata(self.path(name)?) {
            Ok(meta) => Ok(meta.len().min(u64::from(u32::MAX)) as u32),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(0),
            Err(e) => Err(io_error("stat")(e)),
        }
    }

    fn append_line(&mut self, name: &LogFileName, line: &str) -> Result<(), StorageError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(name)?)
            .map_err(io_error("open"))?;
        write!(file, "{}\r\n", line).map_err(io_error("write"))
    }
}

/// Configuration EEPROM persisted as a plain file.
struct FileEeprom {
    path: PathBuf,
    bytes: Vec<u8>,
}

impl FileEeprom {
    /// Open the image at `path`, starting from an erased part when missing.
    fn open(path: &Path) -> io::Result<Self> {
        let mut bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e),
        };
        bytes.resize(EEPROM_SIZE, 0xFF);
        Ok(Self {
            path: path.to_path_buf(),
            bytes,
        })
    }

    fn range(&self, offset: u32, len: usize) -> io::Result<core::ops::Range<usize>> {
        let start = offset as usize;
        match start.checked_add(len) {
            Some(end) if end <= self.bytes.len() => Ok(start..end),
            _ => Err(io::Error::new(
                ErrorKind::InvalidInput,
                "access past the end of the EEPROM",
            )),
        }
    }
}

impl ReadStorage for FileEeprom {
    type Error = io::Error;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> io::Result<()> {
        let range = self.range(offset, bytes.len())?;
        bytes.copy_from_slice(&self.bytes[range]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.bytes.len()
    }
}

impl Storage for FileEeprom {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> io::Result<()> {
        let range = self.range(offset, bytes.len())?;
        self.bytes[range].copy_from_slice(bytes);
        fs::write(&self.path, &self.bytes)
    }
}

/// Status LED shown as log lines.
struct LogLed {
    color: Rgb,
}

impl Indicator for LogLed {
    fn set_color(&mut self, color: Rgb) {
        if color != self.color {
            info!("LED -> ({}, {}, {})", color.r, color.g, color.b);
            self.color = color;
        }
    }
}

/// Console fed by the stdin thread, written to stdout.
struct StdSerial {
    input: Receiver<Vec<u8>>,
    pending: VecDeque<u8>,
}

impl StdSerial {
    fn fill(&mut self) {
        while let Ok(chunk) = self.input.try_recv() {
            self.pending.extend(chunk);
        }
    }
}

impl embedded_io::ErrorType for StdSerial {
    type Error = Infallible;
}

impl embedded_io::Read for StdSerial {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Infallible> {
        self.fill();
        let mut n = 0;
        while n < buf.len() {
            let Some(byte) = self.pending.pop_front() else {
                break;
            };
            buf[n] = byte;
            n += 1;
        }
        Ok(n)
    }
}

impl embedded_io::ReadReady for StdSerial {
    fn read_ready(&mut self) -> Result<bool, Infallible> {
        self.fill();
        Ok(!self.pending.is_empty())
    }
}

impl embedded_io::Write for StdSerial {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Infallible> {
        // stdout failures are not the station's problem
        let _ = io::stdout().write_all(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Infallible> {
        let _ = io::stdout().flush();
        Ok(())
    }
}

/// Red button level at boot, held for the whole detection window.
struct BootPin {
    held: bool,
}

impl PinErrorType for BootPin {
    type Error = Infallible;
}

impl InputPin for BootPin {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(!self.held)
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(self.held)
    }
}

struct SimBoard {
    climate: SimClimate,
    light: SimLight,
    gps: SimGps,
    clock: SimClock,
    volume: DirVolume,
    led: LogLed,
    serial: StdSerial,
}

impl Board for SimBoard {
    type Climate = SimClimate;
    type Light = SimLight;
    type Gps = SimGps;
    type Clock = SimClock;
    type Volume = DirVolume;
    type Indicator = LogLed;
    type Serial = StdSerial;

    fn climate(&mut self) -> &mut SimClimate {
        &mut self.climate
    }

    fn light(&mut self) -> &mut SimLight {
        &mut self.light
    }

    fn gps(&mut self) -> &mut SimGps {
        &mut self.gps
    }

    fn clock(&mut self) -> &mut SimClock {
        &mut self.clock
    }

    fn volume(&mut self) -> &mut DirVolume {
        &mut self.volume
    }

    fn indicator(&mut self) -> &mut LogLed {
        &mut self.led
    }

    fn serial(&mut self) -> &mut StdSerial {
        &mut self.serial
    }
}

// ---------------------------------------------------------------------------
// Console input
// ---------------------------------------------------------------------------

/// Map a `:press`/`:release` argument to a button.
fn parse_button(name: &str) -> Option<Button> {
    match name {
        "green" | "g" => Some(Button::Green),
        "red" | "r" => Some(Button::Red),
        _ => None,
    }
}

/// Read stdin lines: simulator controls are handled here, the rest is
/// forwarded to the station's serial console.
fn spawn_stdin_reader(time: SimTime) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            let mut words = line.split_whitespace();
            match (words.next(), words.next()) {
                (Some(":quit"), _) => break,
                (Some(verb @ (":press" | ":release")), Some(name)) => match parse_button(name) {
                    Some(button) => {
                        let outcome = SIGNALS.on_edge(button, verb == ":press", time.now());
                        info!("{} {} -> {:?}", verb, button.label(), outcome);
                    }
                    None => warn!("Unknown button: {}", name),
                },
                _ => {
                    let mut bytes = line.into_bytes();
                    bytes.push(b'\n');
                    if tx.send(bytes).is_err() {
                        break;
                    }
                }
            }
        }
        QUIT.store(true, Ordering::Relaxed);
    });
    rx
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

struct Args {
    time_scale: u64,
    config_mode: bool,
    gps_down: bool,
    data_dir: PathBuf,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args {
        time_scale: 1,
        config_mode: false,
        gps_down: false,
        data_dir: PathBuf::from(DEFAULT_DATA_DIR),
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--time-scale" => {
                let value = iter.next().ok_or("--time-scale needs a value")?;
                args.time_scale = value
                    .parse()
                    .map_err(|_| format!("invalid time scale: {}", value))?;
            }
            "--config-mode" => args.config_mode = true,
            "--gps-down" => args.gps_down = true,
            other if other.starts_with("--") => return Err(format!("unknown option: {}", other)),
            other => args.data_dir = PathBuf::from(other),
        }
    }
    Ok(args)
}

fn main() {
    env_logger::init();

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            error!("{}", e);
            std::process::exit(2);
        }
    };

    info!("Starting meteo simulator");
    info!(
        "Data directory: {} (time scale {}x)",
        args.data_dir.display(),
        args.time_scale
    );

    if let Err(e) = fs::create_dir_all(&args.data_dir) {
        error!("Cannot create {}: {}", args.data_dir.display(), e);
        std::process::exit(1);
    }
    let eeprom = match FileEeprom::open(&args.data_dir.join("eeprom.bin")) {
        Ok(eeprom) => eeprom,
        Err(e) => {
            error!("Cannot open EEPROM image: {}", e);
            std::process::exit(1);
        }
    };

    let time = SimTime::new(args.time_scale);
    let mut delay = SimDelay {
        scale: args.time_scale.max(1),
    };

    let board = SimBoard {
        climate: SimClimate { time },
        light: SimLight { time },
        gps: SimGps {
            linked: !args.gps_down,
            next: 0,
        },
        clock: SimClock::from_system(time),
        volume: DirVolume {
            root: args.data_dir.clone(),
        },
        led: LogLed { color: Rgb::OFF },
        serial: StdSerial {
            input: spawn_stdin_reader(time),
            pending: VecDeque::new(),
        },
    };

    let mut boot_pin = BootPin {
        held: args.config_mode,
    };
    let boot_mode = detect_boot_mode(&mut boot_pin, || time.now());
    info!("Boot mode: {}", boot_mode.label());

    let mut station = Station::new(board, eeprom, &SIGNALS);
    if let Err(fault) = station
        .start(boot_mode, time.now())
        .and_then(|()| station.await_gps_link(|| time.now()))
    {
        station.halt(fault, &mut delay);
    }

    // -----------------------------------------------------------------------
    // Main loop
    // -----------------------------------------------------------------------
    while !QUIT.load(Ordering::Relaxed) {
        if let Err(fault) = station.poll(time.now()) {
            station.halt(fault, &mut delay);
        }
        std::thread::sleep(POLL_PERIOD);
    }

    info!("Simulator exiting");
}
