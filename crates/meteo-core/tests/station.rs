//! Drives a whole station through its main loop against in-memory hardware.

use std::collections::{HashMap, VecDeque};
use std::convert::Infallible;

use embassy_time::{Duration, Instant};
use embedded_io::{ErrorType, Read, ReadReady, Write};
use embedded_storage::{ReadStorage, Storage};

use meteo_core::app_state::{Board, Fault, FaultKind, Station};
use meteo_core::buttons::{Button, ButtonSignals};
use meteo_core::config::{ConfigStore, Configuration, Param};
use meteo_core::constants::{CONFIG_TIMEOUT, LINE_ENDING, LONG_PRESS};
use meteo_core::indicator::{Indicator, Rgb};
use meteo_core::mode::OperatingMode;
use meteo_core::sampling::SamplingPlan;
use meteo_core::sensors::{
    CalendarDate, ClimateReading, ClimateSensor, ClockError, DateTime, GpsLine, GpsReceiver,
    LightSensor, PositionError, RealTimeClock, SensorError, TimeOfDay,
};
use meteo_core::storage::{LogFileName, LogVolume, StorageError};

const FIX: &str = "$GPGGA,092750.000,5321.6802,N,00630.3372,W,1,8,1.03,61.7,M,55.2,M,,*76";

struct Climate(ClimateReading);

impl ClimateSensor for Climate {
    fn measure(&mut self) -> Result<ClimateReading, SensorError> {
        Ok(self.0)
    }
}

struct Light(u16);

impl LightSensor for Light {
    fn read_level(&mut self) -> Result<u16, SensorError> {
        Ok(self.0)
    }
}

#[derive(Default)]
struct Gps {
    ready: bool,
    reads: usize,
}

impl GpsReceiver for Gps {
    fn is_ready(&mut self) -> bool {
        self.ready
    }

    fn read_line(&mut self, line: &mut GpsLine, _timeout: Duration) -> Result<(), PositionError> {
        if !self.ready {
            return Err(PositionError::Timeout);
        }
        self.reads += 1;
        line.push_str(FIX).map_err(|_| PositionError::LineTooLong)
    }
}

struct Clock {
    now: DateTime,
    halted: bool,
}

impl RealTimeClock for Clock {
    fn now(&mut self) -> Result<DateTime, ClockError> {
        if self.halted {
            return Err(ClockError::Halted);
        }
        Ok(self.now)
    }

    fn set_time(&mut self, time: TimeOfDay) -> Result<(), ClockError> {
        self.now.time = time;
        Ok(())
    }

    fn set_date(&mut self, date: CalendarDate) -> Result<(), ClockError> {
        self.now.date = date;
        Ok(())
    }

    fn set_weekday(&mut self, weekday: u8) -> Result<(), ClockError> {
        self.now.weekday = weekday;
        Ok(())
    }
}

#[derive(Default)]
struct Volume {
    files: HashMap<String, String>,
    missing: bool,
}

impl LogVolume for Volume {
    fn check(&mut self) -> Result<(), StorageError> {
        if self.missing {
            return Err(StorageError::Io {
                operation: "open volume",
            });
        }
        Ok(())
    }

    fn size_of(&mut self, name: &LogFileName) -> Result<u32, StorageError> {
        Ok(self
            .files
            .get(&name.to_string())
            .map_or(0, |contents| contents.len() as u32))
    }

    fn append_line(&mut self, name: &LogFileName, line: &str) -> Result<(), StorageError> {
        let file = self.files.entry(name.to_string()).or_default();
        file.push_str(line);
        file.push_str(LINE_ENDING);
        Ok(())
    }
}

#[derive(Default)]
struct Led(Vec<Rgb>);

impl Indicator for Led {
    fn set_color(&mut self, color: Rgb) {
        self.0.push(color);
    }
}

#[derive(Default)]
struct Serial {
    input: VecDeque<u8>,
    output: Vec<u8>,
}

impl Serial {
    fn take_output(&mut self) -> String {
        String::from_utf8(std::mem::take(&mut self.output)).unwrap()
    }
}

impl ErrorType for Serial {
    type Error = Infallible;
}

impl Read for Serial {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Infallible> {
        let mut count = 0;
        while count < buf.len() {
            match self.input.pop_front() {
                Some(b) => {
                    buf[count] = b;
                    count += 1;
                }
                None => break,
            }
        }
        Ok(count)
    }
}

impl ReadReady for Serial {
    fn read_ready(&mut self) -> Result<bool, Infallible> {
        Ok(!self.input.is_empty())
    }
}

impl Write for Serial {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Infallible> {
        self.output.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}

struct TestBoard {
    climate: Climate,
    light: Light,
    gps: Gps,
    clock: Clock,
    volume: Volume,
    led: Led,
    serial: Serial,
}

impl TestBoard {
    fn new() -> Self {
        Self {
            climate: Climate(ClimateReading {
                temperature: 21.5,
                humidity: 40.0,
                pressure: 1013.0,
            }),
            light: Light(600),
            gps: Gps {
                ready: true,
                reads: 0,
            },
            clock: Clock {
                now: DateTime::new(
                    CalendarDate {
                        month: 6,
                        day: 1,
                        year: 2025,
                    },
                    TimeOfDay {
                        hour: 12,
                        minute: 0,
                        second: 0,
                    },
                    7,
                ),
                halted: false,
            },
            volume: Volume::default(),
            led: Led::default(),
            serial: Serial::default(),
        }
    }
}

impl Board for TestBoard {
    type Climate = Climate;
    type Light = Light;
    type Gps = Gps;
    type Clock = Clock;
    type Volume = Volume;
    type Indicator = Led;
    type Serial = Serial;

    fn climate(&mut self) -> &mut Climate {
        &mut self.climate
    }

    fn light(&mut self) -> &mut Light {
        &mut self.light
    }

    fn gps(&mut self) -> &mut Gps {
        &mut self.gps
    }

    fn clock(&mut self) -> &mut Clock {
        &mut self.clock
    }

    fn volume(&mut self) -> &mut Volume {
        &mut self.volume
    }

    fn indicator(&mut self) -> &mut Led {
        &mut self.led
    }

    fn serial(&mut self) -> &mut Serial {
        &mut self.serial
    }
}

#[derive(Clone)]
struct Eeprom([u8; 64]);

impl Eeprom {
    fn erased() -> Self {
        Self([0xFF; 64])
    }
}

impl ReadStorage for Eeprom {
    type Error = ();

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), ()> {
        let start = offset as usize;
        bytes.copy_from_slice(&self.0[start..start + bytes.len()]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.0.len()
    }
}

impl Storage for Eeprom {
    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), ()> {
        let start = offset as usize;
        self.0[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}

fn at(secs: u64) -> Instant {
    Instant::from_secs(secs)
}

fn started<'s>(
    signals: &'s ButtonSignals,
    eeprom: Eeprom,
    mode: OperatingMode,
) -> Station<'s, TestBoard, Eeprom> {
    let mut station = Station::new(TestBoard::new(), eeprom, signals);
    station.start(mode, at(0)).unwrap();
    station
}

/// Hold `button` past the long-press deadline and let the loop commit it.
fn long_press(
    station: &mut Station<'_, TestBoard, Eeprom>,
    signals: &ButtonSignals,
    button: Button,
    from: u64,
) {
    signals.on_edge(button, true, at(from));
    let due = at(from) + LONG_PRESS;
    station.poll(due).unwrap();
    signals.on_edge(button, false, due);
}

fn send(station: &mut Station<'_, TestBoard, Eeprom>, line: &str, now: Instant) -> String {
    station.board_mut().serial.input.extend(line.as_bytes());
    station.board_mut().serial.input.extend(b"\r\n");
    station.poll(now).unwrap();
    station.board_mut().serial.take_output()
}

fn stored_lines(station: &Station<'_, TestBoard, Eeprom>) -> usize {
    station
        .board()
        .volume
        .files
        .values()
        .map(|file| file.lines().count())
        .sum()
}

#[test]
fn boot_samples_immediately_and_stores() {
    let signals = ButtonSignals::new();
    let mut station = started(&signals, Eeprom::erased(), OperatingMode::Standard);
    assert_eq!(station.board().led.0.last(), Some(&Rgb::GREEN));

    station.poll(at(0)).unwrap();
    station.poll(at(1)).unwrap();

    let file = station.board().volume.files["2025-6-1-1.txt"].clone();
    assert_eq!(file.lines().count(), 1);
    assert_eq!(
        file.as_str(),
        format!("12:0:0-6/1/2025 ; {FIX} ; AVERAGE ; 21.50 ; 40.00 ; 1013.00\r\n")
    );
    let echoed = station.board_mut().serial.take_output();
    assert_eq!(echoed, file);
}

#[test]
fn standard_mode_samples_on_interval() {
    let signals = ButtonSignals::new();
    let mut station = started(&signals, Eeprom::erased(), OperatingMode::Standard);
    let interval = Configuration::default().log_interval().as_secs();

    station.poll(at(0)).unwrap();
    station.poll(at(interval - 1)).unwrap();
    assert_eq!(stored_lines(&station), 1);
    station.poll(at(interval)).unwrap();
    assert_eq!(stored_lines(&station), 2);
}

#[test]
fn short_press_keeps_mode() {
    let signals = ButtonSignals::new();
    let mut station = started(&signals, Eeprom::erased(), OperatingMode::Standard);

    signals.on_edge(Button::Green, true, at(10));
    station.poll(at(12)).unwrap();
    signals.on_edge(Button::Green, false, at(14));
    station.poll(at(30)).unwrap();

    assert_eq!(station.mode(), OperatingMode::Standard);
    assert_eq!(signals.pending(), None);
}

#[test]
fn long_press_commits_exactly_once() {
    let signals = ButtonSignals::new();
    let mut station = started(&signals, Eeprom::erased(), OperatingMode::Standard);

    signals.on_edge(Button::Green, true, at(10));
    station.poll(at(14)).unwrap();
    assert_eq!(station.mode(), OperatingMode::Standard);

    station.poll(at(15)).unwrap();
    assert_eq!(station.mode(), OperatingMode::Economic);
    assert_eq!(station.board().led.0.last(), Some(&Rgb::BLUE));
    assert!(!signals.is_held(Button::Green));
    assert!(!signals.is_held(Button::Red));

    station.poll(at(40)).unwrap();
    assert_eq!(station.mode(), OperatingMode::Economic);
}

#[test]
fn second_button_is_ignored_while_first_is_held() {
    let signals = ButtonSignals::new();
    let mut station = started(&signals, Eeprom::erased(), OperatingMode::Standard);

    signals.on_edge(Button::Red, true, at(10));
    signals.on_edge(Button::Green, true, at(11));
    assert!(!(signals.is_held(Button::Green) && signals.is_held(Button::Red)));

    station.poll(at(15)).unwrap();
    assert_eq!(station.mode(), OperatingMode::Maintenance);
}

#[test]
fn maintenance_round_trip_restores_previous_mode() {
    for first in [OperatingMode::Standard, OperatingMode::Economic] {
        let signals = ButtonSignals::new();
        let mut station = started(&signals, Eeprom::erased(), first);

        long_press(&mut station, &signals, Button::Red, 100);
        assert_eq!(station.mode(), OperatingMode::Maintenance);
        assert_eq!(station.board().led.0.last(), Some(&Rgb::ORANGE));

        long_press(&mut station, &signals, Button::Red, 200);
        assert_eq!(station.mode(), first);
    }
}

#[test]
fn maintenance_prints_without_storing() {
    let signals = ButtonSignals::new();
    let mut station = started(&signals, Eeprom::erased(), OperatingMode::Maintenance);

    for t in 0..3 {
        station.poll(at(t)).unwrap();
    }
    assert_eq!(stored_lines(&station), 0);
    let echoed = station.board_mut().serial.take_output();
    assert_eq!(echoed.lines().count(), 3);
}

#[test]
fn green_button_held_in_maintenance_keeps_echoing() {
    let signals = ButtonSignals::new();
    let mut station = started(&signals, Eeprom::erased(), OperatingMode::Maintenance);

    signals.on_edge(Button::Green, true, at(0));
    for t in 0..10 {
        station.poll(at(t)).unwrap();
    }
    assert_eq!(station.mode(), OperatingMode::Maintenance);
    assert_eq!(station.board_mut().serial.take_output().lines().count(), 10);
    assert_eq!(stored_lines(&station), 0);
}

#[test]
fn green_button_held_in_config_keeps_answering() {
    let signals = ButtonSignals::new();
    let mut station = started(&signals, Eeprom::erased(), OperatingMode::Config);

    signals.on_edge(Button::Green, true, at(0));
    let reply = send(&mut station, "LUMIN_LOW=500", at(10));
    assert_eq!(reply, "LUMIN_LOW altered\r\n");
    assert_eq!(station.config().get(Param::LuminLow), 500);
    assert_eq!(station.mode(), OperatingMode::Config);
}

#[test]
fn economic_mode_reads_gps_every_other_sample() {
    let signals = ButtonSignals::new();
    let mut station = started(&signals, Eeprom::erased(), OperatingMode::Economic);
    let interval = 2 * Configuration::default().log_interval().as_secs();

    let mut reads = Vec::new();
    for n in 0..4 {
        station.poll(at(n * interval)).unwrap();
        reads.push(station.board().gps.reads);
    }
    assert_eq!(reads, [1, 1, 2, 2]);

    let file = &station.board().volume.files["2025-6-1-1.txt"];
    let lines: Vec<&str> = file.lines().collect();
    assert!(lines[0].contains("$GPGGA"));
    assert!(!lines[1].contains("$GPGGA"));
    assert!(!lines[1].contains("GPS error"));
}

#[test]
fn config_command_is_applied_and_persisted() {
    let signals = ButtonSignals::new();
    let mut station = started(&signals, Eeprom::erased(), OperatingMode::Config);
    assert_eq!(station.board().led.0.last(), Some(&Rgb::YELLOW));

    let reply = send(&mut station, "lumin_low=500", at(1));
    assert_eq!(reply, "LUMIN_LOW altered\r\n");
    assert_eq!(station.config().get(Param::LuminLow), 500);

    let eeprom = station.store().storage().clone();
    let signals = ButtonSignals::new();
    let rebooted = started(&signals, eeprom, OperatingMode::Standard);
    assert_eq!(rebooted.config().get(Param::LuminLow), 500);
}

#[test]
fn rejected_commands_leave_configuration_alone() {
    let signals = ButtonSignals::new();
    let mut station = started(&signals, Eeprom::erased(), OperatingMode::Config);

    let reply = send(&mut station, "LUMIN_LOW=2000", at(1));
    assert_eq!(reply, "Unsupported value - LUMIN_LOW : 2000\r\n");
    assert_eq!(send(&mut station, "FOO=1", at(2)), "Unknown cmd\r\n");
    assert_eq!(send(&mut station, "CLOCK=12:00", at(3)), "err\r\n");

    assert_eq!(*station.config(), Configuration::default());
    let mut reloaded = ConfigStore::new(station.store().storage().clone());
    assert_eq!(reloaded.load(), Ok(Configuration::default()));
    assert_eq!(station.mode(), OperatingMode::Config);
}

#[test]
fn clock_commands_reach_the_clock() {
    let signals = ButtonSignals::new();
    let mut station = started(&signals, Eeprom::erased(), OperatingMode::Config);

    assert_eq!(send(&mut station, "DATE=12:31:2030", at(1)), "DATE altered\r\n");
    assert_eq!(send(&mut station, "CLOCK=23:59:58", at(2)), "CLOCK altered\r\n");
    assert_eq!(send(&mut station, "VERSION", at(3)), "420, ID 69\r\n");

    let now = station.board().clock.now;
    assert_eq!(now.to_string(), "23:59:58-12/31/2030");
}

#[test]
fn config_session_times_out_to_standard() {
    let signals = ButtonSignals::new();
    let mut station = started(&signals, Eeprom::erased(), OperatingMode::Config);
    let timeout = CONFIG_TIMEOUT.as_secs();

    send(&mut station, "HYGR=1", at(100));
    station.poll(at(timeout)).unwrap();
    assert_eq!(station.mode(), OperatingMode::Config);

    station.poll(at(100 + timeout)).unwrap();
    assert_eq!(station.mode(), OperatingMode::Standard);
    assert_eq!(station.board().led.0.last(), Some(&Rgb::GREEN));
}

#[test]
fn files_rotate_before_exceeding_limit() {
    let signals = ButtonSignals::new();
    let mut station = started(&signals, Eeprom::erased(), OperatingMode::Standard);
    let plan = SamplingPlan {
        read_gps: true,
        store: true,
    };

    let mut revisions = Vec::new();
    for _ in 0..120 {
        station.sample(plan).unwrap();
        revisions.push(station.log().current().unwrap().revision);
    }

    assert!(revisions.windows(2).all(|pair| pair[0] <= pair[1]));
    assert!(*revisions.last().unwrap() > 1);
    let limit = Configuration::default().file_max_size() as usize;
    assert!(station.board().volume.files.values().all(|file| file.len() <= limit));
}

#[test]
fn halted_clock_is_fatal() {
    let signals = ButtonSignals::new();
    let mut station = started(&signals, Eeprom::erased(), OperatingMode::Standard);
    station.board_mut().clock.halted = true;

    let fault = station.poll(at(0)).unwrap_err();
    assert_eq!(fault, Fault::Clock(ClockError::Halted));
    assert_eq!(fault.kind(), FaultKind::Clock);
}

#[test]
fn gps_failure_degrades_to_marker() {
    let signals = ButtonSignals::new();
    let mut station = started(&signals, Eeprom::erased(), OperatingMode::Standard);
    station.board_mut().gps.ready = false;

    station.poll(at(0)).unwrap();
    let file = &station.board().volume.files["2025-6-1-1.txt"];
    assert!(file.starts_with("12:0:0-6/1/2025 ; GPS error ; AVERAGE"));
}

#[test]
fn missing_volume_fails_start() {
    let signals = ButtonSignals::new();
    let mut board = TestBoard::new();
    board.volume.missing = true;
    let mut station = Station::new(board, Eeprom::erased(), &signals);

    let fault = station.start(OperatingMode::Standard, at(0)).unwrap_err();
    assert_eq!(
        fault,
        Fault::Storage(StorageError::Io {
            operation: "open volume"
        })
    );
    assert_eq!(fault.kind(), FaultKind::StorageRead);
}

#[test]
fn gps_link_wait_is_bounded() {
    let signals = ButtonSignals::new();
    let mut station = started(&signals, Eeprom::erased(), OperatingMode::Standard);
    station.board_mut().gps.ready = false;

    let mut ticks = 0;
    let result = station.await_gps_link(|| {
        ticks += 1;
        at(ticks)
    });
    assert_eq!(result, Err(Fault::Position(PositionError::NoLink)));

    station.board_mut().gps.ready = true;
    assert_eq!(station.await_gps_link(|| at(0)), Ok(()));
}
