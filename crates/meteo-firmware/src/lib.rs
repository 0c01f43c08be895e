//! ESP32-S3 firmware-specific modules for meteo
//!
//! This crate contains hardware-specific code that cannot compile on desktop
//! targets: peripheral drivers for the station's sensors, clock, EEPROM and
//! LED, plus the concrete [`board::FirmwareBoard`] handed to the core station.

#![no_std]

pub mod board;
pub mod drivers;
