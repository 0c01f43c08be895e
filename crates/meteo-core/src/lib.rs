//! Hardware-independent core library for meteo
//!
//! This crate contains all platform-agnostic logic for the meteo environmental
//! data logger: the operating-mode state machine, button signalling and
//! long-press timing, the serial configuration command interpreter, the
//! persisted configuration record, log record assembly and log file rotation.
//!
//! Hardware is reached only through the collaborator traits in [`sensors`],
//! [`storage`], [`indicator`] and [`app_state::Board`], so the same code runs
//! on the ESP32-S3 firmware, in the desktop simulator and in host tests.

#![cfg_attr(not(test), no_std)]

pub mod app_state;
pub mod buttons;
pub mod command;
pub mod config;
pub mod constants;
pub mod indicator;
pub mod metrics;
pub mod mode;
pub mod record;
pub mod sampling;
pub mod sensors;
pub mod storage;
