//! Per-mode sampling cadence
//!
//! Maps the current [`OperatingMode`] to when a sample is taken and what the
//! sampling routine does with it.

use embassy_time::Duration;

use crate::config::Configuration;
use crate::mode::OperatingMode;

/// When the dispatcher runs the sampling routine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Once per elapsed interval
    Interval(Duration),
    /// On every loop pass
    EveryPass,
    /// Never, the mode does something else
    Never,
}

impl Cadence {
    pub fn for_mode(mode: OperatingMode, config: &Configuration) -> Self {
        match mode {
            OperatingMode::Standard => Self::Interval(config.log_interval()),
            // Economic mode halves the sampling rate to save power.
            OperatingMode::Economic => Self::Interval(config.log_interval() * 2),
            OperatingMode::Maintenance => Self::EveryPass,
            OperatingMode::Config => Self::Never,
        }
    }
}

/// What one execution of the sampling routine does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplingPlan {
    pub read_gps: bool,
    /// Append the record to the log volume, not just echo it
    pub store: bool,
}

impl SamplingPlan {
    /// `gps_turn` alternates between executions in economic mode; the GPS is
    /// only read when it is true.
    pub fn for_mode(mode: OperatingMode, gps_turn: bool) -> Self {
        match mode {
            OperatingMode::Economic => Self {
                read_gps: gps_turn,
                store: true,
            },
            OperatingMode::Maintenance => Self {
                read_gps: true,
                store: false,
            },
            OperatingMode::Standard | OperatingMode::Config => Self {
                read_gps: true,
                store: true,
            },
        }
    }
}
