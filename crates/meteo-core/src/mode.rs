//! Operating modes and the mode state machine
//!
//! [`ModeMachine`] is the only writer of the current mode. Button handlers
//! propose transitions through [`crate::buttons::ButtonSignals`]; the main loop
//! commits them with [`ModeMachine::poll_transition`] once the long-press
//! deadline has passed.

use embassy_time::{Duration, Instant};
use log::{info, warn};
use thiserror_no_std::Error;

use crate::buttons::{Button, ButtonSignals};
use crate::constants::CONFIG_TIMEOUT;
use crate::indicator::{Indicator, Rgb};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingMode {
    Standard,
    Economic,
    Maintenance,
    Config,
}

impl OperatingMode {
    /// Indicator color shown while the mode is active
    pub const fn color(self) -> Rgb {
        match self {
            Self::Standard => Rgb::GREEN,
            Self::Economic => Rgb::BLUE,
            Self::Maintenance => Rgb::ORANGE,
            Self::Config => Rgb::YELLOW,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Economic => "economic",
            Self::Maintenance => "maintenance",
            Self::Config => "config",
        }
    }
}

/// Mode change proposed by a button press, committed once `deadline` passes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTransition {
    /// Never `None` when armed by a button; a missing target is rejected
    /// on commit.
    pub target: Option<OperatingMode>,
    pub deadline: Instant,
}

impl PendingTransition {
    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.deadline
    }
}

/// Next mode proposed by a press of `button` while in `current`.
pub fn propose(
    button: Button,
    current: OperatingMode,
    last_non_maintenance: OperatingMode,
) -> Option<OperatingMode> {
    use OperatingMode::*;

    match (button, current) {
        (Button::Green, Standard) => Some(Economic),
        (Button::Green, Economic) => Some(Standard),
        (Button::Red, Standard | Economic) => Some(Maintenance),
        (Button::Red, Maintenance) => Some(last_non_maintenance),
        (_, Maintenance | Config) => None,
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeError {
    #[error("transition has no target mode")]
    NoTarget,
}

/// Result of one [`ModeMachine::poll_transition`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPoll {
    /// Nothing pending, dispatch may run
    Idle,
    /// A press is held but its deadline has not passed
    Waiting,
    Committed(OperatingMode),
    /// A due transition had no target and was dropped
    Rejected,
}

pub struct ModeMachine<'s> {
    signals: &'s ButtonSignals,
    current: OperatingMode,
    last_non_maintenance: OperatingMode,
    /// `None` means a sample is due immediately
    next_sample_at: Option<Instant>,
    config_deadline: Option<Instant>,
}

impl<'s> ModeMachine<'s> {
    /// Starts in standard mode without touching the indicator. Call
    /// [`ModeMachine::enter`] with the boot mode afterwards.
    pub fn new(signals: &'s ButtonSignals) -> Self {
        signals.commit_mode(OperatingMode::Standard, OperatingMode::Standard);
        Self {
            signals,
            current: OperatingMode::Standard,
            last_non_maintenance: OperatingMode::Standard,
            next_sample_at: None,
            config_deadline: None,
        }
    }

    pub fn current(&self) -> OperatingMode {
        self.current
    }

    pub fn last_non_maintenance(&self) -> OperatingMode {
        self.last_non_maintenance
    }

    pub fn signals(&self) -> &'s ButtonSignals {
        self.signals
    }

    /// Switch to `target`.
    ///
    /// A missing target is rejected and leaves both the mode and any pending
    /// transition untouched.
    pub fn enter<I: Indicator>(
        &mut self,
        target: impl Into<Option<OperatingMode>>,
        now: Instant,
        indicator: &mut I,
    ) -> Result<(), ModeError> {
        let Some(target) = target.into() else {
            warn!("Ignoring transition without target, staying in {}", self.current.label());
            return Err(ModeError::NoTarget);
        };

        self.next_sample_at = None;
        self.config_deadline = match target {
            OperatingMode::Config => Some(now + CONFIG_TIMEOUT),
            _ => None,
        };
        if matches!(target, OperatingMode::Standard | OperatingMode::Economic) {
            self.last_non_maintenance = target;
        }

        let previous = self.current;
        self.current = target;
        indicator.set_color(target.color());
        self.signals.commit_mode(self.current, self.last_non_maintenance);

        info!("Mode {} -> {}", previous.label(), target.label());
        Ok(())
    }

    /// Commit the pending transition if its deadline has passed.
    pub fn poll_transition<I: Indicator>(&mut self, now: Instant, indicator: &mut I) -> TransitionPoll {
        match self.signals.take_due(now) {
            Some(pending) => match self.enter(pending.target, now, indicator) {
                Ok(()) => TransitionPoll::Committed(self.current),
                Err(_) => TransitionPoll::Rejected,
            },
            None if self.signals.pending().is_some() => TransitionPoll::Waiting,
            None => TransitionPoll::Idle,
        }
    }

    /// True when a sample is due. Schedules the next one `interval` later.
    pub fn sample_due(&mut self, now: Instant, interval: Duration) -> bool {
        match self.next_sample_at {
            Some(at) if now < at => false,
            _ => {
                self.next_sample_at = Some(now + interval);
                true
            }
        }
    }

    pub fn config_expired(&self, now: Instant) -> bool {
        self.current == OperatingMode::Config
            && self.config_deadline.is_some_and(|deadline| now >= deadline)
    }

    /// Push the config session deadline back after operator activity.
    pub fn rearm_config_deadline(&mut self, now: Instant) {
        if self.current == OperatingMode::Config {
            self.config_deadline = Some(now + CONFIG_TIMEOUT);
        }
    }
}
