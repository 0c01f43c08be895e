//! Button edge signalling shared between interrupt handlers and the main loop
//!
//! Edge handlers only touch [`ButtonSignals`]: they update the held flag of
//! their button and record or cancel a [`PendingTransition`]. The main loop
//! later commits a due transition through [`crate::mode::ModeMachine`].
//!
//! All state lives behind a `critical_section::Mutex`, so a handler and the
//! loop never observe a half-written update. The struct is `const`
//! constructible and meant to live in a `static`.

use core::cell::Cell;

use critical_section::Mutex;
use embassy_time::Instant;
use embedded_hal::digital::InputPin;
use log::{debug, info};

use crate::constants::LONG_PRESS;
use crate::mode::{OperatingMode, PendingTransition, propose};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    /// Toggles standard and economic mode
    Green,
    /// Enters and leaves maintenance mode
    Red,
}

impl Button {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Red => "red",
        }
    }
}

/// What an edge handler did with one edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeOutcome {
    /// The other button is held, or signalling is disabled
    Ignored,
    /// Press recorded, transition pending
    Armed(PendingTransition),
    /// Press recorded, but the button means nothing in the current mode
    Held,
    /// Release before the deadline cancelled the pending transition
    Released,
}

#[derive(Debug, Clone, Copy)]
struct SignalState {
    green_held: bool,
    red_held: bool,
    pending: Option<PendingTransition>,
    mode: OperatingMode,
    last_non_maintenance: OperatingMode,
    disabled: bool,
}

impl SignalState {
    const fn held(&self, button: Button) -> bool {
        match button {
            Button::Green => self.green_held,
            Button::Red => self.red_held,
        }
    }

    fn set_held(&mut self, button: Button, held: bool) {
        match button {
            Button::Green => self.green_held = held,
            Button::Red => self.red_held = held,
        }
    }
}

pub struct ButtonSignals {
    state: Mutex<Cell<SignalState>>,
}

impl Default for ButtonSignals {
    fn default() -> Self {
        Self::new()
    }
}

impl ButtonSignals {
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(Cell::new(SignalState {
                green_held: false,
                red_held: false,
                pending: None,
                mode: OperatingMode::Standard,
                last_non_maintenance: OperatingMode::Standard,
                disabled: false,
            })),
        }
    }

    fn update<R>(&self, f: impl FnOnce(&mut SignalState) -> R) -> R {
        critical_section::with(|cs| {
            let cell = self.state.borrow(cs);
            let mut state = cell.get();
            let result = f(&mut state);
            cell.set(state);
            result
        })
    }

    fn read(&self) -> SignalState {
        critical_section::with(|cs| self.state.borrow(cs).get())
    }

    /// Handle one edge of `button`. `pressed` is the decoded level, so
    /// active-low inputs must be inverted by the caller.
    ///
    /// The proposal is computed from the mode last published by the main loop.
    pub fn on_edge(&self, button: Button, pressed: bool, now: Instant) -> EdgeOutcome {
        let other = match button {
            Button::Green => Button::Red,
            Button::Red => Button::Green,
        };

        let outcome = self.update(|state| {
            if state.disabled || state.held(other) {
                return EdgeOutcome::Ignored;
            }

            state.set_held(button, pressed);
            if pressed {
                let Some(target) = propose(button, state.mode, state.last_non_maintenance) else {
                    return EdgeOutcome::Held;
                };
                let pending = PendingTransition {
                    target: Some(target),
                    deadline: now + LONG_PRESS,
                };
                state.pending = Some(pending);
                EdgeOutcome::Armed(pending)
            } else {
                state.pending = None;
                EdgeOutcome::Released
            }
        });

        debug!("{} button edge (pressed: {}): {:?}", button.label(), pressed, outcome);
        outcome
    }

    pub fn pending(&self) -> Option<PendingTransition> {
        self.read().pending
    }

    pub fn is_held(&self, button: Button) -> bool {
        self.read().held(button)
    }

    /// Take the pending transition if its deadline has passed.
    ///
    /// Taking it also clears both held flags, so the release edge of the long
    /// press that follows finds nothing to cancel.
    pub fn take_due(&self, now: Instant) -> Option<PendingTransition> {
        self.update(|state| match state.pending {
            Some(pending) if pending.is_due(now) => {
                state.pending = None;
                state.green_held = false;
                state.red_held = false;
                Some(pending)
            }
            _ => None,
        })
    }

    /// Drop any pending transition and make the mode visible to the edge
    /// handlers, in one critical section.
    pub fn commit_mode(&self, mode: OperatingMode, last_non_maintenance: OperatingMode) {
        self.update(|state| {
            state.pending = None;
            state.mode = mode;
            state.last_non_maintenance = last_non_maintenance;
        });
    }

    #[cfg(test)]
    pub(crate) fn arm(&self, pending: PendingTransition) {
        self.update(|state| state.pending = Some(pending));
    }

    /// Stop reacting to edges. Used once a fatal fault halts the station.
    pub fn disable(&self) {
        self.update(|state| {
            state.disabled = true;
            state.pending = None;
        });
    }
}

/// Decide the boot mode from the red button level at power-up.
///
/// Holding red (active-low) continuously for [`LONG_PRESS`] boots into config
/// mode. Releasing it early, or not holding it at all, boots into standard
/// mode. A pin read error counts as released.
pub fn detect_boot_mode<P: InputPin>(red: &mut P, mut now: impl FnMut() -> Instant) -> OperatingMode {
    let start = now();
    while red.is_low().unwrap_or(false) {
        if now() - start >= LONG_PRESS {
            info!("Red button held at boot, entering config mode");
            return OperatingMode::Config;
        }
    }
    OperatingMode::Standard
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use embedded_hal::digital::{ErrorType, InputPin};

    fn at(secs: u64) -> Instant {
        Instant::from_secs(secs)
    }

    #[test]
    fn test_held_flags_are_mutually_exclusive() {
        let signals = ButtonSignals::new();
        assert!(matches!(
            signals.on_edge(Button::Green, true, at(0)),
            EdgeOutcome::Armed(_)
        ));
        assert_eq!(signals.on_edge(Button::Red, true, at(1)), EdgeOutcome::Ignored);
        assert!(signals.is_held(Button::Green));
        assert!(!signals.is_held(Button::Red));

        signals.on_edge(Button::Green, false, at(2));
        assert!(matches!(
            signals.on_edge(Button::Red, true, at(3)),
            EdgeOutcome::Armed(_)
        ));
        assert!(!signals.is_held(Button::Green));
        assert!(signals.is_held(Button::Red));
    }

    #[test]
    fn test_release_cancels_pending() {
        let signals = ButtonSignals::new();
        signals.on_edge(Button::Green, true, at(0));
        assert!(signals.pending().is_some());

        assert_eq!(signals.on_edge(Button::Green, false, at(4)), EdgeOutcome::Released);
        assert_eq!(signals.pending(), None);
        assert_eq!(signals.take_due(at(10)), None);
    }

    #[test]
    fn test_take_due_waits_for_deadline_and_clears_flags() {
        let signals = ButtonSignals::new();
        signals.on_edge(Button::Red, true, at(0));

        assert_eq!(signals.take_due(at(4)), None);
        let taken = signals.take_due(at(5)).unwrap();
        assert_eq!(taken.target, Some(OperatingMode::Maintenance));
        assert!(!signals.is_held(Button::Red));
        assert_eq!(signals.take_due(at(6)), None);
    }

    #[test]
    fn test_proposal_uses_published_mode() {
        let signals = ButtonSignals::new();
        signals.commit_mode(OperatingMode::Maintenance, OperatingMode::Economic);
        let EdgeOutcome::Armed(pending) = signals.on_edge(Button::Red, true, at(0)) else {
            panic!("press was not armed");
        };
        assert_eq!(pending.target, Some(OperatingMode::Economic));
    }

    #[test]
    fn test_press_without_meaning_only_sets_held_flag() {
        let signals = ButtonSignals::new();
        signals.commit_mode(OperatingMode::Config, OperatingMode::Standard);

        assert_eq!(signals.on_edge(Button::Green, true, at(0)), EdgeOutcome::Held);
        assert!(signals.is_held(Button::Green));
        assert_eq!(signals.pending(), None);
        assert_eq!(signals.on_edge(Button::Red, true, at(1)), EdgeOutcome::Ignored);
        assert_eq!(signals.take_due(at(10)), None);

        signals.on_edge(Button::Green, false, at(11));
        assert_eq!(signals.on_edge(Button::Red, true, at(12)), EdgeOutcome::Held);
        assert_eq!(signals.pending(), None);
    }

    #[test]
    fn test_commit_mode_drops_pending() {
        let signals = ButtonSignals::new();
        signals.on_edge(Button::Green, true, at(0));
        assert!(signals.pending().is_some());

        signals.commit_mode(OperatingMode::Maintenance, OperatingMode::Standard);
        assert_eq!(signals.pending(), None);
        signals.on_edge(Button::Green, false, at(1));
        let EdgeOutcome::Armed(pending) = signals.on_edge(Button::Red, true, at(2)) else {
            panic!("press was not armed");
        };
        assert_eq!(pending.target, Some(OperatingMode::Standard));
    }

    #[test]
    fn test_disabled_signals_ignore_edges() {
        let signals = ButtonSignals::new();
        signals.disable();
        assert_eq!(signals.on_edge(Button::Green, true, at(0)), EdgeOutcome::Ignored);
        assert_eq!(signals.pending(), None);
    }

    struct HeldPin {
        low_reads: u32,
    }

    impl ErrorType for HeldPin {
        type Error = Infallible;
    }

    impl InputPin for HeldPin {
        fn is_high(&mut self) -> Result<bool, Infallible> {
            self.is_low().map(|low| !low)
        }

        fn is_low(&mut self) -> Result<bool, Infallible> {
            if self.low_reads == 0 {
                return Ok(false);
            }
            self.low_reads -= 1;
            Ok(true)
        }
    }

    #[test]
    fn test_boot_mode_detection() {
        let mut ticks = 0;
        let mut clock = || {
            ticks += 1;
            at(ticks)
        };

        let mut held = HeldPin { low_reads: 100 };
        assert_eq!(detect_boot_mode(&mut held, &mut clock), OperatingMode::Config);

        let mut tapped = HeldPin { low_reads: 2 };
        assert_eq!(detect_boot_mode(&mut tapped, &mut clock), OperatingMode::Standard);
    }
}
