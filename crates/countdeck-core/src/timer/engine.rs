//! Timer engine implementation.
//!
//! The engine is a set of pure functions over a timer collection. It does not
//! own any state, does not use threads, and never persists or notifies: each
//! call takes a snapshot and returns the next snapshot plus whatever it has to
//! say about it. The caller is responsible for calling `tick()` once per second.
//!
//! ## State Transitions
//!
//! ```text
//! Paused -> Running -> (Paused | Completed)
//! any --reset--> Paused
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! let next = engine::start(&timers, &id);
//! let outcome = engine::tick(&next.timers);
//! for event in &outcome.events { /* alert, append history */ }
//! ```

use serde::{Deserialize, Serialize};

use super::model::{Timer, TimerId, TimerStatus};
use crate::error::DataIntegrityError;
use crate::events::Event;

/// A user-initiated single-timer transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    Start,
    Pause,
    Reset,
}

/// Why a transition was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// A completed timer has to be reset before it can run or pause again.
    Completed,
}

/// What a transition did to its target timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "snake_case")]
pub enum TransitionOutcome {
    /// The timer changed.
    Applied,
    /// The timer was already in the requested state.
    Unchanged,
    /// No timer has the requested id; the collection is untouched.
    NotFound,
    /// The transition is not allowed from the current state.
    Rejected(RejectReason),
}

impl TransitionOutcome {
    /// True if the collection may differ from the input.
    pub fn is_applied(self) -> bool {
        self == TransitionOutcome::Applied
    }
}

/// Result of a single-timer transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub timers: Vec<Timer>,
    pub outcome: TransitionOutcome,
}

/// Result of one tick over the whole collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub timers: Vec<Timer>,
    pub events: Vec<Event>,
    /// Running timers that were skipped because their record is unusable.
    pub faults: Vec<DataIntegrityError>,
}

impl TickOutcome {
    /// Completed timers, in collection order.
    pub fn completed(&self) -> impl Iterator<Item = &Timer> {
        self.events.iter().filter_map(|e| match e {
            Event::TimerCompleted { timer } => Some(timer),
            _ => None,
        })
    }
}

impl Command {
    /// Apply to a single timer in place.
    pub fn apply(self, timer: &mut Timer) -> TransitionOutcome {
        match self {
            Command::Start => match timer.status {
                TimerStatus::Paused => {
                    timer.status = TimerStatus::Running;
                    TransitionOutcome::Applied
                }
                TimerStatus::Running => TransitionOutcome::Unchanged,
                TimerStatus::Completed => TransitionOutcome::Rejected(RejectReason::Completed),
            },
            Command::Pause => match timer.status {
                TimerStatus::Running => {
                    timer.status = TimerStatus::Paused;
                    TransitionOutcome::Applied
                }
                TimerStatus::Paused => TransitionOutcome::Unchanged,
                TimerStatus::Completed => TransitionOutcome::Rejected(RejectReason::Completed),
            },
            Command::Reset => {
                let fresh = timer.status == TimerStatus::Paused
                    && timer.remaining_time == timer.duration
                    && !timer.halfway_alert_triggered;
                timer.remaining_time = timer.duration;
                timer.status = TimerStatus::Paused;
                timer.halfway_alert_triggered = false;
                if fresh {
                    TransitionOutcome::Unchanged
                } else {
                    TransitionOutcome::Applied
                }
            }
        }
    }
}

fn transition(timers: &[Timer], id: &TimerId, command: Command) -> Transition {
    let mut timers = timers.to_vec();
    let outcome = match timers.iter_mut().find(|t| &t.id == id) {
        Some(timer) => command.apply(timer),
        None => TransitionOutcome::NotFound,
    };
    Transition { timers, outcome }
}

/// Set the timer to `Running`. Keeps remaining time and alert state.
pub fn start(timers: &[Timer], id: &TimerId) -> Transition {
    transition(timers, id, Command::Start)
}

/// Set the timer to `Paused`. No other field changes.
pub fn pause(timers: &[Timer], id: &TimerId) -> Transition {
    transition(timers, id, Command::Pause)
}

/// Restore full remaining time, `Paused`, and re-arm the halfway alert.
pub fn reset(timers: &[Timer], id: &TimerId) -> Transition {
    transition(timers, id, Command::Reset)
}

/// Advance every running timer by one second.
///
/// Timers that are not running, or already at zero, pass through untouched.
/// A running timer with an unusable record is skipped and reported in
/// [`TickOutcome::faults`] while the rest of the collection still advances.
pub fn tick(timers: &[Timer]) -> TickOutcome {
    let mut events = Vec::new();
    let mut faults = Vec::new();

    let timers = timers
        .iter()
        .map(|timer| {
            if !timer.is_running() || timer.remaining_time == 0 {
                return timer.clone();
            }
            if let Err(fault) = timer.check_integrity() {
                faults.push(fault);
                return timer.clone();
            }

            let mut next = timer.clone();
            next.remaining_time = timer.remaining_time.saturating_sub(1);
            let completed = next.remaining_time == 0;
            if completed {
                next.status = TimerStatus::Completed;
            }

            if next.halfway_alert_enabled
                && !next.halfway_alert_triggered
                && next.at_or_past_halfway(next.remaining_time)
            {
                next.halfway_alert_triggered = true;
                events.push(Event::HalfwayReached {
                    timer: next.clone(),
                });
            }
            if completed {
                events.push(Event::TimerCompleted {
                    timer: next.clone(),
                });
            }
            next
        })
        .collect();

    TickOutcome {
        timers,
        events,
        faults,
    }
}
