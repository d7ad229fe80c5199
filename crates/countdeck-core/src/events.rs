use serde::{Deserialize, Serialize};

use crate::timer::Timer;

/// Side effects emitted by a tick.
///
/// The engine never notifies or persists on its own; callers hand these to
/// the history log and to whatever surface shows alerts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// Remaining time dropped to half the duration or below for the first
    /// time since the last reset. Carries the timer as it is after the tick.
    HalfwayReached { timer: Timer },
    /// Remaining time reached zero; the timer is now `Completed`.
    TimerCompleted { timer: Timer },
}

impl Event {
    pub fn timer(&self) -> &Timer {
        match self {
            Event::HalfwayReached { timer } | Event::TimerCompleted { timer } => timer,
        }
    }

    /// Short human-readable alert text.
    pub fn message(&self) -> String {
        match self {
            Event::HalfwayReached { timer } => {
                format!("Timer \"{}\" is halfway done!", timer.name)
            }
            Event::TimerCompleted { timer } => format!("Timer completed: {}", timer.name),
        }
    }
}
