//! Timer records and their building blocks.
//!
//! The serialized form uses the camelCase field names of the original
//! key-value blob so that documents written by older versions still load.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{DataIntegrityError, ValidationError};

/// Opaque, immutable timer identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimerId(String);

impl TimerId {
    /// Fresh random identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TimerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for TimerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Fixed set of timer categories, in display order.
///
/// Unknown strings in stored data decode as [`Category::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    Workout,
    Study,
    Break,
    Other,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Workout,
        Category::Study,
        Category::Break,
        Category::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Workout => "Workout",
            Category::Study => "Study",
            Category::Break => "Break",
            Category::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ValidationError::UnknownCategory(s.to_string()))
    }
}

impl From<String> for Category {
    fn from(s: String) -> Self {
        s.parse().unwrap_or(Category::Other)
    }
}

impl From<Category> for String {
    fn from(c: Category) -> Self {
        c.as_str().to_string()
    }
}

/// Lifecycle state of a single timer.
///
/// ```text
/// Paused --start--> Running --tick(0)--> Completed
///   ^                  |                     |
///   +------pause-------+                     |
///   +---------------------reset--------------+
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimerStatus {
    #[default]
    Paused,
    Running,
    Completed,
}

impl fmt::Display for TimerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TimerStatus::Paused => "Paused",
            TimerStatus::Running => "Running",
            TimerStatus::Completed => "Completed",
        };
        f.write_str(s)
    }
}

/// A named countdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timer {
    pub id: TimerId,
    pub name: String,
    pub category: Category,
    /// Total seconds. Never changes after creation.
    pub duration: u64,
    /// Seconds left, always within `0..=duration`.
    pub remaining_time: u64,
    #[serde(default)]
    pub status: TimerStatus,
    #[serde(default, alias = "halfwayAlert")]
    pub halfway_alert_enabled: bool,
    #[serde(default)]
    pub halfway_alert_triggered: bool,
}

impl Timer {
    pub fn is_running(&self) -> bool {
        self.status == TimerStatus::Running
    }

    pub fn is_completed(&self) -> bool {
        self.status == TimerStatus::Completed
    }

    pub fn elapsed_secs(&self) -> u64 {
        self.duration.saturating_sub(self.remaining_time)
    }

    /// Fraction of time left, 1.0 for a fresh timer and 0.0 once completed.
    pub fn progress(&self) -> f64 {
        if self.duration == 0 {
            return 0.0;
        }
        (self.remaining_time as f64 / self.duration as f64).clamp(0.0, 1.0)
    }

    /// Whether the halfway point has been reached at `remaining` seconds left.
    ///
    /// Uses exact division so that odd durations trigger at `remaining <= d / 2`
    /// in real arithmetic.
    pub(crate) fn at_or_past_halfway(&self, remaining: u64) -> bool {
        remaining.saturating_mul(2) <= self.duration
    }

    /// Checks the record can safely take part in a tick.
    pub fn check_integrity(&self) -> Result<(), DataIntegrityError> {
        if self.duration == 0 {
            return Err(DataIntegrityError::NonPositiveDuration {
                id: self.id.clone(),
            });
        }
        if self.remaining_time > self.duration {
            return Err(DataIntegrityError::RemainingExceedsDuration {
                id: self.id.clone(),
                remaining: self.remaining_time,
                duration: self.duration,
            });
        }
        Ok(())
    }
}

/// Input of the add-timer flow, validated into a [`Timer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTimer {
    pub name: String,
    pub duration_secs: i64,
    pub category: Category,
    #[serde(default)]
    pub halfway_alert: bool,
}

impl NewTimer {
    pub fn new(name: impl Into<String>, duration_secs: i64, category: Category) -> Self {
        Self {
            name: name.into(),
            duration_secs,
            category,
            halfway_alert: false,
        }
    }

    pub fn with_halfway_alert(mut self, enabled: bool) -> Self {
        self.halfway_alert = enabled;
        self
    }

    /// Validate and build a fresh, paused timer with a new id.
    ///
    /// # Errors
    /// Returns a [`ValidationError`] for an empty name or a duration below one second.
    pub fn build(self) -> Result<Timer, ValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if self.duration_secs < 1 {
            return Err(ValidationError::NonPositiveDuration(self.duration_secs));
        }
        let duration = self.duration_secs as u64;
        Ok(Timer {
            id: TimerId::generate(),
            name: name.to_string(),
            category: self.category,
            duration,
            remaining_time: duration,
            status: TimerStatus::Paused,
            halfway_alert_enabled: self.halfway_alert,
            halfway_alert_triggered: false,
        })
    }
}
