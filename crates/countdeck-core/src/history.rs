//! Completed-timer records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::{Category, Timer, TimerId};

/// Immutable snapshot of a timer taken when it completed.
///
/// Older documents only carried `id`, `name` and `completionTime`; the other
/// fields are optional on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// `<completion epoch millis>-<timer id>`.
    pub id: String,
    #[serde(default)]
    pub timer_id: Option<TimerId>,
    pub name: String,
    #[serde(default)]
    pub category: Option<Category>,
    /// Total seconds of the completed run.
    #[serde(default)]
    pub duration: Option<u64>,
    pub completion_time: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn from_completed(timer: &Timer, completed_at: DateTime<Utc>) -> Self {
        Self {
            id: format!("{}-{}", completed_at.timestamp_millis(), timer.id),
            timer_id: Some(timer.id.clone()),
            name: timer.name.clone(),
            category: Some(timer.category),
            duration: Some(timer.duration),
            completion_time: completed_at,
        }
    }
}
