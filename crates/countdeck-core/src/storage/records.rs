//! Versioned on-disk encoding of the timer collection.
//!
//! Current documents look like `{"version": 1, "timers": [...]}`. A bare JSON
//! array is the legacy blob format and is still accepted. Records are decoded
//! one at a time so a single malformed entry does not take the rest with it.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::DataIntegrityError;
use crate::timer::{Timer, TimerStatus};

pub const DOCUMENT_VERSION: u32 = 1;

#[derive(Serialize)]
struct DocumentRef<'a> {
    version: u32,
    timers: &'a [Timer],
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredDocument {
    Versioned {
        version: u32,
        timers: Vec<serde_json::Value>,
    },
    Legacy(Vec<serde_json::Value>),
}

/// Timers read from storage plus everything that was wrong with them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub timers: Vec<Timer>,
    /// Dropped, repaired, or unusable records.
    pub issues: Vec<DataIntegrityError>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

pub fn encode(timers: &[Timer]) -> Result<String, serde_json::Error> {
    serde_json::to_string(&DocumentRef {
        version: DOCUMENT_VERSION,
        timers,
    })
}

/// Decode a stored document, dropping undecodable records and repairing
/// inconsistent ones.
///
/// # Errors
/// Fails only when the document itself is not a timer document.
pub fn decode(json: &str) -> Result<LoadReport, serde_json::Error> {
    let values = match serde_json::from_str::<StoredDocument>(json)? {
        StoredDocument::Versioned { version, timers } => {
            if version > DOCUMENT_VERSION {
                warn!(version, "timer document is newer than this build, reading known fields");
            }
            timers
        }
        StoredDocument::Legacy(timers) => timers,
    };

    let mut report = LoadReport::default();
    for (index, value) in values.into_iter().enumerate() {
        match serde_json::from_value::<Timer>(value) {
            Ok(mut timer) => {
                report.issues.extend(repair(&mut timer));
                if let Err(issue) = timer.check_integrity() {
                    report.issues.push(issue);
                }
                report.timers.push(timer);
            }
            Err(e) => report.issues.push(DataIntegrityError::MalformedRecord {
                index,
                message: e.to_string(),
            }),
        }
    }
    Ok(report)
}

/// Bring a decoded record back in line with the timer invariants.
///
/// Zero-duration timers are left alone; the tick skips them.
fn repair(timer: &mut Timer) -> Option<DataIntegrityError> {
    if timer.duration == 0 {
        return None;
    }

    let mut fixes = Vec::new();
    if timer.remaining_time > timer.duration {
        timer.remaining_time = timer.duration;
        fixes.push("remaining time clamped to duration");
    }
    match timer.status {
        TimerStatus::Running if timer.remaining_time == 0 => {
            timer.status = TimerStatus::Completed;
            fixes.push("running with no time left marked completed");
        }
        TimerStatus::Completed if timer.remaining_time > 0 => {
            timer.status = TimerStatus::Paused;
            fixes.push("completed with time left marked paused");
        }
        _ => {}
    }
    if timer.halfway_alert_triggered && !timer.halfway_alert_enabled {
        timer.halfway_alert_triggered = false;
        fixes.push("halfway alert flag cleared");
    }

    if fixes.is_empty() {
        None
    } else {
        Some(DataIntegrityError::Repaired {
            id: timer.id.clone(),
            message: fixes.join(", "),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::{Category, NewTimer};

    #[test]
    fn encode_then_decode_is_lossless() {
        let mut a = NewTimer::new("a", 10, Category::Workout)
            .with_halfway_alert(true)
            .build()
            .unwrap();
        a.remaining_time = 4;
        a.status = TimerStatus::Running;
        a.halfway_alert_triggered = true;
        let b = NewTimer::new("b", 3, Category::Other).build().unwrap();
        let timers = vec![a, b];

        let report = decode(&encode(&timers).unwrap()).unwrap();
        assert!(report.is_clean());
        assert_eq!(report.timers, timers);
    }

    #[test]
    fn encoded_document_is_versioned() {
        let json = encode(&[]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["version"], 1);
        assert!(value["timers"].as_array().unwrap().is_empty());
    }

    #[test]
    fn legacy_array_is_accepted() {
        let json = r#"[{"id":"1","name":"Read","duration":20,"remainingTime":20,
            "status":"Paused","category":"Study","halfwayAlert":true}]"#;
        let report = decode(json).unwrap();
        assert_eq!(report.timers.len(), 1);
        assert!(report.timers[0].halfway_alert_enabled);
    }

    #[test]
    fn malformed_record_is_dropped_and_reported() {
        let json = r#"{"version":1,"timers":[
            {"id":"1","name":"ok","duration":5,"remainingTime":5,"status":"Paused","category":"Break"},
            {"id":"2","name":"bad","duration":-3,"remainingTime":5,"status":"Paused","category":"Break"}
        ]}"#;
        let report = decode(json).unwrap();
        assert_eq!(report.timers.len(), 1);
        assert!(matches!(
            report.issues[0],
            DataIntegrityError::MalformedRecord { index: 1, .. }
        ));
    }

    #[test]
    fn inconsistent_records_are_repaired() {
        let json = r#"[
            {"id":"1","name":"over","duration":5,"remainingTime":9,"status":"Paused","category":"Break"},
            {"id":"2","name":"stuck","duration":5,"remainingTime":0,"status":"Running","category":"Break"}
        ]"#;
        let report = decode(json).unwrap();
        assert_eq!(report.timers[0].remaining_time, 5);
        assert_eq!(report.timers[1].status, TimerStatus::Completed);
        assert_eq!(report.issues.len(), 2);
    }

    #[test]
    fn zero_duration_record_is_kept_and_flagged() {
        let json = r#"[{"id":"z","name":"zero","duration":0,"remainingTime":0,"status":"Running","category":"Other"}]"#;
        let report = decode(json).unwrap();
        assert_eq!(report.timers.len(), 1);
        assert!(matches!(
            report.issues[0],
            DataIntegrityError::NonPositiveDuration { .. }
        ));
    }

    #[test]
    fn non_document_is_an_error() {
        assert!(decode(r#"{"hello":"world"}"#).is_err());
    }
}
