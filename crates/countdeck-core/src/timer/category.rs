//! Category grouping and bulk transitions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::engine::{Command, TransitionOutcome};
use super::model::{Category, Timer, TimerId};

/// Category-scoped operation applying one transition to every member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkAction {
    StartAll,
    PauseAll,
    ResetAll,
}

impl BulkAction {
    pub fn command(self) -> Command {
        match self {
            BulkAction::StartAll => Command::Start,
            BulkAction::PauseAll => Command::Pause,
            BulkAction::ResetAll => Command::Reset,
        }
    }
}

/// Result of a bulk transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkOutcome {
    pub timers: Vec<Timer>,
    /// Members that changed.
    pub applied: Vec<TimerId>,
    /// Members already in the target state.
    pub unchanged: Vec<TimerId>,
    /// Members whose transition was refused (e.g. starting a completed timer).
    pub rejected: Vec<TimerId>,
}

impl BulkOutcome {
    pub fn matched(&self) -> usize {
        self.applied.len() + self.unchanged.len() + self.rejected.len()
    }
}

/// Group timers by category.
///
/// Every category is present, in [`Category::ALL`] order, even when empty.
/// Relative order inside a group follows the input.
pub fn group_by_category(timers: &[Timer]) -> BTreeMap<Category, Vec<Timer>> {
    let mut groups: BTreeMap<Category, Vec<Timer>> =
        Category::ALL.into_iter().map(|c| (c, Vec::new())).collect();
    for timer in timers {
        groups.entry(timer.category).or_default().push(timer.clone());
    }
    groups
}

/// Apply `action` to every timer in `category`, leaving the rest untouched.
///
/// Equivalent to folding the single-timer transition over the matching
/// subset in collection order.
pub fn bulk_apply(timers: &[Timer], category: Category, action: BulkAction) -> BulkOutcome {
    let command = action.command();
    let mut outcome = BulkOutcome {
        timers: timers.to_vec(),
        ..BulkOutcome::default()
    };

    for timer in outcome.timers.iter_mut().filter(|t| t.category == category) {
        let id = timer.id.clone();
        match command.apply(timer) {
            TransitionOutcome::Applied => outcome.applied.push(id),
            TransitionOutcome::Unchanged => outcome.unchanged.push(id),
            TransitionOutcome::Rejected(_) => outcome.rejected.push(id),
            TransitionOutcome::NotFound => {}
        }
    }
    outcome
}
