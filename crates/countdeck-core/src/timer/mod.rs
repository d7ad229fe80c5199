pub mod category;
pub mod engine;
mod model;

pub use category::{bulk_apply, group_by_category, BulkAction, BulkOutcome};
pub use engine::{Command, RejectReason, TickOutcome, Transition, TransitionOutcome};
pub use model::{Category, NewTimer, Timer, TimerId, TimerStatus};
