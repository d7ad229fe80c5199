//! # countdeck Core Library
//!
//! This library provides the core logic for countdeck, a manager for named
//! countdown timers grouped by category. All operations are available through
//! the standalone `countdeck` CLI, which is a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Timer Engine**: pure state-transition functions (`start`, `pause`,
//!   `reset`, `tick`) that return the next snapshot plus emitted events
//! - **Category Aggregator**: grouping and category-scoped bulk actions
//! - **Storage**: SQLite timer store and history log, TOML configuration
//! - **Service**: single-writer owner of the collection that persists every
//!   mutation and records completions
//! - **Tick Scheduler**: tokio task calling the service once per second
//!
//! ## Key Components
//!
//! - [`Timer`]: a countdown record and its lifecycle state
//! - [`TimerService`]: serialized mutation path over a [`Repository`]
//! - [`TickScheduler`]: cancellable periodic driver
//! - [`Database`]: durable storage
//! - [`Config`]: application configuration

pub mod error;
pub mod events;
pub mod history;
pub mod notify;
pub mod scheduler;
pub mod service;
pub mod storage;
pub mod timer;

pub use error::{
    ConfigError, CoreError, DataIntegrityError, DatabaseError, PersistenceError, Result,
    ValidationError,
};
pub use events::Event;
pub use history::HistoryEntry;
pub use notify::{EffectSink, Filtered, LogNotifier, Recorder};
pub use scheduler::TickScheduler;
pub use service::{Applied, Durability, Repository, TickReport, TimerService};
pub use storage::{Config, Database, HistoryRepository, MemoryStore, TimerRepository};
pub use timer::{
    BulkAction, BulkOutcome, Category, NewTimer, Timer, TimerId, TimerStatus, TransitionOutcome,
};
