//! Core error types for countdeck-core.
//!
//! This module defines the error hierarchy using thiserror. None of these
//! errors are fatal to a running process: the tick loop and the CLI report
//! them and keep going.

use std::path::PathBuf;
use thiserror::Error;

use crate::timer::TimerId;

/// Core error type for countdeck-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Invalid timer definition, rejected before it reaches the engine
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Start/pause/reset referencing an unknown timer
    #[error("Timer '{0}' not found")]
    NotFound(TimerId),

    /// Storage read/write failure
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Key does not exist in the configuration tree
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Data directory could not be determined or created
    #[error("Failed to access data directory: {0}")]
    DataDir(String),
}

/// Invalid timer definitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Name is empty after trimming
    #[error("Timer name must not be empty")]
    EmptyName,

    /// Duration must be at least one second
    #[error("Timer duration must be at least 1 second (got {0})")]
    NonPositiveDuration(i64),

    /// Unknown category string
    #[error("Unknown category '{0}' (expected Workout, Study, Break or Other)")]
    UnknownCategory(String),
}

/// Storage failures. The in-memory state survives these.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    #[error("Failed to load {what}: {message}")]
    Load { what: &'static str, message: String },

    #[error("Failed to save {what}: {message}")]
    Save { what: &'static str, message: String },
}

/// A stored record that cannot take part in countdown logic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataIntegrityError {
    /// Duration of zero would make the halfway check meaningless
    #[error("Timer '{id}' has non-positive duration")]
    NonPositiveDuration { id: TimerId },

    /// Remaining time above the total duration
    #[error("Timer '{id}' has remaining time {remaining}s above its duration {duration}s")]
    RemainingExceedsDuration {
        id: TimerId,
        remaining: u64,
        duration: u64,
    },

    /// Record could not be decoded at all
    #[error("Stored record #{index} is malformed: {message}")]
    MalformedRecord { index: usize, message: String },

    /// Record was decoded but had to be repaired
    #[error("Timer '{id}' was repaired: {message}")]
    Repaired { id: TimerId, message: String },
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) if e.code == rusqlite::ErrorCode::DatabaseBusy => {
                DatabaseError::Locked
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
