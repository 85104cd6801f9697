//! Core error types for dayflow-core.
//!
//! This module defines the error hierarchy used across the library. Per-task
//! placement failures are not errors: they are collected as data in
//! `ScheduleResult::unplaced` and the run continues. Only invalid input or
//! total resource unavailability surfaces as `Err`.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for planner operations.
#[derive(Error, Debug)]
pub enum PlannerError {
    /// Planning range is invalid (end before start). Fatal, aborts the run
    /// before any write.
    #[error("Invalid planning range: end {end} is not after start {start}")]
    InvalidRange { start: String, end: String },

    /// The user's working-hours profile could not be read.
    #[error("Profile unavailable for user '{0}'")]
    ProfileUnavailable(String),

    /// A referenced task does not exist.
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    /// A referenced schedule run does not exist.
    #[error("Schedule not found: {0}")]
    ScheduleNotFound(String),

    /// The referenced task holds no suggested slot to accept or reject.
    #[error("Task '{0}' has no suggested slot")]
    NoSuggestedSlot(String),

    /// The schedule's suggestion no longer matches the task's current slot,
    /// typically because a later run reassigned the task.
    #[error("Schedule '{schedule_id}' no longer holds the current slot for task '{task_id}'")]
    StaleSuggestion {
        task_id: String,
        schedule_id: String,
    },

    /// Storage-related errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Storage-specific errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open the database
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

    /// Serialization of a stored value failed
    #[error("Stored value could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),

    /// IO errors (data directory creation and the like)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::QueryFailed(e.to_string())
    }
}

/// Validation errors for model construction and user input.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Time string did not match the HH:mm 24-hour format
    #[error("'{0}' is not a valid time, expected HH:mm (24-hour)")]
    InvalidTimeFormat(String),

    /// Working hours end at or before they start
    #[error("Working hours end {end} is not after start {start}")]
    InvertedWorkingHours { start: String, end: String },

    /// Task duration below the supported minimum
    #[error("Task duration {0} minutes is below the 5 minute minimum")]
    DurationTooShort(u32),

    /// Event end at or before its start
    #[error("Event '{0}' ends at or before its start")]
    InvertedEvent(String),
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

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planner_error_display() {
        let err = PlannerError::InvalidRange {
            start: "2025-05-02".to_string(),
            end: "2025-05-01".to_string(),
        };
        assert!(err.to_string().contains("2025-05-02"));
    }

    #[test]
    fn validation_error_converts_into_planner_error() {
        let err: PlannerError = ValidationError::DurationTooShort(3).into();
        assert!(matches!(err, PlannerError::Validation(_)));
    }
}
