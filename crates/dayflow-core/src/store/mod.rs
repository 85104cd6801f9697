//! Collaborator traits consumed by the planner.
//!
//! The planner is constructed with explicit store and notifier
//! implementations: SQLite-backed ones live in `storage`, in-memory fakes in
//! [`memory`] for tests and embedding.

pub mod memory;

use serde::{Deserialize, Serialize};

use crate::calendar::CalendarEvent;
use crate::error::StoreError;
use crate::interval::Interval;
use crate::planner::ScheduleResult;
use crate::profile::WorkingHoursProfile;
use crate::task::Task;

/// Kind of downstream notification requested for a task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Reminder,
    Deadline,
    Dependency,
    Suggestion,
}

/// Read access to user preferences.
pub trait UserStore: Send + Sync {
    /// Working-hours profile for a user, None if the user is unknown.
    fn working_hours(&self, user_id: &str) -> Result<Option<WorkingHoursProfile>, StoreError>;

    /// Replace a user's working-hours profile.
    fn set_working_hours(
        &self,
        user_id: &str,
        profile: &WorkingHoursProfile,
    ) -> Result<(), StoreError>;
}

/// Task persistence.
pub trait TaskStore: Send + Sync {
    /// Every task owned by a user, completed ones included.
    fn tasks_for(&self, user_id: &str) -> Result<Vec<Task>, StoreError>;

    /// Fetch one task by id.
    fn get_task(&self, task_id: &str) -> Result<Option<Task>, StoreError>;

    /// Insert a new task.
    fn create_task(&self, task: &Task) -> Result<(), StoreError>;

    /// Persist a full task row. Idempotent; one call per changed task.
    fn update_task(&self, task: &Task) -> Result<(), StoreError>;
}

/// Calendar event persistence.
pub trait EventStore: Send + Sync {
    /// Events for a user whose expansion could intersect `range`.
    fn events_for(&self, user_id: &str, range: &Interval) -> Result<Vec<CalendarEvent>, StoreError>;

    /// Insert a new event.
    fn create_event(&self, event: &CalendarEvent) -> Result<(), StoreError>;
}

/// Persistence for planning run results, looked up by accept/reject.
pub trait ScheduleStore: Send + Sync {
    /// Insert or replace a run result.
    fn save_result(&self, result: &ScheduleResult) -> Result<(), StoreError>;

    /// Fetch a run result by id.
    fn get_result(&self, schedule_id: &str) -> Result<Option<ScheduleResult>, StoreError>;
}

/// Downstream notification scheduling. Fire-and-forget from the planner's
/// point of view: failures are logged, never propagated.
pub trait Notifier: Send + Sync {
    fn schedule_notifications(
        &self,
        task: &Task,
        kinds: &[NotificationKind],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
