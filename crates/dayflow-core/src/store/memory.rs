//! In-memory store and notifier implementations.
//!
//! Used by the planner's own tests and useful for embedding the engine
//! without SQLite. All collections live behind a single mutex per store;
//! contention is irrelevant at fake-store scale.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::calendar::CalendarEvent;
use crate::error::StoreError;
use crate::interval::Interval;
use crate::profile::WorkingHoursProfile;
use crate::planner::ScheduleResult;
use crate::store::{EventStore, NotificationKind, Notifier, ScheduleStore, TaskStore, UserStore};
use crate::task::Task;

/// In-memory user store.
#[derive(Default)]
pub struct MemoryUserStore {
    profiles: Mutex<HashMap<String, WorkingHoursProfile>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user with the default 09:00-17:00 weekday profile.
    pub fn with_user(self, user_id: &str) -> Self {
        self.profiles
            .lock()
            .expect("poisoned")
            .insert(user_id.to_string(), WorkingHoursProfile::default());
        self
    }
}

impl UserStore for MemoryUserStore {
    fn working_hours(&self, user_id: &str) -> Result<Option<WorkingHoursProfile>, StoreError> {
        Ok(self.profiles.lock().expect("poisoned").get(user_id).cloned())
    }

    fn set_working_hours(
        &self,
        user_id: &str,
        profile: &WorkingHoursProfile,
    ) -> Result<(), StoreError> {
        self.profiles
            .lock()
            .expect("poisoned")
            .insert(user_id.to_string(), profile.clone());
        Ok(())
    }
}

/// In-memory task store.
#[derive(Default)]
pub struct MemoryTaskStore {
    tasks: Mutex<HashMap<String, Task>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a task, returning its id.
    pub fn insert(&self, task: Task) -> String {
        let id = task.id.clone();
        self.tasks.lock().expect("poisoned").insert(id.clone(), task);
        id
    }
}

impl TaskStore for MemoryTaskStore {
    fn tasks_for(&self, user_id: &str) -> Result<Vec<Task>, StoreError> {
        let mut tasks: Vec<Task> = self
            .tasks
            .lock()
            .expect("poisoned")
            .values()
            .filter(|t| t.owner_id == user_id)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(tasks)
    }

    fn get_task(&self, task_id: &str) -> Result<Option<Task>, StoreError> {
        Ok(self.tasks.lock().expect("poisoned").get(task_id).cloned())
    }

    fn create_task(&self, task: &Task) -> Result<(), StoreError> {
        self.tasks
            .lock()
            .expect("poisoned")
            .insert(task.id.clone(), task.clone());
        Ok(())
    }

    fn update_task(&self, task: &Task) -> Result<(), StoreError> {
        self.tasks
            .lock()
            .expect("poisoned")
            .insert(task.id.clone(), task.clone());
        Ok(())
    }
}

/// In-memory event store.
#[derive(Default)]
pub struct MemoryEventStore {
    events: Mutex<Vec<CalendarEvent>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, event: CalendarEvent) {
        self.events.lock().expect("poisoned").push(event);
    }
}

impl EventStore for MemoryEventStore {
    fn events_for(&self, user_id: &str, _range: &Interval) -> Result<Vec<CalendarEvent>, StoreError> {
        // Recurrence makes pre-filtering by range fiddly; expansion drops
        // non-intersecting occurrences anyway.
        Ok(self
            .events
            .lock()
            .expect("poisoned")
            .iter()
            .filter(|e| e.owner_id == user_id)
            .cloned()
            .collect())
    }

    fn create_event(&self, event: &CalendarEvent) -> Result<(), StoreError> {
        self.events.lock().expect("poisoned").push(event.clone());
        Ok(())
    }
}

/// In-memory schedule result store.
#[derive(Default)]
pub struct MemoryScheduleStore {
    results: Mutex<HashMap<String, ScheduleResult>>,
}

impl MemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ScheduleStore for MemoryScheduleStore {
    fn save_result(&self, result: &ScheduleResult) -> Result<(), StoreError> {
        self.results
            .lock()
            .expect("poisoned")
            .insert(result.id.clone(), result.clone());
        Ok(())
    }

    fn get_result(&self, schedule_id: &str) -> Result<Option<ScheduleResult>, StoreError> {
        Ok(self
            .results
            .lock()
            .expect("poisoned")
            .get(schedule_id)
            .cloned())
    }
}

/// Notifier that records every request it receives.
#[derive(Default)]
pub struct RecordingNotifier {
    requests: Mutex<Vec<(String, Vec<NotificationKind>)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Task ids notified so far.
    pub fn notified_task_ids(&self) -> Vec<String> {
        self.requests
            .lock()
            .expect("poisoned")
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Kinds requested for a task.
    pub fn kinds_for(&self, task_id: &str) -> Vec<NotificationKind> {
        self.requests
            .lock()
            .expect("poisoned")
            .iter()
            .filter(|(id, _)| id == task_id)
            .flat_map(|(_, kinds)| kinds.iter().copied())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn schedule_notifications(
        &self,
        task: &Task,
        kinds: &[NotificationKind],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.requests
            .lock()
            .expect("poisoned")
            .push((task.id.clone(), kinds.to_vec()));
        Ok(())
    }
}

/// Notifier that always fails; exercises failure isolation.
pub struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn schedule_notifications(
        &self,
        _task: &Task,
        _kinds: &[NotificationKind],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Err("notification channel unavailable".into())
    }
}
