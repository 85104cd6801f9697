//! Schedule planner: orchestrates a planning run end to end.
//!
//! One run reads a snapshot of the user's profile, tasks and events, resolves
//! availability, lets the constraint scheduler place everything, then emits
//! the result: reschedule history, per-task persistence with an optimistic
//! overlap re-check, and fire-and-forget notification requests.
//!
//! Runs are single-writer per user: concurrent calls for the same user
//! serialize on a per-user lock. The scheduling itself has no shared mutable
//! state beyond the per-run availability.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::availability::Availability;
use crate::calendar::expand_events;
use crate::energy::CompletionHistoryModel;
use crate::error::PlannerError;
use crate::interval::{merge_intervals, Interval};
use crate::profile::WorkingHoursProfile;
use crate::scheduler::{
    needs_placement, ConstraintScheduler, Placement, ScheduleOutcome, Unplaced, UnplacedReason,
};
use crate::store::{EventStore, NotificationKind, Notifier, ScheduleStore, TaskStore, UserStore};
use crate::task::{Task, TaskKind, TaskStatus};

/// Output of one planning run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleResult {
    /// Unique id of this run (UUIDv4)
    pub id: String,
    pub owner_id: String,
    pub range: Interval,
    /// Assignments ordered by slot start
    pub placements: Vec<Placement>,
    /// Tasks that could not be placed, with reasons
    pub unplaced: Vec<Unplaced>,
    pub generated_at: DateTime<Utc>,
}

/// The schedule planner and its injected collaborators.
pub struct Planner {
    users: Arc<dyn UserStore>,
    tasks: Arc<dyn TaskStore>,
    events: Arc<dyn EventStore>,
    notifier: Arc<dyn Notifier>,
    /// Results of past runs, kept for accept/reject lookups
    results: Arc<dyn ScheduleStore>,
    /// Per-user run locks; one writer per user at a time
    run_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Planner {
    pub fn new(
        users: Arc<dyn UserStore>,
        tasks: Arc<dyn TaskStore>,
        events: Arc<dyn EventStore>,
        results: Arc<dyn ScheduleStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            users,
            tasks,
            events,
            notifier,
            results,
            run_locks: Mutex::new(HashMap::new()),
        }
    }

    fn run_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        self.run_locks
            .lock()
            .expect("poisoned")
            .entry(user_id.to_string())
            .or_default()
            .clone()
    }

    /// A past run by id.
    pub fn result(&self, schedule_id: &str) -> Result<Option<ScheduleResult>, PlannerError> {
        Ok(self.results.get_result(schedule_id)?)
    }

    /// Generate a schedule for one user over a date range.
    ///
    /// Reads all inputs before mutating anything; aborts on invalid input
    /// before any write. Per-task placement failures are reported in the
    /// result, never as `Err`.
    pub fn generate_schedule(
        &self,
        user_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<ScheduleResult, PlannerError> {
        if end <= start {
            return Err(PlannerError::InvalidRange {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }
        let range = Interval::new(start, end);

        let lock = self.run_lock(user_id);
        let _guard = lock.lock().expect("poisoned");

        // Snapshot all inputs before any write.
        let profile = self
            .users
            .working_hours(user_id)?
            .ok_or_else(|| PlannerError::ProfileUnavailable(user_id.to_string()))?;
        let snapshot = self.tasks.tasks_for(user_id)?;
        let events = self.events.events_for(user_id, &range)?;

        tracing::info!(
            user_id,
            tasks = snapshot.len(),
            events = events.len(),
            "planning run started"
        );

        let replanned: HashSet<String> = snapshot
            .iter()
            .filter(|t| needs_placement(t))
            .map(|t| t.id.clone())
            .collect();

        let busy = busy_intervals(&snapshot, &events, &range, &replanned, &[]);
        let mut availability = Availability::resolve(&profile, &range, &busy);
        let energy = CompletionHistoryModel::from_tasks(&snapshot);
        let scheduler = ConstraintScheduler::new(&profile, &energy);

        let mut outcome = scheduler.schedule(&snapshot, &mut availability, &range);
        outcome.placements.sort_by_key(|p| p.slot.start);

        let result = self.emit(user_id, &profile, &range, &snapshot, outcome)?;

        tracing::info!(
            user_id,
            schedule_id = %result.id,
            placed = result.placements.len(),
            unplaced = result.unplaced.len(),
            "planning run finished"
        );

        self.results.save_result(&result)?;
        Ok(result)
    }

    /// Persist placements and failures, then request notifications.
    ///
    /// Each task update is independent and idempotent. Immediately before
    /// each persist the slot is re-verified against a fresh read; a detected
    /// race gets one re-placement, then the task fails with `Conflict`.
    fn emit(
        &self,
        user_id: &str,
        profile: &WorkingHoursProfile,
        range: &Interval,
        snapshot: &[Task],
        outcome: ScheduleOutcome,
    ) -> Result<ScheduleResult, PlannerError> {
        let by_id: HashMap<&str, &Task> = snapshot.iter().map(|t| (t.id.as_str(), t)).collect();
        let replanned: HashSet<String> = snapshot
            .iter()
            .filter(|t| needs_placement(t))
            .map(|t| t.id.clone())
            .collect();
        let now = Utc::now();

        let mut persisted: Vec<Interval> = Vec::new();
        let mut placements = Vec::new();
        let mut unplaced = outcome.unplaced;

        for placement in outcome.placements {
            let Some(task) = by_id.get(placement.task_id.as_str()).copied() else {
                continue;
            };

            let placement = match self.verify_and_resolve(
                user_id, profile, range, task, placement, &replanned, &persisted,
            )? {
                Ok(p) => p,
                Err(reason) => {
                    unplaced.push(Unplaced {
                        task_id: task.id.clone(),
                        reason,
                    });
                    continue;
                }
            };

            let mut updated = task.clone();
            updated.apply_slot(Some(placement.slot.clone()), now);
            updated.status = TaskStatus::Pending;
            self.tasks.update_task(&updated)?;
            persisted.push(placement.slot.clone());

            self.notify(&updated);
            placements.push(placement);
        }

        // Tasks that were re-planned but ended unplaced release any stale slot.
        for failure in &unplaced {
            if let Some(task) = by_id.get(failure.task_id.as_str()).copied() {
                if task.assigned_slot.is_some() {
                    let mut updated = task.clone();
                    updated.apply_slot(None, now);
                    updated.status = TaskStatus::Todo;
                    self.tasks.update_task(&updated)?;
                }
            }
        }

        placements.sort_by_key(|p| p.slot.start);
        Ok(ScheduleResult {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: user_id.to_string(),
            range: range.clone(),
            placements,
            unplaced,
            generated_at: now,
        })
    }

    /// Optimistic overlap check against a fresh read, with one re-placement.
    ///
    /// Returns `Ok(Ok(placement))` with the original or re-placed slot, or
    /// `Ok(Err(reason))` when the task loses the race twice.
    fn verify_and_resolve(
        &self,
        user_id: &str,
        profile: &WorkingHoursProfile,
        range: &Interval,
        task: &Task,
        placement: Placement,
        replanned: &HashSet<String>,
        persisted: &[Interval],
    ) -> Result<Result<Placement, UnplacedReason>, PlannerError> {
        let fresh_tasks = self.tasks.tasks_for(user_id)?;
        let fresh_events = self.events.events_for(user_id, range)?;
        let busy = busy_intervals(&fresh_tasks, &fresh_events, range, replanned, persisted);

        if !busy.iter().any(|b| b.overlaps(&placement.slot)) {
            return Ok(Ok(placement));
        }

        tracing::warn!(
            task_id = %task.id,
            "slot lost an optimistic write race, re-placing once"
        );
        let mut fresh_availability = Availability::resolve(profile, range, &busy);
        let energy = CompletionHistoryModel::from_tasks(&fresh_tasks);
        let scheduler = ConstraintScheduler::new(profile, &energy);
        match scheduler.place_single(task, &fresh_tasks, &mut fresh_availability, range, &[]) {
            Ok(replaced) => Ok(Ok(replaced)),
            Err(_) => Ok(Err(UnplacedReason::Conflict)),
        }
    }

    /// Fire-and-forget notification request for a newly scheduled task.
    fn notify(&self, task: &Task) {
        let mut kinds = vec![NotificationKind::Suggestion, NotificationKind::Reminder];
        if matches!(task.kind, TaskKind::Deadline { .. }) {
            kinds.push(NotificationKind::Deadline);
        }
        if !task.depends_on.is_empty() {
            kinds.push(NotificationKind::Dependency);
        }
        if let Err(e) = self.notifier.schedule_notifications(task, &kinds) {
            tracing::warn!(task_id = %task.id, error = %e, "notification scheduling failed");
        }
    }

    /// Accept a suggested slot: the task keeps it and becomes `Scheduled`.
    pub fn accept_suggested_time(
        &self,
        task_id: &str,
        schedule_id: &str,
    ) -> Result<(), PlannerError> {
        let result = self
            .result(schedule_id)?
            .ok_or_else(|| PlannerError::ScheduleNotFound(schedule_id.to_string()))?;

        let lock = self.run_lock(&result.owner_id);
        let _guard = lock.lock().expect("poisoned");

        let mut task = self
            .tasks
            .get_task(task_id)?
            .ok_or_else(|| PlannerError::TaskNotFound(task_id.to_string()))?;
        let placement = result
            .placements
            .iter()
            .find(|p| p.task_id == task_id)
            .ok_or_else(|| PlannerError::NoSuggestedSlot(task_id.to_string()))?;
        // A later run may have moved the task; only the current slot can be
        // finalized.
        if task.assigned_slot.as_ref() != Some(&placement.slot) {
            return Err(PlannerError::StaleSuggestion {
                task_id: task_id.to_string(),
                schedule_id: schedule_id.to_string(),
            });
        }

        task.status = TaskStatus::Scheduled;
        task.updated_at = Utc::now();
        self.tasks.update_task(&task)?;
        tracing::info!(task_id, schedule_id, "suggested slot accepted");
        Ok(())
    }

    /// Reject a suggested slot: release it and re-place the task over
    /// refreshed availability, never offering the rejected interval again.
    ///
    /// Returns the new placement, or `None` when no alternative fits.
    pub fn reject_suggested_time(
        &self,
        task_id: &str,
        schedule_id: &str,
    ) -> Result<Option<Placement>, PlannerError> {
        let result = self
            .result(schedule_id)?
            .ok_or_else(|| PlannerError::ScheduleNotFound(schedule_id.to_string()))?;

        let lock = self.run_lock(&result.owner_id);
        let _guard = lock.lock().expect("poisoned");

        let mut task = self
            .tasks
            .get_task(task_id)?
            .ok_or_else(|| PlannerError::TaskNotFound(task_id.to_string()))?;
        let placement = result
            .placements
            .iter()
            .find(|p| p.task_id == task_id)
            .ok_or_else(|| PlannerError::NoSuggestedSlot(task_id.to_string()))?;
        if task.assigned_slot.as_ref() != Some(&placement.slot) {
            return Err(PlannerError::StaleSuggestion {
                task_id: task_id.to_string(),
                schedule_id: schedule_id.to_string(),
            });
        }
        let rejected = placement.slot.clone();

        let now = Utc::now();
        task.apply_slot(None, now);
        task.status = TaskStatus::Todo;
        self.tasks.update_task(&task)?;

        let profile = self
            .users
            .working_hours(&result.owner_id)?
            .ok_or_else(|| PlannerError::ProfileUnavailable(result.owner_id.clone()))?;
        let fresh_tasks = self.tasks.tasks_for(&result.owner_id)?;
        let fresh_events = self.events.events_for(&result.owner_id, &result.range)?;

        // Every other held slot counts as busy when re-placing one task.
        let none: HashSet<String> = std::iter::once(task_id.to_string()).collect();
        let busy = busy_intervals(&fresh_tasks, &fresh_events, &result.range, &none, &[]);
        let mut availability = Availability::resolve(&profile, &result.range, &busy);
        let energy = CompletionHistoryModel::from_tasks(&fresh_tasks);
        let scheduler = ConstraintScheduler::new(&profile, &energy);

        match scheduler.place_single(
            &task,
            &fresh_tasks,
            &mut availability,
            &result.range,
            &[rejected],
        ) {
            Ok(placement) => {
                task.apply_slot(Some(placement.slot.clone()), now);
                task.status = TaskStatus::Pending;
                self.tasks.update_task(&task)?;
                self.notify(&task);
                self.record_replacement(schedule_id, &placement)?;
                tracing::info!(task_id, schedule_id, "rejected slot re-placed");
                Ok(Some(placement))
            }
            Err(reason) => {
                self.record_failure(schedule_id, task_id, reason)?;
                tracing::info!(task_id, schedule_id, ?reason, "rejected slot not re-placeable");
                Ok(None)
            }
        }
    }

    fn record_replacement(
        &self,
        schedule_id: &str,
        placement: &Placement,
    ) -> Result<(), PlannerError> {
        if let Some(mut result) = self.results.get_result(schedule_id)? {
            result.placements.retain(|p| p.task_id != placement.task_id);
            result.placements.push(placement.clone());
            result.placements.sort_by_key(|p| p.slot.start);
            self.results.save_result(&result)?;
        }
        Ok(())
    }

    fn record_failure(
        &self,
        schedule_id: &str,
        task_id: &str,
        reason: UnplacedReason,
    ) -> Result<(), PlannerError> {
        if let Some(mut result) = self.results.get_result(schedule_id)? {
            result.placements.retain(|p| p.task_id != task_id);
            result.unplaced.push(Unplaced {
                task_id: task_id.to_string(),
                reason,
            });
            self.results.save_result(&result)?;
        }
        Ok(())
    }
}

/// Busy intervals for a run: expanded events, fixed slots, accepted slots,
/// and slots already persisted this run. Slots of tasks being re-planned
/// (`replanned`) are stale and not busy.
fn busy_intervals(
    tasks: &[Task],
    events: &[crate::calendar::CalendarEvent],
    range: &Interval,
    replanned: &HashSet<String>,
    persisted: &[Interval],
) -> Vec<Interval> {
    let mut busy = expand_events(events, range);

    for task in tasks {
        if !task.is_open() {
            continue;
        }
        if let Some(fixed) = task.fixed_slot() {
            busy.push(fixed);
            continue;
        }
        if replanned.contains(&task.id) {
            continue;
        }
        if let Some(slot) = &task.assigned_slot {
            busy.push(slot.clone());
        }
    }

    busy.extend_from_slice(persisted);
    merge_intervals(&busy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::CalendarEvent;
    use crate::error::StoreError;
    use crate::store::memory::{
        FailingNotifier, MemoryEventStore, MemoryScheduleStore, MemoryTaskStore, MemoryUserStore,
        RecordingNotifier,
    };
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn utc(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, d, h, m, 0).unwrap()
    }

    fn planner_with(
        tasks: Arc<MemoryTaskStore>,
        events: Arc<MemoryEventStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Planner {
        let users = Arc::new(MemoryUserStore::new().with_user("u1"));
        Planner::new(
            users,
            tasks,
            events,
            Arc::new(MemoryScheduleStore::new()),
            notifier,
        )
    }

    fn deadline_task(id: &str, minutes: u32, due: DateTime<Utc>) -> Task {
        let mut t = Task::new("u1", id, TaskKind::Deadline { due_at: due }, minutes);
        t.id = id.to_string();
        t
    }

    #[test]
    fn rejects_inverted_range_before_any_write() {
        let tasks = Arc::new(MemoryTaskStore::new());
        tasks.insert(deadline_task("t", 60, utc(5, 12, 0)));
        let planner = planner_with(
            tasks.clone(),
            Arc::new(MemoryEventStore::new()),
            Arc::new(RecordingNotifier::new()),
        );

        let err = planner
            .generate_schedule("u1", utc(6, 0, 0), utc(5, 0, 0))
            .unwrap_err();
        assert!(matches!(err, PlannerError::InvalidRange { .. }));
        // Nothing was persisted.
        assert!(tasks.get_task("t").unwrap().unwrap().assigned_slot.is_none());
    }

    #[test]
    fn unknown_user_fails_with_profile_unavailable() {
        let planner = planner_with(
            Arc::new(MemoryTaskStore::new()),
            Arc::new(MemoryEventStore::new()),
            Arc::new(RecordingNotifier::new()),
        );
        let err = planner
            .generate_schedule("nobody", utc(5, 0, 0), utc(6, 0, 0))
            .unwrap_err();
        assert!(matches!(err, PlannerError::ProfileUnavailable(_)));
    }

    #[test]
    fn run_persists_slot_history_and_notifies() {
        let tasks = Arc::new(MemoryTaskStore::new());
        tasks.insert(deadline_task("report", 60, utc(5, 12, 0)));
        let notifier = Arc::new(RecordingNotifier::new());
        let planner = planner_with(
            tasks.clone(),
            Arc::new(MemoryEventStore::new()),
            notifier.clone(),
        );

        let result = planner
            .generate_schedule("u1", utc(5, 0, 0), utc(6, 0, 0))
            .unwrap();
        assert_eq!(result.placements.len(), 1);

        let stored = tasks.get_task("report").unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Pending);
        assert_eq!(
            stored.assigned_slot,
            Some(Interval::new(utc(5, 9, 0), utc(5, 10, 0)))
        );
        assert_eq!(stored.reschedule_history.len(), 1);
        assert_eq!(notifier.notified_task_ids(), vec!["report".to_string()]);
        assert!(notifier
            .kinds_for("report")
            .contains(&NotificationKind::Deadline));
    }

    #[test]
    fn notifier_failure_does_not_abort_the_run() {
        let tasks = Arc::new(MemoryTaskStore::new());
        tasks.insert(deadline_task("a", 60, utc(5, 12, 0)));
        tasks.insert(deadline_task("b", 60, utc(5, 14, 0)));
        let planner = planner_with(
            tasks.clone(),
            Arc::new(MemoryEventStore::new()),
            Arc::new(FailingNotifier),
        );

        let result = planner
            .generate_schedule("u1", utc(5, 0, 0), utc(6, 0, 0))
            .unwrap();
        assert_eq!(result.placements.len(), 2);
        assert!(tasks.get_task("a").unwrap().unwrap().assigned_slot.is_some());
        assert!(tasks.get_task("b").unwrap().unwrap().assigned_slot.is_some());
    }

    #[test]
    fn events_block_availability() {
        let tasks = Arc::new(MemoryTaskStore::new());
        tasks.insert(deadline_task("report", 60, utc(5, 12, 0)));
        let events = Arc::new(MemoryEventStore::new());
        events.insert(
            CalendarEvent::new("u1", "Standup", utc(5, 9, 0), utc(5, 10, 30)).unwrap(),
        );
        let planner = planner_with(tasks.clone(), events, Arc::new(RecordingNotifier::new()));

        let result = planner
            .generate_schedule("u1", utc(5, 0, 0), utc(6, 0, 0))
            .unwrap();
        assert_eq!(
            result.placements[0].slot,
            Interval::new(utc(5, 10, 30), utc(5, 11, 30))
        );
    }

    #[test]
    fn rerun_on_unchanged_inputs_is_idempotent() {
        let tasks = Arc::new(MemoryTaskStore::new());
        tasks.insert(deadline_task("a", 60, utc(5, 12, 0)));
        let mut flexible = Task::new("u1", "b", TaskKind::Flexible, 45);
        flexible.id = "b".to_string();
        tasks.insert(flexible);
        let planner = planner_with(
            tasks.clone(),
            Arc::new(MemoryEventStore::new()),
            Arc::new(RecordingNotifier::new()),
        );

        let first = planner
            .generate_schedule("u1", utc(5, 0, 0), utc(6, 0, 0))
            .unwrap();
        let second = planner
            .generate_schedule("u1", utc(5, 0, 0), utc(6, 0, 0))
            .unwrap();
        assert_eq!(first.placements, second.placements);
        assert_eq!(first.unplaced, second.unplaced);
    }

    #[test]
    fn accept_finalizes_status() {
        let tasks = Arc::new(MemoryTaskStore::new());
        tasks.insert(deadline_task("report", 60, utc(5, 12, 0)));
        let planner = planner_with(
            tasks.clone(),
            Arc::new(MemoryEventStore::new()),
            Arc::new(RecordingNotifier::new()),
        );

        let result = planner
            .generate_schedule("u1", utc(5, 0, 0), utc(6, 0, 0))
            .unwrap();
        planner.accept_suggested_time("report", &result.id).unwrap();

        let stored = tasks.get_task("report").unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Scheduled);
        // Slot untouched by acceptance.
        assert_eq!(
            stored.assigned_slot,
            Some(Interval::new(utc(5, 9, 0), utc(5, 10, 0)))
        );
    }

    #[test]
    fn accept_against_a_superseded_schedule_fails() {
        let tasks = Arc::new(MemoryTaskStore::new());
        tasks.insert(deadline_task("report", 60, utc(5, 12, 0)));
        let events = Arc::new(MemoryEventStore::new());
        let planner = planner_with(
            tasks.clone(),
            events.clone(),
            Arc::new(RecordingNotifier::new()),
        );

        let first = planner
            .generate_schedule("u1", utc(5, 0, 0), utc(6, 0, 0))
            .unwrap();
        assert_eq!(
            first.placements[0].slot,
            Interval::new(utc(5, 9, 0), utc(5, 10, 0))
        );

        // A meeting lands on the suggested slot; the next run moves the task.
        events.insert(CalendarEvent::new("u1", "sync", utc(5, 9, 0), utc(5, 10, 0)).unwrap());
        let second = planner
            .generate_schedule("u1", utc(5, 0, 0), utc(6, 0, 0))
            .unwrap();
        assert_eq!(
            second.placements[0].slot,
            Interval::new(utc(5, 10, 0), utc(5, 11, 0))
        );

        // The first run's suggestion is no longer what the task holds.
        let err = planner
            .accept_suggested_time("report", &first.id)
            .unwrap_err();
        assert!(matches!(err, PlannerError::StaleSuggestion { .. }));
        assert_eq!(
            tasks.get_task("report").unwrap().unwrap().status,
            TaskStatus::Pending
        );

        // Accepting the current suggestion still works.
        planner.accept_suggested_time("report", &second.id).unwrap();
        assert_eq!(
            tasks.get_task("report").unwrap().unwrap().status,
            TaskStatus::Scheduled
        );
    }

    #[test]
    fn reject_re_places_excluding_the_rejected_interval() {
        let tasks = Arc::new(MemoryTaskStore::new());
        tasks.insert(deadline_task("report", 60, utc(5, 17, 0)));
        let planner = planner_with(
            tasks.clone(),
            Arc::new(MemoryEventStore::new()),
            Arc::new(RecordingNotifier::new()),
        );

        let result = planner
            .generate_schedule("u1", utc(5, 0, 0), utc(6, 0, 0))
            .unwrap();
        let original = result.placements[0].slot.clone();

        let replacement = planner
            .reject_suggested_time("report", &result.id)
            .unwrap()
            .expect("an alternative slot exists");
        assert!(!replacement.slot.overlaps(&original));

        let stored = tasks.get_task("report").unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Pending);
        assert_eq!(stored.assigned_slot, Some(replacement.slot.clone()));
        // History: initial assignment, release, re-placement.
        assert_eq!(stored.reschedule_history.len(), 3);

        let updated = planner.result(&result.id).unwrap().unwrap();
        assert_eq!(updated.placements[0].slot, replacement.slot);
    }

    #[test]
    fn accept_unknown_schedule_fails() {
        let planner = planner_with(
            Arc::new(MemoryTaskStore::new()),
            Arc::new(MemoryEventStore::new()),
            Arc::new(RecordingNotifier::new()),
        );
        let err = planner.accept_suggested_time("t", "missing").unwrap_err();
        assert!(matches!(err, PlannerError::ScheduleNotFound(_)));
    }

    /// Task store that injects a freshly accepted task between the snapshot
    /// read and the pre-persist verification read.
    struct RacyTaskStore {
        inner: MemoryTaskStore,
        injected: AtomicBool,
    }

    impl RacyTaskStore {
        fn new(inner: MemoryTaskStore) -> Self {
            Self {
                inner,
                injected: AtomicBool::new(false),
            }
        }
    }

    impl TaskStore for RacyTaskStore {
        fn tasks_for(&self, user_id: &str) -> Result<Vec<Task>, StoreError> {
            if !self.injected.swap(true, Ordering::SeqCst) {
                // First read: the snapshot. Inject a concurrent writer's
                // accepted task before anyone reads again.
                let mut intruder = Task::new("u1", "intruder", TaskKind::Flexible, 60);
                intruder.id = "intruder".to_string();
                intruder.status = TaskStatus::Scheduled;
                intruder.assigned_slot =
                    Some(Interval::new(utc_day(9, 0), utc_day(10, 0)));
                let snapshot = self.inner.tasks_for(user_id);
                self.inner.insert(intruder);
                return snapshot;
            }
            self.inner.tasks_for(user_id)
        }

        fn get_task(&self, task_id: &str) -> Result<Option<Task>, StoreError> {
            self.inner.get_task(task_id)
        }

        fn create_task(&self, task: &Task) -> Result<(), StoreError> {
            self.inner.create_task(task)
        }

        fn update_task(&self, task: &Task) -> Result<(), StoreError> {
            self.inner.update_task(task)
        }
    }

    fn utc_day(h: u32, m: u32) -> DateTime<Utc> {
        utc(5, h, m)
    }

    #[test]
    fn optimistic_check_re_places_after_a_race() {
        let inner = MemoryTaskStore::new();
        inner.insert(deadline_task("report", 60, utc(5, 17, 0)));
        let tasks = Arc::new(RacyTaskStore::new(inner));
        let users = Arc::new(MemoryUserStore::new().with_user("u1"));
        let planner = Planner::new(
            users,
            tasks.clone(),
            Arc::new(MemoryEventStore::new()),
            Arc::new(MemoryScheduleStore::new()),
            Arc::new(RecordingNotifier::new()),
        );

        let result = planner
            .generate_schedule("u1", utc(5, 0, 0), utc(6, 0, 0))
            .unwrap();

        // The snapshot placed the report at 09:00, the intruder took it
        // concurrently; the re-placement moved the report out of the way.
        assert_eq!(result.placements.len(), 1);
        let slot = &result.placements[0].slot;
        assert!(!slot.overlaps(&Interval::new(utc(5, 9, 0), utc(5, 10, 0))));
        let stored = tasks.get_task("report").unwrap().unwrap();
        assert_eq!(stored.assigned_slot.as_ref(), Some(slot));
    }
}
