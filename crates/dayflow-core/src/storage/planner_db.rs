//! SQLite-based storage for users, tasks, and calendar events.
//!
//! `PlannerDb` implements every store trait the planner consumes, so one
//! handle can back a whole planning run.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::data_dir;
use super::migrations;
use crate::calendar::{CalendarEvent, RepeatRule};
use crate::error::StoreError;
use crate::interval::Interval;
use crate::planner::ScheduleResult;
use crate::profile::WorkingHoursProfile;
use crate::store::{EventStore, ScheduleStore, TaskStore, UserStore};
use crate::task::{EnergyLevel, EnergyWindow, Priority, Task, TaskKind, TaskStatus};

// === Helper Functions ===

/// Parse priority from database string
fn parse_priority(priority_str: &str) -> Priority {
    match priority_str {
        "low" => Priority::Low,
        "high" => Priority::High,
        _ => Priority::Medium,
    }
}

/// Format priority for database storage
fn format_priority(priority: Priority) -> &'static str {
    match priority {
        Priority::Low => "low",
        Priority::Medium => "medium",
        Priority::High => "high",
    }
}

/// Parse task status from database string
fn parse_status(status_str: &str) -> TaskStatus {
    match status_str {
        "in_progress" => TaskStatus::InProgress,
        "completed" => TaskStatus::Completed,
        "pending" => TaskStatus::Pending,
        "scheduled" => TaskStatus::Scheduled,
        _ => TaskStatus::Todo,
    }
}

/// Format task status for database storage
fn format_status(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Todo => "todo",
        TaskStatus::InProgress => "in_progress",
        TaskStatus::Completed => "completed",
        TaskStatus::Pending => "pending",
        TaskStatus::Scheduled => "scheduled",
    }
}

/// Parse energy level from database string
fn parse_energy_level(energy_str: &str) -> EnergyLevel {
    match energy_str {
        "low" => EnergyLevel::Low,
        "high" => EnergyLevel::High,
        _ => EnergyLevel::Medium,
    }
}

/// Format energy level for database storage
fn format_energy_level(energy: EnergyLevel) -> &'static str {
    match energy {
        EnergyLevel::Low => "low",
        EnergyLevel::Medium => "medium",
        EnergyLevel::High => "high",
    }
}

/// Parse energy window from database string
fn parse_energy_window(window_str: &str) -> EnergyWindow {
    match window_str {
        "afternoon" => EnergyWindow::Afternoon,
        "evening" => EnergyWindow::Evening,
        _ => EnergyWindow::Morning,
    }
}

/// Format energy window for database storage
fn format_energy_window(window: EnergyWindow) -> &'static str {
    match window {
        EnergyWindow::Morning => "morning",
        EnergyWindow::Afternoon => "afternoon",
        EnergyWindow::Evening => "evening",
    }
}

/// Parse repeat rule from database string
fn parse_repeat(repeat_str: &str) -> RepeatRule {
    match repeat_str {
        "daily" => RepeatRule::Daily,
        "weekly" => RepeatRule::Weekly,
        "monthly" => RepeatRule::Monthly,
        "yearly" => RepeatRule::Yearly,
        _ => RepeatRule::None,
    }
}

/// Format repeat rule for database storage
fn format_repeat(repeat: RepeatRule) -> &'static str {
    match repeat {
        RepeatRule::None => "none",
        RepeatRule::Daily => "daily",
        RepeatRule::Weekly => "weekly",
        RepeatRule::Monthly => "monthly",
        RepeatRule::Yearly => "yearly",
    }
}

/// Parse task kind from its tag plus the datetime column it carries
fn parse_task_kind(
    kind_str: &str,
    start_at: Option<DateTime<Utc>>,
    due_at: Option<DateTime<Utc>>,
) -> TaskKind {
    match (kind_str, start_at, due_at) {
        ("scheduled", Some(start_at), _) => TaskKind::Scheduled { start_at },
        ("deadline", _, Some(due_at)) => TaskKind::Deadline { due_at },
        ("flexible", ..) => TaskKind::Flexible,
        ("habit", ..) => TaskKind::Habit,
        ("exercise", ..) => TaskKind::Exercise,
        ("long_term", ..) => TaskKind::LongTerm,
        _ => TaskKind::Normal,
    }
}

/// Format task kind tag for database storage
fn format_task_kind(kind: &TaskKind) -> &'static str {
    match kind {
        TaskKind::Scheduled { .. } => "scheduled",
        TaskKind::Deadline { .. } => "deadline",
        TaskKind::Flexible => "flexible",
        TaskKind::Habit => "habit",
        TaskKind::Normal => "normal",
        TaskKind::Exercise => "exercise",
        TaskKind::LongTerm => "long_term",
    }
}

/// Parse datetime from RFC3339 string with fallback to current time
fn parse_datetime_fallback(dt_str: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(dt_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Parse optional datetime from an optional RFC3339 string
fn parse_datetime_opt(dt_str: Option<String>) -> Option<DateTime<Utc>> {
    dt_str.and_then(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    })
}

const TASK_COLUMNS: &str = "id, owner_id, title, description, kind, start_at, due_at,
     duration_minutes, priority, status, parent_task, depends_on, progress,
     energy_required, energy_preferred, slot_start, slot_end,
     reschedule_history, completion_history, tags, category, created_at, updated_at";

/// Build a Task from a database row (column order of `TASK_COLUMNS`)
fn row_to_task(row: &rusqlite::Row) -> Result<Task, rusqlite::Error> {
    let kind_str: String = row.get(4)?;
    let start_at = parse_datetime_opt(row.get(5)?);
    let due_at = parse_datetime_opt(row.get(6)?);

    let priority_str: String = row.get(8)?;
    let status_str: String = row.get(9)?;
    let depends_on_json: String = row.get(11)?;
    let progress_json: String = row.get(12)?;
    let energy_required_str: String = row.get(13)?;
    let energy_preferred_str: String = row.get(14)?;

    let slot_start = parse_datetime_opt(row.get(15)?);
    let slot_end = parse_datetime_opt(row.get(16)?);
    let assigned_slot = match (slot_start, slot_end) {
        (Some(start), Some(end)) => Some(Interval::new(start, end)),
        _ => None,
    };

    let reschedule_json: String = row.get(17)?;
    let completion_json: String = row.get(18)?;
    let tags_json: String = row.get(19)?;
    let created_at_str: String = row.get(21)?;
    let updated_at_str: String = row.get(22)?;

    Ok(Task {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        kind: parse_task_kind(&kind_str, start_at, due_at),
        duration_minutes: row.get(7)?,
        priority: parse_priority(&priority_str),
        status: parse_status(&status_str),
        parent_task: row.get(10)?,
        depends_on: serde_json::from_str(&depends_on_json).unwrap_or_default(),
        progress: serde_json::from_str(&progress_json).unwrap_or_default(),
        energy: crate::task::EnergyPreference {
            required: parse_energy_level(&energy_required_str),
            preferred: parse_energy_window(&energy_preferred_str),
        },
        assigned_slot,
        reschedule_history: serde_json::from_str(&reschedule_json).unwrap_or_default(),
        completion_history: serde_json::from_str(&completion_json).unwrap_or_default(),
        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
        category: row.get(20)?,
        created_at: parse_datetime_fallback(&created_at_str),
        updated_at: parse_datetime_fallback(&updated_at_str),
    })
}

const EVENT_COLUMNS: &str = "id, owner_id, title, start_at, end_at, all_day, repeat,
     participants, location, description, created_at";

/// Build a CalendarEvent from a database row (column order of `EVENT_COLUMNS`)
fn row_to_event(row: &rusqlite::Row) -> Result<CalendarEvent, rusqlite::Error> {
    let start_str: String = row.get(3)?;
    let end_str: String = row.get(4)?;
    let repeat_str: String = row.get(6)?;
    let participants_json: String = row.get(7)?;
    let created_at_str: String = row.get(10)?;

    Ok(CalendarEvent {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        title: row.get(2)?,
        start: parse_datetime_fallback(&start_str),
        end: parse_datetime_fallback(&end_str),
        all_day: row.get(5)?,
        repeat: parse_repeat(&repeat_str),
        participants: serde_json::from_str(&participants_json).unwrap_or_default(),
        location: row.get(8)?,
        description: row.get(9)?,
        created_at: parse_datetime_fallback(&created_at_str),
    })
}

/// SQLite database backing the planner's stores.
pub struct PlannerDb {
    conn: Mutex<Connection>,
}

impl PlannerDb {
    /// Open the planner database at `~/.config/dayflow/dayflow.db`.
    ///
    /// Creates tables if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, StoreError> {
        let path = data_dir()?.join("dayflow.db");
        Self::open_at(&path)
    }

    /// Open the planner database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|source| StoreError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    #[cfg(test)]
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("poisoned")
    }

    fn migrate(&self) -> Result<(), StoreError> {
        let conn = self.conn();

        // Base tables (v1 schema) first
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id            TEXT PRIMARY KEY,
                working_hours TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS tasks (
                id               TEXT PRIMARY KEY,
                owner_id         TEXT NOT NULL,
                title            TEXT NOT NULL,
                description      TEXT,
                kind             TEXT NOT NULL DEFAULT 'normal',
                start_at         TEXT,
                due_at           TEXT,
                duration_minutes INTEGER NOT NULL,
                priority         TEXT NOT NULL DEFAULT 'medium',
                status           TEXT NOT NULL DEFAULT 'todo',
                depends_on       TEXT NOT NULL DEFAULT '[]',
                progress         TEXT NOT NULL DEFAULT '{}',
                energy_required  TEXT NOT NULL DEFAULT 'medium',
                energy_preferred TEXT NOT NULL DEFAULT 'morning',
                slot_start       TEXT,
                slot_end         TEXT,
                tags             TEXT NOT NULL DEFAULT '[]',
                category         TEXT NOT NULL DEFAULT 'General',
                created_at       TEXT NOT NULL,
                updated_at       TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS events (
                id           TEXT PRIMARY KEY,
                owner_id     TEXT NOT NULL,
                title        TEXT NOT NULL,
                start_at     TEXT NOT NULL,
                end_at       TEXT NOT NULL,
                all_day      INTEGER NOT NULL DEFAULT 0,
                repeat       TEXT NOT NULL DEFAULT 'none',
                participants TEXT NOT NULL DEFAULT '[]',
                location     TEXT,
                description  TEXT,
                created_at   TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS schedules (
                id           TEXT PRIMARY KEY,
                owner_id     TEXT NOT NULL,
                generated_at TEXT NOT NULL,
                payload      TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tasks_owner ON tasks(owner_id);
            CREATE INDEX IF NOT EXISTS idx_events_owner ON events(owner_id);",
        )?;

        // Incremental migrations (v1 -> v2, etc.)
        migrations::migrate(&conn)
            .map_err(|e| StoreError::MigrationFailed(e.to_string()))?;

        Ok(())
    }

    fn write_task(&self, task: &Task, sql: &str) -> Result<(), StoreError> {
        let depends_on_json = serde_json::to_string(&task.depends_on)?;
        let progress_json = serde_json::to_string(&task.progress)?;
        let reschedule_json = serde_json::to_string(&task.reschedule_history)?;
        let completion_json = serde_json::to_string(&task.completion_history)?;
        let tags_json = serde_json::to_string(&task.tags)?;

        self.conn().execute(
            sql,
            params![
                task.id,
                task.owner_id,
                task.title,
                task.description,
                format_task_kind(&task.kind),
                task.kind.fixed_start().map(|dt| dt.to_rfc3339()),
                task.kind.deadline().map(|dt| dt.to_rfc3339()),
                task.duration_minutes,
                format_priority(task.priority),
                format_status(task.status),
                task.parent_task,
                depends_on_json,
                progress_json,
                format_energy_level(task.energy.required),
                format_energy_window(task.energy.preferred),
                task.assigned_slot.as_ref().map(|s| s.start.to_rfc3339()),
                task.assigned_slot.as_ref().map(|s| s.end.to_rfc3339()),
                reschedule_json,
                completion_json,
                tags_json,
                task.category,
                task.created_at.to_rfc3339(),
                task.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

impl UserStore for PlannerDb {
    fn working_hours(&self, user_id: &str) -> Result<Option<WorkingHoursProfile>, StoreError> {
        let json: Option<String> = self
            .conn()
            .query_row(
                "SELECT working_hours FROM users WHERE id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn set_working_hours(
        &self,
        user_id: &str,
        profile: &WorkingHoursProfile,
    ) -> Result<(), StoreError> {
        let json = serde_json::to_string(profile)?;
        self.conn().execute(
            "INSERT INTO users (id, working_hours) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET working_hours = excluded.working_hours",
            params![user_id, json],
        )?;
        Ok(())
    }
}

impl TaskStore for PlannerDb {
    fn tasks_for(&self, user_id: &str) -> Result<Vec<Task>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks WHERE owner_id = ?1 ORDER BY id ASC"
        ))?;
        let rows = stmt.query_map(params![user_id], row_to_task)?;
        let mut tasks = Vec::new();
        for task in rows {
            tasks.push(task?);
        }
        Ok(tasks)
    }

    fn get_task(&self, task_id: &str) -> Result<Option<Task>, StoreError> {
        let conn = self.conn();
        let task = conn
            .query_row(
                &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                params![task_id],
                row_to_task,
            )
            .optional()?;
        Ok(task)
    }

    fn create_task(&self, task: &Task) -> Result<(), StoreError> {
        self.write_task(
            task,
            "INSERT INTO tasks (
                id, owner_id, title, description, kind, start_at, due_at,
                duration_minutes, priority, status, parent_task, depends_on, progress,
                energy_required, energy_preferred, slot_start, slot_end,
                reschedule_history, completion_history, tags, category, created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                       ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23)",
        )
    }

    fn update_task(&self, task: &Task) -> Result<(), StoreError> {
        self.write_task(
            task,
            "UPDATE tasks SET
                owner_id = ?2, title = ?3, description = ?4, kind = ?5, start_at = ?6,
                due_at = ?7, duration_minutes = ?8, priority = ?9, status = ?10,
                parent_task = ?11, depends_on = ?12, progress = ?13, energy_required = ?14,
                energy_preferred = ?15, slot_start = ?16, slot_end = ?17,
                reschedule_history = ?18, completion_history = ?19, tags = ?20,
                category = ?21, created_at = ?22, updated_at = ?23
             WHERE id = ?1",
        )
    }
}

impl EventStore for PlannerDb {
    fn events_for(&self, user_id: &str, range: &Interval) -> Result<Vec<CalendarEvent>, StoreError> {
        // Recurring events may start long before the range; keep them all
        // and let occurrence expansion discard non-intersecting ones.
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {EVENT_COLUMNS} FROM events
             WHERE owner_id = ?1 AND (repeat != 'none' OR (end_at > ?2 AND start_at < ?3))
             ORDER BY start_at ASC"
        ))?;
        let rows = stmt.query_map(
            params![user_id, range.start.to_rfc3339(), range.end.to_rfc3339()],
            row_to_event,
        )?;
        let mut events = Vec::new();
        for event in rows {
            events.push(event?);
        }
        Ok(events)
    }

    fn create_event(&self, event: &CalendarEvent) -> Result<(), StoreError> {
        let participants_json = serde_json::to_string(&event.participants)?;
        self.conn().execute(
            "INSERT INTO events (
                id, owner_id, title, start_at, end_at, all_day, repeat,
                participants, location, description, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                event.id,
                event.owner_id,
                event.title,
                event.start.to_rfc3339(),
                event.end.to_rfc3339(),
                event.all_day,
                format_repeat(event.repeat),
                participants_json,
                event.location,
                event.description,
                event.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

impl ScheduleStore for PlannerDb {
    fn save_result(&self, result: &ScheduleResult) -> Result<(), StoreError> {
        let payload = serde_json::to_string(result)?;
        self.conn().execute(
            "INSERT INTO schedules (id, owner_id, generated_at, payload)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET payload = excluded.payload",
            params![
                result.id,
                result.owner_id,
                result.generated_at.to_rfc3339(),
                payload
            ],
        )?;
        Ok(())
    }

    fn get_result(&self, schedule_id: &str) -> Result<Option<ScheduleResult>, StoreError> {
        let payload: Option<String> = self
            .conn()
            .query_row(
                "SELECT payload FROM schedules WHERE id = ?1",
                params![schedule_id],
                |row| row.get(0),
            )
            .optional()?;
        match payload {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }
}
