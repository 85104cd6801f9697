//! Task types for the scheduling engine.
//!
//! A task's scheduling semantics are carried by [`TaskKind`]: only
//! `Scheduled` tasks have a fixed time, only `Deadline` tasks have a due
//! date. The variants enforce at the type level what the original schema
//! left as runtime-optional fields.

pub mod graph;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::interval::Interval;

/// Minimum supported task duration in minutes.
pub const MIN_DURATION_MINUTES: u32 = 5;

/// Task priority.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

/// Task lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Not started yet (initial state)
    Todo,
    /// Currently being worked on
    InProgress,
    /// Finished (terminal state)
    Completed,
    /// Awaiting a suggested slot decision
    Pending,
    /// Holds an accepted slot
    Scheduled,
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Todo
    }
}

/// Required energy level for a task, matched against the day's label.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EnergyLevel {
    Low,
    Medium,
    High,
}

impl Default for EnergyLevel {
    fn default() -> Self {
        EnergyLevel::Medium
    }
}

/// Time-of-day bucket used to match task preference to placement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EnergyWindow {
    /// Before 12:00
    Morning,
    /// 12:00 to 17:00
    Afternoon,
    /// 17:00 onward
    Evening,
}

impl EnergyWindow {
    /// Bucket an hour of day (0-23) into its window.
    pub fn from_hour(hour: u32) -> Self {
        if hour < 12 {
            EnergyWindow::Morning
        } else if hour < 17 {
            EnergyWindow::Afternoon
        } else {
            EnergyWindow::Evening
        }
    }

    /// Windows are ordered through the day; adjacency is distance one.
    fn ordinal(self) -> i8 {
        match self {
            EnergyWindow::Morning => 0,
            EnergyWindow::Afternoon => 1,
            EnergyWindow::Evening => 2,
        }
    }

    /// Match score against another window: exact 2, adjacent 1, opposite 0.
    pub fn match_score(self, other: EnergyWindow) -> u8 {
        match (self.ordinal() - other.ordinal()).abs() {
            0 => 2,
            1 => 1,
            _ => 0,
        }
    }
}

impl Default for EnergyWindow {
    fn default() -> Self {
        EnergyWindow::Morning
    }
}

/// Energy requirements and preference for a task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct EnergyPreference {
    /// Energy the task demands of the day it lands on
    pub required: EnergyLevel,
    /// Preferred time-of-day window
    pub preferred: EnergyWindow,
}

/// Kind of task scheduling semantics.
///
/// Only the fields a kind actually needs are carried by its variant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum TaskKind {
    /// Fixed-time task; its slot is immutable by the scheduler.
    Scheduled { start_at: DateTime<Utc> },
    /// Must finish on or before its due date.
    Deadline { due_at: DateTime<Utc> },
    /// Placeable anywhere in the planning range.
    Flexible,
    /// Recurring habit, placed like a flexible task.
    Habit,
    /// Ordinary task without scheduling constraints.
    Normal,
    /// Exercise task, treated as flexible by the planner.
    Exercise,
    /// Long-running background task, treated as flexible.
    LongTerm,
}

impl TaskKind {
    /// Deadline carried by this kind, if any.
    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        match self {
            TaskKind::Deadline { due_at } => Some(*due_at),
            _ => None,
        }
    }

    /// Fixed start carried by this kind, if any.
    pub fn fixed_start(&self) -> Option<DateTime<Utc>> {
        match self {
            TaskKind::Scheduled { start_at } => Some(*start_at),
            _ => None,
        }
    }
}

impl Default for TaskKind {
    fn default() -> Self {
        TaskKind::Normal
    }
}

/// Progress tracking toward a task target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Progress {
    pub current: f64,
    pub target: f64,
    pub unit: String,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            current: 0.0,
            target: 1.0,
            unit: "ratio".to_string(),
        }
    }
}

/// One prior slot change, kept as an append-only audit trail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RescheduleEntry {
    /// Slot the task held before the change (None when first assigned)
    pub original_slot: Option<Interval>,
    /// Slot the task moved to (None when the slot was released)
    pub new_slot: Option<Interval>,
    pub changed_at: DateTime<Utc>,
}

/// One completed execution, recorded for energy pattern learning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionSample {
    pub scheduled_start: Option<DateTime<Utc>>,
    pub scheduled_end: Option<DateTime<Utc>>,
    pub actual_start: DateTime<Utc>,
    pub actual_end: DateTime<Utc>,
    /// Energy level the user reported for the session
    pub energy_reported: Option<EnergyLevel>,
    /// Self-assessed productivity, 1 (worst) to 5 (best)
    pub productivity: Option<u8>,
}

/// A task owned by a user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    /// Unique identifier (UUIDv4)
    pub id: String,
    /// Task title
    pub title: String,
    /// Optional description
    pub description: Option<String>,
    /// Scheduling semantics
    pub kind: TaskKind,
    /// Required duration in minutes (>= 5)
    pub duration_minutes: u32,
    /// Priority for ordering ties
    pub priority: Priority,
    /// Lifecycle status
    pub status: TaskStatus,
    /// Owning user id
    pub owner_id: String,
    /// Optional parent task. Grouping only; contributes no scheduling edge.
    pub parent_task: Option<String>,
    /// Explicit predecessor task ids that must complete or be placed first
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Progress toward the task target
    #[serde(default)]
    pub progress: Progress,
    /// Energy requirements and preferred window
    #[serde(default)]
    pub energy: EnergyPreference,
    /// Slot assigned by the scheduler, if any
    pub assigned_slot: Option<Interval>,
    /// Append-only log of slot transitions
    #[serde(default)]
    pub reschedule_history: Vec<RescheduleEntry>,
    /// Completed executions, feeds the energy model
    #[serde(default)]
    pub completion_history: Vec<CompletionSample>,
    /// Tags for categorization
    #[serde(default)]
    pub tags: Vec<String>,
    /// Free-form category label
    pub category: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a task with defaults the way a store would materialize one.
    pub fn new(owner_id: &str, title: &str, kind: TaskKind, duration_minutes: u32) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.to_string(),
            description: None,
            kind,
            duration_minutes,
            priority: Priority::default(),
            status: TaskStatus::default(),
            owner_id: owner_id.to_string(),
            parent_task: None,
            depends_on: Vec::new(),
            progress: Progress::default(),
            energy: EnergyPreference::default(),
            assigned_slot: None,
            reschedule_history: Vec::new(),
            completion_history: Vec::new(),
            tags: Vec::new(),
            category: "General".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Validate invariants a store must not persist violations of.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.duration_minutes < MIN_DURATION_MINUTES {
            return Err(ValidationError::DurationTooShort(self.duration_minutes));
        }
        Ok(())
    }

    /// Whether the task still needs placement by the scheduler.
    pub fn is_open(&self) -> bool {
        self.status != TaskStatus::Completed
    }

    /// The slot this task holds when its kind fixes one.
    ///
    /// `Scheduled` tasks always occupy `[start_at, start_at + duration)`,
    /// regardless of `assigned_slot`.
    pub fn fixed_slot(&self) -> Option<Interval> {
        let start = self.kind.fixed_start()?;
        Some(Interval::new(
            start,
            start + chrono::Duration::minutes(self.duration_minutes as i64),
        ))
    }

    /// Record a slot transition and apply the new slot.
    pub fn apply_slot(&mut self, new_slot: Option<Interval>, changed_at: DateTime<Utc>) {
        if self.assigned_slot == new_slot {
            return;
        }
        self.reschedule_history.push(RescheduleEntry {
            original_slot: self.assigned_slot.clone(),
            new_slot: new_slot.clone(),
            changed_at,
        });
        self.assigned_slot = new_slot;
        self.updated_at = changed_at;
    }
}
