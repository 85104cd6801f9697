//! # Dayflow Core Library
//!
//! This library provides the scheduling engine behind dayflow. It implements
//! a CLI-first philosophy where all operations are available via a standalone
//! CLI binary over the same core library.
//!
//! ## Architecture
//!
//! - **Planner**: Orchestrates a planning run end to end and emits results
//! - **Scheduler**: Greedy constraint scheduler over resolved availability
//! - **Availability**: Working hours minus busy calendar intervals
//! - **Storage**: SQLite-based task/event storage and TOML-based configuration
//!
//! ## Key Components
//!
//! - [`Planner`]: Planning run orchestration, accept/reject of suggestions
//! - [`ConstraintScheduler`]: Slot assignment with energy and deadline ranking
//! - [`Availability`]: Free-interval resolution over a date range
//! - [`PlannerDb`]: Task, event, and profile persistence

pub mod availability;
pub mod calendar;
pub mod energy;
pub mod error;
pub mod interval;
pub mod planner;
pub mod profile;
pub mod scheduler;
pub mod storage;
pub mod store;
pub mod task;

pub use availability::Availability;
pub use calendar::{CalendarEvent, InviteStatus, Participant, RepeatRule};
pub use energy::{CompletionHistoryModel, EnergyModel, UniformEnergy};
pub use error::{ConfigError, PlannerError, StoreError, ValidationError};
pub use interval::Interval;
pub use planner::{Planner, ScheduleResult};
pub use profile::{DayHours, WorkingHoursProfile};
pub use scheduler::{ConstraintScheduler, Placement, PlacementReason, Unplaced, UnplacedReason};
pub use storage::{Config, PlannerDb};
pub use store::{EventStore, NotificationKind, Notifier, ScheduleStore, TaskStore, UserStore};
pub use task::{
    CompletionSample, EnergyLevel, EnergyPreference, EnergyWindow, Priority, Task, TaskKind,
    TaskStatus,
};
