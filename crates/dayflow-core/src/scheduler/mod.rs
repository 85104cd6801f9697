//! Constraint scheduler: greedy slot assignment over resolved availability.
//!
//! Tasks arrive in dependency topological order (priority, deadline and
//! creation order breaking ties) and are placed one at a time:
//! - deadline tasks take the earliest feasible start, preserving slack for
//!   later deadlines
//! - flexible and habit tasks take the best energy-scored candidate,
//!   earliest as tie-break
//! - every placement is subtracted from the day's free list so later tasks
//!   see updated availability
//!
//! Placement failures are collected per task; the run never aborts on one.

use chrono::{DateTime, Datelike, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::availability::Availability;
use crate::energy::EnergyModel;
use crate::interval::Interval;
use crate::profile::WorkingHoursProfile;
use crate::task::graph::DependencyGraph;
use crate::task::{EnergyLevel, EnergyWindow, Task, TaskKind, TaskStatus};

/// Why a task landed where it did.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlacementReason {
    /// Deadline task, earliest feasible start
    EarliestFit,
    /// Flexible/habit task placed in its preferred energy window
    EnergyMatch,
    /// Flexible/habit task, best remaining candidate
    BestAvailable,
}

impl PlacementReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EarliestFit => "Earliest fit before deadline",
            Self::EnergyMatch => "Matches preferred energy window",
            Self::BestAvailable => "Best available slot",
        }
    }
}

/// Why a task could not be placed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum UnplacedReason {
    /// No free interval long enough
    NoFit,
    /// Deadline predates the planning range
    DeadlineViolated,
    /// A predecessor is neither completed nor placed
    DependencyUnsatisfied,
    /// Member of a dependency cycle
    CyclicDependency,
    /// Lost an optimistic write race twice
    Conflict,
}

/// One task assigned to one slot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Placement {
    pub task_id: String,
    pub slot: Interval,
    pub reason: PlacementReason,
    /// 0-100
    pub confidence: u8,
}

/// One task that could not be placed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Unplaced {
    pub task_id: String,
    pub reason: UnplacedReason,
}

/// Output of one scheduling pass.
#[derive(Debug, Clone, Default)]
pub struct ScheduleOutcome {
    pub placements: Vec<Placement>,
    pub unplaced: Vec<Unplaced>,
}

/// A scored candidate slot within one free interval.
struct Candidate {
    slot: Interval,
    score: f64,
    match_score: u8,
    energy_score: f64,
}

/// Greedy constraint scheduler over one user's availability.
pub struct ConstraintScheduler<'a> {
    profile: &'a WorkingHoursProfile,
    energy: &'a dyn EnergyModel,
}

impl<'a> ConstraintScheduler<'a> {
    pub fn new(profile: &'a WorkingHoursProfile, energy: &'a dyn EnergyModel) -> Self {
        Self { profile, energy }
    }

    /// Place every open task that needs a slot.
    ///
    /// `tasks` is the run's snapshot of all the user's tasks (completed ones
    /// included, they satisfy dependencies). `availability` must already
    /// exclude events and fixed slots; placements consume it in place.
    pub fn schedule(
        &self,
        tasks: &[Task],
        availability: &mut Availability,
        range: &Interval,
    ) -> ScheduleOutcome {
        let mut outcome = ScheduleOutcome::default();

        let open: Vec<Task> = tasks.iter().filter(|t| t.is_open()).cloned().collect();
        let graph = DependencyGraph::build(&open);
        let topo = graph.topological_order(&open);

        let by_id: HashMap<&str, &Task> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();
        // dependency end times settled so far this run
        let mut placed_ends: HashMap<String, DateTime<Utc>> = HashMap::new();

        for component in &topo.cycles {
            for id in component {
                let task = by_id[id.as_str()];
                if needs_placement(task) {
                    outcome.unplaced.push(Unplaced {
                        task_id: id.clone(),
                        reason: UnplacedReason::CyclicDependency,
                    });
                }
                tracing::debug!(task_id = %id, "excluded from run: dependency cycle");
            }
        }

        let mut deferred: Vec<String> = Vec::new();
        for id in &topo.order {
            let task = by_id[id.as_str()];
            if !needs_placement(task) {
                continue;
            }
            match self.try_place(task, &by_id, &placed_ends, availability, range, &[]) {
                Ok(placement) => {
                    availability.consume(&placement.slot);
                    placed_ends.insert(id.clone(), placement.slot.end);
                    outcome.placements.push(placement);
                }
                Err(UnplacedReason::DependencyUnsatisfied) => deferred.push(id.clone()),
                Err(reason) => outcome.unplaced.push(Unplaced {
                    task_id: id.clone(),
                    reason,
                }),
            }
        }

        // One retry for tasks gated on predecessors that resolved later.
        for id in deferred {
            let task = by_id[id.as_str()];
            match self.try_place(task, &by_id, &placed_ends, availability, range, &[]) {
                Ok(placement) => {
                    availability.consume(&placement.slot);
                    placed_ends.insert(id.clone(), placement.slot.end);
                    outcome.placements.push(placement);
                }
                Err(reason) => outcome.unplaced.push(Unplaced { task_id: id, reason }),
            }
        }

        outcome
    }

    /// Place one task against current availability, e.g. after a rejection.
    ///
    /// `excluded` slots (such as a just-rejected interval) are never offered
    /// again. Succeeds only if every dependency is already settled.
    pub fn place_single(
        &self,
        task: &Task,
        tasks: &[Task],
        availability: &mut Availability,
        range: &Interval,
        excluded: &[Interval],
    ) -> Result<Placement, UnplacedReason> {
        let by_id: HashMap<&str, &Task> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();
        let placement = self.try_place(task, &by_id, &HashMap::new(), availability, range, excluded)?;
        availability.consume(&placement.slot);
        Ok(placement)
    }

    fn try_place(
        &self,
        task: &Task,
        by_id: &HashMap<&str, &Task>,
        placed_ends: &HashMap<String, DateTime<Utc>>,
        availability: &Availability,
        range: &Interval,
        excluded: &[Interval],
    ) -> Result<Placement, UnplacedReason> {
        let earliest_allowed = dependency_floor(task, by_id, placed_ends)?;
        let duration = Duration::minutes(task.duration_minutes as i64);

        let deadline = task.kind.deadline();
        if let Some(due) = deadline {
            if due <= range.start {
                return Err(UnplacedReason::DeadlineViolated);
            }
        }

        let mut candidates: Vec<Candidate> = Vec::new();
        for day in availability.days() {
            for free in &day.free {
                for start in candidate_starts(free, day.date, earliest_allowed, excluded) {
                    let end = start + duration;
                    if end > free.end {
                        continue;
                    }
                    if let Some(due) = deadline {
                        if end > due {
                            continue;
                        }
                    }
                    let slot = Interval::new(start, end);
                    if excluded.iter().any(|ex| ex.overlaps(&slot)) {
                        continue;
                    }
                    candidates.push(self.score_candidate(task, slot));
                }
            }
        }

        if candidates.is_empty() {
            return Err(UnplacedReason::NoFit);
        }

        let winner = if deadline.is_some() {
            // Earliest fit preserves slack for later deadline tasks.
            candidates
                .into_iter()
                .min_by_key(|c| c.slot.start)
                .expect("non-empty")
        } else {
            // Best energy fit, earliest as tie-break.
            candidates
                .into_iter()
                .max_by(|a, b| {
                    a.score
                        .partial_cmp(&b.score)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| b.slot.start.cmp(&a.slot.start))
                })
                .expect("non-empty")
        };

        let reason = if deadline.is_some() {
            PlacementReason::EarliestFit
        } else if winner.match_score == 2 {
            PlacementReason::EnergyMatch
        } else {
            PlacementReason::BestAvailable
        };

        Ok(Placement {
            task_id: task.id.clone(),
            confidence: confidence(winner.match_score, winner.energy_score),
            slot: winner.slot,
            reason,
        })
    }

    fn score_candidate(&self, task: &Task, slot: Interval) -> Candidate {
        let window = EnergyWindow::from_hour(slot.start.hour());
        let match_score = task.energy.preferred.match_score(window);
        let energy_score = self.energy.score(window);

        let day_energy = self.profile.day(slot.start.date_naive().weekday()).energy;
        let day_fit = if energy_rank(day_energy) >= energy_rank(task.energy.required) {
            1.0
        } else {
            0.0
        };

        Candidate {
            score: match_score as f64 * 10.0 + energy_score * 5.0 + day_fit * 2.0,
            slot,
            match_score,
            energy_score,
        }
    }
}

/// Candidate start times within one free interval.
///
/// The interval's own start (lifted to the dependency floor), the
/// energy-window boundaries it spans so a long interval can host an
/// afternoon or evening placement without splitting first, and the far edge
/// of any excluded span so rejection still leaves the earliest legal start
/// on offer.
fn candidate_starts(
    free: &Interval,
    date: chrono::NaiveDate,
    floor: Option<DateTime<Utc>>,
    excluded: &[Interval],
) -> Vec<DateTime<Utc>> {
    let base = match floor {
        Some(f) => free.start.max(f),
        None => free.start,
    };
    let mut starts = vec![base];
    for boundary_hour in [12u32, 17u32] {
        let boundary = date
            .and_hms_opt(boundary_hour, 0, 0)
            .expect("valid boundary time")
            .and_utc();
        if boundary > base && boundary < free.end {
            starts.push(boundary);
        }
    }
    for ex in excluded {
        if ex.end > base && ex.end < free.end {
            starts.push(ex.end);
        }
    }
    starts.sort();
    starts.dedup();
    starts
}

/// Whether the scheduler is responsible for giving this task a slot.
///
/// `Scheduled`-kind tasks are fixed, accepted tasks keep their slot; both
/// only consume availability.
pub fn needs_placement(task: &Task) -> bool {
    if !task.is_open() {
        return false;
    }
    if matches!(task.kind, TaskKind::Scheduled { .. }) {
        return false;
    }
    task.status != TaskStatus::Scheduled
}

/// Slot end a settled task contributes to its dependents, if any.
fn settled_end(task: &Task, placed_ends: &HashMap<String, DateTime<Utc>>) -> Option<DateTime<Utc>> {
    if let Some(end) = placed_ends.get(&task.id) {
        return Some(*end);
    }
    if let Some(slot) = task.fixed_slot() {
        return Some(slot.end);
    }
    if task.status == TaskStatus::Scheduled {
        return task.assigned_slot.as_ref().map(|s| s.end);
    }
    None
}

/// Earliest start allowed by the task's dependencies.
///
/// Completed predecessors impose no floor. Links to unknown task ids are
/// treated as satisfied (the predecessor was deleted). A predecessor that is
/// neither completed nor settled defers the task.
fn dependency_floor(
    task: &Task,
    by_id: &HashMap<&str, &Task>,
    placed_ends: &HashMap<String, DateTime<Utc>>,
) -> Result<Option<DateTime<Utc>>, UnplacedReason> {
    let mut floor: Option<DateTime<Utc>> = None;
    for dep_id in &task.depends_on {
        if dep_id == &task.id {
            continue;
        }
        let Some(dep) = by_id.get(dep_id.as_str()) else {
            continue;
        };
        if dep.status == TaskStatus::Completed {
            continue;
        }
        match settled_end(dep, placed_ends) {
            Some(end) => floor = Some(floor.map_or(end, |f: DateTime<Utc>| f.max(end))),
            None => return Err(UnplacedReason::DependencyUnsatisfied),
        }
    }
    Ok(floor)
}

fn energy_rank(level: EnergyLevel) -> u8 {
    match level {
        EnergyLevel::Low => 0,
        EnergyLevel::Medium => 1,
        EnergyLevel::High => 2,
    }
}

/// Confidence estimate for a placement, 0-100.
fn confidence(match_score: u8, energy_score: f64) -> u8 {
    let score = 50 + u16::from(match_score) * 15 + (energy_score * 20.0) as u16;
    score.min(100) as u8
}
