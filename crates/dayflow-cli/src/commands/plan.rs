//! Schedule planning commands for CLI.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use clap::Subcommand;
use dayflow_core::{
    Config, NotificationKind, Notifier, Planner, PlannerDb, ScheduleStore, Task, TaskStore,
};

#[derive(Subcommand)]
pub enum PlanAction {
    /// Generate a schedule over the coming days
    Run {
        /// Range start (RFC3339, default: now)
        #[arg(long)]
        from: Option<String>,
        /// Days to plan ahead (default: from config)
        #[arg(long)]
        days: Option<u32>,
        /// User id
        #[arg(long, default_value = "default")]
        user: String,
    },
    /// Show a stored planning result
    Show {
        /// Schedule ID
        id: String,
    },
    /// Accept a suggested slot
    Accept {
        /// Schedule ID
        #[arg(long)]
        schedule: String,
        /// Task ID
        #[arg(long)]
        task: String,
    },
    /// Reject a suggested slot and ask for an alternative
    Reject {
        /// Schedule ID
        #[arg(long)]
        schedule: String,
        /// Task ID
        #[arg(long)]
        task: String,
    },
}

/// Notifier that surfaces requests on the log; a delivery channel can hang
/// off the same trait later.
struct LogNotifier {
    enabled: bool,
    reminder_lead: Duration,
    deadline_lead: Duration,
}

impl LogNotifier {
    fn from_config(config: &Config) -> Self {
        Self {
            enabled: config.notifications.enabled,
            reminder_lead: Duration::minutes(config.notifications.reminder_lead_minutes as i64),
            deadline_lead: Duration::hours(config.notifications.deadline_lead_hours as i64),
        }
    }
}

impl Notifier for LogNotifier {
    fn schedule_notifications(
        &self,
        task: &Task,
        kinds: &[NotificationKind],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if !self.enabled {
            return Ok(());
        }
        let remind_at = task
            .assigned_slot
            .as_ref()
            .map(|slot| slot.start - self.reminder_lead);
        let warn_at = task.kind.deadline().map(|due| due - self.deadline_lead);
        tracing::info!(
            task_id = %task.id,
            ?kinds,
            ?remind_at,
            ?warn_at,
            "notifications requested"
        );
        Ok(())
    }
}

fn planner(config: &Config) -> Result<(Planner, Arc<PlannerDb>), Box<dyn std::error::Error>> {
    let db = Arc::new(PlannerDb::open()?);
    let planner = Planner::new(
        db.clone(),
        db.clone(),
        db.clone(),
        db.clone(),
        Arc::new(LogNotifier::from_config(config)),
    );
    Ok((planner, db))
}

pub fn run(action: PlanAction, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        PlanAction::Run { from, days, user } => {
            let start = match from {
                Some(s) => DateTime::parse_from_rfc3339(&s)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| format!("invalid datetime '{s}': {e}"))?,
                None => Utc::now(),
            };
            let days = days.unwrap_or(config.planner.lookahead_days);
            let end = start + Duration::days(days as i64);

            let (planner, _) = planner(config)?;
            let result = planner.generate_schedule(&user, start, end)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        PlanAction::Show { id } => {
            let db = PlannerDb::open()?;
            match db.get_result(&id)? {
                Some(result) => println!("{}", serde_json::to_string_pretty(&result)?),
                None => println!("Schedule not found: {id}"),
            }
        }
        PlanAction::Accept { schedule, task } => {
            let (planner, db) = planner(config)?;
            planner.accept_suggested_time(&task, &schedule)?;
            if let Some(task) = TaskStore::get_task(db.as_ref(), &task)? {
                println!("{}", serde_json::to_string_pretty(&task)?);
            }
        }
        PlanAction::Reject { schedule, task } => {
            let (planner, _) = planner(config)?;
            match planner.reject_suggested_time(&task, &schedule)? {
                Some(placement) => {
                    println!("Re-placed:");
                    println!("{}", serde_json::to_string_pretty(&placement)?);
                }
                None => println!("No alternative slot available; the task was released."),
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use dayflow_core::TaskKind;

    #[test]
    fn log_notifier_computes_leads_for_deadline_tasks() {
        let due = Utc.with_ymd_and_hms(2025, 5, 5, 12, 0, 0).unwrap();
        let mut task = Task::new("u1", "write report", TaskKind::Deadline { due_at: due }, 60);
        task.apply_slot(
            Some(dayflow_core::Interval::new(
                Utc.with_ymd_and_hms(2025, 5, 5, 9, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2025, 5, 5, 10, 0, 0).unwrap(),
            )),
            Utc::now(),
        );
        let notifier = LogNotifier {
            enabled: true,
            reminder_lead: Duration::minutes(15),
            deadline_lead: Duration::hours(24),
        };
        notifier
            .schedule_notifications(&task, &[NotificationKind::Deadline])
            .unwrap();
    }

    #[test]
    fn disabled_notifier_is_a_no_op() {
        let task = Task::new("u1", "stretch", TaskKind::Flexible, 15);
        let notifier = LogNotifier {
            enabled: false,
            reminder_lead: Duration::minutes(15),
            deadline_lead: Duration::hours(24),
        };
        notifier
            .schedule_notifications(&task, &[NotificationKind::Suggestion])
            .unwrap();
    }
}
