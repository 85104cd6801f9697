//! Task management commands for CLI.

use chrono::{DateTime, Duration, Utc};
use clap::Subcommand;
use dayflow_core::{
    CompletionSample, EnergyLevel, EnergyWindow, PlannerDb, Priority, Task, TaskKind, TaskStatus,
    TaskStore,
};

#[derive(Subcommand)]
pub enum TaskAction {
    /// Create a new task
    Create {
        /// Task title
        title: String,
        /// Task description
        #[arg(long)]
        description: Option<String>,
        /// Task kind: scheduled, deadline, flexible, habit, normal, exercise, long-term
        #[arg(long, default_value = "normal")]
        kind: String,
        /// Fixed start time (RFC3339), required for kind=scheduled
        #[arg(long)]
        at: Option<String>,
        /// Due date (RFC3339), required for kind=deadline
        #[arg(long)]
        due: Option<String>,
        /// Duration in minutes (default: 30)
        #[arg(long, default_value = "30")]
        duration: u32,
        /// Priority: low, medium, high
        #[arg(long, default_value = "medium")]
        priority: String,
        /// Comma-separated predecessor task ids
        #[arg(long)]
        depends_on: Option<String>,
        /// Required energy level: low, medium, high
        #[arg(long)]
        energy: Option<String>,
        /// Preferred time window: morning, afternoon, evening
        #[arg(long)]
        window: Option<String>,
        /// Comma-separated tags
        #[arg(long)]
        tags: Option<String>,
        /// Owning user id
        #[arg(long, default_value = "default")]
        user: String,
    },
    /// List tasks
    List {
        /// Owning user id
        #[arg(long, default_value = "default")]
        user: String,
        /// Filter by status (todo, in_progress, completed, pending, scheduled)
        #[arg(long)]
        status: Option<String>,
    },
    /// Get task details
    Get {
        /// Task ID
        id: String,
    },
    /// Update a task
    Update {
        /// Task ID
        id: String,
        /// New title
        #[arg(long)]
        title: Option<String>,
        /// New description
        #[arg(long)]
        description: Option<String>,
        /// New duration in minutes
        #[arg(long)]
        duration: Option<u32>,
        /// New priority
        #[arg(long)]
        priority: Option<String>,
        /// Comma-separated predecessor task ids (replaces the list)
        #[arg(long)]
        depends_on: Option<String>,
        /// Comma-separated tags (replaces the list)
        #[arg(long)]
        tags: Option<String>,
    },
    /// Mark a task completed, recording a completion sample
    Complete {
        /// Task ID
        id: String,
        /// Self-assessed productivity, 1 (worst) to 5 (best)
        #[arg(long)]
        productivity: Option<u8>,
    },
}

fn parse_priority(value: &str) -> Result<Priority, String> {
    match value {
        "low" => Ok(Priority::Low),
        "medium" => Ok(Priority::Medium),
        "high" => Ok(Priority::High),
        other => Err(format!("unknown priority: {other}")),
    }
}

fn parse_datetime(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("invalid datetime '{value}': {e}"))
}

fn parse_kind(
    kind: &str,
    at: Option<&str>,
    due: Option<&str>,
) -> Result<TaskKind, Box<dyn std::error::Error>> {
    Ok(match kind {
        "scheduled" => TaskKind::Scheduled {
            start_at: parse_datetime(at.ok_or("kind=scheduled requires --at")?)?,
        },
        "deadline" => TaskKind::Deadline {
            due_at: parse_datetime(due.ok_or("kind=deadline requires --due")?)?,
        },
        "flexible" => TaskKind::Flexible,
        "habit" => TaskKind::Habit,
        "normal" => TaskKind::Normal,
        "exercise" => TaskKind::Exercise,
        "long-term" | "long_term" => TaskKind::LongTerm,
        other => return Err(format!("unknown kind: {other}").into()),
    })
}

fn split_csv(value: &str) -> Vec<String> {
    value.split(',').map(|s| s.trim().to_string()).collect()
}

pub fn run(action: TaskAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = PlannerDb::open()?;

    match action {
        TaskAction::Create {
            title,
            description,
            kind,
            at,
            due,
            duration,
            priority,
            depends_on,
            energy,
            window,
            tags,
            user,
        } => {
            let kind = parse_kind(&kind, at.as_deref(), due.as_deref())?;
            let mut task = Task::new(&user, &title, kind, duration);
            task.description = description;
            task.priority = parse_priority(&priority)?;
            if let Some(d) = depends_on {
                task.depends_on = split_csv(&d);
            }
            if let Some(e) = energy {
                task.energy.required = match e.as_str() {
                    "low" => EnergyLevel::Low,
                    "medium" => EnergyLevel::Medium,
                    "high" => EnergyLevel::High,
                    other => return Err(format!("unknown energy level: {other}").into()),
                };
            }
            if let Some(w) = window {
                task.energy.preferred = match w.as_str() {
                    "morning" => EnergyWindow::Morning,
                    "afternoon" => EnergyWindow::Afternoon,
                    "evening" => EnergyWindow::Evening,
                    other => return Err(format!("unknown window: {other}").into()),
                };
            }
            if let Some(t) = tags {
                task.tags = split_csv(&t);
            }
            task.validate()?;
            db.create_task(&task)?;
            println!("Task created: {}", task.id);
            println!("{}", serde_json::to_string_pretty(&task)?);
        }
        TaskAction::List { user, status } => {
            let all_tasks = db.tasks_for(&user)?;
            let filtered: Vec<_> = all_tasks
                .into_iter()
                .filter(|task| match status.as_deref() {
                    Some(s) => format!("{:?}", task.status).to_lowercase() == s.replace('_', ""),
                    None => true,
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&filtered)?);
        }
        TaskAction::Get { id } => match db.get_task(&id)? {
            Some(task) => println!("{}", serde_json::to_string_pretty(&task)?),
            None => println!("Task not found: {id}"),
        },
        TaskAction::Update {
            id,
            title,
            description,
            duration,
            priority,
            depends_on,
            tags,
        } => {
            let mut task = db.get_task(&id)?.ok_or(format!("Task not found: {id}"))?;

            if let Some(t) = title {
                task.title = t;
            }
            if let Some(d) = description {
                task.description = Some(d);
            }
            if let Some(d) = duration {
                task.duration_minutes = d;
            }
            if let Some(p) = priority {
                task.priority = parse_priority(&p)?;
            }
            if let Some(d) = depends_on {
                task.depends_on = split_csv(&d);
            }
            if let Some(t) = tags {
                task.tags = split_csv(&t);
            }
            task.validate()?;
            task.updated_at = Utc::now();
            db.update_task(&task)?;
            println!("{}", serde_json::to_string_pretty(&task)?);
        }
        TaskAction::Complete { id, productivity } => {
            let mut task = db.get_task(&id)?.ok_or(format!("Task not found: {id}"))?;

            let now = Utc::now();
            let sample = CompletionSample {
                scheduled_start: task.assigned_slot.as_ref().map(|s| s.start),
                scheduled_end: task.assigned_slot.as_ref().map(|s| s.end),
                actual_start: now - Duration::minutes(task.duration_minutes as i64),
                actual_end: now,
                energy_reported: None,
                productivity,
            };
            task.completion_history.push(sample);
            task.status = TaskStatus::Completed;
            task.updated_at = now;
            db.update_task(&task)?;
            println!("Task completed: {id}");
        }
    }

    Ok(())
}
