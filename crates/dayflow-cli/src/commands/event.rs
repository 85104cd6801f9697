//! Calendar event management commands for CLI.

use chrono::{DateTime, Utc};
use clap::Subcommand;
use dayflow_core::{CalendarEvent, EventStore, Interval, Participant, PlannerDb, RepeatRule};

#[derive(Subcommand)]
pub enum EventAction {
    /// Create a new calendar event
    Create {
        /// Event title
        title: String,
        /// Start time (RFC3339)
        #[arg(long)]
        start: String,
        /// End time (RFC3339)
        #[arg(long)]
        end: String,
        /// Block the whole day
        #[arg(long)]
        all_day: bool,
        /// Recurrence: none, daily, weekly, monthly, yearly
        #[arg(long, default_value = "none")]
        repeat: String,
        /// Comma-separated participant emails
        #[arg(long)]
        participants: Option<String>,
        /// Location
        #[arg(long)]
        location: Option<String>,
        /// Description
        #[arg(long)]
        description: Option<String>,
        /// Owning user id
        #[arg(long, default_value = "default")]
        user: String,
    },
    /// List events overlapping a range
    List {
        /// Range start (RFC3339)
        #[arg(long)]
        from: String,
        /// Range end (RFC3339)
        #[arg(long)]
        to: String,
        /// Owning user id
        #[arg(long, default_value = "default")]
        user: String,
    },
}

fn parse_datetime(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("invalid datetime '{value}': {e}"))
}

fn parse_repeat(value: &str) -> Result<RepeatRule, String> {
    match value {
        "none" => Ok(RepeatRule::None),
        "daily" => Ok(RepeatRule::Daily),
        "weekly" => Ok(RepeatRule::Weekly),
        "monthly" => Ok(RepeatRule::Monthly),
        "yearly" => Ok(RepeatRule::Yearly),
        other => Err(format!("unknown repeat rule: {other}")),
    }
}

pub fn run(action: EventAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = PlannerDb::open()?;

    match action {
        EventAction::Create {
            title,
            start,
            end,
            all_day,
            repeat,
            participants,
            location,
            description,
            user,
        } => {
            let mut event =
                CalendarEvent::new(&user, &title, parse_datetime(&start)?, parse_datetime(&end)?)?;
            event.all_day = all_day;
            event.repeat = parse_repeat(&repeat)?;
            if let Some(p) = participants {
                event.participants = p
                    .split(',')
                    .map(|email| Participant {
                        email: email.trim().to_string(),
                        status: Default::default(),
                    })
                    .collect();
            }
            event.location = location;
            event.description = description;
            db.create_event(&event)?;
            println!("Event created: {}", event.id);
            println!("{}", serde_json::to_string_pretty(&event)?);
        }
        EventAction::List { from, to, user } => {
            let range = Interval::new(parse_datetime(&from)?, parse_datetime(&to)?);
            let events = db.events_for(&user, &range)?;
            println!("{}", serde_json::to_string_pretty(&events)?);
        }
    }

    Ok(())
}
