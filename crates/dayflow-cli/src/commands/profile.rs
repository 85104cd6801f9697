//! Working-hours profile commands for CLI.

use clap::Subcommand;
use dayflow_core::{DayHours, EnergyLevel, PlannerDb, UserStore, WorkingHoursProfile};

#[derive(Subcommand)]
pub enum ProfileAction {
    /// Show the working-hours profile
    Show {
        /// User id
        #[arg(long, default_value = "default")]
        user: String,
    },
    /// Set working hours for one weekday
    SetDay {
        /// Weekday: mon, tue, wed, thu, fri, sat, sun
        day: String,
        /// Start time (HH:mm)
        #[arg(long, default_value = "09:00")]
        start: String,
        /// End time (HH:mm)
        #[arg(long, default_value = "17:00")]
        end: String,
        /// Mark the day as non-working
        #[arg(long)]
        off: bool,
        /// Energy label for the day: low, medium, high
        #[arg(long, default_value = "medium")]
        energy: String,
        /// User id
        #[arg(long, default_value = "default")]
        user: String,
    },
    /// Reset to the stock 09:00-17:00 weekday profile
    Reset {
        /// User id
        #[arg(long, default_value = "default")]
        user: String,
    },
}

fn parse_weekday(value: &str) -> Result<chrono::Weekday, String> {
    match value {
        "mon" => Ok(chrono::Weekday::Mon),
        "tue" => Ok(chrono::Weekday::Tue),
        "wed" => Ok(chrono::Weekday::Wed),
        "thu" => Ok(chrono::Weekday::Thu),
        "fri" => Ok(chrono::Weekday::Fri),
        "sat" => Ok(chrono::Weekday::Sat),
        "sun" => Ok(chrono::Weekday::Sun),
        other => Err(format!("unknown weekday: {other}")),
    }
}

fn parse_energy(value: &str) -> Result<EnergyLevel, String> {
    match value {
        "low" => Ok(EnergyLevel::Low),
        "medium" => Ok(EnergyLevel::Medium),
        "high" => Ok(EnergyLevel::High),
        other => Err(format!("unknown energy level: {other}")),
    }
}

pub fn run(action: ProfileAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = PlannerDb::open()?;

    match action {
        ProfileAction::Show { user } => match db.working_hours(&user)? {
            Some(profile) => println!("{}", serde_json::to_string_pretty(&profile)?),
            None => println!("No profile for user: {user}"),
        },
        ProfileAction::SetDay {
            day,
            start,
            end,
            off,
            energy,
            user,
        } => {
            let weekday = parse_weekday(&day)?;
            let hours = DayHours::from_hhmm(&start, &end, !off, parse_energy(&energy)?)?;
            let mut profile = db.working_hours(&user)?.unwrap_or_default();
            profile.set_day(weekday, hours);
            db.set_working_hours(&user, &profile)?;
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
        ProfileAction::Reset { user } => {
            let profile = WorkingHoursProfile::default();
            db.set_working_hours(&user, &profile)?;
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
    }

    Ok(())
}
