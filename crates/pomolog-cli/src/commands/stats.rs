use chrono::{Local, NaiveDate};
use clap::Subcommand;
use pomolog_core::stats::{daily_improvement, daily_totals, DailyImprovement};
use pomolog_core::{Database, SessionStore};
use serde::Serialize;

#[derive(Subcommand)]
pub enum StatsAction {
    /// Work minutes per day, oldest first
    Totals {
        /// Number of days ending today
        #[arg(long, default_value = "7")]
        days: u32,
    },
    /// Today's Work volume against the last earlier day with any Work
    Improvement,
}

#[derive(Serialize)]
struct ImprovementReport {
    today: NaiveDate,
    #[serde(flatten)]
    improvement: DailyImprovement,
}

pub fn run(action: StatsAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;
    let sessions = db.fetch_all_sessions()?;
    let records = sessions.iter().map(|s| &s.record);
    let today = Local::now().date_naive();

    match action {
        StatsAction::Totals { days } => {
            let totals = daily_totals(records, today, days, &Local);
            println!("{}", serde_json::to_string_pretty(&totals)?);
        }
        StatsAction::Improvement => {
            let report = ImprovementReport {
                today,
                improvement: daily_improvement(records, today, &Local),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}
