use clap::Subcommand;
use pomolog_core::{Database, FocusRating};

#[derive(Subcommand)]
pub enum SessionAction {
    /// List stored sessions, oldest first
    List,
    /// Show one stored session
    Show { id: i64 },
    /// Correct a stored session
    Update {
        id: i64,
        /// Elapsed minutes; the start time moves, the end time stays
        #[arg(long)]
        minutes: Option<f64>,
        /// Focus rating (0-5)
        #[arg(long)]
        rating: Option<u8>,
        /// Category label
        #[arg(long)]
        category: Option<String>,
    },
    /// Delete a stored session
    Delete { id: i64 },
}

pub fn run(action: SessionAction) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open()?;

    match action {
        SessionAction::List => {
            let sessions = db.all_sessions()?;
            println!("{}", serde_json::to_string_pretty(&sessions)?);
        }
        SessionAction::Show { id } => {
            let session = db.get_session(id)?;
            println!("{}", serde_json::to_string_pretty(&session)?);
        }
        SessionAction::Update {
            id,
            minutes,
            rating,
            category,
        } => {
            let mut session = db.get_session(id)?;
            let record = &mut session.record;
            if let Some(minutes) = minutes {
                record.set_elapsed_minutes(minutes)?;
            }
            if let Some(rating) = rating {
                record.focus_rating = FocusRating::new(rating)?;
            }
            if let Some(category) = category {
                record.category = category;
            }
            record.validate()?;
            db.update_session(id, record)?;
            println!("{}", serde_json::to_string_pretty(&session)?);
        }
        SessionAction::Delete { id } => {
            db.delete_session(id)?;
            println!("Session {id} deleted");
        }
    }
    Ok(())
}
