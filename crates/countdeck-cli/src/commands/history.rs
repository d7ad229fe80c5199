use chrono::Local;
use clap::Subcommand;

use super::{format_secs, open_service, CommandResult};

#[derive(Subcommand)]
pub enum HistoryAction {
    /// List completed timers, newest first
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Dump the whole history log as JSON
    Export,
}

pub fn run(action: HistoryAction) -> CommandResult {
    let service = open_service()?;
    let history = service.history()?;

    match action {
        HistoryAction::List { json: false } => {
            if history.is_empty() {
                println!("No completed timers");
            }
            for entry in &history {
                let when = entry.completion_time.with_timezone(&Local);
                let category = entry.category.map(|c| c.as_str()).unwrap_or("-");
                let duration = entry.duration.map(format_secs).unwrap_or_else(|| "-".into());
                println!(
                    "{}  {:<20} {:<8} {}",
                    when.format("%Y-%m-%d %H:%M:%S"),
                    entry.name,
                    category,
                    duration
                );
            }
        }
        HistoryAction::List { json: true } | HistoryAction::Export => {
            println!("{}", serde_json::to_string_pretty(&history)?);
        }
    }
    Ok(())
}
