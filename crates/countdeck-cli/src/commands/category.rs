//! Category-scoped commands for CLI.

use clap::Subcommand;
use countdeck_core::{BulkAction, Category};

use super::timer::summary_line;
use super::{open_service, require_committed, CommandResult};

#[derive(Subcommand)]
pub enum CategoryAction {
    /// List timers grouped by category
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start every timer in a category
    StartAll { category: Category },
    /// Pause every timer in a category
    PauseAll { category: Category },
    /// Reset every timer in a category
    ResetAll { category: Category },
}

pub fn run(action: CategoryAction) -> CommandResult {
    let service = open_service()?;

    let (category, bulk) = match action {
        CategoryAction::List { json } => {
            let groups = service.grouped();
            if json {
                println!("{}", serde_json::to_string_pretty(&groups)?);
            } else {
                for (category, timers) in &groups {
                    println!("{category} ({})", timers.len());
                    for timer in timers {
                        println!("  {}", summary_line(timer));
                    }
                }
            }
            return Ok(());
        }
        CategoryAction::StartAll { category } => (category, BulkAction::StartAll),
        CategoryAction::PauseAll { category } => (category, BulkAction::PauseAll),
        CategoryAction::ResetAll { category } => (category, BulkAction::ResetAll),
    };

    let applied = service.bulk_apply(category, bulk);
    require_committed(applied.durability)?;
    let outcome = applied.value;

    let verb = match bulk {
        BulkAction::StartAll => "Started",
        BulkAction::PauseAll => "Paused",
        BulkAction::ResetAll => "Reset",
    };
    println!(
        "{verb} {} of {} {category} timers",
        outcome.applied.len(),
        outcome.matched()
    );
    if !outcome.rejected.is_empty() {
        println!(
            "Skipped {} completed timers (reset them first)",
            outcome.rejected.len()
        );
    }
    Ok(())
}
