//! Timer commands for CLI.

use clap::Subcommand;
use countdeck_core::timer::RejectReason;
use countdeck_core::{Category, Config, CoreError, NewTimer, Timer, TimerId, TransitionOutcome};

use super::{format_secs, open_service, require_committed, CommandResult};

#[derive(Subcommand)]
pub enum TimerAction {
    /// Add a new timer (starts paused)
    Add {
        /// Timer name
        name: String,
        /// Duration in seconds
        #[arg(long, allow_negative_numbers = true)]
        duration: i64,
        /// Workout, Study, Break or Other (default from config)
        #[arg(long)]
        category: Option<Category>,
        /// Alert once when half of the duration has elapsed
        #[arg(long)]
        halfway_alert: bool,
    },
    /// List timers in insertion order
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print one timer as JSON
    Show {
        /// Timer ID
        id: String,
    },
    /// Start (resume) a timer
    Start {
        /// Timer ID
        id: String,
    },
    /// Pause a running timer
    Pause {
        /// Timer ID
        id: String,
    },
    /// Reset a timer to its full duration
    Reset {
        /// Timer ID
        id: String,
    },
}

pub fn run(action: TimerAction) -> CommandResult {
    let service = open_service()?;

    match action {
        TimerAction::Add {
            name,
            duration,
            category,
            halfway_alert,
        } => {
            let defaults = Config::load()?.timers;
            let new_timer = NewTimer::new(
                name,
                duration,
                category.unwrap_or(defaults.default_category),
            )
            .with_halfway_alert(halfway_alert || defaults.default_halfway_alert);
            let applied = service.create(new_timer)?;
            require_committed(applied.durability)?;
            println!("Timer created: {}", applied.value.id);
            println!("{}", serde_json::to_string_pretty(&applied.value)?);
        }
        TimerAction::List { json } => {
            let timers = service.timers();
            if json {
                println!("{}", serde_json::to_string_pretty(&timers)?);
            } else if timers.is_empty() {
                println!("No timers");
            } else {
                for timer in &timers {
                    println!("{}", summary_line(timer));
                }
            }
        }
        TimerAction::Show { id } => {
            let timer = service.require(&TimerId::from(id))?;
            println!("{}", serde_json::to_string_pretty(&timer)?);
        }
        TimerAction::Start { id } => {
            let id = TimerId::from(id);
            let applied = service.start(&id);
            report(&id, applied.value, "started", "already running")?;
            require_committed(applied.durability)?;
        }
        TimerAction::Pause { id } => {
            let id = TimerId::from(id);
            let applied = service.pause(&id);
            report(&id, applied.value, "paused", "already paused")?;
            require_committed(applied.durability)?;
        }
        TimerAction::Reset { id } => {
            let id = TimerId::from(id);
            let applied = service.reset(&id);
            report(&id, applied.value, "reset", "already at full duration")?;
            require_committed(applied.durability)?;
        }
    }
    Ok(())
}

fn report(
    id: &TimerId,
    outcome: TransitionOutcome,
    done: &str,
    unchanged: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    match outcome {
        TransitionOutcome::Applied => println!("Timer {done}: {id}"),
        TransitionOutcome::Unchanged => println!("Timer {unchanged}: {id}"),
        TransitionOutcome::NotFound => return Err(CoreError::NotFound(id.clone()).into()),
        TransitionOutcome::Rejected(RejectReason::Completed) => {
            return Err(format!("Timer '{id}' is completed; reset it first").into())
        }
    }
    Ok(())
}

pub fn summary_line(timer: &Timer) -> String {
    let alert = match (timer.halfway_alert_enabled, timer.halfway_alert_triggered) {
        (true, true) => "  [halfway]",
        (true, false) => "  [alert]",
        _ => "",
    };
    let done = ((1.0 - timer.progress()) * 100.0).round();
    format!(
        "{}  {:<20} {:<8} {:<10} {} / {} ({done:>3}%){}",
        timer.id,
        timer.name,
        timer.category.as_str(),
        timer.status.to_string(),
        format_secs(timer.remaining_time),
        format_secs(timer.duration),
        alert
    )
}
