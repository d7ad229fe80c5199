//! Foreground tick loop.

use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use countdeck_core::storage::Database;
use countdeck_core::{
    Config, EffectSink, Event, Filtered, LogNotifier, MemoryStore, Repository, TickScheduler,
    TimerRepository, TimerService,
};
use tokio::sync::watch;

use super::CommandResult;

#[derive(Args)]
pub struct RunArgs {
    /// Stop after this many ticks instead of waiting for Ctrl-C
    #[arg(long)]
    ticks: Option<u64>,
    /// Override scheduler.tick_interval_ms
    #[arg(long)]
    interval_ms: Option<u64>,
    /// Count down a copy of the stored timers without writing anything back
    #[arg(long)]
    ephemeral: bool,
    /// Print effects as JSON lines
    #[arg(long)]
    json: bool,
}

/// Prints alerts on stdout.
struct StdoutAlerts {
    json: bool,
}

impl EffectSink for StdoutAlerts {
    fn deliver(&self, event: &Event) {
        if self.json {
            match serde_json::to_string(event) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::error!(error = %e, "could not encode event"),
            }
        } else {
            println!("{}", event.message());
        }
    }
}

pub fn run(args: RunArgs) -> CommandResult {
    let config = Config::load()?;
    let mut period = config.scheduler.tick_interval();
    if let Some(ms) = args.interval_ms {
        period = Duration::from_millis(ms.max(1));
    }

    let sink = Filtered::new(StdoutAlerts { json: args.json }, config.notifications.clone());
    let db = Database::open()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let fired = if args.ephemeral {
        let snapshot = db.load_timers()?.timers;
        let service = TimerService::open(MemoryStore::with_timers(snapshot))?.with_sink(sink);
        runtime.block_on(drive(service, period, args.ticks))?
    } else {
        let service = TimerService::open(db)?.with_sink(sink);
        for issue in service.load_issues() {
            eprintln!("warning: {issue}");
        }
        runtime.block_on(drive(service, period, args.ticks))?
    };

    eprintln!("Stopped after {fired} ticks");
    Ok(())
}

async fn drive<R: Repository + 'static>(
    mut service: TimerService<R>,
    period: Duration,
    limit: Option<u64>,
) -> Result<u64, Box<dyn std::error::Error>> {
    service.add_sink(Box::new(LogNotifier));
    let service = Arc::new(service);
    let running = service.timers().iter().filter(|t| t.is_running()).count();
    eprintln!("Ticking every {period:?} ({running} running timers), Ctrl-C to stop");

    let mut scheduler = TickScheduler::new(period);
    scheduler.start(Arc::clone(&service));

    let mut ticks = scheduler.ticks();
    tokio::select! {
        res = tokio::signal::ctrl_c() => res?,
        _ = wait_ticks(&mut ticks, limit) => {}
    }

    Ok(scheduler.stop().await.unwrap_or(0))
}

async fn wait_ticks(ticks: &mut watch::Receiver<u64>, limit: Option<u64>) {
    match limit {
        Some(n) => {
            let _ = ticks.wait_for(|fired| *fired >= n).await;
        }
        None => std::future::pending::<()>().await,
    }
}
