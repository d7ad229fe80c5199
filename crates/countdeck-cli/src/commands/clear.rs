use super::{open_service, require_committed, CommandResult};

/// Remove every timer and the whole history log.
pub fn run(yes: bool) -> CommandResult {
    if !yes {
        return Err("refusing to delete all timers and history without --yes".into());
    }
    let service = open_service()?;
    let removed = service.timers().len();
    require_committed(service.clear_all())?;
    println!("Cleared {removed} timers and the history log");
    Ok(())
}
