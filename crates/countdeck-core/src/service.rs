//! Single-writer timer service.
//!
//! Every mutation (user transition, bulk action, tick) goes through one mutex
//! and one store transaction: read the latest snapshot, run the pure engine
//! function, write the result back. Ticks and user actions therefore cannot
//! lose each other's updates, in this process or in another one sharing the
//! store.
//!
//! If a write fails the in-memory collection stays authoritative for the rest
//! of the process lifetime. The service stops re-reading the store until a
//! later write succeeds, so a stale on-disk copy never overwrites newer state.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use tracing::{debug, error, warn};

use crate::error::{CoreError, DataIntegrityError, PersistenceError, Result};
use crate::events::Event;
use crate::history::HistoryEntry;
use crate::notify::EffectSink;
use crate::storage::{HistoryRepository, LoadReport, TimerRepository};
use crate::timer::{
    bulk_apply, engine, group_by_category, BulkAction, BulkOutcome, Category, NewTimer, Timer,
    TimerId, TransitionOutcome,
};

/// Storage backend accepted by [`TimerService`].
pub trait Repository: TimerRepository + HistoryRepository + Send {}

impl<T: TimerRepository + HistoryRepository + Send> Repository for T {}

/// Whether a mutation reached durable storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Durability {
    Committed,
    /// Applied in memory only.
    NotCommitted(PersistenceError),
}

impl Durability {
    pub fn is_committed(&self) -> bool {
        matches!(self, Durability::Committed)
    }
}

/// Value of a mutation plus its persistence status.
#[derive(Debug, Clone, PartialEq)]
pub struct Applied<T> {
    pub value: T,
    pub durability: Durability,
}

/// What one scheduled tick did.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub events: Vec<Event>,
    /// Running timers skipped because their record is unusable.
    pub faults: Vec<DataIntegrityError>,
    /// History entries written for timers that completed on this tick.
    pub history: Vec<HistoryEntry>,
    /// History appends that failed.
    pub history_errors: Vec<PersistenceError>,
    pub durability: Durability,
}

struct Inner<R> {
    repo: R,
    timers: Vec<Timer>,
    /// Memory is ahead of the store after a failed write.
    dirty: bool,
}

impl<R: Repository> Inner<R> {
    /// Pick up the latest persisted snapshot unless memory is ahead of it.
    fn refresh(&mut self) {
        if self.dirty {
            return;
        }
        match self.repo.load_timers() {
            Ok(report) => {
                for issue in &report.issues {
                    debug!(%issue, "stored timer issue");
                }
                self.timers = report.timers;
            }
            Err(e) => warn!(error = %e, "could not refresh timers, using in-memory copy"),
        }
    }

    /// Run `f` against the latest stored snapshot and write its result in the
    /// same store transaction.
    ///
    /// After a failed write memory is ahead of the store, so `f` runs on the
    /// in-memory copy and that copy is written over the store instead.
    fn update<T>(&mut self, f: impl Fn(&[Timer]) -> (Vec<Timer>, T)) -> (T, Durability) {
        if !self.dirty {
            let mut value = None;
            let timers = &mut self.timers;
            let result = self.repo.update_timers(&mut |report: LoadReport| {
                for issue in &report.issues {
                    debug!(%issue, "stored timer issue");
                }
                let (next, v) = f(&report.timers);
                value = Some(v);
                let changed = next != report.timers;
                *timers = next;
                changed.then(|| timers.clone())
            });

            match (value, result) {
                (Some(value), Ok(())) => return (value, Durability::Committed),
                (Some(value), Err(e)) => {
                    error!(error = %e, "timer store write failed, keeping in-memory state");
                    self.dirty = true;
                    return (value, Durability::NotCommitted(e));
                }
                (None, Err(e)) => {
                    warn!(error = %e, "could not refresh timers, using in-memory copy")
                }
                (None, Ok(())) => {}
            }
        }

        let (next, value) = f(&self.timers);
        (value, self.commit(next))
    }

    fn persist(&mut self) -> Durability {
        match self.repo.save_timers(&self.timers) {
            Ok(()) => {
                self.dirty = false;
                Durability::Committed
            }
            Err(e) => {
                error!(error = %e, "timer store write failed, keeping in-memory state");
                self.dirty = true;
                Durability::NotCommitted(e)
            }
        }
    }

    /// Replace the collection and write it if anything needs writing.
    fn commit(&mut self, next: Vec<Timer>) -> Durability {
        let changed = next != self.timers;
        self.timers = next;
        if changed || self.dirty {
            self.persist()
        } else {
            Durability::Committed
        }
    }
}

/// Owner of the authoritative timer collection.
pub struct TimerService<R> {
    inner: Mutex<Inner<R>>,
    sinks: Vec<Box<dyn EffectSink>>,
    load_issues: Vec<DataIntegrityError>,
}

impl<R: Repository> TimerService<R> {
    /// Load the collection from `repo`.
    ///
    /// # Errors
    /// Fails if the store cannot be read at all. Individual bad records do
    /// not fail the load; they are reported by [`TimerService::load_issues`].
    pub fn open(repo: R) -> Result<Self> {
        let report = repo.load_timers()?;
        for issue in &report.issues {
            warn!(%issue, "stored timer needs attention");
        }
        Ok(Self {
            inner: Mutex::new(Inner {
                repo,
                timers: report.timers,
                dirty: false,
            }),
            sinks: Vec::new(),
            load_issues: report.issues,
        })
    }

    /// Register a consumer for tick effects.
    pub fn with_sink(mut self, sink: impl EffectSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn add_sink(&mut self, sink: Box<dyn EffectSink>) {
        self.sinks.push(sink);
    }

    /// Problems found in the stored collection at startup.
    pub fn load_issues(&self) -> &[DataIntegrityError] {
        &self.load_issues
    }

    fn lock(&self) -> MutexGuard<'_, Inner<R>> {
        // The collection is only ever replaced wholesale, so it is consistent
        // even if a holder panicked.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn mutate<T>(&self, f: impl Fn(&[Timer]) -> (Vec<Timer>, T)) -> Applied<T> {
        let (value, durability) = self.lock().update(f);
        Applied { value, durability }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn timers(&self) -> Vec<Timer> {
        let mut inner = self.lock();
        inner.refresh();
        inner.timers.clone()
    }

    pub fn timer(&self, id: &TimerId) -> Option<Timer> {
        self.timers().into_iter().find(|t| &t.id == id)
    }

    /// Like [`TimerService::timer`] but unknown ids are an error.
    ///
    /// # Errors
    /// Returns [`CoreError::NotFound`] for an unknown id.
    pub fn require(&self, id: &TimerId) -> Result<Timer> {
        self.timer(id).ok_or_else(|| CoreError::NotFound(id.clone()))
    }

    pub fn grouped(&self) -> BTreeMap<Category, Vec<Timer>> {
        group_by_category(&self.timers())
    }

    /// History log, newest first.
    ///
    /// # Errors
    /// Returns an error if the log cannot be read.
    pub fn history(&self) -> Result<Vec<HistoryEntry>, PersistenceError> {
        self.lock().repo.load_history()
    }

    /// True once a write has failed and memory is ahead of the store.
    pub fn is_dirty(&self) -> bool {
        self.lock().dirty
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Validate and append a new timer.
    ///
    /// # Errors
    /// Returns a validation error; nothing is stored in that case.
    pub fn create(&self, new_timer: NewTimer) -> Result<Applied<Timer>> {
        let timer = new_timer.build()?;
        Ok(self.mutate(|timers| {
            let mut next = timers.to_vec();
            next.push(timer.clone());
            (next, timer.clone())
        }))
    }

    pub fn start(&self, id: &TimerId) -> Applied<TransitionOutcome> {
        self.transition(id, engine::start)
    }

    pub fn pause(&self, id: &TimerId) -> Applied<TransitionOutcome> {
        self.transition(id, engine::pause)
    }

    pub fn reset(&self, id: &TimerId) -> Applied<TransitionOutcome> {
        self.transition(id, engine::reset)
    }

    fn transition(
        &self,
        id: &TimerId,
        op: fn(&[Timer], &TimerId) -> engine::Transition,
    ) -> Applied<TransitionOutcome> {
        let applied = self.mutate(|timers| {
            let t = op(timers, id);
            (t.timers, t.outcome)
        });
        match applied.value {
            TransitionOutcome::NotFound => warn!(timer_id = %id, "no such timer"),
            TransitionOutcome::Rejected(reason) => {
                debug!(timer_id = %id, ?reason, "transition rejected")
            }
            _ => {}
        }
        applied
    }

    /// Apply `action` to every timer in `category` and save once.
    pub fn bulk_apply(&self, category: Category, action: BulkAction) -> Applied<BulkOutcome> {
        self.mutate(|timers| {
            let outcome = bulk_apply(timers, category, action);
            (outcome.timers.clone(), outcome)
        })
    }

    /// Advance every running timer by one second, record completions in the
    /// history log, then hand the effects to the registered sinks.
    pub fn tick(&self) -> TickReport {
        let report = {
            let mut inner = self.lock();
            let (outcome, durability) = inner.update(|timers| {
                let outcome = engine::tick(timers);
                (outcome.timers.clone(), outcome)
            });
            for fault in &outcome.faults {
                warn!(%fault, "skipping timer during tick");
            }

            let completed_at = Utc::now();
            let entries: Vec<HistoryEntry> = outcome
                .completed()
                .map(|timer| HistoryEntry::from_completed(timer, completed_at))
                .collect();

            let mut history = Vec::new();
            let mut history_errors = Vec::new();
            for entry in entries {
                match inner.repo.append_history(&entry) {
                    Ok(()) => history.push(entry),
                    Err(e) => {
                        error!(error = %e, entry_id = %entry.id, "history append failed");
                        history_errors.push(e);
                    }
                }
            }

            TickReport {
                events: outcome.events,
                faults: outcome.faults,
                history,
                history_errors,
                durability,
            }
        };

        for event in &report.events {
            for sink in &self.sinks {
                sink.deliver(event);
            }
        }
        report
    }

    /// Remove every timer and wipe the history log.
    pub fn clear_all(&self) -> Durability {
        let mut inner = self.lock();
        let (_, durability) = inner.update(|_| (Vec::new(), ()));
        match inner.repo.clear_history() {
            Ok(()) => durability,
            Err(e) => {
                error!(error = %e, "history clear failed");
                match durability {
                    Durability::Committed => Durability::NotCommitted(e),
                    other => other,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::Recorder;
    use crate::storage::MemoryStore;
    use crate::timer::TimerStatus;

    fn service() -> (TimerService<MemoryStore>, MemoryStore, Recorder) {
        let store = MemoryStore::new();
        let recorder = Recorder::new();
        let service = TimerService::open(store.clone())
            .unwrap()
            .with_sink(recorder.clone());
        (service, store, recorder)
    }

    #[test]
    fn create_persists_and_validates() {
        let (service, store, _) = service();
        let timer = service
            .create(NewTimer::new("Run", 30, Category::Workout))
            .unwrap()
            .value;
        assert_eq!(store.stored_timers(), vec![timer]);

        let err = service.create(NewTimer::new("", 30, Category::Workout));
        assert!(matches!(err, Err(CoreError::Validation(_))));
        assert_eq!(store.stored_timers().len(), 1);
    }

    #[test]
    fn completion_appends_exactly_one_history_entry() {
        let (service, store, recorder) = service();
        let timer = service
            .create(NewTimer::new("Stretch", 10, Category::Break).with_halfway_alert(true))
            .unwrap()
            .value;
        service.start(&timer.id);

        for _ in 0..12 {
            service.tick();
        }

        let stored = &store.stored_timers()[0];
        assert_eq!(stored.status, TimerStatus::Completed);
        assert_eq!(stored.remaining_time, 0);

        let history = service.history().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].name, "Stretch");
        assert_eq!(history[0].duration, Some(10));
        assert_eq!(history[0].category, Some(Category::Break));

        let events = recorder.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], Event::HalfwayReached { .. }));
        assert!(matches!(events[1], Event::TimerCompleted { .. }));
    }

    #[test]
    fn failed_save_keeps_memory_and_reports() {
        let (service, store, _) = service();
        let timer = service
            .create(NewTimer::new("Read", 5, Category::Study))
            .unwrap()
            .value;

        store.fail_saves(true);
        let applied = service.start(&timer.id);
        assert_eq!(applied.value, TransitionOutcome::Applied);
        assert!(!applied.durability.is_committed());
        assert!(service.is_dirty());
        assert_eq!(store.stored_timers()[0].status, TimerStatus::Paused);

        // Memory is authoritative while the store lags behind.
        let report = service.tick();
        assert!(!report.durability.is_committed());
        assert_eq!(service.timer(&timer.id).unwrap().remaining_time, 4);

        store.fail_saves(false);
        let report = service.tick();
        assert!(report.durability.is_committed());
        assert!(!service.is_dirty());
        assert_eq!(store.stored_timers()[0].remaining_time, 3);
    }

    #[test]
    fn history_append_failure_is_reported_not_fatal() {
        let (service, store, recorder) = service();
        let timer = service
            .create(NewTimer::new("Quick", 1, Category::Other))
            .unwrap()
            .value;
        service.start(&timer.id);

        store.fail_saves(true);
        let report = service.tick();
        assert_eq!(report.history_errors.len(), 1);
        assert!(report.history.is_empty());
        assert_eq!(recorder.events().len(), 1);
        assert_eq!(service.timer(&timer.id).unwrap().status, TimerStatus::Completed);
    }

    #[test]
    fn unknown_id_is_noop_and_require_errors() {
        let (service, store, _) = service();
        service.create(NewTimer::new("x", 5, Category::Other)).unwrap();
        let saves = store.save_count();

        let missing = TimerId::from("nope");
        assert_eq!(service.pause(&missing).value, TransitionOutcome::NotFound);
        assert_eq!(store.save_count(), saves);
        assert!(matches!(service.require(&missing), Err(CoreError::NotFound(_))));
    }

    #[test]
    fn mutations_pick_up_external_writes() {
        let (service, store, _) = service();
        let timer = service
            .create(NewTimer::new("Shared", 5, Category::Study))
            .unwrap()
            .value;

        let mut external = store.stored_timers();
        external.push(NewTimer::new("Added elsewhere", 9, Category::Study).build().unwrap());
        store.save_timers(&external).unwrap();

        service.start(&timer.id);
        let timers = store.stored_timers();
        assert_eq!(timers.len(), 2);
        assert_eq!(timers[0].status, TimerStatus::Running);
    }

    #[test]
    fn bulk_apply_saves_once() {
        let (service, store, _) = service();
        for name in ["a", "b", "c"] {
            service.create(NewTimer::new(name, 5, Category::Workout)).unwrap();
        }
        let saves = store.save_count();
        let applied = service.bulk_apply(Category::Workout, BulkAction::StartAll);
        assert_eq!(applied.value.applied.len(), 3);
        assert_eq!(store.save_count(), saves + 1);
        assert!(store.stored_timers().iter().all(Timer::is_running));
    }

    #[test]
    fn clear_all_wipes_timers_and_history() {
        let (service, store, _) = service();
        let timer = service
            .create(NewTimer::new("Once", 1, Category::Other))
            .unwrap()
            .value;
        service.start(&timer.id);
        service.tick();
        assert_eq!(service.history().unwrap().len(), 1);

        assert!(service.clear_all().is_committed());
        assert!(store.stored_timers().is_empty());
        assert!(service.history().unwrap().is_empty());
    }

    #[test]
    fn clear_all_removes_timers_written_elsewhere() {
        let (service, store, _) = service();
        let external = NewTimer::new("Added elsewhere", 9, Category::Study).build().unwrap();
        store.save_timers(&[external]).unwrap();

        assert!(service.clear_all().is_committed());
        assert!(store.stored_timers().is_empty());
        assert!(service.timers().is_empty());
    }

    #[test]
    fn unreadable_store_falls_back_to_memory() {
        let (service, store, _) = service();
        let timer = service
            .create(NewTimer::new("Read", 5, Category::Study))
            .unwrap()
            .value;

        store.fail_loads(true);
        let applied = service.start(&timer.id);
        assert_eq!(applied.value, TransitionOutcome::Applied);
        assert!(applied.durability.is_committed());

        store.fail_loads(false);
        assert_eq!(store.stored_timers()[0].status, TimerStatus::Running);
    }

    #[test]
    fn open_fails_when_store_unreadable() {
        let store = MemoryStore::new();
        store.fail_loads(true);
        assert!(matches!(
            TimerService::open(store),
            Err(CoreError::Persistence(_))
        ));
    }
}
