//! Effect delivery.
//!
//! Sinks receive tick effects after the new snapshot has been written, outside
//! of the service lock.

use std::sync::{Arc, Mutex};

use tracing::info;

use crate::events::Event;
use crate::storage::NotificationsConfig;

/// Consumer of tick effects (alert surface, UI bridge, test probe).
pub trait EffectSink: Send + Sync {
    fn deliver(&self, event: &Event);
}

/// Writes alerts to the tracing log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl EffectSink for LogNotifier {
    fn deliver(&self, event: &Event) {
        let timer = event.timer();
        match event {
            Event::HalfwayReached { .. } => info!(
                timer_id = %timer.id,
                remaining = timer.remaining_time,
                "{}",
                event.message()
            ),
            Event::TimerCompleted { .. } => {
                info!(timer_id = %timer.id, category = %timer.category, "{}", event.message())
            }
        }
    }
}

/// Drops events the user switched off, forwards the rest.
pub struct Filtered<S> {
    inner: S,
    config: NotificationsConfig,
}

impl<S: EffectSink> Filtered<S> {
    pub fn new(inner: S, config: NotificationsConfig) -> Self {
        Self { inner, config }
    }
}

impl<S: EffectSink> EffectSink for Filtered<S> {
    fn deliver(&self, event: &Event) {
        if self.config.allows(event) {
            self.inner.deliver(event);
        }
    }
}

impl NotificationsConfig {
    pub fn allows(&self, event: &Event) -> bool {
        self.enabled
            && match event {
                Event::HalfwayReached { .. } => self.halfway_alerts,
                Event::TimerCompleted { .. } => self.completion_alerts,
            }
    }
}

/// Collects every delivered event.
#[derive(Debug, Default, Clone)]
pub struct Recorder {
    events: Arc<Mutex<Vec<Event>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl EffectSink for Recorder {
    fn deliver(&self, event: &Event) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
    }
}
