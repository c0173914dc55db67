use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use metrics::counter;
use tracing::{debug, info};

use crate::{
    clock::{Clock, SystemClock},
    priority::{LogPriorityHint, Notification, Priority, PriorityHint},
    stopwatch::{format_elapsed, Stopwatch},
    store::{FileStore, PersistedState, StateStore},
    TimerConfig,
};

#[derive(Debug, Default)]
struct InnerTimerService {
    stopwatch: Stopwatch,
    priority: Priority,
    last_display: String,
    // Once a run has stopped in this process, memory wins over storage.
    completed_run: bool,
}

/// The long-lived owner of the stopwatch. Handles are cheap to clone and all
/// point at the same timer.
#[derive(Debug, Clone)]
pub struct TimerService {
    inner: Arc<Mutex<InnerTimerService>>,
    persisted: PersistedState,
    clock: Arc<dyn Clock>,
    priority_hint: Arc<dyn PriorityHint>,
    notification: Notification,
}

impl TimerService {
    pub fn new(
        store: Arc<dyn StateStore>,
        clock: Arc<dyn Clock>,
        priority_hint: Arc<dyn PriorityHint>,
    ) -> Self {
        let persisted = PersistedState::new(store);
        let last_display = persisted.load().time;
        debug!("timer service created, last display {last_display}");

        Self {
            inner: Arc::new(Mutex::new(InnerTimerService {
                last_display,
                ..Default::default()
            })),
            persisted,
            clock,
            priority_hint,
            notification: Notification::default(),
        }
    }

    pub fn from_config(cfg: &TimerConfig) -> Self {
        Self::new(
            Arc::new(FileStore::new(&cfg.state_dir, &cfg.namespace)),
            Arc::new(SystemClock),
            Arc::new(LogPriorityHint),
        )
    }

    pub fn with_notification(mut self, notification: Notification) -> Self {
        self.notification = notification;
        self
    }

    fn inner(&self) -> MutexGuard<'_, InnerTimerService> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn start_timer(&self) {
        let now = self.clock.now_millis();
        let mut inner = self.inner();
        let completed_run = inner.completed_run;
        let resume_from = || {
            if completed_run {
                None
            } else {
                self.persisted.load().end
            }
        };
        if inner.stopwatch.start(now, resume_from) {
            info!("timer started");
            counter!("timer::start").increment(1);
        }
    }

    pub fn stop_timer(&self) {
        let now = self.clock.now_millis();
        let mut inner = self.inner();
        let Some(end) = inner.stopwatch.stop(now) else {
            return;
        };

        let time = format_elapsed(inner.stopwatch.elapsed(now));
        info!("timer stopped at {time}");
        counter!("timer::stop").increment(1);

        inner.completed_run = true;
        inner.last_display = time.clone();
        drop(inner);

        self.persisted.save(end, &time);
    }

    pub fn is_timer_running(&self) -> bool {
        self.inner().stopwatch.is_running()
    }

    pub fn elapsed_time(&self) -> String {
        let now = self.clock.now_millis();
        self.inner().stopwatch.elapsed_display(now)
    }

    /// The duration to show before anything has run in this process: the
    /// persisted display at startup, then whatever the last stop produced.
    pub fn last_display(&self) -> String {
        self.inner().last_display.clone()
    }

    pub fn priority(&self) -> Priority {
        self.inner().priority
    }

    /// Swaps in `priority` and reports whether it changed. The hint is called
    /// by the callers after the lock is released, so hooks may read the service.
    fn set_priority(&self, priority: Priority) -> bool {
        let mut inner = self.inner();
        let changed = inner.priority != priority;
        inner.priority = priority;
        changed
    }

    pub fn foreground(&self) {
        if self.set_priority(Priority::Elevated) {
            self.priority_hint.enter_foreground_mode(&self.notification);
        }
    }

    pub fn background(&self) {
        if self.set_priority(Priority::Normal) {
            self.priority_hint.enter_background_mode();
        }
    }
}
