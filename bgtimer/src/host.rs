use std::sync::{Arc, Weak};
use std::time::Duration;

use tracing::{debug, info};

use crate::{
    ticker::{RefreshTicker, TimerView},
    timer::TimerService,
    TimerConfig,
};

/// What the embedder should do with the timer process after a view detaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detached {
    /// A run is in progress; the process stays alive at elevated priority.
    KeepAlive,
    /// Nothing is running; the process may exit.
    Shutdown,
    /// No view was attached; nothing changed.
    NotAttached,
}

#[derive(Debug)]
struct Attached {
    view: Weak<dyn TimerView>,
    ticker: Option<RefreshTicker>,
}

/// Binds at most one view to a `TimerService` and drives its refresh loop.
///
/// All methods that may start a refresh loop must be called from within a
/// tokio runtime.
#[derive(Debug)]
pub struct TimerHost {
    service: TimerService,
    refresh_interval: Duration,
    attached: Option<Attached>,
}

impl TimerHost {
    pub fn new(service: TimerService, cfg: &TimerConfig) -> Self {
        Self {
            service,
            refresh_interval: cfg.refresh_interval,
            attached: None,
        }
    }

    pub fn service(&self) -> &TimerService {
        &self.service
    }

    pub fn is_attached(&self) -> bool {
        self.attached.is_some()
    }

    pub fn attach(&mut self, view: &Arc<dyn TimerView>) {
        if let Some(previous) = self.attached.take() {
            // Swapping views is not a visibility change; keep the priority as is.
            debug!("replacing attached view");
            drop(previous.ticker);
        }
        info!("view attached");

        self.service.background();
        view.show_elapsed(&self.service.last_display());
        view.show_running(false);
        self.attached = Some(Attached {
            view: Arc::downgrade(view),
            ticker: None,
        });

        if self.service.is_timer_running() {
            self.run_started();
        }
    }

    pub fn detach(&mut self) -> Detached {
        let Some(attached) = self.attached.take() else {
            return Detached::NotAttached;
        };
        info!("view detached");

        drop(attached.ticker);
        if let Some(view) = attached.view.upgrade() {
            view.show_running(false);
        }

        if self.service.is_timer_running() {
            self.service.foreground();
            Detached::KeepAlive
        } else {
            Detached::Shutdown
        }
    }

    /// The run button: starts a stopped timer, stops a running one.
    pub fn toggle(&mut self) {
        if self.attached.is_none() {
            debug!("toggle ignored, no view attached");
            return;
        }

        if self.service.is_timer_running() {
            debug!("stopping timer");
            self.service.stop_timer();
            self.run_stopped();
        } else {
            debug!("starting timer");
            self.service.start_timer();
            self.run_started();
        }
    }

    fn run_started(&mut self) {
        let service = self.service.clone();
        let period = self.refresh_interval;
        if let Some(attached) = self.attached.as_mut() {
            attached.ticker = Some(RefreshTicker::spawn(
                service,
                attached.view.clone(),
                period,
            ));
            if let Some(view) = attached.view.upgrade() {
                view.show_running(true);
            }
        }
    }

    fn run_stopped(&mut self) {
        if let Some(attached) = self.attached.as_mut() {
            attached.ticker = None;
            if let Some(view) = attached.view.upgrade() {
                view.show_elapsed(&self.service.last_display());
                view.show_running(false);
            }
        }
    }
}

impl Drop for TimerHost {
    fn drop(&mut self) {
        self.detach();
    }
}
