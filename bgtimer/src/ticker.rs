use std::sync::Weak;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::timer::TimerService;

/// The screen showing the timer.
pub trait TimerView: Send + Sync + 'static {
    fn show_elapsed(&self, display: &str);

    /// Whether the run button should offer "Pause" (running) or "Start".
    fn show_running(&self, running: bool);
}

/// Periodically pushes the elapsed time into a view it does not own.
///
/// Must be spawned from within a tokio runtime. Dropping the ticker cancels it.
#[derive(Debug)]
pub struct RefreshTicker {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl RefreshTicker {
    pub fn spawn(service: TimerService, view: Weak<dyn TimerView>, period: Duration) -> Self {
        let token = CancellationToken::new();
        let handle = tokio::spawn({
            let token = token.clone();
            async move {
                Self::refresh_forever(service, view, period, token).await;
            }
        });
        Self { token, handle }
    }

    async fn refresh_forever(
        service: TimerService,
        view: Weak<dyn TimerView>,
        period: Duration,
        token: CancellationToken,
    ) {
        let mut ticks = interval(period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    debug!("refresh cancelled");
                    break;
                }
                _ = ticks.tick() => {
                    let Some(view) = view.upgrade() else {
                        debug!("view went away, refresh stopped");
                        break;
                    };
                    trace!("updating time");
                    view.show_elapsed(&service.elapsed_time());
                }
            }
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for RefreshTicker {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
pub(crate) mod test {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::{clock::ManualClock, store::MemoryStore, timer::test::service_with};

    #[derive(Debug, Default)]
    pub(crate) struct RecordingView {
        pub(crate) frames: Mutex<Vec<String>>,
        pub(crate) running: Mutex<Option<bool>>,
    }

    impl RecordingView {
        pub(crate) fn frames(&self) -> Vec<String> {
            self.frames.lock().unwrap().clone()
        }

        pub(crate) fn running(&self) -> Option<bool> {
            *self.running.lock().unwrap()
        }
    }

    impl TimerView for RecordingView {
        fn show_elapsed(&self, display: &str) {
            self.frames.lock().unwrap().push(display.to_string());
        }

        fn show_running(&self, running: bool) {
            *self.running.lock().unwrap() = Some(running);
        }
    }

    fn running_service(clock: &ManualClock) -> TimerService {
        let service = service_with(Arc::new(MemoryStore::default()), clock);
        service.start_timer();
        service
    }

    #[tokio::test(start_paused = true)]
    async fn renders_every_period() {
        let clock = ManualClock::new(0);
        let service = running_service(&clock);
        let view = Arc::new(RecordingView::default());
        let weak: Weak<dyn TimerView> = Arc::downgrade(&view) as Weak<dyn TimerView>;

        let ticker = RefreshTicker::spawn(service, weak, Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(3_500)).await;

        assert_eq!(4, view.frames().len());
        assert!(!ticker.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn stops_after_cancel() {
        let clock = ManualClock::new(0);
        let service = running_service(&clock);
        let view = Arc::new(RecordingView::default());
        let weak: Weak<dyn TimerView> = Arc::downgrade(&view) as Weak<dyn TimerView>;

        let ticker = RefreshTicker::spawn(service, weak, Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        ticker.cancel();
        let seen = view.frames().len();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(seen, view.frames().len());
        assert!(ticker.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_view_is_dropped() {
        let clock = ManualClock::new(0);
        let service = running_service(&clock);
        let view = Arc::new(RecordingView::default());
        let weak: Weak<dyn TimerView> = Arc::downgrade(&view) as Weak<dyn TimerView>;

        let ticker = RefreshTicker::spawn(service, weak, Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(500)).await;
        drop(view);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(ticker.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn renders_live_elapsed_time() {
        let clock = ManualClock::new(0);
        let service = running_service(&clock);
        let view = Arc::new(RecordingView::default());
        let weak: Weak<dyn TimerView> = Arc::downgrade(&view) as Weak<dyn TimerView>;

        let _ticker = RefreshTicker::spawn(service, weak, Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(100)).await;
        clock.set(61_000);
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(vec!["00:00:00", "00:01:01"], view.frames());
    }
}
