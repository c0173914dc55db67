use std::time::Duration;

use metrics::counter;
use tracing::warn;

pub const ZERO_DISPLAY: &str = "00:00:00";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Stopped,
    Running,
}

/// Wall-clock stopwatch.
///
/// While running, `start` is the (possibly back-dated) moment the current run
/// began and `end` is zero. Once stopped, `end` holds the total elapsed
/// milliseconds rather than a timestamp, which is also the value that gets
/// persisted and later used as the resume offset.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Stopwatch {
    start: i64,
    end: i64,
    running: bool,
}

impl Stopwatch {
    /// Starts the stopwatch at `now`. `resume_from` is only consulted on a valid
    /// transition; if it has nothing, the last in-memory duration is used.
    pub fn start<F>(&mut self, now: i64, resume_from: F) -> bool
    where
        F: FnOnce() -> Option<i64>,
    {
        if self.running {
            warn!("start requested for an already running stopwatch");
            counter!("stopwatch::invalid_transition", "op" => "start").increment(1);
            return false;
        }

        let offset = resume_from().unwrap_or(self.end).max(0);
        self.start = now.saturating_sub(offset);
        self.end = 0;
        self.running = true;
        true
    }

    /// Stops the stopwatch and returns the frozen duration in milliseconds.
    pub fn stop(&mut self, now: i64) -> Option<i64> {
        if !self.running {
            warn!("stop requested for a stopwatch that isn't running");
            counter!("stopwatch::invalid_transition", "op" => "stop").increment(1);
            return None;
        }

        self.end = now.saturating_sub(self.start).max(0);
        self.running = false;
        Some(self.end)
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn state(&self) -> State {
        if self.running {
            State::Running
        } else {
            State::Stopped
        }
    }

    pub fn start_millis(&self) -> i64 {
        self.start
    }

    pub fn end_millis(&self) -> i64 {
        self.end
    }

    pub fn elapsed(&self, now: i64) -> Duration {
        let millis = if self.running {
            now.saturating_sub(self.start)
        } else {
            self.end
        };
        Duration::from_millis(u64::try_from(millis).unwrap_or_default())
    }

    pub fn elapsed_display(&self, now: i64) -> String {
        format_elapsed(self.elapsed(now))
    }
}

/// Renders a duration as `HH:MM:SS`. Hours are not wrapped at 24.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}
