use tracing::info;

/// Process priority the host platform should give the timer process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    #[default]
    Normal,
    Elevated,
}

/// Shown by the platform while the timer process runs at elevated priority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: u32,
    pub title: String,
    pub text: String,
}

impl Default for Notification {
    fn default() -> Self {
        Self {
            id: 1,
            title: "Timer Active".to_string(),
            text: "Tap to return to the timer".to_string(),
        }
    }
}

/// Platform hook for process visibility. Implementations must not touch timer state.
pub trait PriorityHint: std::fmt::Debug + Send + Sync + 'static {
    fn enter_foreground_mode(&self, notification: &Notification);
    fn enter_background_mode(&self);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogPriorityHint;

impl PriorityHint for LogPriorityHint {
    fn enter_foreground_mode(&self, notification: &Notification) {
        info!(
            id = notification.id,
            "entering foreground mode: {} - {}", notification.title, notification.text
        );
    }

    fn enter_background_mode(&self) {
        info!("entering background mode");
    }
}
