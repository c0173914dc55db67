use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_NAMESPACE: &str = "prefs";
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    /// Key under which the persisted state lives; one file per namespace.
    pub namespace: String,
    pub state_dir: PathBuf,
    #[serde(with = "millis")]
    pub refresh_interval: Duration,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            state_dir: dirs::data_local_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("bgtimer"),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

mod clock;
mod host;
mod priority;
mod stopwatch;
mod store;
mod ticker;
mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use host::{Detached, TimerHost};
pub use priority::{LogPriorityHint, Notification, Priority, PriorityHint};
pub use stopwatch::{format_elapsed, State, Stopwatch, ZERO_DISPLAY};
pub use store::{
    FileStore, LoadedState, MemoryStore, PersistedState, Snapshot, StateStore, StoreError,
};
pub use ticker::{RefreshTicker, TimerView};
pub use timer::TimerService;
