use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Alarm bookkeeping stored alongside an event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmState {
    /// Alarm is silenced until this instant.
    pub snooze_until: Option<NaiveDateTime>,
    /// Last time the alarm was dismissed.
    pub last_ack: Option<NaiveDateTime>,
}
