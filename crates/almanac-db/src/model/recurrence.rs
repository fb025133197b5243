//! Stored recurrence descriptor.

use chrono::{NaiveDateTime, Weekday};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecurrenceKind {
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

/// Recurrence of a master event.
///
/// `end_date`, once set, bounds every generated occurrence. A non-recurring
/// event has `kind == RecurrenceKind::None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recurrence {
    pub kind: RecurrenceKind,
    #[serde(default = "default_interval")]
    pub interval: u16,
    pub end_date: Option<NaiveDateTime>,
    pub count: Option<u32>,
    /// Weekdays for weekly rules. Empty means the weekday of the series start.
    #[serde(default)]
    pub weekdays: Vec<Weekday>,
}

const fn default_interval() -> u16 {
    1
}

impl Default for Recurrence {
    fn default() -> Self {
        Self::none()
    }
}

impl Recurrence {
    #[must_use]
    pub const fn none() -> Self {
        Self {
            kind: RecurrenceKind::None,
            interval: 1,
            end_date: None,
            count: None,
            weekdays: Vec::new(),
        }
    }

    #[must_use]
    pub fn every(kind: RecurrenceKind) -> Self {
        Self {
            kind,
            ..Self::none()
        }
    }

    #[must_use]
    pub const fn is_recurring(&self) -> bool {
        !matches!(self.kind, RecurrenceKind::None)
    }

    /// Returns `true` if the rule can still produce instances at or after `instant`.
    #[must_use]
    pub fn reaches(&self, instant: NaiveDateTime) -> bool {
        self.is_recurring() && self.end_date.is_none_or(|end| end >= instant)
    }
}
