//! Series master records and the fields shared with exceptions.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use super::attendee::{Attendee, Organizer};
use super::enums::{Classification, EventStatus};
use super::exception::Exception;
use super::recurrence::Recurrence;

/// Event content shared by masters and live exceptions.
///
/// All-day events are stored with both `start` and `end` at midnight, `end`
/// being the exclusive next midnight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFields {
    pub owner: Option<String>,
    pub organizer: Option<Organizer>,
    #[serde(default)]
    pub attendees: Vec<Attendee>,
    #[serde(default)]
    pub classification: Classification,
    #[serde(default)]
    pub status: EventStatus,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub category: Option<String>,
    /// Signed minutes relative to `start`. Negative triggers before the event.
    pub alarm: Option<i64>,
    pub modified: Option<NaiveDateTime>,
}

impl EventFields {
    /// Empty content spanning `start..end`.
    #[must_use]
    pub const fn spanning(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            owner: None,
            organizer: None,
            attendees: Vec::new(),
            classification: Classification::Public,
            status: EventStatus::Busy,
            start,
            end,
            title: None,
            description: None,
            location: None,
            category: None,
            alarm: None,
            modified: None,
        }
    }

    #[must_use]
    pub fn is_all_day(&self) -> bool {
        self.start.time() == NaiveTime::MIN && self.end.time() == NaiveTime::MIN
    }

    #[must_use]
    pub fn duration(&self) -> chrono::TimeDelta {
        self.end - self.start
    }
}

/// One persisted series, or a standalone event when the recurrence is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterEvent {
    pub uid: String,
    pub calendar: String,
    #[serde(flatten)]
    pub fields: EventFields,
    #[serde(default)]
    pub recurrence: Recurrence,
    #[serde(default)]
    pub exceptions: Vec<Exception>,
}

impl MasterEvent {
    #[must_use]
    pub const fn new(uid: String, calendar: String, fields: EventFields) -> Self {
        Self {
            uid,
            calendar,
            fields,
            recurrence: Recurrence::none(),
            exceptions: Vec::new(),
        }
    }

    #[must_use]
    pub const fn is_recurring(&self) -> bool {
        self.recurrence.is_recurring()
    }

    /// The exception whose recurrence instant falls on `date`, if any.
    #[must_use]
    pub fn exception_on(&self, date: NaiveDate) -> Option<&Exception> {
        self.exceptions
            .iter()
            .find(|exception| exception.recurrence_id.date() == date)
    }

    /// Removes every exception whose recurrence instant falls on `date`.
    /// Returns the removed records.
    pub fn remove_exceptions_on(&mut self, date: NaiveDate) -> Vec<Exception> {
        let (removed, kept) = std::mem::take(&mut self.exceptions)
            .into_iter()
            .partition(|exception| exception.recurrence_id.date() == date);
        self.exceptions = kept;
        removed
    }

    /// Replaces any exception on the same date with `exception`.
    /// Returns `true` if one was replaced.
    pub fn put_exception(&mut self, exception: Exception) -> bool {
        let replaced = !self
            .remove_exceptions_on(exception.recurrence_id.date())
            .is_empty();
        self.exceptions.push(exception);
        replaced
    }

    /// A recurrence cut before the series start leaves no occurrence at all.
    #[must_use]
    pub fn ends_before_start(&self) -> bool {
        self.recurrence
            .end_date
            .is_some_and(|end| end < self.fields.start)
    }

    /// Dates suppressed from rule expansion: tombstones and live overrides alike.
    #[must_use]
    pub fn excluded_dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self
            .exceptions
            .iter()
            .map(|exception| exception.recurrence_id.date())
            .collect();
        dates.sort_unstable();
        dates.dedup();
        dates
    }
}

/// A stored record as seen by the read path.
#[derive(Debug, Clone, Copy)]
pub enum EventRecord<'a> {
    Master(&'a MasterEvent),
    Exception {
        master: &'a MasterEvent,
        exception: &'a Exception,
    },
}

impl<'a> EventRecord<'a> {
    #[must_use]
    pub const fn master(&self) -> &'a MasterEvent {
        match *self {
            Self::Master(master) | Self::Exception { master, .. } => master,
        }
    }

    /// Fields of the record, `None` for a tombstone.
    #[must_use]
    pub fn fields(&self) -> Option<&'a EventFields> {
        match *self {
            Self::Master(master) => Some(&master.fields),
            Self::Exception { exception, .. } => exception.fields(),
        }
    }

    #[must_use]
    pub const fn is_exception(&self) -> bool {
        matches!(self, Self::Exception { .. })
    }
}
