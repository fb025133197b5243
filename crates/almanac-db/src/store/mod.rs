//! Storage collaborator seam.
//!
//! ## Module Organization
//!
//! - `memory`: in-process [`EventStore`] used by the binary and by tests

pub mod memory;

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{DbError, DbResult};
use crate::model::{AlarmState, Attachment, Exception, MasterEvent, NewAttachment};

pub use memory::MemoryStore;

/// Result of a persistence call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Inserted,
    Updated,
    /// Nothing was written.
    Unchanged,
}

impl SaveOutcome {
    #[must_use]
    pub const fn is_write(self) -> bool {
        matches!(self, Self::Inserted | Self::Updated)
    }
}

/// Listing filter over series masters.
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    pub calendars: Vec<String>,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    /// Case-insensitive substring matched against title, location,
    /// description and category.
    pub text: Option<String>,
    pub modified_since: Option<NaiveDateTime>,
}

impl EventQuery {
    /// ## Summary
    /// Returns `true` if `event` satisfies every bound of the query.
    ///
    /// Plain events must overlap the window. Recurring series match when
    /// their recurrence end date is open or not before the window start.
    #[must_use]
    pub fn matches(&self, event: &MasterEvent) -> bool {
        if !self.calendars.iter().any(|calendar| *calendar == event.calendar) {
            return false;
        }

        let overlaps = self.end.is_none_or(|end| event.fields.start <= end)
            && self.start.is_none_or(|start| event.fields.end >= start);
        let recurring_in_range = match self.start {
            Some(start) => event.recurrence.reaches(start),
            None => event.is_recurring(),
        };
        if !overlaps && !recurring_in_range {
            return false;
        }

        if let Some(text) = self.text.as_deref().filter(|text| !text.is_empty()) {
            let needle = text.to_lowercase();
            let fields = &event.fields;
            let found = [
                &fields.title,
                &fields.location,
                &fields.description,
                &fields.category,
            ]
            .into_iter()
            .flatten()
            .any(|value| value.to_lowercase().contains(&needle));
            if !found {
                return false;
            }
        }

        self.modified_since.is_none_or(|since| {
            event
                .fields
                .modified
                .is_some_and(|modified| modified >= since)
        })
    }
}

/// Persistence of series masters, their exceptions, attachments and alarm
/// state. Records are keyed by calendar and series uid.
pub trait EventStore {
    /// ## Errors
    /// Returns `DbError::Backend` if the backend fails.
    fn load(&self, calendar: &str, uid: &str) -> DbResult<Option<MasterEvent>>;

    /// Every master carrying `uid`, across calendars.
    ///
    /// ## Errors
    /// Returns `DbError::Backend` if the backend fails.
    fn find(&self, uid: &str) -> DbResult<Vec<MasterEvent>>;

    /// Inserts or replaces a master together with its exception list.
    ///
    /// ## Errors
    /// Returns `DbError::Backend` if the backend fails.
    fn save(&mut self, event: &MasterEvent) -> DbResult<SaveOutcome>;

    /// Deletes a master and all of its exceptions. Returns `false` if absent.
    ///
    /// ## Errors
    /// Returns `DbError::Backend` if the backend fails.
    fn delete(&mut self, calendar: &str, uid: &str) -> DbResult<bool>;

    /// Stores an exception, replacing any existing one on the same date.
    ///
    /// ## Errors
    /// Returns `DbError::NotFound` if the owning master does not exist.
    fn save_exception(&mut self, calendar: &str, exception: &Exception) -> DbResult<SaveOutcome>;

    /// ## Errors
    /// Returns `DbError::NotFound` if the owning master does not exist.
    fn delete_exception(
        &mut self,
        calendar: &str,
        series_uid: &str,
        date: NaiveDate,
    ) -> DbResult<bool>;

    /// ## Errors
    /// Returns `DbError::Backend` if the backend fails.
    fn query(&self, query: &EventQuery) -> DbResult<Vec<MasterEvent>>;

    /// ## Errors
    /// Returns `DbError::Backend` if the backend fails.
    fn list_attachments(&self, event_uid: &str) -> DbResult<Vec<Attachment>>;

    /// Returns the id of the stored attachment.
    ///
    /// ## Errors
    /// Returns `DbError::Backend` if the backend fails.
    fn add_attachment(
        &mut self,
        event_uid: &str,
        folder: &str,
        attachment: NewAttachment,
    ) -> DbResult<String>;

    /// ## Errors
    /// Returns `DbError::Backend` if the backend fails.
    fn remove_attachment(&mut self, id: &str) -> DbResult<bool>;

    /// Removes every attachment keyed by `event_uid`. Returns the number removed.
    ///
    /// ## Errors
    /// Returns `DbError::Backend` if the backend fails.
    fn remove_attachments(&mut self, event_uid: &str) -> DbResult<usize>;

    /// ## Errors
    /// Returns `DbError::Backend` if the backend fails.
    fn alarm_state(&self, calendar: &str, uid: &str) -> DbResult<AlarmState>;

    /// ## Errors
    /// Returns `DbError::Backend` if the backend fails.
    fn save_alarm_state(&mut self, calendar: &str, uid: &str, state: AlarmState) -> DbResult<()>;

    /// ## Summary
    /// Runs `f` as one unit of work. Every change made through the store
    /// inside `f` is rolled back when `f` returns an error.
    ///
    /// ## Errors
    /// Returns the error produced by `f`, or a `DbError` converted into `E`
    /// when the transaction itself cannot be opened or committed.
    fn transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        Self: Sized,
        F: FnOnce(&mut Self) -> Result<T, E>,
        E: From<DbError>;
}
