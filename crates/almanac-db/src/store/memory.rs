//! In-memory [`EventStore`].

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;

use crate::error::{DbError, DbResult};
use crate::model::{AlarmState, Attachment, Exception, MasterEvent, NewAttachment};

use super::{EventQuery, EventStore, SaveOutcome};

type EventKey = (String, String);

/// Event store held entirely in memory.
///
/// Transactions snapshot the whole store and restore it on failure.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    events: BTreeMap<EventKey, MasterEvent>,
    attachments: BTreeMap<String, Attachment>,
    alarms: BTreeMap<EventKey, AlarmState>,
}

fn key(calendar: &str, uid: &str) -> EventKey {
    (calendar.to_string(), uid.to_string())
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_events(events: impl IntoIterator<Item = MasterEvent>) -> Self {
        let mut store = Self::new();
        for event in events {
            store
                .events
                .insert(key(&event.calendar, &event.uid), event);
        }
        store
    }

    /// ## Summary
    /// Builds a store from a JSON array of master events.
    ///
    /// ## Errors
    /// Returns `DbError::Serialization` if the document is not a valid event list.
    pub fn from_json(json: &str) -> DbResult<Self> {
        let events: Vec<MasterEvent> = serde_json::from_str(json)?;
        tracing::debug!(count = events.len(), "Loaded events from fixture");
        Ok(Self::from_events(events))
    }

    /// ## Errors
    /// Returns `DbError::Backend` if the file cannot be read, or
    /// `DbError::Serialization` if its content is not a valid event list.
    pub fn from_path(path: impl AsRef<Path>) -> DbResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| DbError::Backend(format!("{}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> impl Iterator<Item = &MasterEvent> {
        self.events.values()
    }

    fn master_mut(&mut self, calendar: &str, uid: &str) -> DbResult<&mut MasterEvent> {
        self.events
            .get_mut(&key(calendar, uid))
            .ok_or_else(|| DbError::NotFound(format!("event {uid} in calendar {calendar}")))
    }
}

impl EventStore for MemoryStore {
    fn load(&self, calendar: &str, uid: &str) -> DbResult<Option<MasterEvent>> {
        Ok(self.events.get(&key(calendar, uid)).cloned())
    }

    fn find(&self, uid: &str) -> DbResult<Vec<MasterEvent>> {
        Ok(self
            .events
            .values()
            .filter(|event| event.uid == uid)
            .cloned()
            .collect())
    }

    #[tracing::instrument(skip(self, event), fields(uid = %event.uid, calendar = %event.calendar))]
    fn save(&mut self, event: &MasterEvent) -> DbResult<SaveOutcome> {
        let outcome = match self.events.get(&key(&event.calendar, &event.uid)) {
            Some(existing) if existing == event => SaveOutcome::Unchanged,
            Some(_) => SaveOutcome::Updated,
            None => SaveOutcome::Inserted,
        };
        if outcome.is_write() {
            self.events
                .insert(key(&event.calendar, &event.uid), event.clone());
        }
        tracing::trace!(?outcome, "Saved event");
        Ok(outcome)
    }

    fn delete(&mut self, calendar: &str, uid: &str) -> DbResult<bool> {
        self.alarms.remove(&key(calendar, uid));
        Ok(self.events.remove(&key(calendar, uid)).is_some())
    }

    fn save_exception(&mut self, calendar: &str, exception: &Exception) -> DbResult<SaveOutcome> {
        let master = self.master_mut(calendar, &exception.series_uid)?;
        Ok(if master.put_exception(exception.clone()) {
            SaveOutcome::Updated
        } else {
            SaveOutcome::Inserted
        })
    }

    fn delete_exception(
        &mut self,
        calendar: &str,
        series_uid: &str,
        date: NaiveDate,
    ) -> DbResult<bool> {
        let master = self.master_mut(calendar, series_uid)?;
        Ok(!master.remove_exceptions_on(date).is_empty())
    }

    fn query(&self, query: &EventQuery) -> DbResult<Vec<MasterEvent>> {
        Ok(self
            .events
            .values()
            .filter(|event| query.matches(event))
            .cloned()
            .collect())
    }

    fn list_attachments(&self, event_uid: &str) -> DbResult<Vec<Attachment>> {
        Ok(self
            .attachments
            .values()
            .filter(|attachment| attachment.event_uid == event_uid)
            .cloned()
            .collect())
    }

    fn add_attachment(
        &mut self,
        event_uid: &str,
        folder: &str,
        attachment: NewAttachment,
    ) -> DbResult<String> {
        let id = uuid::Uuid::new_v4().to_string();
        self.attachments.insert(
            id.clone(),
            Attachment {
                id: id.clone(),
                event_uid: event_uid.to_string(),
                folder: folder.to_string(),
                name: attachment.name,
                mimetype: attachment.mimetype,
                data: attachment.data,
            },
        );
        Ok(id)
    }

    fn remove_attachment(&mut self, id: &str) -> DbResult<bool> {
        Ok(self.attachments.remove(id).is_some())
    }

    fn remove_attachments(&mut self, event_uid: &str) -> DbResult<usize> {
        let before = self.attachments.len();
        self.attachments
            .retain(|_, attachment| attachment.event_uid != event_uid);
        Ok(before - self.attachments.len())
    }

    fn alarm_state(&self, calendar: &str, uid: &str) -> DbResult<AlarmState> {
        Ok(self
            .alarms
            .get(&key(calendar, uid))
            .cloned()
            .unwrap_or_default())
    }

    fn save_alarm_state(&mut self, calendar: &str, uid: &str, state: AlarmState) -> DbResult<()> {
        self.alarms.insert(key(calendar, uid), state);
        Ok(())
    }

    fn transaction<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Self) -> Result<T, E>,
        E: From<DbError>,
    {
        let snapshot = self.clone();
        let result = f(self);
        if result.is_err() {
            tracing::debug!("Rolling back in-memory transaction");
            *self = snapshot;
        }
        result
    }
}
