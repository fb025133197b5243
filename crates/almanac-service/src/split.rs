//! Save-mode edits and deletions of recurring series.
//!
//! ## Summary
//! Every write or delete names a [`SaveMode`]. The splitter turns it into
//! mutations of the master, its exceptions, or a forked series:
//!
//! - `current`: add or replace the exception at the addressed occurrence
//! - `future`: end the series the day before the occurrence and fork the rest
//! - `new`: detach the occurrence as an independent series
//! - `all` / none: edit or delete the master itself
//!
//! Multi-step mutations run inside one store transaction.

use chrono::{NaiveDateTime, TimeDelta};

use almanac_core::identity::{ForkKind, OccurrenceId, epoch_seconds, fork_uid, from_epoch_seconds};
use almanac_db::model::{Exception, MasterEvent, Recurrence};
use almanac_db::store::{EventStore, SaveOutcome};

use crate::codec::{FlatEvent, SaveMode, WriteContext, new_fields, write_fields, write_recurrence};
use crate::error::{ServiceError, ServiceResult};

/// Applies save-mode writes and deletes to one calendar.
pub struct RecurrenceSplitter<'a> {
    calendar: &'a str,
    ctx: WriteContext<'a>,
}

impl<'a> RecurrenceSplitter<'a> {
    /// `calendar` is the storage-side calendar reference.
    #[must_use]
    pub const fn new(calendar: &'a str, ctx: WriteContext<'a>) -> Self {
        Self { calendar, ctx }
    }

    /// ## Summary
    /// Applies `edit` to the series `uid` and returns the uid of the series
    /// that now holds the edited data.
    ///
    /// ## Errors
    /// Returns `NotFound` when `current` or `future` target a missing series,
    /// `MalformedInput` when the edited occurrence cannot be resolved, and
    /// `StorageFailure` when a persistence call reports no write. A failed
    /// `future` split leaves the store unchanged.
    #[tracing::instrument(
        skip(self, store, existing, edit, mode),
        fields(calendar = %self.calendar, mode = mode.as_str())
    )]
    pub fn apply_write<S: EventStore>(
        &self,
        store: &mut S,
        existing: Option<MasterEvent>,
        uid: &str,
        edit: &FlatEvent,
        mode: SaveMode,
    ) -> ServiceResult<String> {
        match mode {
            SaveMode::Current => self.write_current(store, require(existing, uid)?, edit),
            SaveMode::Future => self.write_future(store, require(existing, uid)?, edit),
            SaveMode::New => self.write_new(store, existing.as_ref(), uid, edit),
            SaveMode::All | SaveMode::None => self.write_series(store, existing, uid, edit),
        }
    }

    /// ## Summary
    /// Deletes the occurrence, the tail or the whole of `master`.
    ///
    /// Returns `false` when the store had nothing to delete.
    ///
    /// ## Errors
    /// Returns `MalformedInput` when the occurrence cannot be resolved and
    /// `StorageFailure` when a persistence call reports no write.
    #[tracing::instrument(
        skip(self, store, master, edit, mode),
        fields(calendar = %self.calendar, uid = %master.uid, mode = mode.as_str())
    )]
    pub fn apply_delete<S: EventStore>(
        &self,
        store: &mut S,
        master: MasterEvent,
        edit: &FlatEvent,
        mode: SaveMode,
    ) -> ServiceResult<bool> {
        match mode {
            SaveMode::All => self.delete_series(store, &master),
            SaveMode::Current => self.delete_current(store, &master, edit),
            SaveMode::Future => self.delete_future(store, master, edit),
            SaveMode::New | SaveMode::None => self.delete_master(store, &master.uid),
        }
    }

    fn write_current<S: EventStore>(
        &self,
        store: &mut S,
        master: MasterEvent,
        edit: &FlatEvent,
    ) -> ServiceResult<String> {
        let instant = resolve_instant(edit, &master)?;
        let mut fields = master
            .exception_on(instant.date())
            .and_then(Exception::fields)
            .unwrap_or(&master.fields)
            .clone();
        write_fields(&mut fields, edit, false, &self.ctx)?;

        let exception = Exception::with_fields(&master.uid, instant, fields);
        tracing::debug!(recurrence_id = %instant, "Writing exception");
        ensure_written(store.save_exception(self.calendar, &exception)?)?;
        Ok(master.uid)
    }

    fn write_future<S: EventStore>(
        &self,
        store: &mut S,
        master: MasterEvent,
        edit: &FlatEvent,
    ) -> ServiceResult<String> {
        let instant = resolve_instant(edit, &master)?;

        let mut fields = master.fields.clone();
        let duration = fields.duration();
        fields.start = instant;
        fields.end = instant + duration;
        write_fields(&mut fields, edit, true, &self.ctx)?;
        let mut recurrence = Recurrence::none();
        write_recurrence(&mut recurrence, edit, self.ctx.engine)?;

        let fork = MasterEvent {
            uid: fork_uid(&master.uid, epoch_seconds(instant), ForkKind::Future),
            calendar: self.calendar.to_string(),
            fields,
            recurrence,
            exceptions: Vec::new(),
        };
        let truncated = truncate_at(master, instant);
        let collapsed = truncated.ends_before_start();
        tracing::debug!(
            fork = %fork.uid,
            end_date = ?truncated.recurrence.end_date,
            collapsed,
            "Forking series"
        );

        store.transaction(|tx| {
            if collapsed {
                tracing::debug!("Fork starts at the series start, deleting the original series");
                self.delete_master(tx, &truncated.uid)?;
            } else {
                ensure_written(tx.save(&truncated)?)?;
            }
            ensure_written(tx.save(&fork)?)?;
            Ok(fork.uid.clone())
        })
    }

    fn write_new<S: EventStore>(
        &self,
        store: &mut S,
        existing: Option<&MasterEvent>,
        uid: &str,
        edit: &FlatEvent,
    ) -> ServiceResult<String> {
        let instant = match existing {
            Some(master) => resolve_instant(edit, master)?,
            None => edit.start.ok_or_else(unresolved)?,
        };

        let mut detached = MasterEvent::new(
            fork_uid(uid, epoch_seconds(instant), ForkKind::New),
            self.calendar.to_string(),
            new_fields(edit, &self.ctx)?,
        );
        write_recurrence(&mut detached.recurrence, edit, self.ctx.engine)?;
        tracing::debug!(detached = %detached.uid, "Detaching occurrence");

        ensure_written(store.save(&detached)?)?;
        Ok(detached.uid)
    }

    fn write_series<S: EventStore>(
        &self,
        store: &mut S,
        existing: Option<MasterEvent>,
        uid: &str,
        edit: &FlatEvent,
    ) -> ServiceResult<String> {
        let master = match existing {
            Some(mut master) => {
                write_fields(&mut master.fields, edit, false, &self.ctx)?;
                write_recurrence(&mut master.recurrence, edit, self.ctx.engine)?;
                master
            }
            None => {
                let mut master = MasterEvent::new(
                    uid.to_string(),
                    self.calendar.to_string(),
                    new_fields(edit, &self.ctx)?,
                );
                write_recurrence(&mut master.recurrence, edit, self.ctx.engine)?;
                master
            }
        };

        ensure_written(store.save(&master)?)?;
        Ok(master.uid)
    }

    fn delete_series<S: EventStore>(
        &self,
        store: &mut S,
        master: &MasterEvent,
    ) -> ServiceResult<bool> {
        store.transaction(|tx| {
            for exception in &master.exceptions {
                tracing::trace!(recurrence_id = %exception.recurrence_id, "Deleting exception");
                tx.delete_exception(
                    self.calendar,
                    &master.uid,
                    exception.recurrence_id.date(),
                )?;
            }
            self.delete_master(tx, &master.uid)
        })
    }

    fn delete_current<S: EventStore>(
        &self,
        store: &mut S,
        master: &MasterEvent,
        edit: &FlatEvent,
    ) -> ServiceResult<bool> {
        let instant = resolve_instant(edit, master)?;
        tracing::debug!(recurrence_id = %instant, "Writing tombstone");
        let tombstone = Exception::tombstone(&master.uid, instant);
        ensure_written(store.save_exception(self.calendar, &tombstone)?)?;
        Ok(true)
    }

    fn delete_future<S: EventStore>(
        &self,
        store: &mut S,
        master: MasterEvent,
        edit: &FlatEvent,
    ) -> ServiceResult<bool> {
        let instant = resolve_instant(edit, &master)?;
        let mut truncated = truncate_at(master, instant);
        truncated.recurrence.count = None;

        if truncated.ends_before_start() {
            tracing::debug!("Series has no occurrence left, deleting it");
            return self.delete_master(store, &truncated.uid);
        }

        ensure_written(store.save(&truncated)?)?;
        Ok(true)
    }

    /// Deletes a master, then its attachments once no calendar holds the uid.
    fn delete_master<S: EventStore>(&self, store: &mut S, uid: &str) -> ServiceResult<bool> {
        if !store.delete(self.calendar, uid)? {
            tracing::warn!(uid, "Nothing to delete");
            return Ok(false);
        }
        if store.find(uid)?.is_empty() {
            let removed = store.remove_attachments(uid)?;
            tracing::trace!(uid, removed, "Removed attachments");
        }
        Ok(true)
    }
}

/// ## Summary
/// Resolves the occurrence an edit addresses.
///
/// A generated-instance id yields its instant and an exception reference
/// yields the stored exception's instant (or the series start time on that
/// date). A series id on a recurring master addresses its first occurrence.
/// Otherwise the edit's start is used.
///
/// ## Errors
/// Returns `ServiceError::MalformedInput` when no instant can be derived.
pub fn resolve_instant(edit: &FlatEvent, master: &MasterEvent) -> ServiceResult<NaiveDateTime> {
    match edit.id.as_deref().map(OccurrenceId::classify) {
        Some(OccurrenceId::Generated { instant, .. }) => {
            from_epoch_seconds(instant).ok_or_else(unresolved)
        }
        Some(OccurrenceId::ExceptionRef { date, .. }) => Ok(master.exception_on(date).map_or_else(
            || date.and_time(master.fields.start.time()),
            |exception| exception.recurrence_id,
        )),
        Some(OccurrenceId::Series(_)) | None if master.is_recurring() => Ok(master.fields.start),
        Some(OccurrenceId::Series(_)) | None => edit.start.ok_or_else(unresolved),
    }
}

/// Ends the series one day before `instant` and drops exceptions from that
/// date on, which now belong to no occurrence.
fn truncate_at(mut master: MasterEvent, instant: NaiveDateTime) -> MasterEvent {
    master.recurrence.end_date = Some(instant - TimeDelta::days(1));
    master
        .exceptions
        .retain(|exception| exception.recurrence_id.date() < instant.date());
    master
}

fn require(existing: Option<MasterEvent>, uid: &str) -> ServiceResult<MasterEvent> {
    existing.ok_or_else(|| ServiceError::NotFound(format!("event {uid}")))
}

fn unresolved() -> ServiceError {
    ServiceError::MalformedInput("cannot resolve the edited occurrence".to_string())
}

fn ensure_written(outcome: SaveOutcome) -> ServiceResult<()> {
    if outcome.is_write() {
        Ok(())
    } else {
        tracing::error!(?outcome, "Persistence reported no write");
        Err(ServiceError::StorageFailure(
            "persistence reported no write".to_string(),
        ))
    }
}
