//! Calendar operations for one viewer.
//!
//! ## Summary
//! [`CalendarService`] resolves identifiers and calendars, enforces write
//! access, then hands reads to the [`OccurrenceExpander`] and writes to the
//! [`RecurrenceSplitter`].

use chrono::{NaiveDateTime, TimeDelta, Utc};

use almanac_core::config::{AlarmConfig, ExpansionConfig, LabelConfig, Settings};
use almanac_core::identity::{from_public_calendar_ref, mint_uid, sanitize_uid, series_uid};
use almanac_db::model::{AttachmentSummary, EventRecord, MasterEvent};
use almanac_db::store::{EventQuery, EventStore};

use crate::alarm::{PendingAlarm, dismissed, is_pending, trigger_time};
use crate::codec::{FlatEvent, ReadContext, SaveMode, WriteContext, read_event};
use crate::error::{ServiceError, ServiceResult};
use crate::expand::{OccurrenceExpander, Window};
use crate::freebusy::{BusySlot, busy_slots};
use crate::recurrence::{RRuleEngine, RecurrenceEngine};
use crate::rights::{CalendarAccess, Right, RightSet, RightsProvider};
use crate::split::RecurrenceSplitter;

/// Source of the current time.
pub type Clock = fn() -> NaiveDateTime;

fn system_clock() -> NaiveDateTime {
    Utc::now().naive_utc()
}

/// Result of a mutation that passed the write-access check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Applied(T),
    /// Skipped without effect; reported as success to the caller.
    Suppressed,
}

impl<T> Outcome<T> {
    #[must_use]
    pub const fn is_suppressed(&self) -> bool {
        matches!(self, Self::Suppressed)
    }
}

/// Uid of the series holding the written data.
pub type WriteOutcome = Outcome<String>;
/// Whether anything was deleted.
pub type DeleteOutcome = Outcome<bool>;

/// Listing request.
#[derive(Debug, Clone)]
pub struct EventListRequest {
    pub window: Window,
    pub text: Option<String>,
    /// Public calendar references. `None` lists every visible calendar.
    pub calendars: Option<Vec<String>>,
    /// Materialize the occurrences of recurring series.
    pub virtual_occurrences: bool,
    pub modified_since: Option<NaiveDateTime>,
    pub freebusy: bool,
}

impl EventListRequest {
    #[must_use]
    pub const fn window(window: Window) -> Self {
        Self {
            window,
            text: None,
            calendars: None,
            virtual_occurrences: true,
            modified_since: None,
            freebusy: false,
        }
    }
}

pub struct CalendarService<S, R> {
    viewer: String,
    store: S,
    rights: R,
    engine: Box<dyn RecurrenceEngine>,
    expansion: ExpansionConfig,
    labels: LabelConfig,
    alarms: AlarmConfig,
    clock: Clock,
}

impl<S: EventStore, R: RightsProvider> CalendarService<S, R> {
    #[must_use]
    pub fn new(viewer: impl Into<String>, store: S, rights: R, settings: &Settings) -> Self {
        Self {
            viewer: viewer.into(),
            store,
            rights,
            engine: Box::new(RRuleEngine::new()),
            expansion: settings.expansion.clone(),
            labels: settings.labels.clone(),
            alarms: settings.alarms.clone(),
            clock: system_clock,
        }
    }

    #[must_use]
    pub fn with_engine(mut self, engine: impl RecurrenceEngine + 'static) -> Self {
        self.engine = Box::new(engine);
        self
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// ## Summary
    /// Creates an event, or applies a save-mode edit when the uid already exists.
    ///
    /// ## Errors
    /// Returns `AccessDenied` without write access on the target calendar,
    /// `MalformedInput` when the calendar is missing, and any error raised
    /// by the split.
    #[tracing::instrument(skip(self, edit), fields(viewer = %self.viewer, id = ?edit.id))]
    pub fn new_event(&mut self, edit: &FlatEvent) -> ServiceResult<WriteOutcome> {
        self.write(edit, true)
    }

    /// ## Summary
    /// Edits an existing event. When the edit names a previous calendar, the
    /// series is removed from it after the write succeeded.
    ///
    /// ## Errors
    /// See [`CalendarService::new_event`].
    #[tracing::instrument(skip(self, edit), fields(viewer = %self.viewer, id = ?edit.id))]
    pub fn edit_event(&mut self, edit: &FlatEvent) -> ServiceResult<WriteOutcome> {
        let outcome = self.write(edit, false)?;
        let target = edit.calendar.as_deref().map(from_public_calendar_ref);
        let source = edit.from_calendar.as_deref().map(from_public_calendar_ref);

        if !outcome.is_suppressed()
            && let Some(source) = source
            && target.as_deref() != Some(source.as_str())
        {
            tracing::debug!(from = %source, "Removing event from previous calendar");
            let uid = self.resolve_uid(edit, false)?;
            self.require_write(&source)?;
            if let Some(master) = self.store.load(&source, &uid)? {
                let ctx = WriteContext {
                    viewer: &self.viewer,
                    now: (self.clock)(),
                    engine: self.engine.as_ref(),
                };
                RecurrenceSplitter::new(&source, ctx).apply_delete(
                    &mut self.store,
                    master,
                    edit,
                    SaveMode::All,
                )?;
            }
        }
        Ok(outcome)
    }

    /// ## Summary
    /// Changes only the times of an event.
    ///
    /// `current`, `future` and `new` moves are seeded from the stored series
    /// so the affected occurrences keep their content. A `future` move keeps
    /// the series rule on the forked series.
    ///
    /// ## Errors
    /// Returns `NotFound` when the series does not exist, plus the errors of
    /// [`CalendarService::new_event`].
    #[tracing::instrument(skip(self, edit), fields(viewer = %self.viewer, id = ?edit.id))]
    pub fn move_event(&mut self, edit: &FlatEvent) -> ServiceResult<WriteOutcome> {
        let calendar = target_calendar(edit)?;
        let access = self.require_write(&calendar)?;
        let uid = self.resolve_uid(edit, false)?;
        let master = self
            .store
            .load(&calendar, &uid)?
            .ok_or_else(|| ServiceError::NotFound(format!("event {uid}")))?;
        if self.suppressed(&master, &access) {
            return Ok(Outcome::Suppressed);
        }

        let mode = edit.save_mode();
        let moved = match mode {
            SaveMode::Current | SaveMode::Future | SaveMode::New => {
                let mut seed = self.read_unredacted(&master, &access)?;
                seed.id.clone_from(&edit.id);
                seed.start = edit.start;
                seed.end = edit.end;
                seed.all_day = edit.all_day;
                seed.attachments.clear();
                seed.save_mode = Some(mode);
                if mode != SaveMode::Future {
                    seed.recurrence = None;
                }
                seed
            }
            SaveMode::All | SaveMode::None => FlatEvent {
                id: edit.id.clone(),
                uid: Some(uid.clone()),
                calendar: edit.calendar.clone(),
                start: edit.start,
                end: edit.end,
                all_day: edit.all_day,
                save_mode: Some(mode),
                ..FlatEvent::default()
            },
        };

        let ctx = WriteContext {
            viewer: &self.viewer,
            now: (self.clock)(),
            engine: self.engine.as_ref(),
        };
        let saved = RecurrenceSplitter::new(&calendar, ctx).apply_write(
            &mut self.store,
            Some(master),
            &uid,
            &moved,
            mode,
        )?;
        Ok(Outcome::Applied(saved))
    }

    /// Same as [`CalendarService::move_event`].
    ///
    /// ## Errors
    /// See [`CalendarService::move_event`].
    pub fn resize_event(&mut self, edit: &FlatEvent) -> ServiceResult<WriteOutcome> {
        self.move_event(edit)
    }

    /// ## Summary
    /// Deletes an occurrence, the tail of a series or a whole series,
    /// depending on the edit's save mode.
    ///
    /// ## Errors
    /// Returns `AccessDenied` without write access, `MalformedInput` for a
    /// missing calendar or identifier, and any error raised by the split.
    #[tracing::instrument(skip(self, edit), fields(viewer = %self.viewer, id = ?edit.id))]
    pub fn remove_event(&mut self, edit: &FlatEvent) -> ServiceResult<DeleteOutcome> {
        let calendar = target_calendar(edit)?;
        let access = self.require_write(&calendar)?;
        let uid = self.resolve_uid(edit, false)?;
        let Some(master) = self.store.load(&calendar, &uid)? else {
            tracing::debug!(uid, "Nothing to remove");
            return Ok(Outcome::Applied(false));
        };
        if self.suppressed(&master, &access) {
            return Ok(Outcome::Suppressed);
        }

        let ctx = WriteContext {
            viewer: &self.viewer,
            now: (self.clock)(),
            engine: self.engine.as_ref(),
        };
        let deleted = RecurrenceSplitter::new(&calendar, ctx).apply_delete(
            &mut self.store,
            master,
            edit,
            edit.save_mode(),
        )?;
        Ok(Outcome::Applied(deleted))
    }

    /// ## Summary
    /// Loads one series by uid or by any occurrence identifier.
    ///
    /// Without a calendar, the first visible calendar holding the uid is used.
    ///
    /// ## Errors
    /// Returns `NotFound` when no visible calendar holds the series.
    #[tracing::instrument(skip(self), fields(viewer = %self.viewer))]
    pub fn get_event(&self, id: &str, calendar: Option<&str>) -> ServiceResult<FlatEvent> {
        let uid = series_uid(id);
        let candidates: Vec<MasterEvent> = match calendar.map(from_public_calendar_ref) {
            Some(calendar) => self.store.load(&calendar, &uid)?.into_iter().collect(),
            None => self.store.find(&uid)?,
        };

        for master in candidates {
            let Some(access) = self.rights.access(&master.calendar)? else {
                continue;
            };
            let attachments = self.attachment_summaries(&master.uid)?;
            let ctx = self.read_context(&access, false, &attachments);
            return read_event(EventRecord::Master(&master), &ctx);
        }
        Err(ServiceError::NotFound(format!("event {id}")))
    }

    /// ## Summary
    /// Lists the events of the requested calendars in a window, sorted by start.
    ///
    /// Calendars where the viewer holds no right are skipped unless the
    /// request is a free/busy one.
    ///
    /// ## Errors
    /// Returns an error if the store, the rights provider or the recurrence
    /// engine fails.
    #[tracing::instrument(
        skip(self, request),
        fields(
            viewer = %self.viewer,
            window.start = %request.window.start,
            window.end = %request.window.end,
            freebusy = request.freebusy
        )
    )]
    pub fn load_events(&self, request: &EventListRequest) -> ServiceResult<Vec<FlatEvent>> {
        let accesses = self.listing_calendars(request)?;
        if accesses.is_empty() {
            return Ok(Vec::new());
        }

        let query = EventQuery {
            calendars: accesses
                .iter()
                .map(|access| access.calendar.clone())
                .collect(),
            start: Some(request.window.start),
            end: Some(request.window.end),
            text: request.text.clone(),
            modified_since: request.modified_since,
        };
        let masters = self.store.query(&query)?;
        tracing::debug!(count = masters.len(), "Queried masters");

        let expander = OccurrenceExpander::new(&self.expansion);
        let mut events = Vec::new();
        for master in &masters {
            let Some(access) = accesses
                .iter()
                .find(|access| access.calendar == master.calendar)
            else {
                continue;
            };
            let attachments = if request.freebusy {
                Vec::new()
            } else {
                self.attachment_summaries(&master.uid)?
            };
            let ctx = self.read_context(access, request.freebusy, &attachments);
            events.extend(expander.expand(
                master,
                request.window,
                request.virtual_occurrences,
                &ctx,
            )?);
        }

        events.sort_by_key(|event| event.start);
        Ok(events)
    }

    /// ## Summary
    /// Busy slots of one calendar in a window.
    ///
    /// ## Errors
    /// See [`CalendarService::load_events`].
    pub fn freebusy_list(&self, calendar: &str, window: Window) -> ServiceResult<Vec<BusySlot>> {
        let request = EventListRequest {
            calendars: Some(vec![calendar.to_string()]),
            freebusy: true,
            ..EventListRequest::window(window)
        };
        Ok(busy_slots(&self.load_events(&request)?))
    }

    /// ## Summary
    /// Alarms of masters and live exceptions that fired within the configured
    /// age before `now` and were neither acknowledged nor snoozed.
    ///
    /// ## Errors
    /// Returns an error if the store or the rights provider fails.
    #[tracing::instrument(skip(self, calendars), fields(viewer = %self.viewer))]
    pub fn pending_alarms(
        &self,
        now: NaiveDateTime,
        calendars: Option<&[String]>,
    ) -> ServiceResult<Vec<PendingAlarm>> {
        let max_age = TimeDelta::try_days(self.alarms.max_age_days).unwrap_or(TimeDelta::MAX);
        let request = EventListRequest {
            calendars: calendars.map(<[String]>::to_vec),
            ..EventListRequest::window(Window::new(now, now))
        };
        let accesses = self.listing_calendars(&request)?;
        let query = EventQuery {
            calendars: accesses
                .iter()
                .map(|access| access.calendar.clone())
                .collect(),
            ..EventQuery::default()
        };

        let mut pending = Vec::new();
        for master in self.store.query(&query)? {
            let Some(access) = accesses
                .iter()
                .find(|access| access.calendar == master.calendar)
            else {
                continue;
            };
            let state = self.store.alarm_state(&master.calendar, &master.uid)?;
            let ctx = self.read_context(access, false, &[]);

            let records = std::iter::once(EventRecord::Master(&master)).chain(
                master
                    .exceptions
                    .iter()
                    .filter(|exception| !exception.is_deleted())
                    .map(|exception| EventRecord::Exception {
                        master: &master,
                        exception,
                    }),
            );
            for record in records {
                let Some(trigger) = record.fields().and_then(trigger_time) else {
                    continue;
                };
                if !is_pending(trigger, &state, now, max_age) {
                    continue;
                }
                let mut event = read_event(record, &ctx)?;
                event.recurrence = None;
                pending.push(PendingAlarm { trigger, event });
            }
        }

        pending.sort_by_key(|alarm| alarm.trigger);
        Ok(pending)
    }

    /// ## Summary
    /// Snoozes (positive `snooze`) or acknowledges the alarm of `uid` in every
    /// visible calendar holding it. Returns `false` if none does.
    ///
    /// ## Errors
    /// Returns an error if the store or the rights provider fails.
    #[tracing::instrument(skip(self), fields(viewer = %self.viewer))]
    pub fn dismiss_alarm(
        &mut self,
        uid: &str,
        snooze: Option<TimeDelta>,
        now: NaiveDateTime,
    ) -> ServiceResult<bool> {
        let uid = series_uid(uid);
        let mut updated = false;
        for master in self.store.find(&uid)? {
            if self.rights.access(&master.calendar)?.is_none() {
                continue;
            }
            let state = self.store.alarm_state(&master.calendar, &uid)?;
            self.store
                .save_alarm_state(&master.calendar, &uid, dismissed(state, snooze, now))?;
            updated = true;
        }
        Ok(updated)
    }

    fn write(&mut self, edit: &FlatEvent, is_new: bool) -> ServiceResult<WriteOutcome> {
        let calendar = target_calendar(edit)?;
        let access = self.require_write(&calendar)?;
        let uid = self.resolve_uid(edit, is_new)?;

        let existing = self.store.load(&calendar, &uid)?;
        if let Some(master) = &existing
            && self.suppressed(master, &access)
        {
            return Ok(Outcome::Suppressed);
        }
        let uid = if existing.is_none() {
            sanitize_uid(&uid)
        } else {
            uid
        };
        let organizer_uid = existing
            .as_ref()
            .and_then(|master| master.fields.organizer.as_ref())
            .map(|organizer| organizer.uid.clone());

        let ctx = WriteContext {
            viewer: &self.viewer,
            now: (self.clock)(),
            engine: self.engine.as_ref(),
        };
        let saved = RecurrenceSplitter::new(&calendar, ctx).apply_write(
            &mut self.store,
            existing,
            &uid,
            edit,
            edit.save_mode(),
        )?;

        // Only the organizer attaches files.
        let may_attach =
            organizer_uid.is_none_or(|uid| uid.as_deref() == Some(self.viewer.as_str()));
        if may_attach {
            for attachment in &edit.new_attachments {
                self.store
                    .add_attachment(&saved, &access.owner, attachment.clone())?;
            }
        } else if !edit.new_attachments.is_empty() {
            tracing::warn!(uid = %saved, "Viewer is not the organizer, attachments ignored");
        }
        for id in &edit.deleted_attachments {
            self.store.remove_attachment(id)?;
        }

        Ok(Outcome::Applied(saved))
    }

    /// Series uid of an edit: its `uid`, else its identifier stripped of any
    /// occurrence suffix, else a fresh uid for new events.
    fn resolve_uid(&self, edit: &FlatEvent, is_new: bool) -> ServiceResult<String> {
        if let Some(uid) = edit.uid.as_deref().filter(|uid| !uid.is_empty()) {
            return Ok(uid.to_string());
        }
        if let Some(id) = edit.id.as_deref().filter(|id| !id.is_empty()) {
            return Ok(series_uid(id));
        }
        if is_new {
            return Ok(mint_uid((self.clock)().and_utc()));
        }
        Err(ServiceError::MalformedInput(
            "edit carries neither uid nor id".to_string(),
        ))
    }

    fn require_write(&self, calendar: &str) -> ServiceResult<CalendarAccess> {
        match self.rights.access(calendar)? {
            Some(access) if access.has(Right::Write) => Ok(access),
            _ => {
                tracing::warn!(calendar, viewer = %self.viewer, "Write access denied");
                Err(ServiceError::AccessDenied(format!(
                    "no write access on calendar {calendar}"
                )))
            }
        }
    }

    /// Writes that would expose or alter events the viewer only attends, or
    /// private events of others, are skipped silently.
    fn suppressed(&self, master: &MasterEvent, access: &CalendarAccess) -> bool {
        let fields = &master.fields;
        if fields
            .organizer
            .as_ref()
            .is_some_and(|organizer| organizer.is_foreign_to(&access.owner))
        {
            tracing::warn!(uid = %master.uid, "Viewer only attends this event, write skipped");
            return true;
        }
        if fields.classification.is_restricted()
            && access.owner != self.viewer
            && !access.has(Right::Privileged)
        {
            tracing::warn!(uid = %master.uid, "Private event of another user, write skipped");
            return true;
        }
        false
    }

    fn listing_calendars(&self, request: &EventListRequest) -> ServiceResult<Vec<CalendarAccess>> {
        let accesses = match &request.calendars {
            Some(calendars) => {
                let mut accesses = Vec::with_capacity(calendars.len());
                for calendar in calendars {
                    let calendar = from_public_calendar_ref(calendar);
                    match self.rights.access(&calendar)? {
                        Some(access) => accesses.push(access),
                        None if request.freebusy => accesses.push(CalendarAccess {
                            owner: calendar.clone(),
                            calendar,
                            rights: RightSet::empty(),
                        }),
                        None => tracing::trace!(calendar, "Calendar not visible"),
                    }
                }
                accesses
            }
            None => self.rights.calendars()?,
        };

        Ok(accesses
            .into_iter()
            .filter(|access| request.freebusy || !access.rights.is_empty())
            .collect())
    }

    fn attachment_summaries(&self, uid: &str) -> ServiceResult<Vec<AttachmentSummary>> {
        Ok(self
            .store
            .list_attachments(uid)?
            .iter()
            .map(almanac_db::model::Attachment::summary)
            .collect())
    }

    fn read_context<'a>(
        &'a self,
        access: &'a CalendarAccess,
        freebusy: bool,
        attachments: &'a [AttachmentSummary],
    ) -> ReadContext<'a> {
        ReadContext {
            viewer: &self.viewer,
            access,
            freebusy,
            labels: &self.labels,
            alarm_action: &self.alarms.action,
            engine: self.engine.as_ref(),
            attachments,
        }
    }

    /// Reads a master with every field visible, as a seed for derived writes.
    fn read_unredacted(
        &self,
        master: &MasterEvent,
        access: &CalendarAccess,
    ) -> ServiceResult<FlatEvent> {
        let unrestricted = CalendarAccess {
            rights: RightSet::all(),
            ..access.clone()
        };
        let ctx = self.read_context(&unrestricted, false, &[]);
        read_event(EventRecord::Master(master), &ctx)
    }
}

fn target_calendar(edit: &FlatEvent) -> ServiceResult<String> {
    edit.calendar
        .as_deref()
        .filter(|calendar| !calendar.is_empty())
        .map(from_public_calendar_ref)
        .ok_or_else(|| ServiceError::MalformedInput("edit names no calendar".to_string()))
}
