//! Storage to flat transform.

use chrono::{NaiveDateTime, TimeDelta};

use almanac_core::config::LabelConfig;
use almanac_core::identity::to_public_calendar_ref;
use almanac_db::model::{AttachmentSummary, EventFields, EventRecord, Exception};

use super::mapping::{ORGANIZER_ROLE, alarm_to_trigger, response_to_flat, role_to_flat};
use super::{FlatAttendee, FlatEvent, FlatRecurrence};
use crate::error::ServiceResult;
use crate::recurrence::RecurrenceEngine;
use crate::rights::CalendarAccess;
use crate::visibility::{Redaction, decide, status_title};

/// Everything the read transform needs besides the record itself.
pub struct ReadContext<'a> {
    pub viewer: &'a str,
    pub access: &'a CalendarAccess,
    /// Availability query: only times and status-derived titles.
    pub freebusy: bool,
    pub labels: &'a LabelConfig,
    /// Action suffix of alarm trigger strings.
    pub alarm_action: &'a str,
    pub engine: &'a dyn RecurrenceEngine,
    pub attachments: &'a [AttachmentSummary],
}

/// ## Summary
/// Reads a stored master or exception into a flat event.
///
/// A tombstone reads as an event at the epoch with an empty recurrence block.
/// A recurring master carries its rule, the instants of all of its
/// exceptions as excluded dates, and its live exceptions read recursively.
///
/// ## Errors
/// Returns an error if the recurrence engine cannot decode the master's rule.
pub fn read_event(record: EventRecord<'_>, ctx: &ReadContext<'_>) -> ServiceResult<FlatEvent> {
    let master = record.master();
    let id = match record {
        EventRecord::Master(master) => master.uid.clone(),
        EventRecord::Exception { exception, .. } => exception.public_id(),
    };

    let mut flat = FlatEvent {
        id: Some(id),
        uid: Some(master.uid.clone()),
        calendar: Some(to_public_calendar_ref(&master.calendar)),
        ..FlatEvent::default()
    };

    if let EventRecord::Exception { exception, .. } = record {
        flat.is_exception = true;
        flat.recurrence_id = Some(exception.recurrence_id);
    }

    let Some(fields) = record.fields() else {
        tracing::trace!(id = ?flat.id, "Reading tombstone");
        flat.start = Some(NaiveDateTime::UNIX_EPOCH);
        flat.end = Some(NaiveDateTime::UNIX_EPOCH);
        flat.recurrence = Some(FlatRecurrence::default());
        return Ok(flat);
    };

    apply_times(&mut flat, fields);
    flat.changed = fields.modified;
    flat.free_busy = Some(fields.status.into());

    let redaction = decide(fields.classification, ctx.access, ctx.viewer, ctx.freebusy);
    tracing::trace!(id = ?flat.id, ?redaction, "Redaction decided");
    if !ctx.freebusy {
        flat.sensitivity = Some(fields.classification.into());
    }

    match redaction {
        Redaction::Private => flat.title = Some(ctx.labels.private_title.clone()),
        Redaction::FreeBusy => {
            flat.title = Some(status_title(ctx.labels, fields.status).to_string());
        }
        Redaction::Full => apply_content(&mut flat, fields, ctx),
    }

    if let EventRecord::Master(master) = record
        && master.is_recurring()
    {
        let rule = ctx.engine.decode(&master.recurrence)?;
        let exdates = master
            .exceptions
            .iter()
            .map(|exception| exception.recurrence_id)
            .collect();
        let exceptions = master
            .exceptions
            .iter()
            .filter(|exception| !exception.is_deleted())
            .map(|exception| read_exception(master, exception, ctx))
            .collect::<ServiceResult<Vec<_>>>()?;
        flat.recurrence = Some(FlatRecurrence {
            rule,
            exdates,
            exceptions,
        });
    }

    Ok(flat)
}

fn read_exception(
    master: &almanac_db::model::MasterEvent,
    exception: &Exception,
    ctx: &ReadContext<'_>,
) -> ServiceResult<FlatEvent> {
    read_event(EventRecord::Exception { master, exception }, ctx)
}

/// Midnight-to-midnight events display with an inclusive end date.
fn apply_times(flat: &mut FlatEvent, fields: &EventFields) {
    if fields.is_all_day() {
        flat.all_day = true;
        flat.start = Some(fields.start);
        flat.end = Some(fields.end - TimeDelta::days(1));
    } else {
        flat.start = Some(fields.start);
        flat.end = Some(fields.end);
    }
}

fn apply_content(flat: &mut FlatEvent, fields: &EventFields, ctx: &ReadContext<'_>) {
    flat.title.clone_from(&fields.title);
    flat.description.clone_from(&fields.description);
    flat.location.clone_from(&fields.location);
    flat.categories.clone_from(&fields.category);
    flat.alarms = fields
        .alarm
        .and_then(|minutes| alarm_to_trigger(minutes, ctx.alarm_action));

    if !fields.attendees.is_empty() {
        let mut attendees = Vec::with_capacity(fields.attendees.len() + 1);
        if let Some(organizer) = &fields.organizer {
            attendees.push(FlatAttendee {
                name: organizer.name.clone(),
                email: organizer.email.clone(),
                role: Some(ORGANIZER_ROLE.to_string()),
                status: None,
            });
        }
        attendees.extend(fields.attendees.iter().map(|attendee| FlatAttendee {
            name: attendee.name.clone(),
            email: attendee.email.clone(),
            role: Some(role_to_flat(attendee.role).to_string()),
            status: Some(response_to_flat(attendee.response).to_string()),
        }));
        flat.attendees = Some(attendees);
    }

    flat.attachments = ctx.attachments.to_vec();
}

/// Shifts a read event onto another instant of its series, keeping its duration.
pub(crate) fn shift_to(flat: &mut FlatEvent, start: NaiveDateTime, duration: TimeDelta) {
    flat.start = Some(start);
    let end = start + duration;
    flat.end = Some(if flat.all_day {
        end - TimeDelta::days(1)
    } else {
        end
    });
}
