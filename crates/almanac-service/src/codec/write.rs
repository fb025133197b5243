//! Flat to storage transform.
//!
//! Writes are sparse merges: a field absent from the edit leaves the stored
//! value untouched.

use chrono::{NaiveDateTime, NaiveTime};

use almanac_db::model::{Attendee, EventFields, Organizer, Recurrence};

use super::FlatEvent;
use super::mapping::{ORGANIZER_ROLE, response_from_flat, role_from_flat, trigger_to_alarm};
use crate::error::{ServiceError, ServiceResult};
use crate::recurrence::RecurrenceEngine;

pub struct WriteContext<'a> {
    /// Uid of the user performing the write.
    pub viewer: &'a str,
    /// Modification timestamp stamped on every written record.
    pub now: NaiveDateTime,
    pub engine: &'a dyn RecurrenceEngine,
}

/// ## Summary
/// Builds the fields of a brand-new record from an edit.
///
/// ## Errors
/// Returns `ServiceError::MalformedInput` if the edit lacks a start or an end,
/// or carries an invalid alarm trigger.
pub fn new_fields(edit: &FlatEvent, ctx: &WriteContext<'_>) -> ServiceResult<EventFields> {
    let (Some(start), Some(end)) = (edit.start, edit.end) else {
        return Err(ServiceError::MalformedInput(
            "new events need a start and an end".to_string(),
        ));
    };
    let mut fields = EventFields::spanning(start, end);
    write_fields(&mut fields, edit, true, ctx)?;
    Ok(fields)
}

/// ## Summary
/// Merges an edit into stored fields.
///
/// All-day edits floor the start to midnight and move the inclusive end date
/// to the exclusive next midnight. The owner is only set on new records.
///
/// ## Errors
/// Returns `ServiceError::MalformedInput` on an invalid alarm trigger or an
/// end date that cannot be advanced.
pub fn write_fields(
    target: &mut EventFields,
    edit: &FlatEvent,
    is_new: bool,
    ctx: &WriteContext<'_>,
) -> ServiceResult<()> {
    if let Some(start) = edit.start {
        target.start = if edit.all_day { floor_day(start) } else { start };
    }
    if let Some(end) = edit.end {
        target.end = if edit.all_day { ceil_day(end)? } else { end };
    }
    if is_new {
        target.owner = Some(ctx.viewer.to_string());
    }

    if let Some(title) = &edit.title {
        target.title = Some(title.clone());
    }
    if let Some(description) = &edit.description {
        target.description = Some(description.clone());
    }
    if let Some(location) = &edit.location {
        target.location = Some(location.clone());
    }
    if let Some(categories) = &edit.categories {
        target.category = Some(categories.clone());
    }
    if let Some(trigger) = &edit.alarms {
        target.alarm = trigger_to_alarm(trigger)?;
    }
    if let Some(free_busy) = edit.free_busy {
        target.status = free_busy.into();
    }
    if let Some(sensitivity) = edit.sensitivity {
        target.classification = sensitivity.into();
    }

    if let Some(list) = edit.attendees.as_ref().filter(|list| !list.is_empty()) {
        let mut attendees = Vec::with_capacity(list.len());
        for entry in list {
            if entry.role.as_deref() == Some(ORGANIZER_ROLE) {
                // An organizer alone in the list is not an invitation.
                if list.len() != 1 {
                    target.organizer = Some(merge_organizer(
                        target.organizer.take(),
                        entry.name.clone(),
                        entry.email.clone(),
                        ctx.viewer,
                    ));
                }
                continue;
            }
            attendees.push(Attendee {
                name: entry.name.clone(),
                email: entry.email.clone(),
                role: entry
                    .role
                    .as_deref()
                    .map(role_from_flat)
                    .unwrap_or_default(),
                response: entry
                    .status
                    .as_deref()
                    .map(response_from_flat)
                    .unwrap_or_default(),
            });
        }
        target.attendees = attendees;
    }

    target.modified = Some(ctx.now);
    Ok(())
}

/// ## Summary
/// Replaces a master's recurrence when the edit carries a recurrence block.
/// A block without a rule clears the recurrence.
///
/// ## Errors
/// Returns an error if the engine rejects the rule.
pub fn write_recurrence(
    target: &mut Recurrence,
    edit: &FlatEvent,
    engine: &dyn RecurrenceEngine,
) -> ServiceResult<()> {
    if let Some(block) = &edit.recurrence {
        *target = match &block.rule {
            Some(rule) => engine.encode(rule)?,
            None => Recurrence::none(),
        };
    }
    Ok(())
}

/// Keeps the directory identity of an unchanged organizer. A newly named
/// organizer is the user performing the write.
fn merge_organizer(
    existing: Option<Organizer>,
    name: Option<String>,
    email: Option<String>,
    writer: &str,
) -> Organizer {
    match existing {
        Some(organizer) if organizer.email == email => Organizer {
            name: name.or(organizer.name),
            ..organizer
        },
        _ => Organizer {
            name,
            email,
            uid: Some(writer.to_string()),
            external: false,
        },
    }
}

fn floor_day(instant: NaiveDateTime) -> NaiveDateTime {
    instant.date().and_time(NaiveTime::MIN)
}

fn ceil_day(instant: NaiveDateTime) -> ServiceResult<NaiveDateTime> {
    instant
        .date()
        .succ_opt()
        .map(|date| date.and_time(NaiveTime::MIN))
        .ok_or_else(|| ServiceError::MalformedInput(format!("end date {instant} out of range")))
}
