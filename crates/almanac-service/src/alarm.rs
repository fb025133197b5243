//! Alarm triggers and acknowledgement.

use chrono::{NaiveDateTime, TimeDelta};
use serde::Serialize;

use almanac_db::model::{AlarmState, EventFields};

use crate::codec::FlatEvent;

/// An alarm due for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PendingAlarm {
    pub trigger: NaiveDateTime,
    pub event: FlatEvent,
}

/// Instant at which the alarm of `fields` fires, if it has one.
#[must_use]
pub fn trigger_time(fields: &EventFields) -> Option<NaiveDateTime> {
    let minutes = fields.alarm.filter(|minutes| *minutes != 0)?;
    fields
        .start
        .checked_add_signed(TimeDelta::try_minutes(minutes)?)
}

/// ## Summary
/// Returns `true` if an alarm triggered at `trigger` must still be shown at `now`.
///
/// The trigger must lie within `max_age` before `now`. Alarms acknowledged
/// after they fired and alarms snoozed past `now` are not pending.
#[must_use]
pub fn is_pending(
    trigger: NaiveDateTime,
    state: &AlarmState,
    now: NaiveDateTime,
    max_age: TimeDelta,
) -> bool {
    let oldest = now.checked_sub_signed(max_age).unwrap_or(NaiveDateTime::MIN);
    if trigger <= oldest || trigger >= now {
        return false;
    }
    if state.last_ack.is_some_and(|ack| ack > trigger) {
        return false;
    }
    state.snooze_until.is_none_or(|until| until <= now)
}

/// New alarm state after a dismissal at `now`. A positive `snooze` postpones
/// the alarm, anything else acknowledges it.
#[must_use]
pub fn dismissed(
    mut state: AlarmState,
    snooze: Option<TimeDelta>,
    now: NaiveDateTime,
) -> AlarmState {
    match snooze.filter(|snooze| *snooze > TimeDelta::zero()) {
        Some(snooze) => state.snooze_until = now.checked_add_signed(snooze),
        None => state.last_ack = Some(now),
    }
    state
}
