//! Busy time aggregation.

use chrono::{NaiveDateTime, NaiveTime, TimeDelta};
use serde::Serialize;

use crate::codec::{FlatEvent, FreeBusy};

/// One busy range as reported to availability queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BusySlot {
    pub from: NaiveDateTime,
    pub to: NaiveDateTime,
    pub kind: FreeBusy,
}

/// ## Summary
/// Reduces expanded events to busy slots.
///
/// All-day events cover whole days, from the start date's midnight to the
/// midnight after the inclusive end date. Events without a status count as busy.
#[must_use]
pub fn busy_slots(events: &[FlatEvent]) -> Vec<BusySlot> {
    events
        .iter()
        .filter_map(|event| {
            let (from, to) = (event.start?, event.end?);
            let (from, to) = if event.all_day {
                (
                    from.date().and_time(NaiveTime::MIN),
                    to.date().and_time(NaiveTime::MIN) + TimeDelta::days(1),
                )
            } else {
                (from, to)
            };
            Some(BusySlot {
                from,
                to,
                kind: event.free_busy.unwrap_or(FreeBusy::Busy),
            })
        })
        .collect()
}
