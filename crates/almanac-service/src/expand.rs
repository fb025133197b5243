//! Expansion of series into the occurrences visible in a window.

use chrono::{NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

use almanac_core::config::ExpansionConfig;
use almanac_core::identity::{encode_generated, epoch_seconds};
use almanac_db::model::{EventRecord, MasterEvent};

use crate::codec::read::shift_to;
use crate::codec::{FlatEvent, ReadContext, read_event};
use crate::error::ServiceResult;

/// Closed time range of a listing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Window {
    #[must_use]
    pub const fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub fn overlaps(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        start <= self.end && end >= self.start
    }
}

/// Turns masters into virtual occurrences.
#[derive(Debug, Clone, Copy)]
pub struct OccurrenceExpander {
    lookback: TimeDelta,
    max_instances: usize,
}

impl OccurrenceExpander {
    #[must_use]
    pub fn new(config: &ExpansionConfig) -> Self {
        Self {
            lookback: TimeDelta::try_days(config.lookback_days).unwrap_or(TimeDelta::MAX),
            max_instances: config.max_instances,
        }
    }

    /// ## Summary
    /// Expands `master` over `window`.
    ///
    /// Without `materialize` a recurring master is returned once, carrying its
    /// rule and exceptions. With it, the output holds the master itself unless
    /// an exception exists on its start date, every generated instance in the
    /// window not excluded by an exception, and every live exception in the
    /// window. Output follows generation order, not start order.
    ///
    /// ## Errors
    /// Returns an error if the read transform or the recurrence engine fails.
    #[tracing::instrument(
        skip(self, master, window, ctx),
        fields(uid = %master.uid, window.start = %window.start, window.end = %window.end)
    )]
    pub fn expand(
        &self,
        master: &MasterEvent,
        window: Window,
        materialize: bool,
        ctx: &ReadContext<'_>,
    ) -> ServiceResult<Vec<FlatEvent>> {
        let mut flat = read_event(EventRecord::Master(master), ctx)?;
        let fields = &master.fields;

        if !master.is_recurring() {
            return Ok(if window.overlaps(fields.start, fields.end) {
                vec![flat]
            } else {
                Vec::new()
            });
        }
        if master.ends_before_start() {
            tracing::debug!("Series ends before its first occurrence");
            return Ok(Vec::new());
        }
        if !materialize {
            return Ok(vec![flat]);
        }

        let exceptions = flat
            .recurrence
            .as_mut()
            .map(|block| std::mem::take(&mut block.exceptions))
            .unwrap_or_default();
        let excluded = master.excluded_dates();
        let mut occurrences = Vec::new();

        if excluded.binary_search(&fields.start.date()).is_ok() {
            tracing::debug!("Series start superseded by an exception");
        } else if window.overlaps(fields.start, fields.end) {
            occurrences.push(flat.clone());
        }

        let duration = fields.duration();
        let lookback_start = window
            .start
            .checked_sub_signed(self.lookback)
            .unwrap_or(window.start);
        let mut after = fields.start.max(lookback_start);
        let mut generated = 0_usize;
        while let Some(instant) =
            ctx.engine
                .next_instance(&master.recurrence, fields.start, after)?
        {
            after = instant;
            generated += 1;
            if generated > self.max_instances {
                tracing::warn!(limit = self.max_instances, "Instance limit reached");
                break;
            }
            if excluded.binary_search(&instant.date()).is_ok() {
                tracing::trace!(%instant, "Instance excluded");
                continue;
            }
            if instant + duration < window.start {
                continue;
            }
            if instant > window.end {
                break;
            }

            let mut occurrence = flat.clone();
            occurrence.id = Some(encode_generated(&master.uid, epoch_seconds(instant)));
            occurrence.recurrence_id = Some(instant);
            shift_to(&mut occurrence, instant, duration);
            occurrences.push(occurrence);
        }

        let live = master
            .exceptions
            .iter()
            .filter_map(|exception| exception.fields());
        for (stored, exception) in live.zip(exceptions) {
            if window.overlaps(stored.start, stored.end) {
                occurrences.push(exception);
            }
        }

        tracing::debug!(count = occurrences.len(), generated, "Expanded series");
        Ok(occurrences)
    }
}
