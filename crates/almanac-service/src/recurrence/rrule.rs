//! [`RecurrenceEngine`] backed by the `rrule` crate.

use ::rrule::{RRule, RRuleSet, Tz, Unvalidated};
use chrono::{DateTime, NaiveDateTime, Utc, Weekday};

use almanac_db::model::{Recurrence, RecurrenceKind};

use super::{RecurrenceEngine, RuleSummary};
use crate::error::{ServiceError, ServiceResult};

/// Instances fetched per lookup. Two are enough to step past an inclusive bound.
const LOOKAHEAD: u16 = 2;

#[derive(Debug, Clone, Copy, Default)]
pub struct RRuleEngine;

impl RRuleEngine {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Renders the descriptor as an RRULE value. The end date is applied
    /// separately by cutting instants, never through `UNTIL`.
    fn rule_text(recurrence: &Recurrence) -> Option<String> {
        let freq = freq_name(recurrence.kind)?;
        let mut text = format!("FREQ={freq};INTERVAL={}", recurrence.interval.max(1));
        if !recurrence.weekdays.is_empty() {
            let days: Vec<&str> = recurrence
                .weekdays
                .iter()
                .map(|day| weekday_name(*day))
                .collect();
            text.push_str(";BYDAY=");
            text.push_str(&days.join(","));
        }
        if let Some(count) = recurrence.count.filter(|count| *count > 0) {
            text.push_str(&format!(";COUNT={count}"));
        }
        Some(text)
    }

    fn build(recurrence: &Recurrence, dtstart: NaiveDateTime) -> ServiceResult<Option<RRuleSet>> {
        let Some(text) = Self::rule_text(recurrence) else {
            return Ok(None);
        };
        tracing::trace!(rrule = %text, "Building recurrence rule");

        let rrule = text
            .parse::<RRule<Unvalidated>>()
            .map_err(|err| ServiceError::UpstreamFailure(err.to_string()))?;
        let dt_start = to_tz(dtstart);
        let set = rrule
            .build(dt_start)
            .map_err(|err| ServiceError::UpstreamFailure(err.to_string()))?;
        Ok(Some(set))
    }
}

impl RecurrenceEngine for RRuleEngine {
    fn decode(&self, recurrence: &Recurrence) -> ServiceResult<Option<RuleSummary>> {
        let Some(freq) = freq_name(recurrence.kind) else {
            return Ok(None);
        };
        Ok(Some(RuleSummary {
            freq: freq.to_string(),
            interval: recurrence.interval.max(1),
            until: recurrence.end_date,
            count: recurrence.count.filter(|count| *count > 0),
            by_day: recurrence
                .weekdays
                .iter()
                .map(|day| weekday_name(*day).to_string())
                .collect(),
        }))
    }

    fn encode(&self, rule: &RuleSummary) -> ServiceResult<Recurrence> {
        let kind = match rule.freq.to_ascii_uppercase().as_str() {
            "" | "NONE" => RecurrenceKind::None,
            "DAILY" => RecurrenceKind::Daily,
            "WEEKLY" => RecurrenceKind::Weekly,
            "MONTHLY" => RecurrenceKind::Monthly,
            "YEARLY" => RecurrenceKind::Yearly,
            other => {
                return Err(ServiceError::MalformedInput(format!(
                    "unsupported recurrence frequency '{other}'"
                )));
            }
        };
        if kind == RecurrenceKind::None {
            return Ok(Recurrence::none());
        }

        let weekdays = rule
            .by_day
            .iter()
            .map(|day| {
                parse_weekday(day).ok_or_else(|| {
                    ServiceError::MalformedInput(format!("unsupported weekday '{day}'"))
                })
            })
            .collect::<ServiceResult<Vec<_>>>()?;

        Ok(Recurrence {
            kind,
            interval: rule.interval.max(1),
            end_date: rule.until,
            count: rule.count.filter(|count| *count > 0),
            weekdays,
        })
    }

    fn next_instance(
        &self,
        recurrence: &Recurrence,
        dtstart: NaiveDateTime,
        after: NaiveDateTime,
    ) -> ServiceResult<Option<NaiveDateTime>> {
        let Some(set) = Self::build(recurrence, dtstart)? else {
            return Ok(None);
        };

        let result = set.after(to_tz(after)).all(LOOKAHEAD);
        let next = result
            .dates
            .into_iter()
            .map(|date| date.with_timezone(&Utc).naive_utc())
            .find(|instant| *instant > after);

        Ok(next.filter(|instant| recurrence.end_date.is_none_or(|end| *instant <= end)))
    }
}

fn to_tz(instant: NaiveDateTime) -> DateTime<Tz> {
    instant.and_utc().with_timezone(&Tz::UTC)
}

const fn freq_name(kind: RecurrenceKind) -> Option<&'static str> {
    match kind {
        RecurrenceKind::None => None,
        RecurrenceKind::Daily => Some("DAILY"),
        RecurrenceKind::Weekly => Some("WEEKLY"),
        RecurrenceKind::Monthly => Some("MONTHLY"),
        RecurrenceKind::Yearly => Some("YEARLY"),
    }
}

const fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}

fn parse_weekday(value: &str) -> Option<Weekday> {
    match value.to_ascii_uppercase().as_str() {
        "MO" => Some(Weekday::Mon),
        "TU" => Some(Weekday::Tue),
        "WE" => Some(Weekday::Wed),
        "TH" => Some(Weekday::Thu),
        "FR" => Some(Weekday::Fri),
        "SA" => Some(Weekday::Sat),
        "SU" => Some(Weekday::Sun),
        _ => None,
    }
}
