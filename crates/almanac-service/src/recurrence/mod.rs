//! Recurrence engine seam.
//!
//! The service never interprets recurrence rules itself. It converts between
//! the stored [`Recurrence`] descriptor and the caller-facing [`RuleSummary`]
//! and asks an engine for successive instances.
//!
//! ## Module Organization
//!
//! - `rrule`: engine backed by the `rrule` crate

pub mod rrule;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use almanac_db::model::Recurrence;

use crate::error::ServiceResult;

pub use self::rrule::RRuleEngine;

/// Caller-facing recurrence rule.
///
/// `freq` and `by_day` use RFC 5545 spellings (`WEEKLY`, `MO`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSummary {
    pub freq: String,
    #[serde(default = "default_interval")]
    pub interval: u16,
    pub until: Option<NaiveDateTime>,
    pub count: Option<u32>,
    #[serde(default)]
    pub by_day: Vec<String>,
}

const fn default_interval() -> u16 {
    1
}

/// Recurrence rule collaborator.
pub trait RecurrenceEngine {
    /// Caller-facing rule for a stored descriptor, `None` for non-recurring events.
    ///
    /// ## Errors
    /// Returns `ServiceError::UpstreamFailure` if the descriptor cannot be rendered.
    fn decode(&self, recurrence: &Recurrence) -> ServiceResult<Option<RuleSummary>>;

    /// ## Errors
    /// Returns `ServiceError::MalformedInput` for unknown frequencies or weekdays.
    fn encode(&self, rule: &RuleSummary) -> ServiceResult<Recurrence>;

    /// First instance of the series starting at `dtstart` strictly after `after`.
    ///
    /// ## Errors
    /// Returns `ServiceError::UpstreamFailure` if the rule cannot be evaluated.
    fn next_instance(
        &self,
        recurrence: &Recurrence,
        dtstart: NaiveDateTime,
        after: NaiveDateTime,
    ) -> ServiceResult<Option<NaiveDateTime>>;
}
