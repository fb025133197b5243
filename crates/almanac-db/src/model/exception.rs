use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use almanac_core::identity::encode_exception_ref;

use super::event::EventFields;

/// Per-occurrence override or deletion of a series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exception {
    pub series_uid: String,
    /// Instant of the occurrence this record overrides.
    pub recurrence_id: NaiveDateTime,
    pub state: ExceptionState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "fields")]
pub enum ExceptionState {
    Override(Box<EventFields>),
    /// Tombstone: suppresses the occurrence, carries nothing visible.
    Deleted,
}

impl Exception {
    #[must_use]
    pub fn tombstone(series_uid: &str, recurrence_id: NaiveDateTime) -> Self {
        Self {
            series_uid: series_uid.to_string(),
            recurrence_id,
            state: ExceptionState::Deleted,
        }
    }

    #[must_use]
    pub fn with_fields(
        series_uid: &str,
        recurrence_id: NaiveDateTime,
        fields: EventFields,
    ) -> Self {
        Self {
            series_uid: series_uid.to_string(),
            recurrence_id,
            state: ExceptionState::Override(Box::new(fields)),
        }
    }

    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        matches!(self.state, ExceptionState::Deleted)
    }

    #[must_use]
    pub fn fields(&self) -> Option<&EventFields> {
        match &self.state {
            ExceptionState::Override(fields) => Some(fields),
            ExceptionState::Deleted => None,
        }
    }

    /// Caller-visible identifier of this exception.
    #[must_use]
    pub fn public_id(&self) -> String {
        encode_exception_ref(&self.series_uid, self.recurrence_id.date())
    }
}
