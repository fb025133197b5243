//! Mapping between caller-facing flat events and stored records.
//!
//! ## Module Organization
//!
//! - `mapping`: fixed enumeration maps and the alarm trigger string
//! - `read`: storage to flat, with redaction
//! - `write`: flat to storage, as a sparse merge

pub mod mapping;
pub mod read;
pub mod write;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use almanac_db::model::{AttachmentSummary, NewAttachment};

use crate::recurrence::RuleSummary;

pub use mapping::{FreeBusy, Sensitivity};
pub use read::{ReadContext, read_event};
pub use write::{WriteContext, new_fields, write_fields, write_recurrence};

/// Scope of a write or delete on a recurring series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveMode {
    #[default]
    None,
    /// Only the addressed occurrence.
    Current,
    /// The addressed occurrence and every later one.
    Future,
    /// Detach the addressed occurrence as an independent event.
    New,
    /// The whole series.
    All,
}

impl SaveMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Current => "current",
            Self::Future => "future",
            Self::New => "new",
            Self::All => "all",
        }
    }
}

/// Attendee as exchanged with callers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatAttendee {
    pub name: Option<String>,
    pub email: Option<String>,
    /// `ORGANIZER`, `CHAIR`, `REQ-PARTICIPANT`, `OPT-PARTICIPANT` or `NON-PARTICIPANT`.
    pub role: Option<String>,
    /// `NEEDS-ACTION`, `ACCEPTED`, `DECLINED`, `TENTATIVE` or `DELEGATED`.
    pub status: Option<String>,
}

/// Recurrence block of a flat event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlatRecurrence {
    pub rule: Option<RuleSummary>,
    /// Occurrence instants suppressed from rule expansion.
    #[serde(default)]
    pub exdates: Vec<NaiveDateTime>,
    /// Overridden occurrences, each read as its own flat event.
    #[serde(default)]
    pub exceptions: Vec<FlatEvent>,
}

/// One visible occurrence, or an edit of one.
///
/// On write every `None` field is left untouched on the stored record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlatEvent {
    /// Occurrence identifier; may carry a generated-instant or exception suffix.
    pub id: Option<String>,
    /// Series uid.
    pub uid: Option<String>,
    /// Public calendar reference.
    pub calendar: Option<String>,
    /// Previous calendar when an edit moves the event between calendars.
    pub from_calendar: Option<String>,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    #[serde(default)]
    pub all_day: bool,
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub categories: Option<String>,
    /// Trigger string `<sign><N><unit>:<action>`, e.g. `-15M:DISPLAY`.
    pub alarms: Option<String>,
    pub free_busy: Option<FreeBusy>,
    pub sensitivity: Option<Sensitivity>,
    pub attendees: Option<Vec<FlatAttendee>>,
    pub recurrence: Option<FlatRecurrence>,
    /// Set on overridden occurrences.
    #[serde(default)]
    pub is_exception: bool,
    /// Instant of the occurrence an exception or generated instance stands for.
    pub recurrence_id: Option<NaiveDateTime>,
    pub changed: Option<NaiveDateTime>,
    /// Attachment summaries, populated on full-detail reads.
    #[serde(default)]
    pub attachments: Vec<AttachmentSummary>,
    /// Attachments to store with the event on write.
    #[serde(default)]
    pub new_attachments: Vec<NewAttachment>,
    /// Attachment ids to remove on write.
    #[serde(default)]
    pub deleted_attachments: Vec<String>,
    pub save_mode: Option<SaveMode>,
}

impl FlatEvent {
    #[must_use]
    pub fn save_mode(&self) -> SaveMode {
        self.save_mode.unwrap_or_default()
    }
}
