//! Storage-side calendar records.
//!
//! ## Module Organization
//!
//! - `alarm`: per-event alarm acknowledgement and snooze state
//! - `attachment`: attachment summaries and uploads keyed by event uid
//! - `attendee`: attendees and organizer
//! - `enums`: classification, status, attendee role and response
//! - `event`: shared event fields and the series master record
//! - `exception`: per-occurrence overrides and tombstones
//! - `recurrence`: the stored recurrence descriptor

pub mod alarm;
pub mod attachment;
pub mod attendee;
pub mod enums;
pub mod event;
pub mod exception;
pub mod recurrence;

pub use alarm::AlarmState;
pub use attachment::{Attachment, AttachmentSummary, NewAttachment};
pub use attendee::{Attendee, Organizer};
pub use enums::{AttendeeResponse, AttendeeRole, Classification, EventStatus};
pub use event::{EventFields, EventRecord, MasterEvent};
pub use exception::{Exception, ExceptionState};
pub use recurrence::{Recurrence, RecurrenceKind};
