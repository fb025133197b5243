//! Calendar event services: identity codecs, visibility, recurrence
//! splitting and occurrence expansion.
//!
//! ## Module Organization
//!
//! - `alarm`: alarm triggers, pending alarms and dismissal
//! - `codec`: conversion between stored records and flat caller events
//! - `error`: service error type and failure classes
//! - `expand`: occurrence expansion over a time window
//! - `freebusy`: busy slots derived from listed events
//! - `recurrence`: recurrence rule engine seam
//! - `rights`: per-calendar access rights
//! - `service`: the operations exposed to callers
//! - `split`: save-mode writes and deletes on recurring series
//! - `visibility`: redaction decisions

pub mod alarm;
pub mod codec;
pub mod error;
pub mod expand;
pub mod freebusy;
pub mod recurrence;
pub mod rights;
pub mod service;
pub mod split;
pub mod visibility;
