//! Models for calendar event attendees.

use serde::{Deserialize, Serialize};

use super::enums::{AttendeeResponse, AttendeeRole};

/// Calendar event attendee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendee {
    /// Common name of attendee.
    pub name: Option<String>,
    /// Attendee e-mail address.
    pub email: Option<String>,
    /// Participation role (chair, required, optional, non-participant).
    pub role: AttendeeRole,
    /// Participation status.
    pub response: AttendeeResponse,
}

/// Event organizer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organizer {
    pub name: Option<String>,
    pub email: Option<String>,
    /// Directory uid when the organizer is a local user.
    pub uid: Option<String>,
    /// Organizer lives outside the local directory.
    #[serde(default)]
    pub external: bool,
}

impl Organizer {
    /// ## Summary
    /// Returns `true` when the organizer is a local user other than `calendar_owner`.
    ///
    /// Such events are only visible to the calendar owner as an attendee and
    /// must not be rewritten from that calendar.
    #[must_use]
    pub fn is_foreign_to(&self, calendar_owner: &str) -> bool {
        !self.external
            && self.email.as_deref().is_some_and(|email| !email.is_empty())
            && self.uid.as_deref() != Some(calendar_owner)
    }
}
