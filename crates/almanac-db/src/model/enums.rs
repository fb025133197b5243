//! Storage enum types.
//!
//! Each enum has a stable storage string used by fixtures and by the
//! storage collaborator; `parse` is the inverse of `as_str`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Event privacy classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    #[default]
    Public,
    Private,
    Confidential,
}

impl Classification {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::Confidential => "confidential",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "public" => Some(Self::Public),
            "private" => Some(Self::Private),
            "confidential" => Some(Self::Confidential),
            _ => None,
        }
    }

    /// Private and confidential events hide their content from other users.
    #[must_use]
    pub const fn is_restricted(self) -> bool {
        matches!(self, Self::Private | Self::Confidential)
    }
}

/// Time transparency of an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Free,
    Tentative,
    #[default]
    Busy,
    OutOfOffice,
}

impl EventStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Tentative => "tentative",
            Self::Busy => "busy",
            Self::OutOfOffice => "out_of_office",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "free" => Some(Self::Free),
            "tentative" => Some(Self::Tentative),
            "busy" => Some(Self::Busy),
            "out_of_office" => Some(Self::OutOfOffice),
            _ => None,
        }
    }
}

/// Attendee participation role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendeeRole {
    Chair,
    #[default]
    Required,
    Optional,
    NonParticipant,
}

impl AttendeeRole {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Chair => "chair",
            Self::Required => "required",
            Self::Optional => "optional",
            Self::NonParticipant => "non_participant",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "chair" => Some(Self::Chair),
            "required" => Some(Self::Required),
            "optional" => Some(Self::Optional),
            "non_participant" => Some(Self::NonParticipant),
            _ => None,
        }
    }
}

/// Attendee participation status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendeeResponse {
    #[default]
    NeedsAction,
    Accepted,
    Declined,
    Tentative,
    Delegated,
}

impl AttendeeResponse {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NeedsAction => "needs_action",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
            Self::Tentative => "tentative",
            Self::Delegated => "delegated",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "needs_action" => Some(Self::NeedsAction),
            "accepted" => Some(Self::Accepted),
            "declined" => Some(Self::Declined),
            "tentative" => Some(Self::Tentative),
            "delegated" => Some(Self::Delegated),
            _ => None,
        }
    }
}

macro_rules! impl_display {
    ($($ty:ty),+) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }
        )+
    };
}

impl_display!(Classification, EventStatus, AttendeeRole, AttendeeResponse);
