//! Fixed enumeration maps and alarm trigger strings.

use chrono::TimeDelta;
use serde::{Deserialize, Serialize};

use almanac_db::model::{AttendeeResponse, AttendeeRole, Classification, EventStatus};

use crate::error::{ServiceError, ServiceResult};

/// Role string marking the organizer in a flat attendee list.
pub const ORGANIZER_ROLE: &str = "ORGANIZER";

/// Caller-facing transparency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FreeBusy {
    Free,
    Busy,
    Tentative,
    OutOfOffice,
}

/// Caller-facing classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    Public,
    Private,
    Confidential,
}

impl From<EventStatus> for FreeBusy {
    fn from(status: EventStatus) -> Self {
        match status {
            EventStatus::Free => Self::Free,
            EventStatus::Tentative => Self::Tentative,
            EventStatus::Busy => Self::Busy,
            EventStatus::OutOfOffice => Self::OutOfOffice,
        }
    }
}

impl From<FreeBusy> for EventStatus {
    fn from(value: FreeBusy) -> Self {
        match value {
            FreeBusy::Free => Self::Free,
            FreeBusy::Tentative => Self::Tentative,
            FreeBusy::Busy => Self::Busy,
            FreeBusy::OutOfOffice => Self::OutOfOffice,
        }
    }
}

impl From<Classification> for Sensitivity {
    fn from(classification: Classification) -> Self {
        match classification {
            Classification::Public => Self::Public,
            Classification::Private => Self::Private,
            Classification::Confidential => Self::Confidential,
        }
    }
}

impl From<Sensitivity> for Classification {
    fn from(value: Sensitivity) -> Self {
        match value {
            Sensitivity::Public => Self::Public,
            Sensitivity::Private => Self::Private,
            Sensitivity::Confidential => Self::Confidential,
        }
    }
}

#[must_use]
pub const fn role_to_flat(role: AttendeeRole) -> &'static str {
    match role {
        AttendeeRole::Chair => "CHAIR",
        AttendeeRole::Required => "REQ-PARTICIPANT",
        AttendeeRole::Optional => "OPT-PARTICIPANT",
        AttendeeRole::NonParticipant => "NON-PARTICIPANT",
    }
}

/// Unknown roles fall back to a required participant.
#[must_use]
pub fn role_from_flat(role: &str) -> AttendeeRole {
    match role {
        "CHAIR" => AttendeeRole::Chair,
        "OPT-PARTICIPANT" => AttendeeRole::Optional,
        "NON-PARTICIPANT" => AttendeeRole::NonParticipant,
        _ => AttendeeRole::Required,
    }
}

#[must_use]
pub const fn response_to_flat(response: AttendeeResponse) -> &'static str {
    match response {
        AttendeeResponse::NeedsAction => "NEEDS-ACTION",
        AttendeeResponse::Accepted => "ACCEPTED",
        AttendeeResponse::Declined => "DECLINED",
        AttendeeResponse::Tentative => "TENTATIVE",
        AttendeeResponse::Delegated => "DELEGATED",
    }
}

/// Unknown statuses fall back to needs-action.
#[must_use]
pub fn response_from_flat(status: &str) -> AttendeeResponse {
    match status {
        "ACCEPTED" => AttendeeResponse::Accepted,
        "DECLINED" => AttendeeResponse::Declined,
        "TENTATIVE" => AttendeeResponse::Tentative,
        "DELEGATED" => AttendeeResponse::Delegated,
        _ => AttendeeResponse::NeedsAction,
    }
}

/// ## Summary
/// Renders a signed minute offset as a trigger string.
///
/// A zero offset means no alarm.
#[must_use]
pub fn alarm_to_trigger(minutes: i64, action: &str) -> Option<String> {
    match minutes.signum() {
        0 => None,
        -1 => Some(format!("-{}M:{action}", minutes.unsigned_abs())),
        _ => Some(format!("+{minutes}M:{action}")),
    }
}

/// ## Summary
/// Parses a trigger string `<sign><N><unit>[:<action>]` into signed minutes.
///
/// Units are `M`, `H` and `D`. A missing sign is read as positive. An empty
/// trigger clears the alarm.
///
/// ## Errors
/// Returns `ServiceError::MalformedInput` if the trigger does not parse.
pub fn trigger_to_alarm(trigger: &str) -> ServiceResult<Option<i64>> {
    let offset = trigger.split(':').next().unwrap_or_default().trim();
    if offset.is_empty() {
        return Ok(None);
    }

    let malformed = || ServiceError::MalformedInput(format!("invalid alarm trigger '{trigger}'"));

    let (negative, rest) = match offset.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, offset.strip_prefix('+').unwrap_or(offset)),
    };
    let (unit_at, _) = rest.char_indices().next_back().ok_or_else(malformed)?;
    let (amount, unit) = rest.split_at(unit_at);
    let amount: i64 = amount.parse().map_err(|err| {
        ServiceError::MalformedInput(format!("invalid alarm trigger '{trigger}': {err}"))
    })?;
    let factor = match unit.to_ascii_uppercase().as_str() {
        "M" => 1,
        "H" => 60,
        "D" => 24 * 60,
        _ => return Err(malformed()),
    };

    let magnitude = amount.checked_mul(factor).ok_or_else(malformed)?;
    let minutes = if negative {
        magnitude.checked_neg().ok_or_else(malformed)?
    } else {
        magnitude
    };
    if TimeDelta::try_minutes(minutes).is_none() {
        return Err(malformed());
    }
    Ok(Some(minutes))
}
