//! Synthetic identifiers for series, generated instances and exceptions.
//!
//! ## Summary
//! Callers address a single visible occurrence through an opaque string id.
//! Three shapes exist and are kept apart by an explicit tag:
//!
//! - `Series`: the bare series UID
//! - `Generated`: `<uid>@DATE-<epoch seconds>` for a rule-generated instance
//! - `ExceptionRef`: `<uid>-<YYYYMMDD>@RECURRENCE-ID` for a stored override
//!
//! Naive timestamps are interpreted as UTC when converted to epoch seconds.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::constants::{
    CALENDAR_DOT_ESCAPE, EXCEPTION_REF_DATE_FORMAT, EXCEPTION_REF_DATE_LEN, EXCEPTION_REF_MARKER,
    FUTURE_FORK_TAG, GENERATED_MARKER, MINTED_UID_DOMAIN, NEW_FORK_TAG,
};
use crate::error::{CoreError, CoreResult};

/// Decoded form of a caller-visible event identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OccurrenceId {
    Series(String),
    Generated { uid: String, instant: i64 },
    ExceptionRef { uid: String, date: NaiveDate },
}

impl OccurrenceId {
    /// Classifies an identifier. Strings without a recognised suffix are series UIDs.
    #[must_use]
    pub fn classify(id: &str) -> Self {
        if let Some((uid, date)) = decode_exception_ref(id) {
            return Self::ExceptionRef { uid, date };
        }
        if let Some((uid, instant)) = decode_generated(id) {
            return Self::Generated { uid, instant };
        }
        Self::Series(id.to_string())
    }

    /// The series UID this identifier belongs to.
    #[must_use]
    pub fn series_uid(&self) -> &str {
        match self {
            Self::Series(uid) | Self::Generated { uid, .. } | Self::ExceptionRef { uid, .. } => uid,
        }
    }
}

impl fmt::Display for OccurrenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Series(uid) => f.write_str(uid),
            Self::Generated { uid, instant } => write!(f, "{uid}{GENERATED_MARKER}{instant}"),
            Self::ExceptionRef { uid, date } => write!(
                f,
                "{uid}-{}{EXCEPTION_REF_MARKER}",
                date.format(EXCEPTION_REF_DATE_FORMAT)
            ),
        }
    }
}

impl FromStr for OccurrenceId {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        let id = Self::classify(s);
        if id.series_uid().is_empty() {
            return Err(CoreError::InvalidInput(format!(
                "identifier '{s}' has no series uid"
            )));
        }
        Ok(id)
    }
}

/// Appends the generated-instance marker and epoch seconds to a series UID.
#[must_use]
pub fn encode_generated(uid: &str, instant: i64) -> String {
    OccurrenceId::Generated {
        uid: uid.to_string(),
        instant,
    }
    .to_string()
}

/// Inverse of [`encode_generated`]. Returns `None` when the marker is absent
/// or the payload is not an integer.
#[must_use]
pub fn decode_generated(id: &str) -> Option<(String, i64)> {
    let (uid, payload) = id.rsplit_once(GENERATED_MARKER)?;
    let instant = payload.parse::<i64>().ok()?;
    Some((uid.to_string(), instant))
}

/// Appends the exception-reference marker for the given occurrence date.
#[must_use]
pub fn encode_exception_ref(uid: &str, date: NaiveDate) -> String {
    OccurrenceId::ExceptionRef {
        uid: uid.to_string(),
        date,
    }
    .to_string()
}

/// Inverse of [`encode_exception_ref`].
#[must_use]
pub fn decode_exception_ref(id: &str) -> Option<(String, NaiveDate)> {
    let rest = id.strip_suffix(EXCEPTION_REF_MARKER)?;
    let split = rest.len().checked_sub(EXCEPTION_REF_DATE_LEN)?;
    if !rest.is_char_boundary(split) {
        return None;
    }
    let (head, digits) = rest.split_at(split);
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let uid = head.strip_suffix('-')?;
    let date = NaiveDate::parse_from_str(digits, EXCEPTION_REF_DATE_FORMAT).ok()?;
    Some((uid.to_string(), date))
}

/// Returns the series UID carried by any identifier shape.
#[must_use]
pub fn series_uid(id: &str) -> String {
    OccurrenceId::classify(id).series_uid().to_string()
}

/// How a series was forked off its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForkKind {
    /// Edited occurrence and everything after it moved to a new series.
    Future,
    /// Edited occurrence detached as an independent event.
    New,
}

impl ForkKind {
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Future => FUTURE_FORK_TAG,
            Self::New => NEW_FORK_TAG,
        }
    }
}

/// UID of a series forked from `uid` at `instant`.
#[must_use]
pub fn fork_uid(uid: &str, instant: i64, kind: ForkKind) -> String {
    format!("{uid}-{instant}@{}", kind.tag())
}

/// Mints a UID for a brand-new series.
#[must_use]
pub fn mint_uid(now: DateTime<Utc>) -> String {
    format!(
        "{}{}{}@{MINTED_UID_DOMAIN}",
        now.format("%Y%m%d"),
        now.timestamp(),
        uuid::Uuid::new_v4().simple()
    )
}

/// Client-supplied UIDs of new series must not contain path separators.
#[must_use]
pub fn sanitize_uid(uid: &str) -> String {
    uid.replace('/', "")
}

/// Calendar reference as handed to callers.
#[must_use]
pub fn to_public_calendar_ref(calendar: &str) -> String {
    calendar.replace('.', CALENDAR_DOT_ESCAPE)
}

/// Calendar reference as understood by storage.
#[must_use]
pub fn from_public_calendar_ref(calendar: &str) -> String {
    calendar.replace(CALENDAR_DOT_ESCAPE, ".")
}

#[must_use]
pub fn epoch_seconds(instant: NaiveDateTime) -> i64 {
    instant.and_utc().timestamp()
}

#[must_use]
pub fn from_epoch_seconds(seconds: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(seconds, 0).map(|dt| dt.naive_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn test_generated_round_trip() {
        let id = encode_generated("abc@host", 1_767_261_600);
        assert_eq!(id, "abc@host@DATE-1767261600");
        assert_eq!(
            decode_generated(&id),
            Some(("abc@host".to_string(), 1_767_261_600))
        );
    }

    #[test]
    fn test_generated_negative_instant() {
        let id = encode_generated("old", -86_400);
        assert_eq!(decode_generated(&id), Some(("old".to_string(), -86_400)));
    }

    #[test]
    fn test_decode_generated_without_marker() {
        assert_eq!(decode_generated("plain-uid"), None);
        assert_eq!(decode_generated("uid@DATE-notanumber"), None);
    }

    #[test]
    fn test_exception_ref_round_trip() {
        let id = encode_exception_ref("series-1", date(2026, 3, 9));
        assert_eq!(id, "series-1-20260309@RECURRENCE-ID");
        assert_eq!(
            decode_exception_ref(&id),
            Some(("series-1".to_string(), date(2026, 3, 9)))
        );
    }

    #[test]
    fn test_decode_exception_ref_rejects_garbage() {
        assert_eq!(decode_exception_ref("series-1"), None);
        assert_eq!(decode_exception_ref("series-2026030@RECURRENCE-ID"), None);
        assert_eq!(decode_exception_ref("series-20261399@RECURRENCE-ID"), None);
        assert_eq!(decode_exception_ref("é@RECURRENCE-ID"), None);
    }

    #[test]
    fn test_classify_keeps_kinds_apart() {
        assert_eq!(
            OccurrenceId::classify("u@DATE-60"),
            OccurrenceId::Generated {
                uid: "u".to_string(),
                instant: 60
            }
        );
        assert_eq!(
            OccurrenceId::classify("u-20260101@RECURRENCE-ID"),
            OccurrenceId::ExceptionRef {
                uid: "u".to_string(),
                date: date(2026, 1, 1)
            }
        );
        assert_eq!(
            OccurrenceId::classify("u"),
            OccurrenceId::Series("u".to_string())
        );
    }

    #[test]
    fn test_display_matches_classify() {
        for raw in ["u@DATE-60", "u-20260101@RECURRENCE-ID", "u"] {
            assert_eq!(OccurrenceId::classify(raw).to_string(), raw);
        }
    }

    #[test]
    fn test_from_str_rejects_empty_uid() {
        assert!("@DATE-10".parse::<OccurrenceId>().is_err());
        assert!("".parse::<OccurrenceId>().is_err());
        assert!("x@DATE-10".parse::<OccurrenceId>().is_ok());
    }


    #[test]
    fn test_fork_uid() {
        assert_eq!(fork_uid("s", 100, ForkKind::Future), "s-100@future");
        assert_eq!(fork_uid("s", 100, ForkKind::New), "s-100@new");
    }

    #[test]
    fn test_minted_uid_shape() {
        let now = DateTime::from_timestamp(1_767_261_600, 0).expect("valid timestamp");
        let uid = mint_uid(now);
        assert!(uid.starts_with("202601011767261600"));
        assert!(uid.ends_with("@almanac"));
    }

    #[test]
    fn test_calendar_ref_escaping() {
        let public = to_public_calendar_ref("jane.doe");
        assert_eq!(public, "jane_-P-_doe");
        assert_eq!(from_public_calendar_ref(&public), "jane.doe");
    }

    #[test]
    fn test_sanitize_uid() {
        assert_eq!(sanitize_uid("a/b/c"), "abc");
    }
}
