//! Identifier markers shared across crates.

/// Marker separating a series UID from the epoch seconds of a generated instance.
pub const GENERATED_MARKER: &str = "@DATE-";

/// Tag closing an exception reference (`<uid>-<YYYYMMDD>@RECURRENCE-ID`).
pub const EXCEPTION_REF_TAG: &str = "RECURRENCE-ID";
pub const EXCEPTION_REF_MARKER: &str = const_str::concat!("@", EXCEPTION_REF_TAG);

/// Date layout embedded in exception references.
pub const EXCEPTION_REF_DATE_FORMAT: &str = "%Y%m%d";
pub const EXCEPTION_REF_DATE_LEN: usize = 8;

/// Tags appended to forked series UIDs (`<uid>-<epoch>@future`, `<uid>-<epoch>@new`).
pub const FUTURE_FORK_TAG: &str = "future";
pub const NEW_FORK_TAG: &str = "new";

/// Domain suffix of freshly minted series UIDs.
pub const MINTED_UID_DOMAIN: &str = "almanac";

/// Replacement for `.` in calendar references handed to callers.
pub const CALENDAR_DOT_ESCAPE: &str = "_-P-_";
