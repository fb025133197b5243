//! Calendar access rights.
//!
//! Rights are independent flags rather than a ladder: a viewer may hold
//! free/busy access without read access, or privileged access without write.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::ServiceResult;

/// A single right on a calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Right {
    /// Can read event bodies.
    Read,
    /// Can create, update and delete events.
    Write,
    /// Sees private and confidential events in full.
    Privileged,
    /// Can see busy times without content.
    FreeBusy,
}

impl Right {
    pub const ALL: [Self; 4] = [Self::Read, Self::Write, Self::Privileged, Self::FreeBusy];

    const fn bit(self) -> u8 {
        match self {
            Self::Read => 1,
            Self::Write => 1 << 1,
            Self::Privileged => 1 << 2,
            Self::FreeBusy => 1 << 3,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Privileged => "priv",
            Self::FreeBusy => "freebusy",
        }
    }
}

impl fmt::Display for Right {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of rights held on one calendar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RightSet(u8);

impl RightSet {
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn all() -> Self {
        Self(0b1111)
    }

    #[must_use]
    pub const fn with(self, right: Right) -> Self {
        Self(self.0 | right.bit())
    }

    #[must_use]
    pub const fn contains(self, right: Right) -> bool {
        self.0 & right.bit() != 0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl FromIterator<Right> for RightSet {
    fn from_iter<I: IntoIterator<Item = Right>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), Self::with)
    }
}

/// What the current viewer may do on one calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarAccess {
    /// Storage-side calendar reference.
    pub calendar: String,
    /// Uid of the calendar owner.
    pub owner: String,
    pub rights: RightSet,
}

impl CalendarAccess {
    #[must_use]
    pub fn has(&self, right: Right) -> bool {
        self.rights.contains(right)
    }
}

/// Rights collaborator, scoped to the current viewer.
pub trait RightsProvider {
    /// Access on `calendar`, `None` when the viewer cannot see it at all.
    ///
    /// ## Errors
    /// Returns `ServiceError::UpstreamFailure` if the provider fails.
    fn access(&self, calendar: &str) -> ServiceResult<Option<CalendarAccess>>;

    /// Every calendar the viewer has some access to.
    ///
    /// ## Errors
    /// Returns `ServiceError::UpstreamFailure` if the provider fails.
    fn calendars(&self) -> ServiceResult<Vec<CalendarAccess>>;

    /// ## Errors
    /// Returns `ServiceError::UpstreamFailure` if the provider fails.
    fn right(&self, calendar: &str, right: Right) -> ServiceResult<bool> {
        Ok(self
            .access(calendar)?
            .is_some_and(|access| access.has(right)))
    }
}

/// Fixed rights table.
#[derive(Debug, Clone, Default)]
pub struct StaticRights {
    calendars: BTreeMap<String, CalendarAccess>,
}

impl StaticRights {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn grant(mut self, calendar: &str, owner: &str, rights: RightSet) -> Self {
        self.calendars.insert(
            calendar.to_string(),
            CalendarAccess {
                calendar: calendar.to_string(),
                owner: owner.to_string(),
                rights,
            },
        );
        self
    }
}

impl RightsProvider for StaticRights {
    fn access(&self, calendar: &str) -> ServiceResult<Option<CalendarAccess>> {
        Ok(self.calendars.get(calendar).cloned())
    }

    fn calendars(&self) -> ServiceResult<Vec<CalendarAccess>> {
        Ok(self.calendars.values().cloned().collect())
    }
}
