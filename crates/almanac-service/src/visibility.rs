//! Redaction of event content by ownership, classification and rights.

use almanac_core::config::LabelConfig;
use almanac_db::model::{Classification, EventStatus};

use crate::rights::{CalendarAccess, Right};

/// How much of an event a viewer may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redaction {
    /// Placeholder title only.
    Private,
    /// Times and a status-derived title.
    FreeBusy,
    Full,
}

/// ## Summary
/// Decides the redaction level of an event for `viewer`.
///
/// An explicit free/busy request always yields [`Redaction::FreeBusy`].
/// Otherwise private content wins over free/busy-only access, which wins
/// over full detail.
#[must_use]
pub fn decide(
    classification: Classification,
    access: &CalendarAccess,
    viewer: &str,
    freebusy_request: bool,
) -> Redaction {
    if freebusy_request {
        return Redaction::FreeBusy;
    }

    let is_private = classification.is_restricted()
        && access.owner != viewer
        && !access.has(Right::Privileged);
    if is_private {
        return Redaction::Private;
    }

    let freebusy_only = !access.has(Right::Read) && access.has(Right::FreeBusy);
    if freebusy_only {
        return Redaction::FreeBusy;
    }

    Redaction::Full
}

/// Title shown in place of the real one for free/busy redaction.
#[must_use]
pub fn status_title(labels: &LabelConfig, status: EventStatus) -> &str {
    match status {
        EventStatus::Free => &labels.free_title,
        EventStatus::Tentative => &labels.tentative_title,
        EventStatus::Busy => &labels.busy_title,
        EventStatus::OutOfOffice => &labels.out_of_office_title,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rights::RightSet;

    fn access(rights: &[Right]) -> CalendarAccess {
        CalendarAccess {
            calendar: "boss".to_string(),
            owner: "boss".to_string(),
            rights: rights.iter().copied().collect::<RightSet>(),
        }
    }

    #[test]
    fn test_private_beats_freebusy_rights() {
        let redaction = decide(
            Classification::Private,
            &access(&[Right::FreeBusy]),
            "me",
            false,
        );
        assert_eq!(redaction, Redaction::Private);
        assert_eq!(
            decide(Classification::Confidential, &access(&[Right::Read]), "me", false),
            Redaction::Private
        );
    }

    #[test]
    fn test_owner_and_privileged_see_private() {
        assert_eq!(
            decide(Classification::Private, &access(&[Right::Read]), "boss", false),
            Redaction::Full
        );
        assert_eq!(
            decide(
                Classification::Private,
                &access(&[Right::Read, Right::Privileged]),
                "me",
                false
            ),
            Redaction::Full
        );
    }

    #[test]
    fn test_public_with_freebusy_only() {
        assert_eq!(
            decide(Classification::Public, &access(&[Right::FreeBusy]), "me", false),
            Redaction::FreeBusy
        );
        assert_eq!(
            decide(Classification::Public, &access(&[Right::Read]), "me", false),
            Redaction::Full
        );
        assert_eq!(
            decide(Classification::Public, &access(&[]), "me", false),
            Redaction::Full
        );
    }

    #[test]
    fn test_freebusy_request_overrides_rights() {
        assert_eq!(
            decide(Classification::Public, &access(&Right::ALL), "boss", true),
            Redaction::FreeBusy
        );
    }

    #[test]
    fn test_status_titles() {
        let labels = LabelConfig::default();
        assert_eq!(status_title(&labels, EventStatus::Busy), "Busy");
        assert_eq!(status_title(&labels, EventStatus::OutOfOffice), "Out of office");
    }
}
