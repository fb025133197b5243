use almanac_core::config::Settings;
use almanac_core::identity::{encode_generated, epoch_seconds};
use almanac_db::model::{
    Classification, EventFields, MasterEvent, NewAttachment, Organizer, Recurrence, RecurrenceKind,
};
use almanac_db::store::{EventStore, MemoryStore};
use almanac_service::codec::{FlatEvent, FlatRecurrence, FreeBusy, SaveMode};
use almanac_service::error::ErrorKind;
use almanac_service::expand::Window;
use almanac_service::recurrence::RuleSummary;
use almanac_service::rights::{Right, RightSet, StaticRights};
use almanac_service::service::{CalendarService, EventListRequest, Outcome};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .and_then(|date| date.and_hms_opt(h, 0, 0))
        .expect("valid datetime")
}

fn fixed_now() -> NaiveDateTime {
    at(2026, 1, 1, 12)
}

fn rights() -> StaticRights {
    StaticRights::new()
        .grant("cal", "me", RightSet::all())
        .grant("other", "me", RightSet::all())
        .grant("boss", "boss", [Right::Read].into_iter().collect())
}

fn service(store: MemoryStore) -> CalendarService<MemoryStore, StaticRights> {
    CalendarService::new("me", store, rights(), &Settings::default()).with_clock(fixed_now)
}

fn weekly_rule() -> FlatRecurrence {
    FlatRecurrence {
        rule: Some(RuleSummary {
            freq: "WEEKLY".to_string(),
            interval: 1,
            until: None,
            count: None,
            by_day: Vec::new(),
        }),
        ..FlatRecurrence::default()
    }
}

/// Weekly standup on Mondays from 2026-01-05, 09:00 to 10:00.
fn standup(service: &mut CalendarService<MemoryStore, StaticRights>) {
    let edit = FlatEvent {
        uid: Some("standup".to_string()),
        calendar: Some("cal".to_string()),
        start: Some(at(2026, 1, 5, 9)),
        end: Some(at(2026, 1, 5, 10)),
        title: Some("Standup".to_string()),
        recurrence: Some(weekly_rule()),
        ..FlatEvent::default()
    };
    let outcome = service.new_event(&edit).expect("series is created");
    assert_eq!(outcome, Outcome::Applied("standup".to_string()));
}

fn january() -> Window {
    Window::new(at(2026, 1, 1, 0), at(2026, 1, 31, 23))
}

fn list(service: &CalendarService<MemoryStore, StaticRights>) -> Vec<FlatEvent> {
    service
        .load_events(&EventListRequest::window(january()))
        .expect("listing succeeds")
}

fn starts(events: &[FlatEvent]) -> Vec<NaiveDateTime> {
    events.iter().filter_map(|event| event.start).collect()
}

fn occurrence_edit(instant: NaiveDateTime, mode: SaveMode) -> FlatEvent {
    FlatEvent {
        id: Some(encode_generated("standup", epoch_seconds(instant))),
        calendar: Some("cal".to_string()),
        save_mode: Some(mode),
        ..FlatEvent::default()
    }
}

#[test_log::test]
fn listing_materializes_weekly_occurrences() {
    let mut service = service(MemoryStore::new());
    standup(&mut service);

    let events = list(&service);
    assert_eq!(
        starts(&events),
        vec![
            at(2026, 1, 5, 9),
            at(2026, 1, 12, 9),
            at(2026, 1, 19, 9),
            at(2026, 1, 26, 9)
        ]
    );
    assert_eq!(events[0].id.as_deref(), Some("standup"));
    assert_eq!(
        events[1].id,
        Some(encode_generated("standup", epoch_seconds(at(2026, 1, 12, 9))))
    );
    assert_eq!(events[1].recurrence_id, Some(at(2026, 1, 12, 9)));
    assert!(
        events
            .iter()
            .all(|event| event.title.as_deref() == Some("Standup"))
    );
}

#[test_log::test]
fn listing_without_materialization_returns_series_once() {
    let mut service = service(MemoryStore::new());
    standup(&mut service);

    let request = EventListRequest {
        virtual_occurrences: false,
        ..EventListRequest::window(january())
    };
    let events = service.load_events(&request).expect("listing succeeds");
    assert_eq!(events.len(), 1);
    let rule = events[0]
        .recurrence
        .as_ref()
        .and_then(|block| block.rule.as_ref())
        .expect("rule is exposed");
    assert_eq!(rule.freq, "WEEKLY");
}

#[test_log::test]
fn current_edit_replaces_one_occurrence() {
    let mut service = service(MemoryStore::new());
    standup(&mut service);

    let edit = FlatEvent {
        title: Some("Retro".to_string()),
        ..occurrence_edit(at(2026, 1, 12, 9), SaveMode::Current)
    };
    let outcome = service.edit_event(&edit).expect("edit succeeds");
    assert_eq!(outcome, Outcome::Applied("standup".to_string()));

    let events = list(&service);
    assert_eq!(events.len(), 4);
    let on_12th: Vec<&FlatEvent> = events
        .iter()
        .filter(|event| event.start == Some(at(2026, 1, 12, 9)))
        .collect();
    assert_eq!(on_12th.len(), 1);
    assert!(on_12th[0].is_exception);
    assert_eq!(on_12th[0].title.as_deref(), Some("Retro"));
    assert_eq!(
        on_12th[0].id.as_deref(),
        Some("standup-20260112@RECURRENCE-ID")
    );
}

#[test_log::test]
fn deleted_occurrence_disappears_and_delete_is_repeatable() {
    let mut service = service(MemoryStore::new());
    standup(&mut service);

    let edit = occurrence_edit(at(2026, 1, 19, 9), SaveMode::Current);
    assert_eq!(
        service.remove_event(&edit).expect("delete succeeds"),
        Outcome::Applied(true)
    );
    assert_eq!(
        service.remove_event(&edit).expect("second delete succeeds"),
        Outcome::Applied(true)
    );

    let events = list(&service);
    assert_eq!(
        starts(&events),
        vec![at(2026, 1, 5, 9), at(2026, 1, 12, 9), at(2026, 1, 26, 9)]
    );
    let master = service
        .store()
        .load("cal", "standup")
        .expect("load succeeds")
        .expect("series still exists");
    assert_eq!(master.exceptions.len(), 1);
}

#[test_log::test]
fn future_edit_forks_the_series() {
    let mut service = service(MemoryStore::new());
    standup(&mut service);

    let instant = at(2026, 1, 19, 9);
    let edit = FlatEvent {
        title: Some("Planning".to_string()),
        recurrence: Some(weekly_rule()),
        ..occurrence_edit(instant, SaveMode::Future)
    };
    let outcome = service.edit_event(&edit).expect("split succeeds");
    let fork_uid = format!("standup-{}@future", epoch_seconds(instant));
    assert_eq!(outcome, Outcome::Applied(fork_uid.clone()));

    let master = service
        .store()
        .load("cal", "standup")
        .expect("load succeeds")
        .expect("master kept");
    assert_eq!(master.recurrence.end_date, Some(at(2026, 1, 18, 9)));

    let events = list(&service);
    assert_eq!(
        starts(&events),
        vec![
            at(2026, 1, 5, 9),
            at(2026, 1, 12, 9),
            at(2026, 1, 19, 9),
            at(2026, 1, 26, 9)
        ]
    );
    let titles: Vec<&str> = events
        .iter()
        .filter_map(|event| event.title.as_deref())
        .collect();
    assert_eq!(titles, vec!["Standup", "Standup", "Planning", "Planning"]);
    assert_eq!(events[2].uid.as_deref(), Some(fork_uid.as_str()));
}

#[test_log::test]
fn future_delete_at_series_start_removes_series() {
    let mut service = service(MemoryStore::new());
    standup(&mut service);

    let edit = occurrence_edit(at(2026, 1, 5, 9), SaveMode::Future);
    assert_eq!(
        service.remove_event(&edit).expect("delete succeeds"),
        Outcome::Applied(true)
    );
    assert!(service.store().is_empty());
}

#[test_log::test]
fn future_delete_truncates_series() {
    let mut service = service(MemoryStore::new());
    standup(&mut service);

    let edit = occurrence_edit(at(2026, 1, 19, 9), SaveMode::Future);
    service.remove_event(&edit).expect("delete succeeds");

    assert_eq!(
        starts(&list(&service)),
        vec![at(2026, 1, 5, 9), at(2026, 1, 12, 9)]
    );
}

#[test_log::test]
fn delete_all_removes_series_and_exceptions() {
    let mut service = service(MemoryStore::new());
    standup(&mut service);
    service
        .remove_event(&occurrence_edit(at(2026, 1, 12, 9), SaveMode::Current))
        .expect("tombstone written");

    let edit = FlatEvent {
        id: Some("standup".to_string()),
        calendar: Some("cal".to_string()),
        save_mode: Some(SaveMode::All),
        ..FlatEvent::default()
    };
    assert_eq!(
        service.remove_event(&edit).expect("delete succeeds"),
        Outcome::Applied(true)
    );
    assert!(list(&service).is_empty());
}

#[test_log::test]
fn all_day_event_round_trips() {
    let mut service = service(MemoryStore::new());
    let edit = FlatEvent {
        uid: Some("holiday".to_string()),
        calendar: Some("cal".to_string()),
        start: Some(at(2026, 1, 10, 0)),
        end: Some(at(2026, 1, 10, 0)),
        all_day: true,
        title: Some("Holiday".to_string()),
        ..FlatEvent::default()
    };
    service.new_event(&edit).expect("event is created");

    let stored = service
        .store()
        .load("cal", "holiday")
        .expect("load succeeds")
        .expect("event stored");
    assert_eq!(stored.fields.start, at(2026, 1, 10, 0));
    assert_eq!(stored.fields.end, at(2026, 1, 11, 0));

    let read = service.get_event("holiday", None).expect("event found");
    assert!(read.all_day);
    assert_eq!(read.start, Some(at(2026, 1, 10, 0)));
    assert_eq!(read.end, Some(at(2026, 1, 10, 0)));
}

#[test_log::test]
fn new_event_without_uid_gets_minted_uid() {
    let mut service = service(MemoryStore::new());
    let edit = FlatEvent {
        calendar: Some("cal".to_string()),
        start: Some(at(2026, 1, 10, 9)),
        end: Some(at(2026, 1, 10, 10)),
        ..FlatEvent::default()
    };
    let Outcome::Applied(uid) = service.new_event(&edit).expect("event is created") else {
        panic!("write was suppressed");
    };
    assert!(uid.starts_with("20260101"));
    assert!(uid.ends_with("@almanac"));
    assert_eq!(service.store().len(), 1);
}

fn private_boss_event() -> MasterEvent {
    let mut fields = EventFields::spanning(at(2026, 1, 7, 14), at(2026, 1, 7, 15));
    fields.title = Some("Salary talk".to_string());
    fields.description = Some("Confidential".to_string());
    fields.classification = Classification::Private;
    fields.owner = Some("boss".to_string());
    MasterEvent::new("salary".to_string(), "boss".to_string(), fields)
}

#[test_log::test]
fn private_events_of_others_are_redacted() {
    let service = service(MemoryStore::from_events([private_boss_event()]));

    let read = service
        .get_event("salary", Some("boss"))
        .expect("event visible");
    assert_eq!(read.title.as_deref(), Some("Private event"));
    assert_eq!(read.description, None);
    assert_eq!(read.start, Some(at(2026, 1, 7, 14)));
}

#[test_log::test]
fn privileged_viewer_sees_private_events() {
    let rights = rights().grant(
        "boss",
        "boss",
        [Right::Read, Right::Privileged].into_iter().collect(),
    );
    let service = CalendarService::new(
        "me",
        MemoryStore::from_events([private_boss_event()]),
        rights,
        &Settings::default(),
    );

    let read = service
        .get_event("salary", Some("boss"))
        .expect("event visible");
    assert_eq!(read.title.as_deref(), Some("Salary talk"));
    assert_eq!(read.description.as_deref(), Some("Confidential"));
}

#[test_log::test]
fn freebusy_listing_hides_content() {
    let service = service(MemoryStore::from_events([private_boss_event()]));

    let request = EventListRequest {
        calendars: Some(vec!["boss".to_string()]),
        freebusy: true,
        ..EventListRequest::window(january())
    };
    let events = service.load_events(&request).expect("listing succeeds");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].title.as_deref(), Some("Busy"));
    assert_eq!(events[0].sensitivity, None);

    let slots = service
        .freebusy_list("boss", january())
        .expect("free/busy succeeds");
    assert_eq!(slots.len(), 1);
    assert_eq!(slots[0].from, at(2026, 1, 7, 14));
    assert_eq!(slots[0].to, at(2026, 1, 7, 15));
    assert_eq!(slots[0].kind, FreeBusy::Busy);
}

#[test_log::test]
fn write_without_rights_is_denied() {
    let mut service = service(MemoryStore::from_events([private_boss_event()]));
    let edit = FlatEvent {
        id: Some("salary".to_string()),
        calendar: Some("boss".to_string()),
        title: Some("Hacked".to_string()),
        ..FlatEvent::default()
    };

    let err = service.edit_event(&edit).expect_err("write is denied");
    assert_eq!(err.kind(), ErrorKind::AccessDenied);
}

#[test_log::test]
fn attendee_copy_is_not_rewritten() {
    let mut fields = EventFields::spanning(at(2026, 1, 8, 9), at(2026, 1, 8, 10));
    fields.title = Some("Board meeting".to_string());
    fields.organizer = Some(Organizer {
        name: Some("Boss".to_string()),
        email: Some("boss@example.org".to_string()),
        uid: Some("boss".to_string()),
        external: false,
    });
    let invitation = MasterEvent::new("board".to_string(), "cal".to_string(), fields);
    let mut service = service(MemoryStore::from_events([invitation.clone()]));

    let edit = FlatEvent {
        id: Some("board".to_string()),
        calendar: Some("cal".to_string()),
        title: Some("Renamed".to_string()),
        ..FlatEvent::default()
    };
    assert_eq!(
        service.edit_event(&edit).expect("write is skipped"),
        Outcome::Suppressed
    );
    assert_eq!(
        service.remove_event(&edit).expect("delete is skipped"),
        Outcome::Suppressed
    );
    let stored = service
        .store()
        .load("cal", "board")
        .expect("load succeeds");
    assert_eq!(stored, Some(invitation));
}

#[test_log::test]
fn calendar_change_moves_the_series() {
    let mut service = service(MemoryStore::new());
    standup(&mut service);

    let edit = FlatEvent {
        id: Some("standup".to_string()),
        calendar: Some("other".to_string()),
        from_calendar: Some("cal".to_string()),
        start: Some(at(2026, 1, 5, 9)),
        end: Some(at(2026, 1, 5, 10)),
        title: Some("Standup".to_string()),
        recurrence: Some(weekly_rule()),
        ..FlatEvent::default()
    };
    service.edit_event(&edit).expect("move succeeds");

    let found = service.store().find("standup").expect("find succeeds");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].calendar, "other");
}

#[test_log::test]
fn move_current_keeps_occurrence_content() {
    let mut service = service(MemoryStore::new());
    standup(&mut service);

    let edit = FlatEvent {
        start: Some(at(2026, 1, 12, 11)),
        end: Some(at(2026, 1, 12, 12)),
        ..occurrence_edit(at(2026, 1, 12, 9), SaveMode::Current)
    };
    service.move_event(&edit).expect("move succeeds");

    let events = list(&service);
    let moved = events
        .iter()
        .find(|event| event.is_exception)
        .expect("exception listed");
    assert_eq!(moved.start, Some(at(2026, 1, 12, 11)));
    assert_eq!(moved.title.as_deref(), Some("Standup"));
    assert_eq!(moved.recurrence_id, Some(at(2026, 1, 12, 9)));
    assert_eq!(events.len(), 4);
}

#[test_log::test]
fn attachments_are_stored_and_listed() {
    let mut service = service(MemoryStore::new());
    let edit = FlatEvent {
        uid: Some("review".to_string()),
        calendar: Some("cal".to_string()),
        start: Some(at(2026, 1, 9, 9)),
        end: Some(at(2026, 1, 9, 10)),
        new_attachments: vec![NewAttachment {
            name: "agenda.txt".to_string(),
            mimetype: Some("text/plain".to_string()),
            data: b"1. budget".to_vec(),
        }],
        ..FlatEvent::default()
    };
    service.new_event(&edit).expect("event is created");

    let read = service.get_event("review", Some("cal")).expect("event found");
    assert_eq!(read.attachments.len(), 1);
    assert_eq!(read.attachments[0].name, "agenda.txt");

    let removal = FlatEvent {
        id: Some("review".to_string()),
        calendar: Some("cal".to_string()),
        title: Some("Review".to_string()),
        deleted_attachments: vec![read.attachments[0].id.clone()],
        ..FlatEvent::default()
    };
    service.edit_event(&removal).expect("edit succeeds");
    let read = service.get_event("review", Some("cal")).expect("event found");
    assert!(read.attachments.is_empty());
}

#[test_log::test]
fn pending_alarm_is_dismissed() {
    let mut fields = EventFields::spanning(at(2026, 1, 1, 13), at(2026, 1, 1, 14));
    fields.alarm = Some(-90);
    fields.title = Some("Lunch".to_string());
    let lunch = MasterEvent::new("lunch".to_string(), "cal".to_string(), fields);
    let mut service = service(MemoryStore::from_events([lunch]));

    let now = at(2026, 1, 1, 12);
    let pending = service.pending_alarms(now, None).expect("alarms listed");
    assert_eq!(pending.len(), 1);
    assert_eq!(
        pending[0].trigger,
        at(2026, 1, 1, 11) + TimeDelta::minutes(30)
    );
    assert_eq!(pending[0].event.alarms.as_deref(), Some("-90M:DISPLAY"));

    assert!(
        service
            .dismiss_alarm("lunch", Some(TimeDelta::minutes(10)), now)
            .expect("snoozed")
    );
    assert!(
        service
            .pending_alarms(now + TimeDelta::minutes(5), None)
            .expect("alarms listed")
            .is_empty()
    );
    assert_eq!(
        service
            .pending_alarms(now + TimeDelta::minutes(15), None)
            .expect("alarms listed")
            .len(),
        1
    );

    assert!(service.dismiss_alarm("lunch", None, now).expect("acknowledged"));
    assert!(
        service
            .pending_alarms(now + TimeDelta::minutes(15), None)
            .expect("alarms listed")
            .is_empty()
    );
}

#[test_log::test]
fn missing_calendar_is_malformed() {
    let mut service = service(MemoryStore::new());
    let edit = FlatEvent {
        start: Some(at(2026, 1, 10, 9)),
        end: Some(at(2026, 1, 10, 10)),
        ..FlatEvent::default()
    };
    let err = service.new_event(&edit).expect_err("calendar required");
    assert_eq!(err.kind(), ErrorKind::MalformedInput);
}

#[test_log::test]
fn plain_series_recurrence_kind_is_stored() {
    let mut service = service(MemoryStore::new());
    standup(&mut service);
    let master = service
        .store()
        .load("cal", "standup")
        .expect("load succeeds")
        .expect("stored");
    assert_eq!(master.recurrence, Recurrence::every(RecurrenceKind::Weekly));
}

#[test_log::test]
fn future_edit_at_series_start_replaces_series() {
    let mut service = service(MemoryStore::new());
    standup(&mut service);

    let instant = at(2026, 1, 5, 9);
    let edit = FlatEvent {
        id: Some("standup".to_string()),
        calendar: Some("cal".to_string()),
        start: Some(instant),
        title: Some("Planning".to_string()),
        recurrence: Some(weekly_rule()),
        save_mode: Some(SaveMode::Future),
        ..FlatEvent::default()
    };
    let outcome = service.edit_event(&edit).expect("split succeeds");
    let fork_uid = format!("standup-{}@future", epoch_seconds(instant));
    assert_eq!(outcome, Outcome::Applied(fork_uid.clone()));

    assert!(
        service
            .store()
            .load("cal", "standup")
            .expect("load succeeds")
            .is_none()
    );
    assert_eq!(service.store().len(), 1);

    let events = list(&service);
    assert_eq!(
        starts(&events),
        vec![
            at(2026, 1, 5, 9),
            at(2026, 1, 12, 9),
            at(2026, 1, 19, 9),
            at(2026, 1, 26, 9)
        ]
    );
    assert!(events.iter().all(|event| {
        event.uid.as_deref() == Some(fork_uid.as_str())
            && event.title.as_deref() == Some("Planning")
    }));
}

#[test_log::test]
fn moving_series_id_moves_first_occurrence() {
    let mut service = service(MemoryStore::new());
    standup(&mut service);

    let edit = FlatEvent {
        id: Some("standup".to_string()),
        calendar: Some("cal".to_string()),
        start: Some(at(2026, 1, 7, 9)),
        end: Some(at(2026, 1, 7, 10)),
        save_mode: Some(SaveMode::Current),
        ..FlatEvent::default()
    };
    service.move_event(&edit).expect("move succeeds");

    let events = list(&service);
    assert_eq!(
        starts(&events),
        vec![
            at(2026, 1, 7, 9),
            at(2026, 1, 12, 9),
            at(2026, 1, 19, 9),
            at(2026, 1, 26, 9)
        ]
    );
    assert!(events[0].is_exception);
    assert_eq!(events[0].recurrence_id, Some(at(2026, 1, 5, 9)));
    assert_eq!(events[0].title.as_deref(), Some("Standup"));
}

#[test_log::test]
fn new_mode_detaches_occurrence_and_keeps_series() {
    let mut service = service(MemoryStore::new());
    standup(&mut service);
    let before = service
        .store()
        .load("cal", "standup")
        .expect("load succeeds")
        .expect("stored");

    let instant = at(2026, 1, 12, 9);
    let edit = FlatEvent {
        start: Some(at(2026, 1, 12, 14)),
        end: Some(at(2026, 1, 12, 15)),
        title: Some("Offsite".to_string()),
        ..occurrence_edit(instant, SaveMode::New)
    };
    let outcome = service.edit_event(&edit).expect("detach succeeds");
    let detached_uid = format!("standup-{}@new", epoch_seconds(instant));
    assert_eq!(outcome, Outcome::Applied(detached_uid.clone()));

    let after = service
        .store()
        .load("cal", "standup")
        .expect("load succeeds")
        .expect("series kept");
    assert_eq!(after, before);
    assert_eq!(after.recurrence.end_date, None);

    let detached = service
        .store()
        .load("cal", &detached_uid)
        .expect("load succeeds")
        .expect("detached event stored");
    assert!(!detached.is_recurring());

    let events = list(&service);
    assert_eq!(events.len(), 5);
    let on_the_twelfth: Vec<(NaiveDateTime, &str)> = events
        .iter()
        .filter(|event| event.start.is_some_and(|start| start.date() == instant.date()))
        .filter_map(|event| Some((event.start?, event.title.as_deref()?)))
        .collect();
    assert_eq!(
        on_the_twelfth,
        vec![
            (at(2026, 1, 12, 9), "Standup"),
            (at(2026, 1, 12, 14), "Offsite")
        ]
    );
}

#[test_log::test]
fn alarm_offset_beyond_time_range_is_malformed() {
    let mut service = service(MemoryStore::new());
    let edit = FlatEvent {
        uid: Some("launch".to_string()),
        calendar: Some("cal".to_string()),
        start: Some(at(2026, 1, 5, 9)),
        end: Some(at(2026, 1, 5, 10)),
        alarms: Some("-1000000000000000M:DISPLAY".to_string()),
        ..FlatEvent::default()
    };
    let err = service.new_event(&edit).expect_err("alarm out of range");
    assert_eq!(err.kind(), ErrorKind::MalformedInput);
    assert!(service.store().is_empty());
}
