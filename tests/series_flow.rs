//! End-to-end flow: define a recurring series, carve out exceptions,
//! materialize a window, conflict-check it against a busy room, and walk
//! the suggested way out.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use ulid::Ulid;

use cadence::engine::{AnalyzeOptions, Engine, MaterializeOptions, suggest_resolution};
use cadence::model::*;
use cadence::rule::codec;
use cadence::rule::{EndCondition, MonthlyPattern, PatternKind, RecurrencePattern, Weekday};
use cadence::sources::{
    ExceptionStore, FixedClock, InMemoryBookings, InMemoryExceptionStore, InMemoryHolidays,
};

fn dt(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

#[tokio::test]
async fn recurring_series_lifecycle() {
    let _ = tracing_subscriber::fmt::try_init();

    let bookings = Arc::new(InMemoryBookings::new());
    let holidays = Arc::new(InMemoryHolidays::new());
    let exceptions = Arc::new(InMemoryExceptionStore::new());
    let engine = Engine::with_clock(
        bookings.clone(),
        holidays.clone(),
        exceptions.clone(),
        Arc::new(FixedClock(dt(2024, 1, 1, 8, 0))),
    );

    // The organizer asks for "every Monday and Wednesday at 09:00 for 8
    // occurrences, skipping holidays".
    let pattern = RecurrencePattern {
        kind: PatternKind::Weekly,
        interval: 1,
        week_days: vec![Weekday::Mo, Weekday::We],
        monthly: None,
        end: EndCondition::AfterCount(8),
        skip_holidays: true,
        holiday_region: Some("US".into()),
    };
    let descriptor = pattern.to_descriptor().unwrap();
    let rule_text = codec::encode(&descriptor);
    assert_eq!(codec::decode(&rule_text).unwrap(), descriptor);

    let room = Resource {
        id: Ulid::new(),
        name: Some("Aurora".into()),
        capacity: 8,
        equipment: vec!["projector".into()],
        rules: OperatingRules::default(),
    };
    let series = RecurringSeries {
        id: Ulid::new(),
        resource_id: room.id,
        title: Some("platform standup".into()),
        start_time: dt(2024, 1, 1, 9, 0), // Monday
        end_time: dt(2024, 1, 1, 9, 30),
        rule: rule_text,
        timezone: "UTC".into(),
        skip_holidays: true,
        holiday_region: "US".into(),
        buffer_minutes: 0,
        max_booking_ahead_days: 365,
        status: SeriesStatus::Active,
    };

    // New Year's Day is closed; the first Monday must vanish.
    holidays.insert(Holiday {
        date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        region: "US".into(),
        active: true,
    });

    // The Jan 10 occurrence was moved to the afternoon by its organizer.
    engine
        .upsert_exception(Exception {
            series_id: series.id,
            kind: ExceptionKind::Moved,
            original_start: dt(2024, 1, 10, 9, 0),
            original_end: dt(2024, 1, 10, 9, 30),
            new_start: Some(dt(2024, 1, 10, 15, 0)),
            new_end: Some(dt(2024, 1, 10, 15, 30)),
            reason: Some("offsite in the morning".into()),
        })
        .await
        .unwrap();

    let occurrences = engine
        .materialize(
            &series,
            dt(2024, 1, 1, 0, 0),
            dt(2024, 2, 15, 0, 0),
            &MaterializeOptions::default(),
        )
        .await
        .unwrap();

    // 8 counted occurrences minus the holiday-dropped Jan 1.
    assert_eq!(occurrences.len(), 7);
    let starts: Vec<_> = occurrences.iter().map(|o| o.start).collect();
    assert!(!starts.contains(&dt(2024, 1, 1, 9, 0)));
    assert!(starts.contains(&dt(2024, 1, 10, 15, 0)));
    assert!(!starts.contains(&dt(2024, 1, 10, 9, 0)));

    // A rival meeting occupies the room on Jan 8.
    bookings.insert(Booking {
        id: Ulid::new(),
        resource_id: room.id,
        slot: Slot::new(dt(2024, 1, 8, 9, 0), dt(2024, 1, 8, 10, 0)),
        title: Some("all-hands".into()),
        attendee_count: 6,
        equipment: Vec::new(),
        status: BookingStatus::Confirmed,
    });

    let analysis = engine
        .analyze_series(
            &series,
            &room,
            dt(2024, 1, 1, 0, 0),
            dt(2024, 2, 15, 0, 0),
            &AnalyzeOptions {
                attendee_count: 5,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(analysis.total_instances, 7);
    assert_eq!(analysis.valid_instances, 7);
    assert_eq!(analysis.breakdown.len(), 1);
    assert_eq!(analysis.conflict_rate, 0.14);
    assert!(analysis.has_conflict());

    let strategies = suggest_resolution(&analysis, &series);
    assert_eq!(strategies[0].kind, StrategyKind::TimeAdjustment);
    assert!(strategies.iter().any(|s| s.kind == StrategyKind::SkipConflicts));

    // The caller resolves the clash by cancelling that one occurrence.
    engine
        .upsert_exception(Exception {
            series_id: series.id,
            kind: ExceptionKind::Cancelled,
            original_start: dt(2024, 1, 8, 9, 0),
            original_end: dt(2024, 1, 8, 9, 30),
            new_start: None,
            new_end: None,
            reason: Some("yielded to all-hands".into()),
        })
        .await
        .unwrap();

    let after = engine
        .analyze_series(
            &series,
            &room,
            dt(2024, 1, 1, 0, 0),
            dt(2024, 2, 15, 0, 0),
            &AnalyzeOptions {
                attendee_count: 5,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(after.valid_instances, 6);
    assert!(!after.has_conflict());
    assert_eq!(after.conflict_rate, 0.0);

    // The cancelled slot still shows up in the materialized window, inert.
    let final_occurrences = engine
        .materialize(
            &series,
            dt(2024, 1, 1, 0, 0),
            dt(2024, 2, 15, 0, 0),
            &MaterializeOptions::default(),
        )
        .await
        .unwrap();
    let cancelled: Vec<_> = final_occurrences.iter().filter(|o| o.is_cancelled()).collect();
    assert_eq!(cancelled.len(), 1);
    assert_eq!(cancelled[0].start, dt(2024, 1, 8, 9, 0));

    // Exceptions survive as store rows until explicitly removed.
    assert_eq!(exceptions.for_series(series.id).await.unwrap().len(), 2);
    assert!(engine
        .remove_exception(series.id, dt(2024, 1, 8, 9, 0))
        .await
        .unwrap());
    assert_eq!(exceptions.for_series(series.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn single_booking_check_flow() {
    let bookings = Arc::new(InMemoryBookings::new());
    let engine = Engine::with_clock(
        bookings.clone(),
        Arc::new(InMemoryHolidays::new()),
        Arc::new(InMemoryExceptionStore::new()),
        Arc::new(FixedClock(dt(2024, 5, 1, 8, 0))),
    );

    let room = Resource {
        id: Ulid::new(),
        name: Some("Borealis".into()),
        capacity: 4,
        equipment: vec!["whiteboard".into()],
        rules: OperatingRules {
            min_booking_duration: Some(30),
            max_booking_duration: Some(240),
            buffer_time: None,
            advance_booking_min: None,
            advance_booking_max: None,
        },
    };
    bookings.insert(Booking {
        id: Ulid::new(),
        resource_id: room.id,
        slot: Slot::new(dt(2024, 5, 6, 10, 0), dt(2024, 5, 6, 11, 0)),
        title: Some("design review".into()),
        attendee_count: 4,
        equipment: Vec::new(),
        status: BookingStatus::Confirmed,
    });

    let request = BookingRequest {
        resource_id: room.id,
        slot: Slot::new(dt(2024, 5, 6, 10, 30), dt(2024, 5, 6, 11, 30)),
        attendee_count: 6,
        equipment: vec!["projector".into()],
    };
    let result = engine.check_booking(&request, &room, &[]).await.unwrap();

    let kinds: Vec<ConflictKind> = result.conflicts.iter().map(|c| c.kind).collect();
    assert!(kinds.contains(&ConflictKind::TimeOverlap));
    assert!(kinds.contains(&ConflictKind::CapacityExceeded));
    assert!(kinds.contains(&ConflictKind::EquipmentConflict));

    // Every suggestion must itself be bookable time-wise.
    assert!(!result.suggestions.is_empty());
    for pair in result.suggestions.windows(2) {
        assert!(pair[0].start < pair[1].start);
    }
}
