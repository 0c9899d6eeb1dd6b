//! Conflict detection for a single candidate reservation. Five independent
//! checks, no short-circuit — a report always lists everything wrong at
//! once. Pure functions of their inputs plus an injected `now`.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde_json::json;
use ulid::Ulid;

use crate::limits::{
    MAX_SUGGESTIONS, OPERATING_DAY_END_HOUR, OPERATING_DAY_START_HOUR, SUGGESTION_STEP_MINUTES,
};
use crate::model::{
    Booking, BookingRequest, Conflict, ConflictKind, ConflictResult, Resource, Severity, Slot,
};

/// Evaluate `request` against existing bookings, the resource's
/// capacity/equipment/rules, and maintenance windows. All applicable
/// checks run; conflicts are normal results, not errors. When anything
/// conflicts, up to five conflict-free alternative slots on the
/// candidate's day are suggested, chronological.
pub fn detect(
    request: &BookingRequest,
    existing: &[Booking],
    resource: &Resource,
    maintenance: &[Slot],
    now: DateTime<Utc>,
) -> ConflictResult {
    metrics::counter!(crate::observability::CONFLICT_CHECKS_TOTAL).increment(1);

    let conflicts = run_checks(request, existing, resource, maintenance, now);
    metrics::counter!(crate::observability::CONFLICTS_FOUND_TOTAL)
        .increment(conflicts.len() as u64);

    let suggestions = if conflicts.is_empty() {
        Vec::new()
    } else {
        suggest_alternatives(request, existing, maintenance)
    };

    ConflictResult {
        conflicts,
        suggestions,
    }
}

/// The five checks without the suggestion pass — the series analyzer
/// reuses this per occurrence and has no use for per-occurrence
/// suggestions.
pub(crate) fn run_checks(
    request: &BookingRequest,
    existing: &[Booking],
    resource: &Resource,
    maintenance: &[Slot],
    now: DateTime<Utc>,
) -> Vec<Conflict> {
    let mut conflicts = Vec::new();
    conflicts.extend(check_time_overlaps(request, existing));
    conflicts.extend(check_capacity(request, resource));
    conflicts.extend(check_equipment(request, resource));
    conflicts.extend(check_maintenance(request, maintenance));
    conflicts.extend(check_booking_rules(request, resource, now));
    conflicts
}

fn check_time_overlaps(request: &BookingRequest, existing: &[Booking]) -> Vec<Conflict> {
    let mut conflicts = Vec::new();
    for booking in existing {
        if booking.resource_id != request.resource_id || booking.is_cancelled() {
            continue;
        }
        if request.slot.overlaps(&booking.slot) {
            let title = booking.title.as_deref().unwrap_or("untitled");
            conflicts.push(Conflict {
                kind: ConflictKind::TimeOverlap,
                severity: Severity::High,
                description: format!("overlaps existing booking \"{title}\""),
                details: json!({
                    "booking_id": booking.id.to_string(),
                    "existing": { "start": booking.slot.start, "end": booking.slot.end },
                    "requested": { "start": request.slot.start, "end": request.slot.end },
                }),
            });
        }
    }
    conflicts
}

fn check_capacity(request: &BookingRequest, resource: &Resource) -> Option<Conflict> {
    // Equal to capacity is allowed; only an excess conflicts.
    if request.attendee_count <= resource.capacity {
        return None;
    }
    let excess = request.attendee_count - resource.capacity;
    Some(Conflict {
        kind: ConflictKind::CapacityExceeded,
        severity: Severity::High,
        description: format!(
            "attendee count ({}) exceeds room capacity ({})",
            request.attendee_count, resource.capacity
        ),
        details: json!({
            "attendee_count": request.attendee_count,
            "capacity": resource.capacity,
            "excess": excess,
        }),
    })
}

fn check_equipment(request: &BookingRequest, resource: &Resource) -> Vec<Conflict> {
    let mut conflicts = Vec::new();
    for item in &request.equipment {
        if !resource.equipment.contains(item) {
            conflicts.push(Conflict {
                kind: ConflictKind::EquipmentConflict,
                severity: Severity::Medium,
                description: format!("room lacks requested equipment: {item}"),
                details: json!({
                    "requested": item,
                    "available": resource.equipment,
                }),
            });
        }
    }
    conflicts
}

fn check_maintenance(request: &BookingRequest, maintenance: &[Slot]) -> Vec<Conflict> {
    let mut conflicts = Vec::new();
    for window in maintenance {
        if request.slot.overlaps(window) {
            conflicts.push(Conflict {
                kind: ConflictKind::MaintenanceConflict,
                severity: Severity::High,
                description: "requested time overlaps a maintenance window".into(),
                details: json!({
                    "maintenance": { "start": window.start, "end": window.end },
                    "requested": { "start": request.slot.start, "end": request.slot.end },
                }),
            });
        }
    }
    conflicts
}

fn check_booking_rules(
    request: &BookingRequest,
    resource: &Resource,
    now: DateTime<Utc>,
) -> Vec<Conflict> {
    let rules = &resource.rules;
    let mut conflicts = Vec::new();

    let duration_minutes = request.slot.duration().num_minutes();
    let lead = request.slot.start - now;

    if let Some(min) = rules.min_booking_duration
        && duration_minutes < min as i64
    {
        conflicts.push(Conflict {
            kind: ConflictKind::RuleViolation,
            severity: Severity::Medium,
            description: format!("booking shorter than the {min} minute minimum"),
            details: json!({ "duration_minutes": duration_minutes, "min_minutes": min }),
        });
    }
    if let Some(max) = rules.max_booking_duration
        && duration_minutes > max as i64
    {
        conflicts.push(Conflict {
            kind: ConflictKind::RuleViolation,
            severity: Severity::Medium,
            description: format!("booking longer than the {max} minute maximum"),
            details: json!({ "duration_minutes": duration_minutes, "max_minutes": max }),
        });
    }
    if let Some(min_lead) = rules.advance_booking_min
        && lead.num_minutes() < min_lead as i64
    {
        conflicts.push(Conflict {
            kind: ConflictKind::RuleViolation,
            severity: Severity::Medium,
            description: format!("must be booked at least {min_lead} minutes ahead"),
            details: json!({
                "lead_minutes": lead.num_minutes(),
                "min_lead_minutes": min_lead,
            }),
        });
    }
    if let Some(max_lead_days) = rules.advance_booking_max
        && lead.num_days() > max_lead_days as i64
    {
        conflicts.push(Conflict {
            kind: ConflictKind::RuleViolation,
            severity: Severity::Low,
            description: format!("cannot be booked more than {max_lead_days} days ahead"),
            details: json!({
                "lead_days": lead.num_days(),
                "max_lead_days": max_lead_days,
            }),
        });
    }

    conflicts
}

/// Brute-force alternative search: candidate starts at a fixed cadence
/// across the operating window of the candidate's day, same duration,
/// rejected on any collision with existing bookings or maintenance.
/// Intentionally a bounded linear scan, not a scheduler.
fn suggest_alternatives(
    request: &BookingRequest,
    existing: &[Booking],
    maintenance: &[Slot],
) -> Vec<Slot> {
    let duration = request.slot.duration();
    let day = request.slot.day();
    let day_start = at_hour(day, OPERATING_DAY_START_HOUR);
    let day_end = at_hour(day, OPERATING_DAY_END_HOUR);

    let mut suggestions = Vec::new();
    let mut start = day_start;
    while start + duration <= day_end && suggestions.len() < MAX_SUGGESTIONS {
        let candidate = Slot::new(start, start + duration);
        if !collides(request.resource_id, &candidate, existing, maintenance) {
            suggestions.push(candidate);
        }
        start += Duration::minutes(SUGGESTION_STEP_MINUTES);
    }
    suggestions
}

/// Free 30-minute grid slots of a resource's operating day.
pub fn free_slots_for_day(
    resource_id: Ulid,
    day: NaiveDate,
    existing: &[Booking],
    maintenance: &[Slot],
) -> Vec<Slot> {
    let step = Duration::minutes(SUGGESTION_STEP_MINUTES);
    let day_end = at_hour(day, OPERATING_DAY_END_HOUR);

    let mut free = Vec::new();
    let mut start = at_hour(day, OPERATING_DAY_START_HOUR);
    while start + step <= day_end {
        let slot = Slot::new(start, start + step);
        if !collides(resource_id, &slot, existing, maintenance) {
            free.push(slot);
        }
        start += step;
    }
    free
}

fn collides(
    resource_id: Ulid,
    candidate: &Slot,
    existing: &[Booking],
    maintenance: &[Slot],
) -> bool {
    existing.iter().any(|b| {
        b.resource_id == resource_id && !b.is_cancelled() && candidate.overlaps(&b.slot)
    }) || maintenance.iter().any(|m| candidate.overlaps(m))
}

fn at_hour(day: NaiveDate, hour: u32) -> DateTime<Utc> {
    day.and_time(NaiveTime::from_hms_opt(hour, 0, 0).expect("valid hour"))
        .and_utc()
}
