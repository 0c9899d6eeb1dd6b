use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Half-open interval `[start, end)` in UTC — the only time-range type.
/// Bookings, maintenance windows and suggested slots are all `Slot`s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slot {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Slot {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        debug_assert!(start < end, "Slot start must be before end");
        Self { start, end }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Symmetric half-open overlap test.
    pub fn overlaps(&self, other: &Slot) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains_instant(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t < self.end
    }

    /// Calendar day of the slot's start.
    pub fn day(&self) -> NaiveDate {
        self.start.date_naive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Confirmed,
    Pending,
    Cancelled,
}

/// An existing booking row as the persistence layer reports it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub resource_id: Ulid,
    pub slot: Slot,
    pub title: Option<String>,
    pub attendee_count: u32,
    pub equipment: Vec<String>,
    pub status: BookingStatus,
}

impl Booking {
    pub fn is_cancelled(&self) -> bool {
        self.status == BookingStatus::Cancelled
    }
}

/// Per-resource booking rules. All durations are minutes except
/// `advance_booking_max`, which is days — the granularity callers
/// configure them in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatingRules {
    pub min_booking_duration: Option<u32>,
    pub max_booking_duration: Option<u32>,
    pub buffer_time: Option<u32>,
    pub advance_booking_min: Option<u32>,
    pub advance_booking_max: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: Ulid,
    pub name: Option<String>,
    pub capacity: u32,
    pub equipment: Vec<String>,
    pub rules: OperatingRules,
}

/// Read-only holiday calendar entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holiday {
    pub date: NaiveDate,
    pub region: String,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SeriesStatus {
    Active,
    Paused,
    Completed,
    Cancelled,
}

impl SeriesStatus {
    /// Completed and Cancelled are terminal; nothing leaves them.
    pub fn is_terminal(self) -> bool {
        matches!(self, SeriesStatus::Completed | SeriesStatus::Cancelled)
    }

    /// Active↔Paused by user action, Active→Completed when the termination
    /// condition is reached, {Active, Paused}→Cancelled.
    pub fn can_transition_to(self, next: SeriesStatus) -> bool {
        use SeriesStatus::*;
        matches!(
            (self, next),
            (Active, Paused)
                | (Paused, Active)
                | (Active, Completed)
                | (Active, Cancelled)
                | (Paused, Cancelled)
        )
    }
}

/// A persisted recurring series. Owned by the booking-management layer;
/// the engine only reads it and derives occurrences from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurringSeries {
    pub id: Ulid,
    pub resource_id: Ulid,
    pub title: Option<String>,
    /// Base occurrence — defines duration and time-of-day for the series.
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Persisted rule text (`FREQ=...;...`), decoded by `rule::codec`.
    pub rule: String,
    /// IANA zone name, carried opaquely; all engine arithmetic is UTC.
    pub timezone: String,
    pub skip_holidays: bool,
    pub holiday_region: String,
    pub buffer_minutes: u32,
    pub max_booking_ahead_days: u32,
    pub status: SeriesStatus,
}

impl RecurringSeries {
    pub fn base_slot(&self) -> Slot {
        Slot::new(self.start_time, self.end_time)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExceptionKind {
    Cancelled,
    Modified,
    Moved,
}

/// A persisted override for one occurrence of a series, keyed by
/// `(series_id, original_start)`. Exact-timestamp match only — if the
/// series' rule or base time is edited later, exceptions whose key no
/// longer matches any generated occurrence become inert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exception {
    pub series_id: Ulid,
    pub kind: ExceptionKind,
    pub original_start: DateTime<Utc>,
    pub original_end: DateTime<Utc>,
    pub new_start: Option<DateTime<Utc>>,
    pub new_end: Option<DateTime<Utc>>,
    pub reason: Option<String>,
}

impl Exception {
    pub fn key(&self) -> (Ulid, DateTime<Utc>) {
        (self.series_id, self.original_start)
    }
}

/// One concrete, booking-ready instance of a series — computed, never
/// persisted by the engine. `start`/`end` are effective times: any
/// override is substituted and the buffer already subtracted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Occurrence {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub is_holiday: bool,
    pub has_exception: bool,
    pub exception_kind: Option<ExceptionKind>,
    pub original_start: Option<DateTime<Utc>>,
    pub reason: Option<String>,
}

impl Occurrence {
    pub fn slot(&self) -> Slot {
        Slot::new(self.start, self.end)
    }

    /// Cancelled occurrences are emitted but inert — not booking candidates.
    pub fn is_cancelled(&self) -> bool {
        self.exception_kind == Some(ExceptionKind::Cancelled)
    }
}

// ── Conflict reporting ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    TimeOverlap,
    CapacityExceeded,
    EquipmentConflict,
    MaintenanceConflict,
    RuleViolation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// A typed, severity-ranked reason a candidate cannot be confirmed as
/// requested. Conflicts are normal results, not errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub kind: ConflictKind,
    pub severity: Severity,
    pub description: String,
    pub details: serde_json::Value,
}

/// A candidate reservation to evaluate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub resource_id: Ulid,
    pub slot: Slot,
    pub attendee_count: u32,
    pub equipment: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictResult {
    pub conflicts: Vec<Conflict>,
    /// Up to five conflict-free alternative slots on the candidate's day,
    /// chronological.
    pub suggestions: Vec<Slot>,
}

impl ConflictResult {
    pub fn has_conflict(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

/// Conflicts of a single occurrence within a series analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccurrenceReport {
    pub occurrence: Occurrence,
    pub conflicts: Vec<Conflict>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringConflictResult {
    /// Distinct conflicts across the series, de-duplicated by
    /// (kind, description, occurrence start).
    pub conflicts: Vec<Conflict>,
    pub breakdown: Vec<OccurrenceReport>,
    pub total_instances: usize,
    /// Non-cancelled occurrences actually checked.
    pub valid_instances: usize,
    /// Fraction of valid occurrences with at least one conflict,
    /// rounded to 2 decimals. 0.0 when there are no valid occurrences.
    pub conflict_rate: f64,
}

impl RecurringConflictResult {
    pub fn has_conflict(&self) -> bool {
        !self.conflicts.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    TimeAdjustment,
    FrequencyChange,
    RoomChange,
    SkipConflicts,
}

/// A proposed way out of a conflicted series. `impact` is the disruption
/// to the organizer's intent; `effort` is the work to apply it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionStrategy {
    pub kind: StrategyKind,
    pub impact: Severity,
    pub effort: Severity,
    pub description: String,
}

/// Summary counts over a materialized window of a series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesStatistics {
    pub total_occurrences: usize,
    pub cancelled_occurrences: usize,
    pub modified_occurrences: usize,
    pub holiday_occurrences: usize,
    pub next_occurrence: Option<DateTime<Utc>>,
}
