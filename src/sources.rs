//! The engine's read dependencies and the exception store, as
//! constructor-injected traits. The engine itself is stateless; these
//! seams are the only suspension points it has.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use ulid::Ulid;

use crate::model::{Booking, Exception, Holiday, Slot};

/// Failure of an external source. The engine wraps it into
/// `EngineError::Dependency` and propagates — no retries, no fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError(pub String);

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for SourceError {}

/// Read-only view of existing bookings.
#[async_trait]
pub trait BookingSource: Send + Sync {
    /// All bookings of `resource_id` overlapping `window`, any status.
    /// The conflict checks filter cancelled rows themselves.
    async fn bookings_in_window(
        &self,
        resource_id: Ulid,
        window: Slot,
    ) -> Result<Vec<Booking>, SourceError>;
}

/// Read-only holiday calendar.
#[async_trait]
pub trait HolidaySource: Send + Sync {
    async fn holidays_in_window(
        &self,
        window: Slot,
        region: &str,
    ) -> Result<Vec<Holiday>, SourceError>;
}

/// Persisted per-occurrence overrides, keyed by `(series_id,
/// original_start)`. Keys are exact timestamps: an exception whose key no
/// longer matches any generated occurrence (because the series' rule or
/// base time was edited) is never matched again — accepted behavior, not
/// reconciled here.
#[async_trait]
pub trait ExceptionStore: Send + Sync {
    /// Insert or replace the exception with the same key.
    async fn upsert(&self, exception: Exception) -> Result<Exception, SourceError>;

    async fn for_series(&self, series_id: Ulid) -> Result<Vec<Exception>, SourceError>;

    /// Remove by key. Returns whether anything was removed.
    async fn remove(
        &self,
        series_id: Ulid,
        original_start: DateTime<Utc>,
    ) -> Result<bool, SourceError>;
}

/// Time source for advance-booking checks. Injected so tests can pin "now".
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock frozen at a fixed instant.
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

// ── In-memory implementations ────────────────────────────────────
//
// Reference implementations for tests and embedders that keep everything
// in process. Production callers adapt their own persistence instead.

#[derive(Default)]
pub struct InMemoryBookings {
    by_resource: DashMap<Ulid, Vec<Booking>>,
}

impl InMemoryBookings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, booking: Booking) {
        self.by_resource
            .entry(booking.resource_id)
            .or_default()
            .push(booking);
    }
}

#[async_trait]
impl BookingSource for InMemoryBookings {
    async fn bookings_in_window(
        &self,
        resource_id: Ulid,
        window: Slot,
    ) -> Result<Vec<Booking>, SourceError> {
        Ok(self
            .by_resource
            .get(&resource_id)
            .map(|rows| {
                rows.iter()
                    .filter(|b| b.slot.overlaps(&window))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct InMemoryHolidays {
    by_region: DashMap<String, Vec<Holiday>>,
}

impl InMemoryHolidays {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, holiday: Holiday) {
        self.by_region
            .entry(holiday.region.clone())
            .or_default()
            .push(holiday);
    }
}

#[async_trait]
impl HolidaySource for InMemoryHolidays {
    async fn holidays_in_window(
        &self,
        window: Slot,
        region: &str,
    ) -> Result<Vec<Holiday>, SourceError> {
        let first = window.start.date_naive();
        let last = window.end.date_naive();
        Ok(self
            .by_region
            .get(region)
            .map(|rows| {
                rows.iter()
                    .filter(|h| h.date >= first && h.date <= last)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct InMemoryExceptionStore {
    by_key: DashMap<(Ulid, DateTime<Utc>), Exception>,
}

impl InMemoryExceptionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExceptionStore for InMemoryExceptionStore {
    async fn upsert(&self, exception: Exception) -> Result<Exception, SourceError> {
        self.by_key.insert(exception.key(), exception.clone());
        Ok(exception)
    }

    async fn for_series(&self, series_id: Ulid) -> Result<Vec<Exception>, SourceError> {
        let mut rows: Vec<Exception> = self
            .by_key
            .iter()
            .filter(|e| e.key().0 == series_id)
            .map(|e| e.value().clone())
            .collect();
        rows.sort_by_key(|e| e.original_start);
        Ok(rows)
    }

    async fn remove(
        &self,
        series_id: Ulid,
        original_start: DateTime<Utc>,
    ) -> Result<bool, SourceError> {
        Ok(self.by_key.remove(&(series_id, original_start)).is_some())
    }
}

/// A source that always fails — for exercising dependency-error paths.
pub struct FailingSource(pub String);

#[async_trait]
impl BookingSource for FailingSource {
    async fn bookings_in_window(
        &self,
        _resource_id: Ulid,
        _window: Slot,
    ) -> Result<Vec<Booking>, SourceError> {
        Err(SourceError(self.0.clone()))
    }
}

#[async_trait]
impl HolidaySource for FailingSource {
    async fn holidays_in_window(
        &self,
        _window: Slot,
        _region: &str,
    ) -> Result<Vec<Holiday>, SourceError> {
        Err(SourceError(self.0.clone()))
    }
}

#[async_trait]
impl ExceptionStore for FailingSource {
    async fn upsert(&self, _exception: Exception) -> Result<Exception, SourceError> {
        Err(SourceError(self.0.clone()))
    }

    async fn for_series(&self, _series_id: Ulid) -> Result<Vec<Exception>, SourceError> {
        Err(SourceError(self.0.clone()))
    }

    async fn remove(
        &self,
        _series_id: Ulid,
        _original_start: DateTime<Utc>,
    ) -> Result<bool, SourceError> {
        Err(SourceError(self.0.clone()))
    }
}
