//! The engine proper: stateless computation over injected read
//! dependencies. One `Engine` per process is plenty — it holds no mutable
//! state, only its collaborators.
//!
//! Two hazards belong to the caller, not the engine:
//! 1. Materializing occurrences into persisted booking rows is not
//!    idempotent — check for an existing `(series_id, start, end)` row
//!    before inserting; the engine does not deduplicate against storage.
//! 2. Conflict-checking a candidate and later persisting it is a
//!    check-then-act race when two writers share a resource. Serialize
//!    writes per resource (single-writer queue or a unique constraint on
//!    resource + time); the engine offers no locking primitive.

mod conflict;
mod error;
mod generate;
mod series;

pub use conflict::{detect, free_slots_for_day};
pub use error::EngineError;
pub use generate::expand;
pub use series::{AnalyzeOptions, suggest_resolution};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use tracing::debug;
use ulid::Ulid;

use crate::limits::{DEFAULT_MAX_OCCURRENCES, MAX_OCCURRENCES_HARD_CAP};
use crate::model::{
    BookingRequest, ConflictResult, Exception, ExceptionKind, Occurrence, RecurringSeries,
    Resource, SeriesStatistics, Slot,
};
use crate::rule::codec;
use crate::sources::{BookingSource, Clock, ExceptionStore, HolidaySource, SystemClock};

/// Knobs for one materialization. `None` fields fall back to the series'
/// own settings (or crate defaults for `max_occurrences`).
#[derive(Debug, Clone)]
pub struct MaterializeOptions {
    pub max_occurrences: Option<usize>,
    pub include_exceptions: bool,
    pub skip_holidays: Option<bool>,
    pub buffer_minutes: Option<u32>,
}

impl Default for MaterializeOptions {
    fn default() -> Self {
        Self {
            max_occurrences: None,
            include_exceptions: true,
            skip_holidays: None,
            buffer_minutes: None,
        }
    }
}

pub struct Engine {
    pub(super) bookings: Arc<dyn BookingSource>,
    pub(super) holidays: Arc<dyn HolidaySource>,
    pub(super) exceptions: Arc<dyn ExceptionStore>,
    pub(super) clock: Arc<dyn Clock>,
}

impl Engine {
    pub fn new(
        bookings: Arc<dyn BookingSource>,
        holidays: Arc<dyn HolidaySource>,
        exceptions: Arc<dyn ExceptionStore>,
    ) -> Self {
        Self::with_clock(bookings, holidays, exceptions, Arc::new(SystemClock))
    }

    /// Same as [`Engine::new`] with a caller-supplied time source, so tests
    /// can pin "now" for advance-booking checks.
    pub fn with_clock(
        bookings: Arc<dyn BookingSource>,
        holidays: Arc<dyn HolidaySource>,
        exceptions: Arc<dyn ExceptionStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            bookings,
            holidays,
            exceptions,
            clock,
        }
    }

    /// Produce the concrete occurrences of `series` inside
    /// `[window_start, window_end]`: rule expansion, then exception
    /// overrides, then buffer, then holiday skipping. Cancelled
    /// occurrences are emitted inert and count toward the limit; holiday
    /// drops are not emitted at all.
    pub async fn materialize(
        &self,
        series: &RecurringSeries,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        options: &MaterializeOptions,
    ) -> Result<Vec<Occurrence>, EngineError> {
        let rule_text = series.rule.trim();
        if rule_text.is_empty() {
            return Err(EngineError::NotFound(series.id));
        }
        let descriptor = codec::decode(rule_text)?;

        let max = options
            .max_occurrences
            .unwrap_or(DEFAULT_MAX_OCCURRENCES)
            .min(MAX_OCCURRENCES_HARD_CAP);
        if max == 0 {
            return Err(EngineError::Range("max occurrences must be positive"));
        }
        let skip_holidays = options.skip_holidays.unwrap_or(series.skip_holidays);
        let buffer_minutes = options.buffer_minutes.unwrap_or(series.buffer_minutes);

        // Generate past the emission limit: holiday drops consume no
        // quota, so the raw sequence may need to be longer than `max`.
        let slots = generate::expand(
            &descriptor,
            series.start_time,
            series.end_time,
            window_start,
            window_end,
            MAX_OCCURRENCES_HARD_CAP,
        )?;
        if slots.is_empty() {
            return Ok(Vec::new());
        }

        // The two reads are independent; run them concurrently.
        let query = Slot::new(slots[0].start, slots.last().expect("non-empty").end);
        let (exceptions, holidays) = futures::try_join!(
            async {
                if options.include_exceptions {
                    self.exceptions.for_series(series.id).await
                } else {
                    Ok(Vec::new())
                }
            },
            async {
                if skip_holidays {
                    self.holidays
                        .holidays_in_window(query, &series.holiday_region)
                        .await
                } else {
                    Ok(Vec::new())
                }
            },
        )
        .map_err(EngineError::from)?;

        let overrides: HashMap<DateTime<Utc>, &Exception> = exceptions
            .iter()
            .map(|e| (e.original_start, e))
            .collect();
        let closed_days: HashSet<NaiveDate> = holidays
            .iter()
            .filter(|h| h.active)
            .map(|h| h.date)
            .collect();

        let buffer = Duration::minutes(buffer_minutes as i64);
        let mut out = Vec::new();
        for slot in &slots {
            if out.len() >= max {
                break;
            }
            let exception = overrides.get(&slot.start).copied();
            // Holiday membership is judged on the rule-computed day, even
            // for moved occurrences.
            let is_holiday = closed_days.contains(&slot.day());

            if let Some(ex) = exception
                && ex.kind == ExceptionKind::Cancelled
            {
                out.push(Occurrence {
                    start: slot.start,
                    end: slot.end,
                    is_holiday,
                    has_exception: true,
                    exception_kind: Some(ExceptionKind::Cancelled),
                    original_start: Some(slot.start),
                    reason: ex.reason.clone(),
                });
                continue;
            }

            let mut start = slot.start;
            let mut end = slot.end;
            if let Some(ex) = exception {
                if let Some(new_start) = ex.new_start {
                    start = new_start;
                }
                if let Some(new_end) = ex.new_end {
                    end = new_end;
                }
            }

            // Buffer precedes the slot: both ends shift earlier.
            start -= buffer;
            end -= buffer;

            if skip_holidays && is_holiday {
                continue;
            }

            out.push(Occurrence {
                start,
                end,
                is_holiday,
                has_exception: exception.is_some(),
                exception_kind: exception.map(|e| e.kind),
                original_start: exception.map(|_| slot.start),
                reason: exception.and_then(|e| e.reason.clone()),
            });
        }

        debug!(
            series = %series.id,
            occurrences = out.len(),
            "materialized series window"
        );
        metrics::counter!(crate::observability::MATERIALIZATIONS_TOTAL).increment(1);
        metrics::histogram!(crate::observability::MATERIALIZED_OCCURRENCES)
            .record(out.len() as f64);

        Ok(out)
    }

    /// Conflict-check a single candidate: fetches the candidate day's
    /// bookings and runs [`detect`] with the engine's clock.
    pub async fn check_booking(
        &self,
        request: &BookingRequest,
        resource: &Resource,
        maintenance: &[Slot],
    ) -> Result<ConflictResult, EngineError> {
        // Cover the whole operating day so the suggestion scan sees
        // every booking it must avoid.
        let day_start = request
            .slot
            .day()
            .and_time(NaiveTime::MIN)
            .and_utc();
        let day_end = day_start + Duration::days(1);
        let window = Slot::new(day_start, day_end.max(request.slot.end));

        let existing = self
            .bookings
            .bookings_in_window(request.resource_id, window)
            .await
            .map_err(EngineError::from)?;

        Ok(detect(
            request,
            &existing,
            resource,
            maintenance,
            self.clock.now(),
        ))
    }

    /// Insert or replace the exception for `(series_id, original_start)`.
    pub async fn upsert_exception(&self, exception: Exception) -> Result<Exception, EngineError> {
        if let (Some(new_start), Some(new_end)) = (exception.new_start, exception.new_end)
            && new_end <= new_start
        {
            return Err(EngineError::Range("exception new end not after new start"));
        }
        self.exceptions
            .upsert(exception)
            .await
            .map_err(EngineError::from)
    }

    /// Remove the exception for `(series_id, original_start)`. Returns
    /// whether one existed.
    pub async fn remove_exception(
        &self,
        series_id: Ulid,
        original_start: DateTime<Utc>,
    ) -> Result<bool, EngineError> {
        self.exceptions
            .remove(series_id, original_start)
            .await
            .map_err(EngineError::from)
    }

    /// Summary counts over a materialized window, plus the next upcoming
    /// non-cancelled occurrence relative to the engine's clock.
    pub async fn series_statistics(
        &self,
        series: &RecurringSeries,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<SeriesStatistics, EngineError> {
        let occurrences = self
            .materialize(series, window_start, window_end, &MaterializeOptions::default())
            .await?;

        let now = self.clock.now();
        let mut stats = SeriesStatistics {
            total_occurrences: occurrences.len(),
            cancelled_occurrences: 0,
            modified_occurrences: 0,
            holiday_occurrences: 0,
            next_occurrence: None,
        };

        for occ in &occurrences {
            match occ.exception_kind {
                Some(ExceptionKind::Cancelled) => stats.cancelled_occurrences += 1,
                Some(ExceptionKind::Modified) | Some(ExceptionKind::Moved) => {
                    stats.modified_occurrences += 1
                }
                None => {}
            }
            if occ.is_holiday {
                stats.holiday_occurrences += 1;
            }
            if stats.next_occurrence.is_none() && occ.start > now && !occ.is_cancelled() {
                stats.next_occurrence = Some(occ.start);
            }
        }

        Ok(stats)
    }
}
