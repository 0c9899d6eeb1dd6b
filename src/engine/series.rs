//! Whole-series conflict analysis: materialize a window, conflict-check
//! every live occurrence, aggregate a conflict rate, and propose ranked
//! ways out.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::model::{
    Booking, BookingRequest, ConflictKind, OccurrenceReport, RecurringConflictResult,
    RecurringSeries, ResolutionStrategy, Resource, Severity, Slot, StrategyKind,
};

use super::conflict::run_checks;
use super::{Engine, EngineError, MaterializeOptions};

/// Knobs for one series analysis. `attendee_count`/`equipment` describe
/// the demand each occurrence places on the room — the series row itself
/// does not carry them.
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    pub max_instances: Option<usize>,
    pub skip_holidays: Option<bool>,
    pub attendee_count: u32,
    pub equipment: Vec<String>,
}

impl Engine {
    /// Run the detector across every non-cancelled occurrence of `series`
    /// in the window. Each occurrence is compared against the resource's
    /// existing bookings minus any row occupying the occurrence's own slot
    /// (a previously materialized series row must not conflict with
    /// itself).
    pub async fn analyze_series(
        &self,
        series: &RecurringSeries,
        resource: &Resource,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        options: &AnalyzeOptions,
    ) -> Result<RecurringConflictResult, EngineError> {
        let occurrences = self
            .materialize(
                series,
                window_start,
                window_end,
                &MaterializeOptions {
                    max_occurrences: options.max_instances,
                    include_exceptions: true,
                    skip_holidays: options.skip_holidays,
                    buffer_minutes: None,
                },
            )
            .await?;

        metrics::counter!(crate::observability::SERIES_ANALYSES_TOTAL).increment(1);

        let total_instances = occurrences.len();
        let live: Vec<_> = occurrences.iter().filter(|o| !o.is_cancelled()).collect();
        let valid_instances = live.len();
        if live.is_empty() {
            return Ok(RecurringConflictResult {
                conflicts: Vec::new(),
                breakdown: Vec::new(),
                total_instances,
                valid_instances,
                conflict_rate: 0.0,
            });
        }

        let fetch_start = live.iter().map(|o| o.start).min().expect("non-empty");
        let fetch_end = live.iter().map(|o| o.end).max().expect("non-empty");
        let existing = self
            .bookings
            .bookings_in_window(resource.id, Slot::new(fetch_start, fetch_end))
            .await
            .map_err(EngineError::from)?;

        let now = self.clock.now();
        let mut seen: HashSet<(ConflictKind, String, DateTime<Utc>)> = HashSet::new();
        let mut conflicts = Vec::new();
        let mut breakdown = Vec::new();

        for occ in live {
            let slot = occ.slot();
            // Exclude the occurrence's own persisted row, if any.
            let others: Vec<Booking> = existing
                .iter()
                .filter(|b| b.slot != slot)
                .cloned()
                .collect();
            let request = BookingRequest {
                resource_id: resource.id,
                slot,
                attendee_count: options.attendee_count,
                equipment: options.equipment.clone(),
            };
            let found = run_checks(&request, &others, resource, &[], now);
            if found.is_empty() {
                continue;
            }
            for conflict in &found {
                if seen.insert((conflict.kind, conflict.description.clone(), occ.start)) {
                    conflicts.push(conflict.clone());
                }
            }
            breakdown.push(OccurrenceReport {
                occurrence: occ.clone(),
                conflicts: found,
            });
        }

        let conflict_rate = if valid_instances == 0 {
            0.0
        } else {
            round2(breakdown.len() as f64 / valid_instances as f64)
        };

        debug!(
            series = %series.id,
            checked = valid_instances,
            conflicted = breakdown.len(),
            conflict_rate,
            "analyzed series"
        );

        Ok(RecurringConflictResult {
            conflicts,
            breakdown,
            total_instances,
            valid_instances,
            conflict_rate,
        })
    }
}

/// Classify a conflicted series and propose ranked strategies. The head
/// of the returned list is the recommendation: the strategy maximizing
/// `score(impact) + score(effort)` with low=3, medium=2, high=1 — the
/// cheapest meaningful fix wins.
pub fn suggest_resolution(
    result: &RecurringConflictResult,
    series: &RecurringSeries,
) -> Vec<ResolutionStrategy> {
    if !result.has_conflict() {
        return Vec::new();
    }

    let name = series.title.as_deref().unwrap_or("the series");
    let time_based = result
        .conflicts
        .iter()
        .filter(|c| {
            matches!(
                c.kind,
                ConflictKind::TimeOverlap | ConflictKind::MaintenanceConflict
            )
        })
        .count();
    let placement = result
        .conflicts
        .iter()
        .filter(|c| {
            matches!(
                c.kind,
                ConflictKind::CapacityExceeded | ConflictKind::EquipmentConflict
            )
        })
        .count();

    let mut strategies = Vec::new();

    if time_based > 0 {
        strategies.push(ResolutionStrategy {
            kind: StrategyKind::TimeAdjustment,
            impact: Severity::Low,
            effort: Severity::Low,
            description: format!(
                "shift {name} to a nearby time; {time_based} conflict(s) are time-based"
            ),
        });
    }
    if placement > 0 {
        strategies.push(ResolutionStrategy {
            kind: StrategyKind::RoomChange,
            impact: Severity::High,
            effort: Severity::Medium,
            description: format!(
                "move {name} to a room that fits its size and equipment needs"
            ),
        });
    }
    if result.conflict_rate >= 0.5 {
        strategies.push(ResolutionStrategy {
            kind: StrategyKind::FrequencyChange,
            impact: Severity::Medium,
            effort: Severity::Medium,
            description: format!(
                "most occurrences clash (rate {:.2}); widen the repeat interval or \
                 pick different days",
                result.conflict_rate
            ),
        });
    } else {
        strategies.push(ResolutionStrategy {
            kind: StrategyKind::SkipConflicts,
            impact: Severity::Low,
            effort: Severity::Low,
            description: format!(
                "cancel the {} conflicted occurrence(s) and keep the rest",
                result.breakdown.len()
            ),
        });
    }

    strategies.sort_by(|a, b| strategy_score(b).cmp(&strategy_score(a)));
    strategies
}

fn strategy_score(strategy: &ResolutionStrategy) -> u8 {
    weight(strategy.impact) + weight(strategy.effort)
}

fn weight(level: Severity) -> u8 {
    match level {
        Severity::Low => 3,
        Severity::Medium => 2,
        Severity::High => 1,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
