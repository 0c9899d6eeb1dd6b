//! Metric names. The crate records through the `metrics` facade only;
//! installing a recorder/exporter is the embedding process' business.

/// Counter: rule expansions performed.
pub const EXPANSIONS_TOTAL: &str = "cadence_expansions_total";

/// Counter: series materializations performed.
pub const MATERIALIZATIONS_TOTAL: &str = "cadence_materializations_total";

/// Histogram: occurrences emitted per materialization.
pub const MATERIALIZED_OCCURRENCES: &str = "cadence_materialized_occurrences";

/// Counter: single-candidate conflict checks.
pub const CONFLICT_CHECKS_TOTAL: &str = "cadence_conflict_checks_total";

/// Counter: conflicts found across all checks.
pub const CONFLICTS_FOUND_TOTAL: &str = "cadence_conflicts_found_total";

/// Counter: whole-series analyses.
pub const SERIES_ANALYSES_TOTAL: &str = "cadence_series_analyses_total";
