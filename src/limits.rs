//! Crate-wide bounds. Callers can always ask for less; never for more.

/// Default cap on occurrences produced per expansion/materialization.
pub const DEFAULT_MAX_OCCURRENCES: usize = 100;

/// Hard ceiling on occurrences per call, regardless of caller options.
pub const MAX_OCCURRENCES_HARD_CAP: usize = 1_000;

/// Operating day for alternative-slot search, UTC hours.
pub const OPERATING_DAY_START_HOUR: u32 = 8;
pub const OPERATING_DAY_END_HOUR: u32 = 18;

/// Cadence of the alternative-slot scan.
pub const SUGGESTION_STEP_MINUTES: i64 = 30;

/// At most this many alternative slots per conflict report.
pub const MAX_SUGGESTIONS: usize = 5;
