//! cadence — a recurrence-and-conflict engine for shared-resource booking.
//!
//! The engine turns a repeat description into a normalized, round-trippable
//! rule ([`rule`]), expands it into concrete occurrences while honoring
//! per-occurrence exceptions and holiday closures ([`engine::Engine::materialize`]),
//! and evaluates single candidates or whole series against existing
//! bookings and resource constraints ([`engine::detect`],
//! [`engine::Engine::analyze_series`]).
//!
//! It is a library, not a service: persistence, auth, transport, caching
//! and notification belong to the caller. The engine's only contact with
//! the outside world is the read traits in [`sources`].
//!
//! Integrator notes:
//! - Materializing occurrences into persisted booking rows is not
//!   idempotent. Check for an existing `(series_id, start, end)` row
//!   before inserting.
//! - Conflict-check followed by persist is a check-then-act race when two
//!   writers share a resource. Serialize writes per resource.

pub mod engine;
pub mod limits;
pub mod model;
pub mod observability;
pub mod rule;
pub mod sources;
