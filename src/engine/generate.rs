//! Rule expansion: a `RuleDescriptor` plus the series' base slot becomes a
//! bounded, ordered sequence of concrete `(start, end)` slots. Pure and
//! restartable — a bounded window never requires walking the whole series.

use std::collections::HashSet;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};

use crate::limits::MAX_OCCURRENCES_HARD_CAP;
use crate::model::Slot;
use crate::rule::{Frequency, RuleDescriptor, Weekday};

use super::EngineError;

/// Expand `descriptor` into slots whose starts fall inside
/// `[window_start, window_end]` (inclusive). Every slot has the duration of
/// the base slot `base_start..base_end`. Iteration stops at the first of:
/// `max_occurrences` emitted, the descriptor's COUNT exhausted, UNTIL
/// exceeded, or the window end exceeded. Two raw hits on one calendar day
/// collapse to one.
///
/// COUNT is consumed by every occurrence the rule produces from the series
/// start, whether or not it lands in the window — a later window shows the
/// tail of a counted series, not a restarted one.
pub fn expand(
    descriptor: &RuleDescriptor,
    base_start: DateTime<Utc>,
    base_end: DateTime<Utc>,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    max_occurrences: usize,
) -> Result<Vec<Slot>, EngineError> {
    if max_occurrences == 0 {
        return Err(EngineError::Range("max occurrences must be positive"));
    }
    if window_end < window_start {
        return Err(EngineError::Range("window end before window start"));
    }
    if base_end <= base_start {
        return Err(EngineError::Range("series base end not after base start"));
    }
    if descriptor.interval == 0 {
        return Err(EngineError::Range("rule interval must be positive"));
    }

    metrics::counter!(crate::observability::EXPANSIONS_TOTAL).increment(1);

    // Candidates past this instant cannot be emitted; every walker's
    // candidates are strictly increasing, so this bounds the iteration.
    let stop_at = match descriptor.until {
        Some(until) if until < window_end => until,
        _ => window_end,
    };

    let mut out = Vec::new();
    let mut emission = Emission {
        duration: base_end - base_start,
        window_start,
        count: descriptor.count,
        max: max_occurrences.min(MAX_OCCURRENCES_HARD_CAP),
        produced: 0,
        seen_days: HashSet::new(),
        out: &mut out,
    };

    let base_date = base_start.date_naive();
    let time = base_start.time();
    let interval = descriptor.interval as i64;

    match descriptor.frequency {
        Frequency::Daily => {
            walk_daily(descriptor, base_start, stop_at, interval, &mut emission);
        }
        Frequency::Weekly => {
            walk_weekly(
                descriptor, base_start, base_date, time, stop_at, interval, &mut emission,
            );
        }
        Frequency::Monthly => {
            walk_monthly(
                descriptor, base_start, base_date, time, stop_at, interval, &mut emission,
            );
        }
        Frequency::Yearly => {
            walk_yearly(
                descriptor, base_start, base_date, time, stop_at, interval, &mut emission,
            );
        }
    }

    Ok(out)
}

/// Termination and emission state shared by the frequency walkers.
struct Emission<'a> {
    duration: Duration,
    window_start: DateTime<Utc>,
    count: Option<u32>,
    max: usize,
    produced: u32,
    seen_days: HashSet<NaiveDate>,
    out: &'a mut Vec<Slot>,
}

impl Emission<'_> {
    /// Feed one existing candidate. Returns false once expansion must stop
    /// (COUNT exhausted or `max` emitted).
    fn accept(&mut self, start: DateTime<Utc>) -> bool {
        if !self.seen_days.insert(start.date_naive()) {
            // Same-day duplicate: collapsed, consumes nothing.
            return true;
        }
        if let Some(count) = self.count
            && self.produced >= count
        {
            return false;
        }
        self.produced += 1;
        if start >= self.window_start {
            self.out.push(Slot::new(start, start + self.duration));
            if self.out.len() >= self.max {
                return false;
            }
        }
        true
    }
}

fn month_selected(descriptor: &RuleDescriptor, month: u32) -> bool {
    descriptor.by_month.is_empty() || descriptor.by_month.contains(&month)
}

fn walk_daily(
    descriptor: &RuleDescriptor,
    base_start: DateTime<Utc>,
    stop_at: DateTime<Utc>,
    interval: i64,
    emission: &mut Emission<'_>,
) {
    let step = Duration::days(interval);
    let mut current = base_start;
    while current <= stop_at {
        if month_selected(descriptor, current.month()) && !emission.accept(current) {
            return;
        }
        current += step;
    }
}

fn walk_weekly(
    descriptor: &RuleDescriptor,
    base_start: DateTime<Utc>,
    base_date: NaiveDate,
    time: NaiveTime,
    stop_at: DateTime<Utc>,
    interval: i64,
    emission: &mut Emission<'_>,
) {
    let week_start = descriptor.week_start;
    // No BYDAY means the base weekday repeats.
    let mut days: Vec<Weekday> = if descriptor.by_day.is_empty() {
        vec![Weekday::from_chrono(base_date.weekday())]
    } else {
        descriptor.by_day.clone()
    };
    days.sort_by_key(|d| d.days_from(week_start));
    days.dedup();

    // Align to the start of the base week, then step whole weeks.
    let anchor =
        base_date - Duration::days(Weekday::from_chrono(base_date.weekday()).days_from(week_start));
    let mut week = anchor;
    loop {
        for day in &days {
            let date = week + Duration::days(day.days_from(week_start));
            let candidate = date.and_time(time).and_utc();
            if candidate < base_start {
                continue;
            }
            if candidate > stop_at {
                return; // all later candidates are later still
            }
            if month_selected(descriptor, date.month()) && !emission.accept(candidate) {
                return;
            }
        }
        week += Duration::weeks(interval);
        if week.and_time(time).and_utc() > stop_at {
            return;
        }
    }
}

fn walk_monthly(
    descriptor: &RuleDescriptor,
    base_start: DateTime<Utc>,
    base_date: NaiveDate,
    time: NaiveTime,
    stop_at: DateTime<Utc>,
    interval: i64,
    emission: &mut Emission<'_>,
) {
    let mut k: i64 = 0;
    loop {
        let (year, month) = add_months(base_date.year(), base_date.month(), k * interval);
        let Some(month_first) = NaiveDate::from_ymd_opt(year, month, 1) else {
            return; // out of chrono's date range
        };
        if month_first.and_time(time).and_utc() > stop_at {
            return;
        }
        k += 1;
        if !month_selected(descriptor, month) {
            continue;
        }

        let mut dates = dates_in_month(descriptor, year, month, base_date);
        dates.sort();
        for date in dates {
            let candidate = date.and_time(time).and_utc();
            if candidate < base_start {
                continue;
            }
            if candidate > stop_at {
                return;
            }
            if !emission.accept(candidate) {
                return;
            }
        }
    }
}

/// Which dates a monthly rule selects within one month. BYMONTHDAY picks
/// fixed days (months lacking the day yield nothing); BYDAY+BYSETPOS picks
/// the n-th matching weekday (negative positions count from the end);
/// BYDAY alone picks every matching weekday; no selector repeats the base
/// day-of-month.
fn dates_in_month(
    descriptor: &RuleDescriptor,
    year: i32,
    month: u32,
    base_date: NaiveDate,
) -> Vec<NaiveDate> {
    if !descriptor.by_month_day.is_empty() {
        return descriptor
            .by_month_day
            .iter()
            .filter_map(|&d| NaiveDate::from_ymd_opt(year, month, d))
            .collect();
    }
    if !descriptor.by_day.is_empty() {
        let matches: Vec<NaiveDate> = weekday_dates(year, month, &descriptor.by_day);
        if descriptor.by_set_pos.is_empty() {
            return matches;
        }
        return descriptor
            .by_set_pos
            .iter()
            .filter_map(|&pos| pick_position(&matches, pos))
            .collect();
    }
    NaiveDate::from_ymd_opt(year, month, base_date.day())
        .into_iter()
        .collect()
}

fn walk_yearly(
    descriptor: &RuleDescriptor,
    base_start: DateTime<Utc>,
    base_date: NaiveDate,
    time: NaiveTime,
    stop_at: DateTime<Utc>,
    interval: i64,
    emission: &mut Emission<'_>,
) {
    let mut k: i64 = 0;
    loop {
        let year = base_date.year() as i64 + k * interval;
        let year = match i32::try_from(year) {
            Ok(y) => y,
            Err(_) => return,
        };
        let Some(year_first) = NaiveDate::from_ymd_opt(year, 1, 1) else {
            return;
        };
        if year_first.and_time(time).and_utc() > stop_at {
            return;
        }
        k += 1;
        if !month_selected(descriptor, base_date.month()) {
            continue;
        }
        // Feb 29 only exists in leap years; skip the rest.
        let Some(date) = NaiveDate::from_ymd_opt(year, base_date.month(), base_date.day()) else {
            continue;
        };
        let candidate = date.and_time(time).and_utc();
        if candidate < base_start {
            continue;
        }
        if candidate > stop_at {
            return;
        }
        if !emission.accept(candidate) {
            return;
        }
    }
}

/// All dates in `year`/`month` whose weekday is in `days`, ascending.
fn weekday_dates(year: i32, month: u32, days: &[Weekday]) -> Vec<NaiveDate> {
    let wanted: Vec<chrono::Weekday> = days.iter().map(|d| d.to_chrono()).collect();
    let mut out = Vec::new();
    let mut date = match NaiveDate::from_ymd_opt(year, month, 1) {
        Some(d) => d,
        None => return out,
    };
    while date.month() == month {
        if wanted.contains(&date.weekday()) {
            out.push(date);
        }
        date = match date.succ_opt() {
            Some(d) => d,
            None => break,
        };
    }
    out
}

fn pick_position(matches: &[NaiveDate], pos: i32) -> Option<NaiveDate> {
    if pos > 0 {
        matches.get(pos as usize - 1).copied()
    } else if pos < 0 {
        let idx = matches.len() as i32 + pos;
        usize::try_from(idx).ok().and_then(|i| matches.get(i)).copied()
    } else {
        None
    }
}

fn add_months(year: i32, month: u32, delta: i64) -> (i32, u32) {
    let zero_based = year as i64 * 12 + (month as i64 - 1) + delta;
    (
        zero_based.div_euclid(12) as i32,
        (zero_based.rem_euclid(12) + 1) as u32,
    )
}
