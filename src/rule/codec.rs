//! Textual rule codec. The encoding is the only series state that crosses
//! process restarts, so it stays byte-stable: `FREQ=...` first, then
//! semicolon-separated `KEY=VALUE` pairs, dates as `YYYYMMDDTHHMMSSZ`.
//! Defaults (INTERVAL=1, WKST=MO, empty selectors) are omitted on encode
//! and restored on decode, making `decode(encode(d)) == d` exact.

use chrono::{DateTime, NaiveDateTime, Utc};

use super::{Frequency, RuleDescriptor, Weekday};
use crate::engine::EngineError;

pub fn encode(descriptor: &RuleDescriptor) -> String {
    let mut parts: Vec<String> = Vec::new();

    parts.push(format!("FREQ={}", descriptor.frequency.token()));

    if descriptor.interval != 1 {
        parts.push(format!("INTERVAL={}", descriptor.interval));
    }
    if let Some(count) = descriptor.count {
        parts.push(format!("COUNT={count}"));
    }
    if let Some(until) = descriptor.until {
        parts.push(format!("UNTIL={}", format_timestamp(until)));
    }
    if !descriptor.by_day.is_empty() {
        let days: Vec<&str> = descriptor.by_day.iter().map(|d| d.abbrev()).collect();
        parts.push(format!("BYDAY={}", days.join(",")));
    }
    if !descriptor.by_month_day.is_empty() {
        parts.push(format!("BYMONTHDAY={}", join_ints(&descriptor.by_month_day)));
    }
    if !descriptor.by_set_pos.is_empty() {
        parts.push(format!("BYSETPOS={}", join_ints(&descriptor.by_set_pos)));
    }
    if !descriptor.by_month.is_empty() {
        parts.push(format!("BYMONTH={}", join_ints(&descriptor.by_month)));
    }
    if descriptor.week_start != Weekday::Mo {
        parts.push(format!("WKST={}", descriptor.week_start.abbrev()));
    }

    parts.join(";")
}

pub fn decode(text: &str) -> Result<RuleDescriptor, EngineError> {
    // Legacy rows carry an RRULE: prefix; accept it, never emit it.
    let text = text
        .strip_prefix("RRULE:")
        .or_else(|| text.strip_prefix("rrule:"))
        .unwrap_or(text);

    let mut frequency: Option<Frequency> = None;
    let mut interval: u32 = 1;
    let mut count: Option<u32> = None;
    let mut until: Option<DateTime<Utc>> = None;
    let mut by_day: Vec<Weekday> = Vec::new();
    let mut by_month_day: Vec<u32> = Vec::new();
    let mut by_set_pos: Vec<i32> = Vec::new();
    let mut by_month: Vec<u32> = Vec::new();
    let mut week_start = Weekday::Mo;

    for part in text.split(';') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let Some((key, value)) = part.split_once('=') else {
            return Err(EngineError::MalformedRule(format!(
                "token without '=': {part}"
            )));
        };
        match key.to_ascii_uppercase().as_str() {
            "FREQ" => {
                frequency = Some(Frequency::from_token(value).ok_or_else(|| {
                    EngineError::MalformedRule(format!("unknown frequency: {value}"))
                })?);
            }
            "INTERVAL" => interval = parse_int(key, value)?,
            "COUNT" => count = Some(parse_int(key, value)?),
            "UNTIL" => until = Some(parse_timestamp(value)?),
            "BYDAY" => {
                for token in value.split(',') {
                    by_day.push(Weekday::from_abbrev(token).ok_or_else(|| {
                        EngineError::MalformedRule(format!("unknown weekday: {token}"))
                    })?);
                }
            }
            "BYMONTHDAY" => by_month_day = parse_int_list(key, value)?,
            "BYSETPOS" => by_set_pos = parse_int_list(key, value)?,
            "BYMONTH" => by_month = parse_int_list(key, value)?,
            "WKST" => {
                week_start = Weekday::from_abbrev(value).ok_or_else(|| {
                    EngineError::MalformedRule(format!("unknown week start: {value}"))
                })?;
            }
            // Unknown keys are tolerated so newer writers stay readable.
            _ => {}
        }
    }

    let frequency = frequency
        .ok_or_else(|| EngineError::MalformedRule("missing FREQ token".into()))?;

    Ok(RuleDescriptor {
        frequency,
        interval,
        count,
        until,
        by_day,
        by_month_day,
        by_set_pos,
        by_month,
        week_start,
    })
}

fn join_ints<T: std::fmt::Display>(values: &[T]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn parse_int<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, EngineError> {
    value.parse().map_err(|_| {
        EngineError::MalformedRule(format!("{key} is not a valid integer: {value}"))
    })
}

fn parse_int_list<T: std::str::FromStr>(key: &str, value: &str) -> Result<Vec<T>, EngineError> {
    value.split(',').map(|v| parse_int(key, v)).collect()
}

/// `YYYYMMDDTHHMMSSZ`, UTC.
fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, EngineError> {
    let trimmed = value.strip_suffix('Z').unwrap_or(value);
    NaiveDateTime::parse_from_str(trimmed, "%Y%m%dT%H%M%S")
        .map(|naive| naive.and_utc())
        .map_err(|_| EngineError::MalformedRule(format!("bad timestamp: {value}")))
}
