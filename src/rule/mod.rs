//! Repeat rules: the user-facing `RecurrencePattern`, the normalized
//! `RuleDescriptor`, and the textual codec that persists descriptors.

pub mod codec;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub fn token(self) -> &'static str {
        match self {
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Yearly => "YEARLY",
        }
    }

    pub fn from_token(s: &str) -> Option<Self> {
        match s {
            "DAILY" => Some(Frequency::Daily),
            "WEEKLY" => Some(Frequency::Weekly),
            "MONTHLY" => Some(Frequency::Monthly),
            "YEARLY" => Some(Frequency::Yearly),
            _ => None,
        }
    }
}

/// Weekday with the two-letter wire abbreviation used by the rule text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Weekday {
    Mo,
    Tu,
    We,
    Th,
    Fr,
    Sa,
    Su,
}

impl Weekday {
    pub fn abbrev(self) -> &'static str {
        match self {
            Weekday::Mo => "MO",
            Weekday::Tu => "TU",
            Weekday::We => "WE",
            Weekday::Th => "TH",
            Weekday::Fr => "FR",
            Weekday::Sa => "SA",
            Weekday::Su => "SU",
        }
    }

    pub fn from_abbrev(s: &str) -> Option<Self> {
        match s {
            "MO" => Some(Weekday::Mo),
            "TU" => Some(Weekday::Tu),
            "WE" => Some(Weekday::We),
            "TH" => Some(Weekday::Th),
            "FR" => Some(Weekday::Fr),
            "SA" => Some(Weekday::Sa),
            "SU" => Some(Weekday::Su),
            _ => None,
        }
    }

    pub fn to_chrono(self) -> chrono::Weekday {
        match self {
            Weekday::Mo => chrono::Weekday::Mon,
            Weekday::Tu => chrono::Weekday::Tue,
            Weekday::We => chrono::Weekday::Wed,
            Weekday::Th => chrono::Weekday::Thu,
            Weekday::Fr => chrono::Weekday::Fri,
            Weekday::Sa => chrono::Weekday::Sat,
            Weekday::Su => chrono::Weekday::Sun,
        }
    }

    pub fn from_chrono(wd: chrono::Weekday) -> Self {
        match wd {
            chrono::Weekday::Mon => Weekday::Mo,
            chrono::Weekday::Tue => Weekday::Tu,
            chrono::Weekday::Wed => Weekday::We,
            chrono::Weekday::Thu => Weekday::Th,
            chrono::Weekday::Fri => Weekday::Fr,
            chrono::Weekday::Sat => Weekday::Sa,
            chrono::Weekday::Sun => Weekday::Su,
        }
    }

    /// Days from `week_start` to `self` within one week, 0..=6.
    pub fn days_from(self, week_start: Weekday) -> i64 {
        let a = self.to_chrono().num_days_from_monday() as i64;
        let b = week_start.to_chrono().num_days_from_monday() as i64;
        (a - b).rem_euclid(7)
    }
}

/// Normalized repeat rule: frequency + interval + selectors. This is the
/// engine's working form; `codec` round-trips it to the persisted text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDescriptor {
    pub frequency: Frequency,
    pub interval: u32,
    pub count: Option<u32>,
    pub until: Option<DateTime<Utc>>,
    pub by_day: Vec<Weekday>,
    pub by_month_day: Vec<u32>,
    pub by_set_pos: Vec<i32>,
    pub by_month: Vec<u32>,
    pub week_start: Weekday,
}

impl RuleDescriptor {
    pub fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            interval: 1,
            count: None,
            until: None,
            by_day: Vec::new(),
            by_month_day: Vec::new(),
            by_set_pos: Vec::new(),
            by_month: Vec::new(),
            week_start: Weekday::Mo,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    Daily,
    Weekly,
    Monthly,
    Yearly,
    Custom,
}

/// How a monthly pattern picks its day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonthlyPattern {
    /// Fixed day-of-month, 1–31.
    ByDate(u32),
    /// The `week`-th (1–5) `weekday` of the month — "2nd Thursday".
    ByWeekday { week: u32, weekday: Weekday },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndCondition {
    Never,
    OnDate(DateTime<Utc>),
    AfterCount(u32),
}

/// User-friendly repeat description, as the booking UI collects it.
/// `validate` rejects inconsistent field combinations before any
/// conversion — nothing is silently defaulted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrencePattern {
    pub kind: PatternKind,
    pub interval: u32,
    /// Which weekdays to hit; required and non-empty for weekly.
    pub week_days: Vec<Weekday>,
    /// Required for monthly.
    pub monthly: Option<MonthlyPattern>,
    pub end: EndCondition,
    pub skip_holidays: bool,
    pub holiday_region: Option<String>,
}

impl RecurrencePattern {
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.interval < 1 || self.interval > 999 {
            return Err(EngineError::Configuration(format!(
                "interval must be 1..=999, got {}",
                self.interval
            )));
        }
        match self.kind {
            PatternKind::Weekly => {
                if self.week_days.is_empty() {
                    return Err(EngineError::Configuration(
                        "weekly pattern requires at least one weekday".into(),
                    ));
                }
            }
            PatternKind::Monthly => match self.monthly {
                None => {
                    return Err(EngineError::Configuration(
                        "monthly pattern requires a monthly selector".into(),
                    ));
                }
                Some(MonthlyPattern::ByDate(d)) if !(1..=31).contains(&d) => {
                    return Err(EngineError::Configuration(format!(
                        "monthly date must be 1..=31, got {d}"
                    )));
                }
                Some(MonthlyPattern::ByWeekday { week, .. }) if !(1..=5).contains(&week) => {
                    return Err(EngineError::Configuration(format!(
                        "monthly week must be 1..=5, got {week}"
                    )));
                }
                _ => {}
            },
            _ => {}
        }
        if let EndCondition::AfterCount(n) = self.end
            && (n < 1 || n > 999)
        {
            return Err(EngineError::Configuration(format!(
                "end count must be 1..=999, got {n}"
            )));
        }
        Ok(())
    }

    /// Convert to the normalized descriptor. Weekly copies the weekday
    /// list; monthly-by-date becomes a single month-day selector;
    /// monthly-by-weekday becomes weekday + position ("2nd Thursday" =
    /// BYDAY=TH, BYSETPOS=2). Custom repeats like daily.
    pub fn to_descriptor(&self) -> Result<RuleDescriptor, EngineError> {
        self.validate()?;

        let frequency = match self.kind {
            PatternKind::Daily | PatternKind::Custom => Frequency::Daily,
            PatternKind::Weekly => Frequency::Weekly,
            PatternKind::Monthly => Frequency::Monthly,
            PatternKind::Yearly => Frequency::Yearly,
        };
        let mut descriptor = RuleDescriptor::new(frequency);
        descriptor.interval = self.interval;

        match self.kind {
            PatternKind::Weekly => {
                descriptor.by_day = self.week_days.clone();
            }
            PatternKind::Monthly => match self.monthly {
                Some(MonthlyPattern::ByDate(d)) => descriptor.by_month_day = vec![d],
                Some(MonthlyPattern::ByWeekday { week, weekday }) => {
                    descriptor.by_day = vec![weekday];
                    descriptor.by_set_pos = vec![week as i32];
                }
                None => unreachable!("validated above"),
            },
            _ => {}
        }

        match self.end {
            EndCondition::Never => {}
            EndCondition::AfterCount(n) => descriptor.count = Some(n),
            EndCondition::OnDate(dt) => descriptor.until = Some(dt),
        }

        Ok(descriptor)
    }
}
