//! The `TimeScope` value type: a validated day, ISO week or calendar quarter id.
//!
//! Three textual forms are accepted:
//!
//! * day: `YYYY-wwWW.D` (ISO week-numbering year, ISO week, weekday 1 = Monday)
//! * week: `YYYY-wwWW`
//! * quarter: `YYYY—QN` (em-dash separator)
//!
//! Equality, hashing and ordering use the id string only, so quarters sort after
//! every day and week id sharing their year prefix.

use crate::errors::{ScopeError, ScopeResult};
use chrono::{Datelike, Days, Local, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// Separator between the year and the quarter in a quarter id.
pub const QUARTER_SEPARATOR: char = '—';

static WEEK_FORM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:([0-9]{4})-)?ww([0-9]{2})(?:\.([0-9]))?$").expect("valid regex")
});
static QUARTER_FORM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]{4})—Q([0-9])$").expect("valid regex"));
static HYPHEN_QUARTER_FORM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]{4}[-–]Q[0-9]$").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Granularity {
    Day,
    Week,
    Quarter,
}

impl Granularity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Quarter => "quarter",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
enum Parts {
    Day { year: i32, week: u32, weekday: u32 },
    Week { year: i32, week: u32 },
    Quarter { year: i32, quarter: u32 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeScope {
    id: String,
    granularity: Granularity,
    year: i32,
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl TimeScope {
    /// Parses a scope id. Year-less week and day ids (`ww48`, `ww48.4`) take
    /// the current local calendar year.
    pub fn parse(input: &str) -> ScopeResult<Self> {
        Self::parse_with_default_year(input, Local::now().year())
    }

    pub fn parse_with_default_year(input: &str, default_year: i32) -> ScopeResult<Self> {
        if let Some(caps) = WEEK_FORM.captures(input) {
            let year = match caps.get(1) {
                Some(value) => parse_number::<i32>(input, value.as_str())?,
                None => default_year,
            };
            let week = parse_number::<u32>(input, &caps[2])?;
            let parts = match caps.get(3) {
                Some(value) => Parts::Day {
                    year,
                    week,
                    weekday: parse_number::<u32>(input, value.as_str())?,
                },
                None => Parts::Week { year, week },
            };
            return Self::from_parts(input, parts);
        }

        if let Some(caps) = QUARTER_FORM.captures(input) {
            let parts = Parts::Quarter {
                year: parse_number::<i32>(input, &caps[1])?,
                quarter: parse_number::<u32>(input, &caps[2])?,
            };
            return Self::from_parts(input, parts);
        }

        if HYPHEN_QUARTER_FORM.is_match(input) {
            return Err(ScopeError::parse(
                input,
                "quarter separator must be an em-dash (—)",
            ));
        }

        Err(ScopeError::parse(
            input,
            "expected YYYY-wwWW.D, YYYY-wwWW or YYYY—QN",
        ))
    }

    pub fn day(year: i32, week: u32, weekday: u32) -> ScopeResult<Self> {
        let parts = Parts::Day { year, week, weekday };
        Self::from_parts(&format_parts(parts), parts)
    }

    pub fn week(year: i32, week: u32) -> ScopeResult<Self> {
        let parts = Parts::Week { year, week };
        Self::from_parts(&format_parts(parts), parts)
    }

    pub fn quarter(year: i32, quarter: u32) -> ScopeResult<Self> {
        let parts = Parts::Quarter { year, quarter };
        Self::from_parts(&format_parts(parts), parts)
    }

    /// The scope of the given granularity containing `date`.
    pub fn from_date(date: NaiveDate, granularity: Granularity) -> ScopeResult<Self> {
        let iso = date.iso_week();
        match granularity {
            Granularity::Day => Self::day(iso.year(), iso.week(), date.weekday().number_from_monday()),
            Granularity::Week => Self::week(iso.year(), iso.week()),
            Granularity::Quarter => Self::quarter(date.year(), date.month0() / 3 + 1),
        }
    }

    pub fn from_datetime(instant: NaiveDateTime, granularity: Granularity) -> ScopeResult<Self> {
        Self::from_date(instant.date(), granularity)
    }

    /// The scope containing today's local date.
    pub fn current(granularity: Granularity) -> ScopeResult<Self> {
        Self::from_date(Local::now().date_naive(), granularity)
    }

    pub fn as_str(&self) -> &str {
        &self.id
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// The four-digit year prefix: the ISO week-numbering year for day and
    /// week scopes, the calendar year for quarters.
    pub fn year(&self) -> i32 {
        self.year
    }

    /// Inclusive start instant.
    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    /// Exclusive end instant, the start of the next unit.
    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    pub fn contains(&self, instant: NaiveDateTime) -> bool {
        self.start <= instant && instant < self.end
    }

    fn from_parts(input: &str, parts: Parts) -> ScopeResult<Self> {
        let (granularity, year, start, end) = match parts {
            Parts::Day { year, week, weekday } => {
                check_year(input, year)?;
                let weekday = weekday_from_digit(weekday)
                    .ok_or_else(|| ScopeError::parse(input, "weekday digit must be 1..7"))?;
                let date = iso_date(input, year, week, weekday)?;
                let end = date
                    .checked_add_days(Days::new(1))
                    .ok_or_else(|| ScopeError::parse(input, "day end out of range"))?;
                (Granularity::Day, year, date, end)
            }
            Parts::Week { year, week } => {
                check_year(input, year)?;
                let monday = iso_date(input, year, week, Weekday::Mon)?;
                let end = monday
                    .checked_add_days(Days::new(7))
                    .ok_or_else(|| ScopeError::parse(input, "week end out of range"))?;
                (Granularity::Week, year, monday, end)
            }
            Parts::Quarter { year, quarter } => {
                check_year(input, year)?;
                if !(1..=4).contains(&quarter) {
                    return Err(ScopeError::parse(input, "quarter must be 1..4"));
                }
                let start = NaiveDate::from_ymd_opt(year, 3 * quarter - 2, 1)
                    .ok_or_else(|| ScopeError::parse(input, "quarter start out of range"))?;
                let end = start
                    .checked_add_months(Months::new(3))
                    .ok_or_else(|| ScopeError::parse(input, "quarter end out of range"))?;
                (Granularity::Quarter, year, start, end)
            }
        };

        Ok(Self {
            id: format_parts(parts),
            granularity,
            year,
            start: start.and_time(NaiveTime::MIN),
            end: end.and_time(NaiveTime::MIN),
        })
    }
}

fn format_parts(parts: Parts) -> String {
    match parts {
        Parts::Day { year, week, weekday } => format!("{:04}-ww{:02}.{}", year, week, weekday),
        Parts::Week { year, week } => format!("{:04}-ww{:02}", year, week),
        Parts::Quarter { year, quarter } => format!("{:04}{}Q{}", year, QUARTER_SEPARATOR, quarter),
    }
}

fn parse_number<T: FromStr>(input: &str, digits: &str) -> ScopeResult<T> {
    digits
        .parse::<T>()
        .map_err(|_| ScopeError::parse(input, format!("'{}' is not a number", digits)))
}

fn check_year(input: &str, year: i32) -> ScopeResult<()> {
    if (0..=9999).contains(&year) {
        Ok(())
    } else {
        Err(ScopeError::parse(input, format!("year {} is not four digits", year)))
    }
}

fn iso_date(input: &str, year: i32, week: u32, weekday: Weekday) -> ScopeResult<NaiveDate> {
    NaiveDate::from_isoywd_opt(year, week, weekday).ok_or_else(|| {
        ScopeError::parse(
            input,
            format!("week {:02} does not exist in ISO year {:04}", week, year),
        )
    })
}

fn weekday_from_digit(digit: u32) -> Option<Weekday> {
    match digit {
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        7 => Some(Weekday::Sun),
        _ => None,
    }
}

impl PartialEq for TimeScope {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TimeScope {}

impl Hash for TimeScope {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for TimeScope {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimeScope {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl fmt::Display for TimeScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

impl AsRef<str> for TimeScope {
    fn as_ref(&self) -> &str {
        &self.id
    }
}

impl FromStr for TimeScope {
    type Err = ScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TimeScope {
    type Error = ScopeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for TimeScope {
    type Error = ScopeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<TimeScope> for String {
    fn from(value: TimeScope) -> Self {
        value.id
    }
}
