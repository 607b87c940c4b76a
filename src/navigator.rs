//! Navigation across the day / week / quarter partition.
//!
//! A week belongs to the quarter containing its Thursday. This is the same
//! rule ISO 8601 uses to assign a week to its year, so a week id's year
//! prefix always equals the year of its parent quarter.

use crate::errors::{ScopeError, ScopeResult};
use crate::time_scope::{Granularity, TimeScope, QUARTER_SEPARATOR};
use chrono::{Datelike, Days, Months, NaiveDate, Weekday};

pub fn parent(scope: &TimeScope) -> TimeScope {
    match scope.granularity() {
        Granularity::Day => enclosing(scope.start().date(), Granularity::Week),
        Granularity::Week => enclosing(thursday_of(scope), Granularity::Quarter),
        Granularity::Quarter => scope.clone(),
    }
}

/// Walks `parent` until `granularity` is reached.
pub fn ancestor_at(scope: &TimeScope, granularity: Granularity) -> ScopeResult<TimeScope> {
    if granularity < scope.granularity() {
        return Err(ScopeError::Navigation(format!(
            "{} has no {} ancestor",
            scope,
            granularity
        )));
    }
    let mut current = scope.clone();
    while current.granularity() < granularity {
        current = parent(&current);
    }
    Ok(current)
}

/// The scope itself followed by every coarser ancestor, ending with its quarter.
pub fn lineage(scope: &TimeScope) -> Vec<TimeScope> {
    let mut chain = vec![scope.clone()];
    while chain[chain.len() - 1].granularity() != Granularity::Quarter {
        let next = parent(&chain[chain.len() - 1]);
        chain.push(next);
    }
    chain
}

pub fn children(scope: &TimeScope) -> ScopeResult<Vec<TimeScope>> {
    match scope.granularity() {
        Granularity::Day => Ok(Vec::new()),
        Granularity::Week => {
            let monday = scope.start().date();
            (0..7u64)
                .map(|offset| {
                    let date = monday
                        .checked_add_days(Days::new(offset))
                        .ok_or_else(|| out_of_range(scope))?;
                    TimeScope::from_date(date, Granularity::Day)
                })
                .collect()
        }
        Granularity::Quarter => quarter_weeks(scope),
    }
}

fn quarter_weeks(quarter: &TimeScope) -> ScopeResult<Vec<TimeScope>> {
    let first_day = quarter.start().date();
    let last_day = quarter.end().date();

    let back = u64::from(first_day.weekday().num_days_from_monday());
    let mut monday = first_day
        .checked_sub_days(Days::new(back))
        .ok_or_else(|| out_of_range(quarter))?;
    if thursday_after(monday, quarter)? < first_day {
        monday = monday
            .checked_add_days(Days::new(7))
            .ok_or_else(|| out_of_range(quarter))?;
    }

    let mut weeks = Vec::with_capacity(14);
    while thursday_after(monday, quarter)? < last_day {
        let week = TimeScope::from_date(monday, Granularity::Week)?;
        let owner = parent(&week);
        if owner != *quarter {
            tracing::error!(quarter = %quarter, week = %week, owner = %owner, "week generated for a foreign quarter");
            return Err(ScopeError::Invariant(format!(
                "week {} generated for {} resolves to {}",
                week, quarter, owner
            )));
        }
        weeks.push(week);
        monday = monday
            .checked_add_days(Days::new(7))
            .ok_or_else(|| out_of_range(quarter))?;
    }
    Ok(weeks)
}

pub fn next(scope: &TimeScope) -> ScopeResult<TimeScope> {
    let start = scope.start().date();
    let moved = match scope.granularity() {
        Granularity::Day => start.checked_add_days(Days::new(1)),
        Granularity::Week => start.checked_add_days(Days::new(7)),
        Granularity::Quarter => start.checked_add_months(Months::new(3)),
    };
    step(scope, moved, "after")
}

pub fn prev(scope: &TimeScope) -> ScopeResult<TimeScope> {
    let start = scope.start().date();
    let moved = match scope.granularity() {
        Granularity::Day => start.checked_sub_days(Days::new(1)),
        Granularity::Week => start.checked_sub_days(Days::new(7)),
        Granularity::Quarter => start.checked_sub_months(Months::new(3)),
    };
    step(scope, moved, "before")
}

fn step(scope: &TimeScope, moved: Option<NaiveDate>, direction: &str) -> ScopeResult<TimeScope> {
    let date = moved.ok_or_else(|| out_of_range(scope))?;
    TimeScope::from_date(date, scope.granularity()).map_err(|error| {
        ScopeError::Navigation(format!("no {} {} {}: {}", scope.granularity(), direction, scope, error))
    })
}

/// Shortest display form of `scope` next to `reference`: empty when equal,
/// the part after the year when both share a year prefix, otherwise the
/// full id.
pub fn minimize(scope: &TimeScope, reference: &TimeScope) -> String {
    if scope == reference {
        return String::new();
    }
    let (year, rest) = scope.as_str().split_at(4);
    if reference.as_str().starts_with(year) {
        return rest
            .trim_start_matches(|ch| ch == '-' || ch == QUARTER_SEPARATOR)
            .to_string();
    }
    scope.to_string()
}

fn thursday_of(week: &TimeScope) -> NaiveDate {
    let iso = week.start().date().iso_week();
    NaiveDate::from_isoywd_opt(iso.year(), iso.week(), Weekday::Thu).unwrap_or(week.start().date())
}

fn thursday_after(monday: NaiveDate, scope: &TimeScope) -> ScopeResult<NaiveDate> {
    monday
        .checked_add_days(Days::new(3))
        .ok_or_else(|| out_of_range(scope))
}

// A day's date and a week's Thursday share the scope's four-digit year.
fn enclosing(date: NaiveDate, granularity: Granularity) -> TimeScope {
    TimeScope::from_date(date, granularity)
        .expect("dates inside a parsed scope stay within four-digit years")
}

fn out_of_range(scope: &TimeScope) -> ScopeError {
    ScopeError::Navigation(format!("{} is at the edge of the supported calendar", scope))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope(value: &str) -> TimeScope {
        TimeScope::parse(value).expect("valid scope")
    }

    #[test]
    fn day_parent_is_its_week_prefix() {
        let day = scope("2020-ww48.4");
        let week = parent(&day);
        assert_eq!(week.granularity(), Granularity::Week);
        assert_eq!(week.as_str(), &day.as_str()[..9]);
        assert!(children(&week).expect("children").contains(&day));
    }

    #[test]
    fn week_children_run_monday_to_sunday() {
        let days = children(&scope("2015-ww53")).expect("children");
        let ids = days.iter().map(TimeScope::as_str).collect::<Vec<_>>();
        assert_eq!(
            ids,
            vec![
                "2015-ww53.1",
                "2015-ww53.2",
                "2015-ww53.3",
                "2015-ww53.4",
                "2015-ww53.5",
                "2015-ww53.6",
                "2015-ww53.7"
            ]
        );
        assert!(children(&days[0]).expect("day children").is_empty());
    }

    #[test]
    fn boundary_week_follows_its_thursday() {
        // Mon 2015-12-28 .. Sun 2016-01-03, Thursday on 2015-12-31.
        assert_eq!(parent(&scope("2015-ww53")).as_str(), "2015—Q4");
        // Mon 2020-03-30 .. Sun 2020-04-05, Thursday on 2020-04-02.
        assert_eq!(parent(&scope("2020-ww14")).as_str(), "2020—Q2");
        // Mon 2021-06-28 .. Sun 2021-07-04, Thursday on 2021-07-01.
        assert_eq!(parent(&scope("2021-ww26")).as_str(), "2021—Q3");
        // Mon 2019-09-30 .. Sun 2019-10-06, Thursday on 2019-10-03.
        assert_eq!(parent(&scope("2019-ww40")).as_str(), "2019—Q4");
        // Mon 2024-09-30 .. Sun 2024-10-06, Thursday on 2024-10-03.
        assert_eq!(parent(&scope("2024-ww40")).as_str(), "2024—Q4");
        // Mon 2018-12-31 .. Sun 2019-01-06 is 2019-ww01.
        assert_eq!(parent(&scope("2019-ww01")).as_str(), "2019—Q1");
    }

    #[test]
    fn parent_is_total_at_the_calendar_edges() {
        for (value, quarter) in [
            ("0000-ww01.1", "0000—Q1"),
            ("9999-ww52.7", "9999—Q4"),
            ("9999-ww52", "9999—Q4"),
        ] {
            let chain = lineage(&scope(value));
            assert_eq!(chain.last().map(TimeScope::as_str), Some(quarter));
        }
    }

    #[test]
    fn quarter_is_its_own_parent() {
        let quarter = scope("2021—Q3");
        assert_eq!(parent(&quarter), quarter);
        assert_eq!(ancestor_at(&quarter, Granularity::Quarter).expect("self"), quarter);
    }

    #[test]
    fn quarter_children_are_the_weeks_it_owns() {
        let weeks = children(&scope("2015—Q4")).expect("weeks");
        assert_eq!(weeks.first().map(TimeScope::as_str), Some("2015-ww40"));
        assert_eq!(weeks.last().map(TimeScope::as_str), Some("2015-ww53"));
        assert_eq!(weeks.len(), 14);

        let weeks = children(&scope("2016—Q1")).expect("weeks");
        assert_eq!(weeks.first().map(TimeScope::as_str), Some("2016-ww01"));
        assert_eq!(weeks.last().map(TimeScope::as_str), Some("2016-ww13"));

        for quarter in ["2019—Q4", "2020—Q2", "2021—Q3", "2024—Q1"] {
            let quarter = scope(quarter);
            for week in children(&quarter).expect("weeks") {
                assert_eq!(parent(&week), quarter);
            }
        }
    }

    #[test]
    fn consecutive_quarters_partition_the_weeks() {
        let mut quarter = scope("2019—Q1");
        let mut expected = scope("2019-ww01");
        for _ in 0..12 {
            for week in children(&quarter).expect("weeks") {
                assert_eq!(week, expected);
                expected = next(&expected).expect("next week");
            }
            quarter = next(&quarter).expect("next quarter");
        }
    }

    #[test]
    fn ancestor_at_rejects_finer_targets() {
        let week = scope("2021-ww31");
        let error = ancestor_at(&week, Granularity::Day).expect_err("finer target");
        assert!(matches!(error, ScopeError::Navigation(_)));
        assert_eq!(
            ancestor_at(&scope("2021-ww31.6"), Granularity::Quarter)
                .expect("quarter")
                .as_str(),
            "2021—Q3"
        );
    }

    #[test]
    fn lineage_ends_with_quarter() {
        let chain = lineage(&scope("2021-ww31.6"));
        let ids = chain.iter().map(TimeScope::as_str).collect::<Vec<_>>();
        assert_eq!(ids, vec!["2021-ww31.6", "2021-ww31", "2021—Q3"]);
    }

    #[test]
    fn next_and_prev_roll_over_years() {
        assert_eq!(next(&scope("2015-ww53.7")).expect("next").as_str(), "2016-ww01.1");
        assert_eq!(next(&scope("2015-ww53")).expect("next").as_str(), "2016-ww01");
        assert_eq!(next(&scope("2016-ww52")).expect("next").as_str(), "2017-ww01");
        assert_eq!(next(&scope("2020—Q4")).expect("next").as_str(), "2021—Q1");
        assert_eq!(prev(&scope("2021—Q1")).expect("prev").as_str(), "2020—Q4");
        assert_eq!(prev(&scope("2016-ww01")).expect("prev").as_str(), "2015-ww53");
    }

    #[test]
    fn next_and_prev_are_inverse() {
        for value in ["2020-ww48.4", "2015-ww53.7", "2016-ww01.1", "2015-ww53", "2020-ww01", "2020—Q1", "2020—Q4"] {
            let original = scope(value);
            assert_eq!(next(&prev(&original).expect("prev")).expect("next"), original);
            assert_eq!(prev(&next(&original).expect("next")).expect("prev"), original);
        }
    }

    #[test]
    fn stepping_past_the_calendar_edge_fails() {
        let error = next(&scope("9999—Q4")).expect_err("past year 9999");
        assert!(matches!(error, ScopeError::Navigation(_)));
        let error = prev(&scope("0000—Q1")).expect_err("before year 0");
        assert!(matches!(error, ScopeError::Navigation(_)));
    }

    #[test]
    fn minimize_elides_shared_prefixes() {
        let target = scope("2020-ww48.4");
        assert_eq!(minimize(&target, &scope("2020-ww48.4")), "");
        assert_eq!(minimize(&target, &scope("2020-ww47.3")), "ww48.4");
        assert_eq!(minimize(&target, &scope("2010-ww48.4")), "2020-ww48.4");
        assert_eq!(minimize(&scope("2020—Q3"), &target), "Q3");
    }
}
