//! Date token parsing and path date matching.
//!
//! Turns user date tokens (`YYYYMM`, `YYYYMMDD`, `YYYYMMDD-YYYYMMDD`) into a
//! [`DateInterval`] and decides whether directory or file names fall inside it.

use crate::constants::MONTH_END_OFFSET_DAYS;
use crate::error::{EtlError, Result};
use crate::models::DateInterval;
use chrono::{Datelike, Days, NaiveDate};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, warn};

/// `DD-DDMonYYYY`, e.g. `01-12Feb2020`
static DAY_RANGE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{2})-(\d{2})([A-Za-z]{3})(\d{4})").expect("day range pattern is valid")
});

/// Runs of consecutive ASCII digits
static DIGIT_RUN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("digit run pattern is valid"));

/// Parse a date token into a closed interval
///
/// Accepted forms (surrounding whitespace ignored):
/// - `YYYYMMDD-YYYYMMDD`: the two dates, in the order given
/// - `YYYYMM`: the whole calendar month
/// - `YYYYMMDD`: a single day
pub fn parse_date_input(input: &str) -> Result<DateInterval> {
    let token = input.trim();
    let invalid = || EtlError::InvalidDateFormat {
        input: input.to_string(),
    };

    if let Some((start, end)) = token.split_once('-') {
        let start = parse_ymd(start.trim()).ok_or_else(invalid)?;
        let end = parse_ymd(end.trim()).ok_or_else(invalid)?;
        if start > end {
            warn!(
                "Date range '{}' ends before it starts; nothing will match",
                token
            );
        }
        return Ok(DateInterval::new(start, end));
    }

    let interval = match token.len() {
        6 => {
            let start = parse_ym(token).ok_or_else(invalid)?;
            DateInterval::new(start, month_end(start).ok_or_else(invalid)?)
        }
        8 => {
            let date = parse_ymd(token).ok_or_else(invalid)?;
            DateInterval::new(date, date)
        }
        _ => return Err(invalid()),
    };

    debug!("Parsed date input '{}' as {}", token, interval);
    Ok(interval)
}

/// Last day of the month starting at `first`
///
/// Adds 31 days (always lands in the following month), truncates to day 1
/// and steps back one day.
fn month_end(first: NaiveDate) -> Option<NaiveDate> {
    first
        .checked_add_days(Days::new(MONTH_END_OFFSET_DAYS))?
        .with_day(1)?
        .pred_opt()
}

fn is_ascii_digits(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| b.is_ascii_digit())
}

fn parse_ymd(s: &str) -> Option<NaiveDate> {
    if !is_ascii_digits(s, 8) {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y%m%d").ok()
}

fn parse_ym(s: &str) -> Option<NaiveDate> {
    if !is_ascii_digits(s, 6) {
        return None;
    }
    let year = s[..4].parse().ok()?;
    let month = s[4..].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// Check whether the first day of a `YYYYMM` directory lies in the interval
///
/// Names that are not exactly six digits forming a valid month never match.
pub fn directory_in_range(dir_name: &str, interval: &DateInterval) -> bool {
    parse_ym(dir_name).is_some_and(|first| interval.contains(first))
}

/// Check whether a file name carries a date inside the interval
///
/// Either an 8-digit `YYYYMMDD` run inside the window, or a `DD-DDMonYYYY`
/// day range overlapping it.
pub fn filename_in_range(file_name: &str, interval: &DateInterval) -> bool {
    let single_day = DIGIT_RUN_PATTERN
        .find_iter(file_name)
        .filter_map(|m| parse_ymd(m.as_str()))
        .any(|date| interval.contains(date));
    if single_day {
        return true;
    }

    DAY_RANGE_PATTERN
        .captures_iter(file_name)
        .filter_map(|caps| {
            let month_year = format!("{}{}", &caps[3], &caps[4]);
            let from = parse_day_month_year(&caps[1], &month_year)?;
            let to = parse_day_month_year(&caps[2], &month_year)?;
            Some((from, to))
        })
        .any(|(from, to)| interval.overlaps(from, to))
}

fn parse_day_month_year(day: &str, month_year: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{}{}", day, month_year), "%d%b%Y").ok()
}
