//! Validation predicates for user input.
//!
//! Every check returns a plain `bool`; callers decide how to surface a
//! rejection.

use chrono::{Local, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

pub const MAX_TITLE_LENGTH: usize = 255;
pub const MAX_EMAIL_LENGTH: usize = 255;

static EMAIL_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").ok());

/// ASCII `local@domain.tld` with an alphabetic TLD of two letters or more.
pub fn validate_email(email: &str) -> bool {
    if email.len() > MAX_EMAIL_LENGTH {
        return false;
    }
    EMAIL_PATTERN
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(email))
}

/// 1 to 255 characters once surrounding whitespace is removed.
pub fn validate_poll_title(title: &str) -> bool {
    let length = title.trim().chars().count();
    (1..=MAX_TITLE_LENGTH).contains(&length)
}

/// Parse a strict `YYYY-MM-DD` calendar date.
pub fn parse_date(date: &str) -> Option<NaiveDate> {
    let bytes = date.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return None;
    }
    let digits_ok = bytes
        .iter()
        .enumerate()
        .all(|(idx, b)| idx == 4 || idx == 7 || b.is_ascii_digit());
    if !digits_ok {
        return None;
    }

    let year = date[0..4].parse().ok()?;
    let month = date[5..7].parse().ok()?;
    let day = date[8..10].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

pub fn is_valid_date(date: &str) -> bool {
    parse_date(date).is_some()
}

/// Valid date falling today or later on the local calendar.
pub fn is_future_date(date: &str) -> bool {
    is_future_date_from(date, Local::now().date_naive())
}

pub fn is_future_date_from(date: &str, today: NaiveDate) -> bool {
    parse_date(date).is_some_and(|parsed| parsed >= today)
}

/// Parse `HH:MM` with two digits each into `(hour, minute)`.
pub fn parse_time_slot(time: &str) -> Option<(u8, u8)> {
    let (hour, minute) = time.split_once(':')?;
    if hour.len() != 2 || minute.len() != 2 {
        return None;
    }
    if !hour.bytes().chain(minute.bytes()).all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hour: u8 = hour.parse().ok()?;
    let minute: u8 = minute.parse().ok()?;
    (hour <= 23 && minute <= 59).then_some((hour, minute))
}

pub fn validate_time_slot(time: &str) -> bool {
    parse_time_slot(time).is_some()
}

/// Same-day range with `end` strictly after `start`. A range crossing
/// midnight such as `23:00 -> 01:00` is rejected.
pub fn validate_time_range(start: &str, end: &str) -> bool {
    match (parse_time_slot(start), parse_time_slot(end)) {
        (Some((sh, sm)), Some((eh, em))) => {
            u32::from(eh) * 60 + u32::from(em) > u32::from(sh) * 60 + u32::from(sm)
        }
        _ => false,
    }
}
