//! Time-of-day grids for date polls.

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use super::validation::parse_date;
use crate::entities::{TimeSlot, TimeSlotMap};

const NORMAL_HOURS: (u32, u32) = (8, 20);
const EXTENDED_HOURS: (u32, u32) = (6, 23);
const MAX_GRANULARITY: u32 = 60;

const VISIBLE_PADDING_BEFORE: u32 = 60;
const VISIBLE_PADDING_AFTER: u32 = 120;

const FRENCH_DAYS: [&str; 7] = ["lun.", "mar.", "mer.", "jeu.", "ven.", "sam.", "dim."];
const FRENCH_MONTHS: [&str; 12] = [
    "janv.", "févr.", "mars", "avr.", "mai", "juin", "juil.", "août", "sept.", "oct.", "nov.",
    "déc.",
];

/// A labelled position on the time grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSlot {
    pub hour: u8,
    pub minute: u8,
    pub label: String,
}

impl GridSlot {
    fn at(minutes_of_day: u32) -> Self {
        let hour = (minutes_of_day / 60) as u8;
        let minute = (minutes_of_day % 60) as u8;
        Self {
            hour,
            minute,
            label: format!("{hour:02}:{minute:02}"),
        }
    }

    pub fn minutes_of_day(&self) -> u32 {
        u32::from(self.hour) * 60 + u32::from(self.minute)
    }
}

/// Day header shown above a date column, e.g. `lun.` / `15` / `janv.`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateHeader {
    pub day_name: String,
    pub day_number: String,
    pub month: String,
}

/// Grid from 08:00 to 20:00, or 06:00 to 23:00 when `extended_hours`.
/// Every hour restarts at minute 0 and the closing hour only appears at
/// minute 0. A granularity of 0 yields an
/// empty grid and anything above 60 steps by the hour.
pub fn generate_time_slots(extended_hours: bool, granularity_minutes: u32) -> Vec<GridSlot> {
    if granularity_minutes == 0 {
        return Vec::new();
    }
    let step = granularity_minutes.min(MAX_GRANULARITY);
    let (start_hour, end_hour) = if extended_hours {
        EXTENDED_HOURS
    } else {
        NORMAL_HOURS
    };
    let mut slots: Vec<GridSlot> = (start_hour..end_hour)
        .flat_map(|hour| (0..60).step_by(step as usize).map(move |minute| hour * 60 + minute))
        .map(GridSlot::at)
        .collect();
    slots.push(GridSlot::at(end_hour * 60));
    slots
}

/// Copy of `slots` where `(hour, minute)` on `date` is added as enabled
/// when missing, or has its `enabled` flag flipped when present.
pub fn toggle_time_slot_for_date(
    slots: &TimeSlotMap,
    date: &str,
    hour: u8,
    minute: u8,
) -> TimeSlotMap {
    let mut next = slots.clone();
    let day = next.entry(date.to_string()).or_default();

    match day
        .iter_mut()
        .find(|slot| slot.hour == hour && slot.minute == minute)
    {
        Some(existing) => existing.enabled = !existing.enabled,
        None => day.push(TimeSlot {
            hour,
            minute,
            enabled: true,
        }),
    }

    day.sort_by_key(TimeSlot::minutes_of_day);
    day.dedup_by_key(|slot| slot.minutes_of_day());
    next
}

/// Narrow `all` to a window around the enabled slots: one hour before the
/// earliest to two hours after the latest. Without any enabled slot the
/// 08:00-20:00 working window is shown.
pub fn get_visible_time_slots(all: &[GridSlot], slots: &TimeSlotMap) -> Vec<GridSlot> {
    let enabled = slots
        .values()
        .flatten()
        .filter(|slot| slot.enabled)
        .map(TimeSlot::minutes_of_day);

    let (earliest, latest) = enabled.fold((None, None), |(min, max): (Option<u32>, Option<u32>), t| {
        (
            Some(min.map_or(t, |m| m.min(t))),
            Some(max.map_or(t, |m| m.max(t))),
        )
    });

    let (from, to) = match (earliest, latest) {
        (Some(earliest), Some(latest)) => (
            earliest.saturating_sub(VISIBLE_PADDING_BEFORE),
            latest + VISIBLE_PADDING_AFTER,
        ),
        _ => (NORMAL_HOURS.0 * 60, NORMAL_HOURS.1 * 60),
    };

    all.iter()
        .filter(|slot| (from..=to).contains(&slot.minutes_of_day()))
        .cloned()
        .collect()
}

/// French short header for a `YYYY-MM-DD` date, read as a calendar day.
pub fn format_selected_date_header(date: &str) -> Option<DateHeader> {
    let parsed = parse_date(date)?;
    let weekday = parsed.weekday().num_days_from_monday() as usize;
    let month = parsed.month0() as usize;

    Some(DateHeader {
        day_name: FRENCH_DAYS[weekday].to_string(),
        day_number: parsed.day().to_string(),
        month: FRENCH_MONTHS[month].to_string(),
    })
}

/// Whether every enabled slot falls on a minute boundary of the new
/// granularity, e.g. `10:15` blocks a switch to 30 minutes.
pub fn is_granularity_compatible(slots: &TimeSlotMap, granularity_minutes: u32) -> bool {
    if granularity_minutes == 0 {
        return false;
    }
    let step = granularity_minutes.min(MAX_GRANULARITY);
    slots
        .values()
        .flatten()
        .filter(|slot| slot.enabled)
        .all(|slot| u32::from(slot.minute) % step == 0)
}
