use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{BlackoutPeriod, WeekSchedule};

/// An already-booked stretch of a resource's day, with the duration fully
/// resolved.
#[derive(Debug, Clone, Copy)]
pub struct BusyInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum SlotStatus {
    Past,
    TooSoon,
    Blocked,
    Booked,
    Available,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct Slot {
    pub start: DateTime<Utc>,
    pub status: SlotStatus,
}

/// Inputs for one day's slot computation. Everything is borrowed, so the
/// returned iterator is a pure, restartable function of these values.
pub struct SlotContext<'a> {
    pub date: NaiveDate,
    pub now: DateTime<Utc>,
    pub duration_minutes: i64,
    pub granularity_minutes: i64,
    pub min_lead_minutes: i64,
    pub resource_id: Option<Uuid>,
    pub schedule: &'a WeekSchedule,
    pub blackouts: &'a [BlackoutPeriod],
    pub busy: &'a [BusyInterval],
}

/// Enumerates candidate starts at `granularity_minutes` steps within each
/// working window of the day and classifies every candidate. A candidate's
/// whole interval must be continuously covered by the day's (merged) working
/// windows; checking only the endpoints would wave through bookings that
/// span an unconfigured break.
pub fn available_slots<'a>(ctx: &'a SlotContext<'a>) -> impl Iterator<Item = Slot> + 'a {
    let day = ctx.schedule.for_weekday(ctx.date.weekday());
    let windows: Vec<(DateTime<Utc>, DateTime<Utc>)> = if day.enabled {
        day.windows
            .iter()
            .filter(|w| w.start < w.end)
            .map(|w| {
                (
                    ctx.date.and_time(w.start).and_utc(),
                    ctx.date.and_time(w.end).and_utc(),
                )
            })
            .collect()
    } else {
        Vec::new()
    };
    let merged = merge_windows(&windows);

    windows.into_iter().flat_map(move |(win_start, win_end)| {
        let mut slots = Vec::new();
        let mut cursor = win_start;
        while cursor < win_end {
            slots.push(Slot {
                start: cursor,
                status: classify(ctx, &merged, cursor),
            });
            cursor += Duration::minutes(ctx.granularity_minutes);
        }
        slots.into_iter()
    })
}

fn classify(
    ctx: &SlotContext<'_>,
    merged: &[(DateTime<Utc>, DateTime<Utc>)],
    start: DateTime<Utc>,
) -> SlotStatus {
    let end = start + Duration::minutes(ctx.duration_minutes);

    if start < ctx.now {
        return SlotStatus::Past;
    }
    if start - ctx.now < Duration::minutes(ctx.min_lead_minutes) {
        return SlotStatus::TooSoon;
    }
    if !covered(merged, start, end) {
        return SlotStatus::Blocked;
    }
    if ctx
        .blackouts
        .iter()
        .any(|b| b.applies_to(ctx.resource_id) && b.overlaps(start, end))
    {
        return SlotStatus::Blocked;
    }
    if ctx
        .busy
        .iter()
        .any(|b| start < b.end && end > b.start)
    {
        return SlotStatus::Booked;
    }
    SlotStatus::Available
}

/// Coalesces overlapping and back-to-back windows so coverage of a long
/// interval can be answered against a single stretch.
fn merge_windows(
    windows: &[(DateTime<Utc>, DateTime<Utc>)],
) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let mut sorted = windows.to_vec();
    sorted.sort_by_key(|w| w.0);

    let mut merged: Vec<(DateTime<Utc>, DateTime<Utc>)> = Vec::new();
    for window in sorted {
        match merged.last_mut() {
            Some(last) if window.0 <= last.1 => {
                last.1 = last.1.max(window.1);
            }
            _ => merged.push(window),
        }
    }
    merged
}

/// True when [start, end) lies entirely inside one merged working stretch.
fn covered(
    merged: &[(DateTime<Utc>, DateTime<Utc>)],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> bool {
    merged.iter().any(|(s, e)| *s <= start && end <= *e)
}
