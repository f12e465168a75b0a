use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

/// One bookable window within a day, e.g. 09:00-13:00.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DaySchedule {
    pub enabled: bool,
    pub windows: Vec<TimeWindow>,
}

/// Working-hours configuration for a business or a single resource.
/// Indexed Monday..Sunday.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WeekSchedule {
    pub days: [DaySchedule; 7],
}

impl WeekSchedule {
    pub fn for_weekday(&self, weekday: Weekday) -> &DaySchedule {
        &self.days[weekday.num_days_from_monday() as usize]
    }

    pub fn for_weekday_mut(&mut self, weekday: Weekday) -> &mut DaySchedule {
        &mut self.days[weekday.num_days_from_monday() as usize]
    }
}
