// libs/doctor-cell/src/services/availability.rs
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::ScheduleError;

/// Schedule text as stored: lowercase weekday name to `"HH:MM-HH:MM"` ranges.
pub type RawWeeklySchedule = BTreeMap<String, Vec<String>>;

const WEEKDAYS: [(Weekday, &str); 7] = [
    (Weekday::Mon, "monday"),
    (Weekday::Tue, "tuesday"),
    (Weekday::Wed, "wednesday"),
    (Weekday::Thu, "thursday"),
    (Weekday::Fri, "friday"),
    (Weekday::Sat, "saturday"),
    (Weekday::Sun, "sunday"),
];

fn range_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*(\d{1,2}):(\d{2})\s*-\s*(\d{1,2}):(\d{2})\s*$")
            .expect("static range pattern is valid")
    })
}

pub fn weekday_name(day: Weekday) -> &'static str {
    WEEKDAYS[day.num_days_from_monday() as usize].1
}

fn parse_weekday(name: &str) -> Option<Weekday> {
    WEEKDAYS
        .iter()
        .find(|(_, day_name)| day_name.eq_ignore_ascii_case(name.trim()))
        .map(|(day, _)| *day)
}

/// A contiguous time-of-day range during which a doctor accepts appointments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, ScheduleError> {
        if start >= end {
            return Err(ScheduleError::EmptyRange(format!(
                "{}-{}",
                start.format("%H:%M"),
                end.format("%H:%M")
            )));
        }
        Ok(Self { start, end })
    }

    /// Parses `"HH:MM-HH:MM"`.
    pub fn parse(text: &str) -> Result<Self, ScheduleError> {
        let captures = range_pattern()
            .captures(text)
            .ok_or_else(|| ScheduleError::BadRange(text.to_string()))?;

        let field = |idx: usize| -> Result<u32, ScheduleError> {
            captures[idx]
                .parse::<u32>()
                .map_err(|_| ScheduleError::BadRange(text.to_string()))
        };

        let start = NaiveTime::from_hms_opt(field(1)?, field(2)?, 0)
            .ok_or_else(|| ScheduleError::BadRange(text.to_string()))?;
        let end = NaiveTime::from_hms_opt(field(3)?, field(4)?, 0)
            .ok_or_else(|| ScheduleError::BadRange(text.to_string()))?;

        Self::new(start, end)
    }

    /// Whether `[start, end)` lies inside this window on `start`'s date.
    pub fn contains(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        let date = start.date();
        start >= date.and_time(self.start) && end <= date.and_time(self.end)
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}

/// A doctor's recurring weekly availability, validated on construction.
///
/// Windows for each weekday are sorted by start time and pairwise disjoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawWeeklySchedule", into = "RawWeeklySchedule")]
pub struct WeeklyAvailability {
    days: [Vec<TimeWindow>; 7],
}

impl WeeklyAvailability {
    /// Parses loosely-typed JSON schedule data, reporting structural problems
    /// separately from bad ranges.
    pub fn from_json(value: &Value) -> Result<Self, ScheduleError> {
        let raw: RawWeeklySchedule = serde_json::from_value(value.clone())
            .map_err(|e| ScheduleError::Structure(e.to_string()))?;
        Self::try_from(raw)
    }

    /// Windows for `date`'s weekday; empty when the doctor does not work that day.
    pub fn resolve(&self, date: NaiveDate) -> &[TimeWindow] {
        self.windows_for(date.weekday())
    }

    pub fn windows_for(&self, day: Weekday) -> &[TimeWindow] {
        &self.days[day.num_days_from_monday() as usize]
    }

    /// The window that fully contains `[start, end)`, if any.
    pub fn containing_window(&self, start: NaiveDateTime, end: NaiveDateTime) -> Option<TimeWindow> {
        self.resolve(start.date())
            .iter()
            .find(|window| window.contains(start, end))
            .copied()
    }

    pub fn is_empty(&self) -> bool {
        self.days.iter().all(Vec::is_empty)
    }

    pub fn to_raw(&self) -> RawWeeklySchedule {
        WEEKDAYS
            .iter()
            .filter_map(|(day, name)| {
                let windows = self.windows_for(*day);
                (!windows.is_empty())
                    .then(|| (name.to_string(), windows.iter().map(ToString::to_string).collect()))
            })
            .collect()
    }
}

impl TryFrom<RawWeeklySchedule> for WeeklyAvailability {
    type Error = ScheduleError;

    fn try_from(raw: RawWeeklySchedule) -> Result<Self, Self::Error> {
        let mut days: [Vec<TimeWindow>; 7] = Default::default();
        let mut seen = [false; 7];

        for (name, ranges) in raw {
            let day = parse_weekday(&name).ok_or_else(|| ScheduleError::UnknownWeekday(name.clone()))?;
            let idx = day.num_days_from_monday() as usize;
            if std::mem::replace(&mut seen[idx], true) {
                return Err(ScheduleError::DuplicateWeekday(weekday_name(day).to_string()));
            }

            let mut windows = ranges
                .iter()
                .map(|range| TimeWindow::parse(range))
                .collect::<Result<Vec<_>, _>>()?;
            windows.sort_by_key(|window| window.start);

            if let Some(pair) = windows.windows(2).find(|pair| pair[1].start < pair[0].end) {
                return Err(ScheduleError::OverlappingWindows {
                    weekday: weekday_name(day).to_string(),
                    first: pair[0].to_string(),
                    second: pair[1].to_string(),
                });
            }

            days[idx] = windows;
        }

        Ok(Self { days })
    }
}

impl From<WeeklyAvailability> for RawWeeklySchedule {
    fn from(availability: WeeklyAvailability) -> Self {
        availability.to_raw()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn time(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn at(date: NaiveDate, h: u32, m: u32) -> NaiveDateTime {
        date.and_time(time(h, m))
    }

    #[test]
    fn parses_and_sorts_windows() {
        let schedule = WeeklyAvailability::from_json(&json!({
            "monday": ["14:00-18:00", "09:00-12:00"],
            "friday": ["08:30-10:00"]
        }))
        .unwrap();

        assert_eq!(
            schedule.windows_for(Weekday::Mon),
            &[
                TimeWindow { start: time(9, 0), end: time(12, 0) },
                TimeWindow { start: time(14, 0), end: time(18, 0) },
            ]
        );
        assert!(schedule.windows_for(Weekday::Tue).is_empty());
    }

    #[test]
    fn resolves_by_date_weekday() {
        let schedule = WeeklyAvailability::from_json(&json!({"monday": ["09:00-12:00"]})).unwrap();
        // 2024-06-03 is a Monday.
        let monday = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        assert_eq!(schedule.resolve(monday).len(), 1);
        assert!(schedule.resolve(monday.succ_opt().unwrap()).is_empty());
    }

    #[test]
    fn containment_is_inclusive_of_window_bounds() {
        let window = TimeWindow::parse("09:00-12:00").unwrap();
        let day = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();

        assert!(window.contains(at(day, 9, 0), at(day, 9, 30)));
        assert!(window.contains(at(day, 11, 30), at(day, 12, 0)));
        assert!(!window.contains(at(day, 11, 45), at(day, 12, 15)));
        assert!(!window.contains(at(day, 8, 45), at(day, 9, 15)));
    }

    #[test]
    fn rejects_malformed_ranges() {
        assert!(matches!(TimeWindow::parse("9-12"), Err(ScheduleError::BadRange(_))));
        assert!(matches!(TimeWindow::parse("25:00-26:00"), Err(ScheduleError::BadRange(_))));
        assert!(matches!(TimeWindow::parse("12:00-09:00"), Err(ScheduleError::EmptyRange(_))));
        assert!(matches!(TimeWindow::parse("10:00-10:00"), Err(ScheduleError::EmptyRange(_))));
    }

    #[test]
    fn rejects_bad_structure_and_days() {
        assert!(matches!(
            WeeklyAvailability::from_json(&json!(["monday"])),
            Err(ScheduleError::Structure(_))
        ));
        assert!(matches!(
            WeeklyAvailability::from_json(&json!({"monday": "09:00-12:00"})),
            Err(ScheduleError::Structure(_))
        ));
        assert!(matches!(
            WeeklyAvailability::from_json(&json!({"lunes": ["09:00-12:00"]})),
            Err(ScheduleError::UnknownWeekday(_))
        ));
    }

    #[test]
    fn rejects_overlapping_windows() {
        let result = WeeklyAvailability::from_json(&json!({
            "tuesday": ["09:00-12:00", "11:00-13:00"]
        }));
        assert!(matches!(result, Err(ScheduleError::OverlappingWindows { .. })));

        // Touching windows are fine.
        assert!(WeeklyAvailability::from_json(&json!({
            "tuesday": ["09:00-12:00", "12:00-13:00"]
        }))
        .is_ok());
    }

    #[test]
    fn weekday_names_ignore_case() {
        let schedule = WeeklyAvailability::from_json(&json!({"Thursday": ["09:00-10:00"]})).unwrap();
        assert_eq!(schedule.windows_for(Weekday::Thu).len(), 1);
        assert_eq!(schedule.to_raw().keys().collect::<Vec<_>>(), vec!["thursday"]);
    }

    #[test]
    fn same_weekday_in_two_spellings_is_rejected() {
        let result = WeeklyAvailability::from_json(&json!({
            "Monday": ["09:00-12:00"],
            "monday": ["14:00-17:00"]
        }));
        assert_eq!(result.unwrap_err(), ScheduleError::DuplicateWeekday("monday".to_string()));
    }

    #[test]
    fn serializes_to_canonical_text() {
        let schedule = WeeklyAvailability::from_json(&json!({"wednesday": [" 9:00 - 12:30 "]})).unwrap();
        assert_eq!(serde_json::to_value(&schedule).unwrap(), json!({"wednesday": ["09:00-12:30"]}));
    }
}
