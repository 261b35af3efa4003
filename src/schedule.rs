use std::collections::BTreeMap;

use anyhow::{bail, Result};
use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Day {
    Mon,
    Tue,
    Wed,
    Thu,
    Fri,
    Sat,
    Sun,
}

impl From<Weekday> for Day {
    fn from(day: Weekday) -> Self {
        match day {
            Weekday::Mon => Self::Mon,
            Weekday::Tue => Self::Tue,
            Weekday::Wed => Self::Wed,
            Weekday::Thu => Self::Thu,
            Weekday::Fri => Self::Fri,
            Weekday::Sat => Self::Sat,
            Weekday::Sun => Self::Sun,
        }
    }
}

/// When the watch loop runs a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Schedule {
    /// Every `minutes` minutes after the previous pass.
    Interval { minutes: u32 },
    /// At a wall-clock time on each listed day.
    Weekly { days: BTreeMap<Day, NaiveTime> },
}

impl Default for Schedule {
    fn default() -> Self {
        Self::Interval { minutes: 60 }
    }
}

impl Schedule {
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Interval { minutes: 0 } => bail!("interval schedule needs minutes > 0"),
            Self::Weekly { days } if days.is_empty() => {
                bail!("weekly schedule needs at least one day")
            }
            _ => Ok(()),
        }
    }

    /// First run instant strictly after `now` (local wall clock).
    pub fn next_run_after(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        match self {
            Self::Interval { minutes } if *minutes > 0 => {
                Some(now + Duration::minutes(i64::from(*minutes)))
            }
            Self::Interval { .. } => None,
            Self::Weekly { days } => (0..=7).find_map(|offset| {
                let date = now.date() + Duration::days(offset);
                let time = days.get(&Day::from(date.weekday()))?;
                let candidate = date.and_time(*time);
                (candidate > now).then_some(candidate)
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn interval_adds_minutes() {
        let schedule = Schedule::Interval { minutes: 90 };
        assert_eq!(
            schedule.next_run_after(at(2024, 6, 3, 10, 0)),
            Some(at(2024, 6, 3, 11, 30))
        );
    }

    #[test]
    fn weekly_picks_later_today_or_next_listed_day() {
        let mut days = BTreeMap::new();
        days.insert(Day::Mon, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        days.insert(Day::Thu, NaiveTime::from_hms_opt(18, 0, 0).unwrap());
        let schedule = Schedule::Weekly { days };

        // 2024-06-03 is a Monday.
        assert_eq!(
            schedule.next_run_after(at(2024, 6, 3, 8, 0)),
            Some(at(2024, 6, 3, 9, 0))
        );
        assert_eq!(
            schedule.next_run_after(at(2024, 6, 3, 9, 0)),
            Some(at(2024, 6, 6, 18, 0))
        );
        assert_eq!(
            schedule.next_run_after(at(2024, 6, 6, 19, 0)),
            Some(at(2024, 6, 10, 9, 0))
        );
    }

    #[test]
    fn single_day_wraps_a_full_week() {
        let mut days = BTreeMap::new();
        days.insert(Day::Mon, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        let schedule = Schedule::Weekly { days };
        assert_eq!(
            schedule.next_run_after(at(2024, 6, 3, 10, 0)),
            Some(at(2024, 6, 10, 9, 0))
        );
    }

    #[test]
    fn parses_tagged_json() {
        let interval: Schedule = serde_json::from_str(r#"{"interval": {"minutes": 15}}"#).unwrap();
        assert_eq!(interval, Schedule::Interval { minutes: 15 });

        let weekly: Schedule =
            serde_json::from_str(r#"{"weekly": {"days": {"tue": "07:30:00"}}}"#).unwrap();
        let Schedule::Weekly { days } = weekly else {
            panic!("expected weekly schedule");
        };
        assert_eq!(days.get(&Day::Tue), NaiveTime::from_hms_opt(7, 30, 0).as_ref());
    }

    #[test]
    fn rejects_degenerate_schedules() {
        assert!(Schedule::Interval { minutes: 0 }.validate().is_err());
        assert!(Schedule::Weekly {
            days: BTreeMap::new()
        }
        .validate()
        .is_err());
        assert!(Schedule::default().validate().is_ok());
    }
}
