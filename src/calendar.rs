use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::{Datelike, Days, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest value `week_number_of` can produce: a leap year starting on a
/// Saturday spills Dec 31 into a 54th row.
pub const MAX_WEEK: u32 = 54;

pub const WEEKDAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CalendarError {
    #[error("week {week} is out of range 1..=54")]
    WeekOutOfRange { week: u32 },
    #[error("year {0} cannot be represented")]
    InvalidYear(i32),
    #[error("invalid date '{input}': expected YYYY-MM-DD")]
    InvalidDate { input: String },
    #[error("invalid week key '{input}': expected <week>-<year>")]
    InvalidWeekKey { input: String },
}

/// Weekday index with Sunday as 0.
pub fn weekday_index(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

/// Sunday-based week row of `date` within its own calendar year.
///
/// Jan 1 always lands in week 1; there is no ISO carry-over between years.
pub fn week_number_of(date: NaiveDate) -> u32 {
    let days_since_jan1 = date.ordinal0();
    let jan1_weekday = (u32::from(weekday_index(date)) + 7 - days_since_jan1 % 7) % 7;
    (days_since_jan1 + jan1_weekday + 1).div_ceil(7)
}

/// Jan 1 of `year` advanced by whole weeks. Not aligned to any weekday.
pub fn date_of_week(week: u32, year: i32) -> Result<NaiveDate, CalendarError> {
    if week == 0 || week > MAX_WEEK {
        return Err(CalendarError::WeekOutOfRange { week });
    }

    let jan1 = NaiveDate::from_ymd_opt(year, 1, 1).ok_or(CalendarError::InvalidYear(year))?;
    jan1.checked_add_days(Days::new(u64::from(week - 1) * 7))
        .ok_or(CalendarError::InvalidYear(year))
}

/// The seven days displayed for the week around `anchor`.
///
/// The Monday of the anchor's week is located first (a Sunday belongs to the
/// week that ends on it), then the row starts one day before that Monday.
pub fn dates_of_week(anchor: NaiveDate) -> [NaiveDate; 7] {
    let weekday = i64::from(weekday_index(anchor));
    let back_to_monday = if weekday == 0 { 6 } else { weekday - 1 };
    let first = anchor - Duration::days(back_to_monday + 1);

    let mut dates = [first; 7];
    for (offset, slot) in dates.iter_mut().enumerate() {
        *slot = first + Duration::days(offset as i64);
    }
    dates
}

pub fn total_weeks_in(year: i32) -> Result<u32, CalendarError> {
    let last_day = NaiveDate::from_ymd_opt(year, 12, 31).ok_or(CalendarError::InvalidYear(year))?;
    Ok(week_number_of(last_day))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%b %-d, %Y").to_string()
}

pub fn parse_date(input: &str) -> Result<NaiveDate, CalendarError> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").map_err(|_| CalendarError::InvalidDate {
        input: input.to_string(),
    })
}

/// A `(week, year)` bucket that activities and achievements are filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawWeekKey")]
pub struct WeekKey {
    pub week: u32,
    pub year: i32,
}

#[derive(Deserialize)]
struct RawWeekKey {
    week: u32,
    year: i32,
}

impl TryFrom<RawWeekKey> for WeekKey {
    type Error = CalendarError;

    fn try_from(raw: RawWeekKey) -> Result<Self, Self::Error> {
        WeekKey::new(raw.week, raw.year)
    }
}

impl WeekKey {
    pub fn new(week: u32, year: i32) -> Result<Self, CalendarError> {
        if week == 0 || week > MAX_WEEK {
            return Err(CalendarError::WeekOutOfRange { week });
        }
        Ok(Self { week, year })
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self {
            week: week_number_of(date),
            year: date.year(),
        }
    }

    pub fn anchor(&self) -> Result<NaiveDate, CalendarError> {
        date_of_week(self.week, self.year)
    }

    pub fn dates(&self) -> Result<[NaiveDate; 7], CalendarError> {
        Ok(dates_of_week(self.anchor()?))
    }

    pub fn next(&self) -> Result<Self, CalendarError> {
        if self.week >= total_weeks_in(self.year)? {
            Ok(Self {
                week: 1,
                year: self.year + 1,
            })
        } else {
            Ok(Self {
                week: self.week + 1,
                year: self.year,
            })
        }
    }

    pub fn previous(&self) -> Result<Self, CalendarError> {
        if self.week <= 1 {
            let year = self.year - 1;
            Ok(Self {
                week: total_weeks_in(year)?,
                year,
            })
        } else {
            Ok(Self {
                week: self.week - 1,
                year: self.year,
            })
        }
    }
}

impl Display for WeekKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.week, self.year)
    }
}

impl FromStr for WeekKey {
    type Err = CalendarError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = || CalendarError::InvalidWeekKey {
            input: input.to_string(),
        };
        let (week, year) = input.trim().split_once('-').ok_or_else(invalid)?;
        let week = week.parse::<u32>().map_err(|_| invalid())?;
        let year = year.parse::<i32>().map_err(|_| invalid())?;
        WeekKey::new(week, year)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, NaiveDate};

    use super::*;

    fn day(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn every_day_of(year: i32) -> impl Iterator<Item = NaiveDate> {
        day(year, 1, 1)
            .iter_days()
            .take_while(move |date| date.year() == year)
    }

    #[test]
    fn jan_first_is_always_week_one() {
        for year in 1990..2040 {
            assert_eq!(week_number_of(day(year, 1, 1)), 1, "year {year}");
        }
    }

    #[test]
    fn week_number_counts_sunday_rows() {
        // 2024 starts on a Monday.
        assert_eq!(week_number_of(day(2024, 1, 6)), 1);
        assert_eq!(week_number_of(day(2024, 1, 7)), 2);
        assert_eq!(week_number_of(day(2024, 3, 6)), 10);
        // 2023 starts on a Sunday.
        assert_eq!(week_number_of(day(2023, 1, 7)), 1);
        assert_eq!(week_number_of(day(2023, 1, 8)), 2);
    }

    #[test]
    fn total_weeks_matches_last_day_of_year() {
        for year in 1990..2040 {
            assert_eq!(
                total_weeks_in(year).unwrap(),
                week_number_of(day(year, 12, 31))
            );
        }
        assert_eq!(total_weeks_in(2023).unwrap(), 53);
        assert_eq!(total_weeks_in(2000).unwrap(), 54);
    }

    #[test]
    fn week_anchor_stays_within_six_days() {
        for year in [2000, 2019, 2023, 2024, 2026] {
            for date in every_day_of(year) {
                let anchor = date_of_week(week_number_of(date), year).unwrap();
                let gap = (date - anchor).num_days().abs();
                assert!(gap <= 6, "{date} anchored at {anchor}");
            }
        }
    }

    #[test]
    fn dates_of_week_start_the_day_before_monday() {
        let wednesday = day(2024, 3, 6);
        let dates = dates_of_week(wednesday);
        assert_eq!(dates[0], day(2024, 3, 3));
        assert_eq!(dates[6], day(2024, 3, 9));

        let sunday = day(2024, 3, 10);
        assert_eq!(dates_of_week(sunday), dates);

        let monday = day(2024, 3, 11);
        assert_eq!(dates_of_week(monday)[0], day(2024, 3, 10));
    }

    #[test]
    fn dates_of_week_are_consecutive() {
        for date in every_day_of(2024) {
            let dates = dates_of_week(date);
            for pair in dates.windows(2) {
                assert_eq!((pair[1] - pair[0]).num_days(), 1);
            }
        }
    }

    #[test]
    fn rejects_out_of_range_weeks() {
        assert_eq!(
            date_of_week(0, 2024),
            Err(CalendarError::WeekOutOfRange { week: 0 })
        );
        assert!(date_of_week(55, 2024).is_err());
        assert_eq!(date_of_week(2, 2024).unwrap(), day(2024, 1, 8));
    }

    #[test]
    fn formats_and_parses_dates() {
        assert_eq!(format_date(day(2024, 3, 6)), "Mar 6, 2024");
        assert_eq!(parse_date("2024-03-06").unwrap(), day(2024, 3, 6));
        assert!(matches!(
            parse_date("2024-02-30"),
            Err(CalendarError::InvalidDate { .. })
        ));
    }

    #[test]
    fn week_keys_roll_over_year_boundaries() {
        let last = WeekKey::new(53, 2023).unwrap();
        assert_eq!(last.next().unwrap(), WeekKey::new(1, 2024).unwrap());
        assert_eq!(WeekKey::new(1, 2024).unwrap().previous().unwrap(), last);

        let key: WeekKey = "10-2024".parse().unwrap();
        assert_eq!(key, WeekKey::containing(day(2024, 3, 6)));
        assert_eq!(key.to_string(), "10-2024");
        assert!("ten-2024".parse::<WeekKey>().is_err());
    }

    #[test]
    fn deserializing_week_keys_checks_the_range() {
        let key: WeekKey = serde_json::from_str(r#"{"week":54,"year":2000}"#).unwrap();
        assert_eq!(key, WeekKey::new(54, 2000).unwrap());
        assert!(serde_json::from_str::<WeekKey>(r#"{"week":0,"year":2024}"#).is_err());
        assert!(serde_json::from_str::<WeekKey>(r#"{"week":55,"year":2024}"#).is_err());
    }
}
