//! Counts billable days over a date range. Sundays and French public holidays aren't billable,
//! Saturdays are.

use chrono::{Datelike, Days, NaiveDate, Weekday};
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DayCount {
    /// Every day in the range, both ends included.
    pub days: u32,
    pub sundays: u32,
    /// Holidays that don't fall on a Sunday.
    pub holidays: u32,
    pub billable: u32,
}

/// Counts the days between `start` and `end` inclusive. A reversed range is counted as if its
/// ends were swapped.
pub fn count_days(start: NaiveDate, end: NaiveDate) -> DayCount {
    let (start, end) = if end < start {
        debug!("Swapping reversed range {start} - {end}");
        (end, start)
    } else {
        (start, end)
    };

    let mut holidays = vec![];
    for year in start.year()..=end.year() {
        holidays.extend(public_holidays(year));
    }

    let mut count = DayCount::default();
    for day in start.iter_days().take_while(|v| *v <= end) {
        count.days += 1;
        if day.weekday() == Weekday::Sun {
            count.sundays += 1;
        } else if holidays.contains(&day) {
            count.holidays += 1;
        } else {
            count.billable += 1;
        }
    }
    count
}

/// Western Easter, anonymous Gregorian algorithm.
pub fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}

/// The eleven French public holidays of `year`, in calendar order.
pub fn public_holidays(year: i32) -> Vec<NaiveDate> {
    let fixed = [(1, 1), (5, 1), (5, 8), (7, 14), (8, 15), (11, 1), (11, 11), (12, 25)];
    let mut result = fixed
        .iter()
        .filter_map(|(month, day)| NaiveDate::from_ymd_opt(year, *month, *day))
        .collect::<Vec<_>>();

    if let Some(easter) = easter_sunday(year) {
        // Easter Monday, Ascension Thursday and Whit Monday
        result.extend(
            [1, 39, 50]
                .into_iter()
                .filter_map(|offset| easter.checked_add_days(Days::new(offset))),
        );
    }
    result.sort();
    result
}
