use chrono::{DateTime, NaiveDate, NaiveTime, SubsecRound, TimeZone, Utc};

/// Parses a wall clock time written as `HH:MM`. Hours must be in 0..24 and minutes in 0..60.
pub fn parse_clock_time(value: &str) -> Option<NaiveTime> {
    let (hours, minutes) = value.trim().split_once(':')?;
    let hours = hours.trim().parse::<u32>().ok()?;
    let minutes = minutes.trim().parse::<u32>().ok()?;
    if hours >= 24 || minutes >= 60 {
        return None;
    }
    NaiveTime::from_hms_opt(hours, minutes, 0)
}

/// Interprets `date` + `time` in the `tz` timezone. Times skipped by a DST transition have no
/// instant and yield `None`; repeated ones resolve to the earliest.
pub fn zoned_to_utc<Tz: TimeZone>(
    tz: &Tz,
    date: NaiveDate,
    time: NaiveTime,
) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|v| v.with_timezone(&Utc))
}

/// Persisted timestamps carry millisecond precision, so everything entering the store is cut
/// to that precision first.
pub fn truncate_to_millis(value: DateTime<Utc>) -> DateTime<Utc> {
    value.trunc_subsecs(3)
}
