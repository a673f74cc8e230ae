//! Manual creation and editing of sessions. Input comes as separate dates and `HH:MM` times,
//! the way a person would type them, and is checked before anything reaches the store.

use chrono::{NaiveDate, TimeZone};
use thiserror::Error;

use crate::utils::time::{parse_clock_time, zoned_to_utc};

use super::entities::{Category, Session, SessionId};

/// Reasons a manual entry or an edit is refused. None of them leave a partial change behind.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EntryError {
    #[error("Invalid start time format {0:?}, expected HH:MM")]
    InvalidStartTime(String),
    #[error("Invalid end time format {0:?}, expected HH:MM")]
    InvalidEndTime(String),
    #[error("End time must be after start time")]
    EndBeforeStart,
    #[error("No session with id {0}")]
    UnknownSession(SessionId),
}

#[derive(Debug, Clone)]
pub struct SessionDraft {
    pub category: Category,
    pub start_date: NaiveDate,
    /// Defaults to `start_date` when the session doesn't cross midnight.
    pub end_date: Option<NaiveDate>,
    pub start_time: String,
    pub end_time: String,
}

impl SessionDraft {
    /// Builds a draft pre-filled from an existing session, as seen in the `tz` timezone.
    pub fn from_session<Tz: TimeZone>(session: &Session, tz: &Tz) -> Self
    where
        Tz::Offset: std::fmt::Display,
    {
        let start = session.start_time.with_timezone(tz);
        let end = session.end_time.with_timezone(tz);
        Self {
            category: session.category.clone(),
            start_date: start.date_naive(),
            end_date: Some(end.date_naive()),
            start_time: start.format("%H:%M").to_string(),
            end_time: end.format("%H:%M").to_string(),
        }
    }

    /// Validates the draft and turns it into a session with the given id. The duration is
    /// derived from the span, seconds are always zero since input has minute precision.
    pub fn into_session<Tz: TimeZone>(
        self,
        id: SessionId,
        tz: &Tz,
    ) -> Result<Session, EntryError> {
        let start_time = parse_clock_time(&self.start_time)
            .ok_or_else(|| EntryError::InvalidStartTime(self.start_time.clone()))?;
        let end_time = parse_clock_time(&self.end_time)
            .ok_or_else(|| EntryError::InvalidEndTime(self.end_time.clone()))?;

        let start = zoned_to_utc(tz, self.start_date, start_time)
            .ok_or_else(|| EntryError::InvalidStartTime(self.start_time.clone()))?;
        let end = zoned_to_utc(tz, self.end_date.unwrap_or(self.start_date), end_time)
            .ok_or_else(|| EntryError::InvalidEndTime(self.end_time.clone()))?;

        Session::from_span(id, self.category, start, end)
    }
}
