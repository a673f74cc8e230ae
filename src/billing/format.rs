use std::fmt::Display;

use chrono::Duration;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use super::pricing::round_to_quarter_hour;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Fr,
    En,
}

impl Display for Locale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Locale::Fr => write!(f, "fr"),
            Locale::En => write!(f, "en"),
        }
    }
}

impl Locale {
    fn units(&self) -> [&'static str; 3] {
        match self {
            Locale::Fr => ["heure", "minute", "seconde"],
            Locale::En => ["hour", "minute", "second"],
        }
    }

    fn separator(&self) -> &'static str {
        match self {
            Locale::Fr => " et ",
            Locale::En => " and ",
        }
    }

    /// French keeps zero singular, English doesn't.
    fn is_plural(&self, quantity: i64) -> bool {
        match self {
            Locale::Fr => quantity > 1,
            Locale::En => quantity != 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DurationStyle {
    /// `HH:MM:SS`, for the live timer.
    Clock,
    /// `2 heures et 5 secondes`, for history and totals.
    Long,
    /// `1h 15min` of the quarter hour rounded value, for billed durations.
    Quarters,
}

pub fn format_duration(duration: Duration, style: DurationStyle, locale: Locale) -> String {
    match style {
        DurationStyle::Clock => clock_display(duration),
        DurationStyle::Long => long_display(duration, locale),
        DurationStyle::Quarters => quarters_display(duration),
    }
}

pub fn clock_display(duration: Duration) -> String {
    let seconds = duration.num_seconds().max(0);
    format!(
        "{:02}:{:02}:{:02}",
        seconds / 3600,
        seconds % 3600 / 60,
        seconds % 60
    )
}

fn long_display(duration: Duration, locale: Locale) -> String {
    let seconds = duration.num_seconds().max(0);
    let components = [seconds / 3600, seconds % 3600 / 60, seconds % 60];
    let mut parts = components
        .into_iter()
        .zip(locale.units())
        .filter(|(quantity, _)| *quantity > 0)
        .map(|(quantity, unit)| plural(quantity, unit, locale))
        .collect::<Vec<_>>();
    if parts.is_empty() {
        parts.push(plural(0, locale.units()[2], locale));
    }
    parts.join(locale.separator())
}

fn plural(quantity: i64, unit: &str, locale: Locale) -> String {
    let suffix = if locale.is_plural(quantity) { "s" } else { "" };
    format!("{quantity} {unit}{suffix}")
}

fn quarters_display(duration: Duration) -> String {
    let minutes = round_to_quarter_hour(duration).num_minutes().max(0);
    let hours = minutes / 60;
    let minutes = minutes % 60;
    match (hours, minutes) {
        (0, minutes) => format!("{minutes}min"),
        (hours, 0) => format!("{hours}h"),
        (hours, minutes) => format!("{hours}h {minutes}min"),
    }
}
