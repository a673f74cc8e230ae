use std::{fmt::Display, str::FromStr, sync::Arc};

use anyhow::anyhow;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::time::truncate_to_millis;

use super::entry::EntryError;

/// Bucket a session is billed under. The known labels are a closed set; anything else found in
/// persisted data (for example a category dropped from an older version) is kept as
/// [Category::Unmapped] so it is shown but never priced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    #[default]
    Gwen,
    Smartback,
    Jb,
    Admin,
    Compta,
    Factures,
    Unmapped(Arc<str>),
}

impl Category {
    /// Categories accepted as input. The first three are the current set, the rest are still
    /// recognised so older data keeps its prices.
    pub const KNOWN: [Category; 6] = [
        Category::Gwen,
        Category::Smartback,
        Category::Jb,
        Category::Admin,
        Category::Compta,
        Category::Factures,
    ];

    pub fn label(&self) -> &str {
        match self {
            Category::Gwen => "gwen",
            Category::Smartback => "smartback",
            Category::Jb => "jb",
            Category::Admin => "admin",
            Category::Compta => "compta",
            Category::Factures => "factures",
            Category::Unmapped(label) => label,
        }
    }

    pub fn is_mapped(&self) -> bool {
        !matches!(self, Category::Unmapped(_))
    }

    fn from_known_label(label: &str) -> Option<Category> {
        Category::KNOWN.into_iter().find(|v| v.label() == label)
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl From<String> for Category {
    fn from(value: String) -> Self {
        Category::from_known_label(&value).unwrap_or_else(|| Category::Unmapped(value.into()))
    }
}

impl From<Category> for String {
    fn from(value: Category) -> Self {
        value.label().to_string()
    }
}

/// Strict parsing for user input. Unlike deserialization, unknown labels are rejected.
impl FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let label = s.trim().to_lowercase();
        Category::from_known_label(&label).ok_or_else(|| {
            let known = Category::KNOWN
                .iter()
                .map(|v| v.label())
                .collect::<Vec<_>>()
                .join(", ");
            anyhow!("Unknown category {s:?}. Expected one of: {known}")
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Arc<str>);

impl SessionId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string().into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(anyhow!("Session id can't be empty"));
        }
        Ok(Self(s.into()))
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.into())
    }
}

/// One recorded span of work. Timestamps are kept at millisecond precision, which is what the
/// store persists.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    #[serde(rename = "type")]
    pub category: Category,
    #[serde(with = "iso_millis")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "iso_millis")]
    pub end_time: DateTime<Utc>,
    #[serde(with = "duration_ser")]
    pub duration: Duration,
}

impl Session {
    /// Builds a session whose duration is derived from its span.
    pub fn from_span(
        id: SessionId,
        category: Category,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<Self, EntryError> {
        let start_time = truncate_to_millis(start_time);
        let end_time = truncate_to_millis(end_time);
        if end_time <= start_time {
            return Err(EntryError::EndBeforeStart);
        }
        Ok(Self {
            id,
            category,
            start_time,
            end_time,
            duration: Duration::seconds((end_time - start_time).num_seconds()),
        })
    }

    /// Builds a session with an explicitly counted duration, as produced by the timer.
    pub fn with_duration(
        id: SessionId,
        category: Category,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        duration: Duration,
    ) -> Result<Self, EntryError> {
        let session = Self::from_span(id, category, start_time, end_time)?;
        Ok(Self {
            duration,
            ..session
        })
    }

    pub fn validate(&self) -> Result<(), EntryError> {
        if self.end_time <= self.start_time {
            Err(EntryError::EndBeforeStart)
        } else {
            Ok(())
        }
    }
}

mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|v| v.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

pub(crate) mod duration_ser {
    use chrono::Duration;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(duration.num_seconds())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = i64::deserialize(deserializer)?;
        Ok(Duration::seconds(s))
    }
}
