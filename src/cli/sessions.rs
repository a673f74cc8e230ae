use ansi_term::Style;
use anyhow::Result;
use chrono::{Local, NaiveDate, TimeZone};
use tracing::info;

use crate::{
    billing::{
        aggregate::group,
        format::{format_duration, DurationStyle, Locale},
    },
    tracker::{
        entities::{Category, Session, SessionId},
        entry::{EntryError, SessionDraft},
        store::{KeyValueStore, SessionStore},
    },
};

use super::{validation_error, Context};

#[derive(Debug, clap::Args)]
pub struct AddCommand {
    #[arg(short, long, help = "Category the session is billed under")]
    category: Category,
    #[arg(
        long,
        help = "Day the session started. Examples are \"today\", \"yesterday\", \"15/03/2025\""
    )]
    date: String,
    #[arg(long, help = "Day the session ended, when it crosses midnight")]
    end_date: Option<String>,
    #[arg(long = "from", help = "Start time as HH:MM")]
    start_time: String,
    #[arg(long = "to", help = "End time as HH:MM")]
    end_time: String,
}

#[derive(Debug, clap::Args)]
pub struct EditCommand {
    #[arg(help = "Id of the session, as shown by list")]
    id: SessionId,
    #[arg(short, long)]
    category: Option<Category>,
    #[arg(long)]
    date: Option<String>,
    #[arg(long)]
    end_date: Option<String>,
    #[arg(long = "from", help = "Start time as HH:MM")]
    start_time: Option<String>,
    #[arg(long = "to", help = "End time as HH:MM")]
    end_time: Option<String>,
}

#[derive(Debug, clap::Args)]
pub struct RemoveCommand {
    #[arg(help = "Id of the session, as shown by list")]
    id: SessionId,
}

/// Fields to change on an existing session. Missing fields keep their current value.
#[derive(Debug, Default, Clone)]
pub struct SessionEdit {
    pub category: Option<Category>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

impl SessionEdit {
    fn changes_span(&self) -> bool {
        self.start_date.is_some()
            || self.end_date.is_some()
            || self.start_time.is_some()
            || self.end_time.is_some()
    }
}

pub fn process_add_command(command: AddCommand, context: &Context) -> Result<()> {
    let draft = SessionDraft {
        category: command.category,
        start_date: context.parse_date(&command.date, "date")?,
        end_date: command
            .end_date
            .map(|v| context.parse_date(&v, "end date"))
            .transpose()?,
        start_time: command.start_time,
        end_time: command.end_time,
    };
    let mut store = context.open_store()?;
    let session = add_session(&mut store, draft, &Local).map_err(user_error)?;
    println!("Added {}", describe(&session, context.config.locale));
    Ok(())
}

pub fn process_edit_command(command: EditCommand, context: &Context) -> Result<()> {
    let edit = SessionEdit {
        category: command.category,
        start_date: command
            .date
            .map(|v| context.parse_date(&v, "date"))
            .transpose()?,
        end_date: command
            .end_date
            .map(|v| context.parse_date(&v, "end date"))
            .transpose()?,
        start_time: command.start_time,
        end_time: command.end_time,
    };
    let mut store = context.open_store()?;
    let session = edit_session(&mut store, &command.id, edit, &Local).map_err(user_error)?;
    println!("Updated {}", describe(&session, context.config.locale));
    Ok(())
}

pub fn process_remove_command(command: RemoveCommand, context: &Context) -> Result<()> {
    let mut store = context.open_store()?;
    match store.remove(&command.id)? {
        Some(session) => println!("Removed {}", describe(&session, context.config.locale)),
        None => println!("No session with id {}", command.id),
    }
    Ok(())
}

pub fn process_list_command(context: &Context) -> Result<()> {
    let store = context.open_store()?;
    let locale = context.config.locale;
    if store.is_empty() {
        println!("No sessions recorded");
        return Ok(());
    }
    let aggregate = group(store.sessions());
    for group in aggregate.groups() {
        println!(
            "{} {}",
            Style::new().bold().paint(group.category.label()),
            format_duration(group.total_duration, DurationStyle::Long, locale)
        );
        for session in &group.sessions {
            println!("  {}", describe(session, locale));
        }
        println!();
    }
    println!(
        "{} {}",
        Style::new().bold().paint("Total"),
        format_duration(aggregate.total_duration(), DurationStyle::Long, locale)
    );
    Ok(())
}

pub fn add_session<S: KeyValueStore, Tz: TimeZone>(
    store: &mut SessionStore<S>,
    draft: SessionDraft,
    tz: &Tz,
) -> Result<Session> {
    let session = draft.into_session(SessionId::generate(), tz)?;
    store.append(session.clone())?;
    info!("Added session {}", session.id);
    Ok(session)
}

pub fn edit_session<S: KeyValueStore, Tz: TimeZone>(
    store: &mut SessionStore<S>,
    id: &SessionId,
    edit: SessionEdit,
    tz: &Tz,
) -> Result<Session>
where
    Tz::Offset: std::fmt::Display,
{
    let current = store
        .get(id)
        .ok_or_else(|| EntryError::UnknownSession(id.clone()))?;

    if !edit.changes_span() {
        // timer sessions carry seconds that a minute based draft would lose
        let mut session = current.clone();
        if let Some(category) = edit.category {
            session.category = category;
        }
        store.update(id, session.clone())?;
        info!("Recategorised session {id}");
        return Ok(session);
    }

    let mut draft = SessionDraft::from_session(current, tz);
    if let Some(category) = edit.category {
        draft.category = category;
    }
    if let Some(start_date) = edit.start_date {
        draft.start_date = start_date;
        // a moved session stays on one day unless told otherwise
        draft.end_date = None;
    }
    if let Some(end_date) = edit.end_date {
        draft.end_date = Some(end_date);
    }
    if let Some(start_time) = edit.start_time {
        draft.start_time = start_time;
    }
    if let Some(end_time) = edit.end_time {
        draft.end_time = end_time;
    }

    let session = draft.into_session(id.clone(), tz)?;
    store.update(id, session.clone())?;
    info!("Edited session {id}");
    Ok(session)
}

/// Entry problems are the user's to fix, show them like argument errors.
fn user_error(error: anyhow::Error) -> anyhow::Error {
    match error.downcast::<EntryError>() {
        Ok(entry) => validation_error(entry),
        Err(other) => other,
    }
}

fn describe(session: &Session, locale: Locale) -> String {
    let start = session.start_time.with_timezone(&Local);
    let end = session.end_time.with_timezone(&Local);
    format!(
        "{}  {} {}  {} - {}  {}",
        Style::new().dimmed().paint(session.id.as_str()),
        session.category,
        start.format("%d/%m/%Y"),
        start.format("%H:%M"),
        end.format("%H:%M"),
        format_duration(session.duration, DurationStyle::Long, locale)
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    use super::{add_session, edit_session, SessionEdit};
    use crate::tracker::{
        entities::{Category, Session, SessionId},
        entry::{EntryError, SessionDraft},
        store::{MemoryKeyValueStore, SessionStore},
    };

    fn store() -> SessionStore<Arc<MemoryKeyValueStore>> {
        SessionStore::load(Arc::new(MemoryKeyValueStore::default()))
    }

    fn draft(start: &str, end: &str) -> SessionDraft {
        SessionDraft {
            category: Category::Smartback,
            start_date: NaiveDate::from_ymd_opt(2025, 3, 15).unwrap(),
            end_date: None,
            start_time: start.into(),
            end_time: end.into(),
        }
    }

    #[test]
    fn added_session_goes_first() {
        let mut store = store();
        let first = add_session(&mut store, draft("09:00", "10:00"), &Utc).unwrap();
        let second = add_session(&mut store, draft("11:00", "11:30"), &Utc).unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(store.sessions()[0], second);
        assert_eq!(second.duration, Duration::minutes(30));
    }

    #[test]
    fn rejected_entry_is_not_stored() {
        let mut store = store();
        let err = add_session(&mut store, draft("10:00", "09:00"), &Utc).unwrap_err();
        assert_eq!(err.downcast_ref::<EntryError>(), Some(&EntryError::EndBeforeStart));
        assert!(store.is_empty());
    }

    #[test]
    fn edit_changes_only_given_fields() {
        let mut store = store();
        let session = add_session(&mut store, draft("09:00", "10:00"), &Utc).unwrap();
        let edited = edit_session(
            &mut store,
            &session.id,
            SessionEdit {
                category: Some(Category::Jb),
                end_time: Some("10:45".into()),
                ..Default::default()
            },
            &Utc,
        )
        .unwrap();
        assert_eq!(edited.id, session.id);
        assert_eq!(edited.category, Category::Jb);
        assert_eq!(edited.start_time, session.start_time);
        assert_eq!(edited.duration, Duration::minutes(105));
        assert_eq!(store.sessions(), &[edited]);
    }

    #[test]
    fn category_edit_keeps_timer_precision() {
        let mut store = store();
        let start = Utc.with_ymd_and_hms(2025, 3, 15, 9, 0, 37).unwrap();
        let timed = Session::from_span(
            SessionId::from("timed"),
            Category::Gwen,
            start,
            start + Duration::seconds(90),
        )
        .unwrap();
        let start = Utc.with_ymd_and_hms(2025, 3, 15, 10, 0, 10).unwrap();
        let short = Session::from_span(
            SessionId::from("short"),
            Category::Gwen,
            start,
            start + Duration::seconds(40),
        )
        .unwrap();
        store.append(timed.clone()).unwrap();
        store.append(short.clone()).unwrap();

        for original in [timed, short] {
            let edited = edit_session(
                &mut store,
                &original.id,
                SessionEdit {
                    category: Some(Category::Jb),
                    ..Default::default()
                },
                &Utc,
            )
            .unwrap();
            assert_eq!(edited.category, Category::Jb);
            assert_eq!(edited.start_time, original.start_time);
            assert_eq!(edited.end_time, original.end_time);
            assert_eq!(edited.duration, original.duration);
            assert_eq!(store.get(&original.id), Some(&edited));
        }
    }

    #[test]
    fn invalid_edit_leaves_store_unchanged() {
        let mut store = store();
        let session = add_session(&mut store, draft("09:00", "10:00"), &Utc).unwrap();
        let err = edit_session(
            &mut store,
            &session.id,
            SessionEdit {
                start_time: Some("11:00".into()),
                ..Default::default()
            },
            &Utc,
        )
        .unwrap_err();
        assert_eq!(err.downcast_ref::<EntryError>(), Some(&EntryError::EndBeforeStart));
        assert_eq!(store.sessions(), &[session]);
    }

    #[test]
    fn editing_unknown_session_fails() {
        let mut store = store();
        let err = edit_session(
            &mut store,
            &SessionId::from("missing"),
            SessionEdit::default(),
            &Utc,
        )
        .unwrap_err();
        assert_eq!(
            err.downcast_ref::<EntryError>(),
            Some(&EntryError::UnknownSession(SessionId::from("missing")))
        );
    }
}
