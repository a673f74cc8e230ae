pub mod days;
pub mod report;
pub mod sessions;
pub mod shutdown;
pub mod timer;

use std::{fmt::Display, path::PathBuf};

use anyhow::Result;
use chrono::{Local, NaiveDate};
use chrono_english::parse_date_string;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use days::DaysCommand;
use report::{ExportCommand, ReportCommand};
use sessions::{AddCommand, EditCommand, RemoveCommand};
use timer::TimerArgs;
use tracing::level_filters::LevelFilter;

use crate::{
    config::{self, BillingConfig},
    tracker::store::{FileKeyValueStore, SessionStore},
    utils::{
        dir::application_path,
        logging::{enable_logging, CLI_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "billtimer", version, long_about = None)]
#[command(about = "Track billable work sessions and turn them into invoices", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Print logs to the console")]
    log: bool,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        default_value_t = DateStyle::Uk,
        help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year"
    )]
    date_style: DateStyle,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(
        about = "Run an interactive timer. Type start, stop, reset, switch <category>, status or quit"
    )]
    Timer {
        #[command(flatten)]
        command: TimerArgs,
    },
    #[command(about = "Record a session by hand")]
    Add {
        #[command(flatten)]
        command: AddCommand,
    },
    #[command(about = "Change a recorded session")]
    Edit {
        #[command(flatten)]
        command: EditCommand,
    },
    #[command(about = "Delete a recorded session")]
    Remove {
        #[command(flatten)]
        command: RemoveCommand,
    },
    #[command(about = "Show recorded sessions grouped by category")]
    List {},
    #[command(about = "Show the priced summary of every recorded session")]
    Report {
        #[command(flatten)]
        command: ReportCommand,
    },
    #[command(about = "Write a summary or an invoice into a file")]
    Export {
        #[command(flatten)]
        command: ExportCommand,
    },
    #[command(about = "Count billable days between two dates")]
    Days {
        #[command(flatten)]
        command: DaysCommand,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

/// Everything a command needs from the environment.
pub struct Context {
    pub app_dir: PathBuf,
    pub config: BillingConfig,
    pub date_style: DateStyle,
}

impl Context {
    pub fn open_store(&self) -> Result<SessionStore<FileKeyValueStore>> {
        let storage = FileKeyValueStore::new(self.app_dir.join("store"))?;
        Ok(SessionStore::load(storage))
    }

    /// Parses a user supplied date such as "yesterday" or "15/03/2025".
    pub fn parse_date(&self, value: &str, name: &str) -> Result<NaiveDate> {
        parse_date_string(value, Local::now(), self.date_style.into())
            .map(|v| v.date_naive())
            .map_err(|e| validation_error(format!("Failed to validate {name} {e}")))
    }
}

/// Reports a bad argument the same way clap reports its own.
pub fn validation_error(message: impl Display) -> anyhow::Error {
    Args::command()
        .error(clap::error::ErrorKind::ValueValidation, message)
        .into()
}

pub async fn run_cli(args: Args) -> Result<()> {
    let app_dir = application_path(args.dir.as_deref())?;

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    enable_logging(CLI_PREFIX, &app_dir.join("logs"), logging_level, args.log)?;

    let context = Context {
        config: config::load_or_init(&app_dir)?,
        app_dir,
        date_style: args.date_style,
    };

    match args.commands {
        Commands::Timer { command } => timer::process_timer_command(command, &context).await,
        Commands::Add { command } => sessions::process_add_command(command, &context),
        Commands::Edit { command } => sessions::process_edit_command(command, &context),
        Commands::Remove { command } => sessions::process_remove_command(command, &context),
        Commands::List {} => sessions::process_list_command(&context),
        Commands::Report { command } => report::process_report_command(command, &context),
        Commands::Export { command } => report::process_export_command(command, &context),
        Commands::Days { command } => days::process_days_command(command, &context),
    }
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, Parser};

    use super::{Args, Commands};

    #[test]
    fn arguments_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn global_options_after_subcommand() {
        let args = Args::try_parse_from([
            "billtimer",
            "list",
            "--dir",
            "/tmp/bt",
            "--date-style",
            "us",
        ])
        .unwrap();
        assert!(matches!(args.commands, Commands::List {}));
        assert_eq!(args.dir.unwrap().to_str(), Some("/tmp/bt"));
    }

    #[test]
    fn unknown_category_is_rejected() {
        let result = Args::try_parse_from([
            "billtimer", "add", "-c", "acme", "--date", "today", "--from", "09:00", "--to", "10:00",
        ]);
        assert!(result.is_err());
    }
}
