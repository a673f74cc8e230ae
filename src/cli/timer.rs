use std::io::{BufRead, Write};

use ansi_term::Colour;
use anyhow::{anyhow, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::{
    billing::format::{clock_display, format_duration, DurationStyle, Locale},
    tracker::{
        entities::Category,
        runner::{TimerCommand, TimerEvent, TimerModule},
    },
    utils::clock::DefaultClock,
};

use super::{shutdown, Context};

#[derive(Debug, clap::Args)]
pub struct TimerArgs {
    #[arg(
        short,
        long,
        default_value_t = Category::Gwen,
        help = "Category the sessions are billed under"
    )]
    category: Category,
    #[arg(short, long, help = "Start counting right away")]
    start: bool,
}

/// Runs the timer until `quit`, end of input or Ctrl-C. A running span is saved on the way out.
pub async fn process_timer_command(
    TimerArgs { category, start }: TimerArgs,
    context: &Context,
) -> Result<()> {
    let store = context.open_store()?;
    let locale = context.config.locale;

    let (command_sender, command_receiver) = mpsc::channel::<TimerCommand>(16);
    let (event_sender, event_receiver) = mpsc::channel::<TimerEvent>(64);
    let shutdown_token = CancellationToken::new();

    if start {
        command_sender.send(TimerCommand::Start).await?;
    }
    spawn_input_reader(command_sender);

    let module = TimerModule::new(
        command_receiver,
        event_sender,
        store,
        category,
        shutdown_token.clone(),
        Box::new(DefaultClock),
    );

    println!("{}", Colour::Cyan.paint(HELP));
    let (_, result, _) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token.clone()),
        async {
            let result = module.run().await;
            shutdown_token.cancel();
            result
        },
        print_events(event_receiver, locale),
    );
    let store = result?;
    debug!("Timer finished with {} sessions recorded", store.len());
    Ok(())
}

const HELP: &str = "Commands: start, stop, reset, switch <category>, status, quit";

/// Stdin is read on a plain thread, a blocking read would otherwise hold the runtime open after
/// the timer is done.
fn spawn_input_reader(sender: mpsc::Sender<TimerCommand>) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(v) => v,
                Err(e) => {
                    error!("Failed to read input {e:?}");
                    break;
                }
            };
            match parse_command(&line) {
                Ok(Some(command)) => {
                    if sender.blocking_send(command).is_err() {
                        return;
                    }
                }
                Ok(None) => {}
                Err(e) => eprintln!("{}", Colour::Red.paint(e.to_string())),
            }
        }
        let _ = sender.blocking_send(TimerCommand::Quit);
    });
}

/// Blank lines yield `None`.
fn parse_command(line: &str) -> Result<Option<TimerCommand>> {
    let mut words = line.split_whitespace();
    let Some(command) = words.next() else {
        return Ok(None);
    };
    let command = match command.to_lowercase().as_str() {
        "start" => TimerCommand::Start,
        "stop" => TimerCommand::Stop,
        "reset" => TimerCommand::Reset,
        "status" => TimerCommand::Status,
        "quit" | "exit" | "q" => TimerCommand::Quit,
        "switch" => {
            let category = words
                .next()
                .ok_or_else(|| anyhow!("switch needs a category"))?
                .parse::<Category>()?;
            TimerCommand::Switch(category)
        }
        other => return Err(anyhow!("Unknown command {other:?}. {HELP}")),
    };
    Ok(Some(command))
}

async fn print_events(mut events: mpsc::Receiver<TimerEvent>, locale: Locale) {
    while let Some(event) = events.recv().await {
        match event {
            TimerEvent::Tick { category, elapsed } => {
                print!("\r{category} {}", Colour::Green.paint(clock_display(elapsed)));
                let _ = std::io::stdout().flush();
            }
            TimerEvent::Started { category } => println!("Started {category}"),
            TimerEvent::Saved(session) => println!(
                "\r{} {} {}",
                Colour::Green.paint("Saved"),
                session.category,
                format_duration(session.duration, DurationStyle::Long, locale)
            ),
            TimerEvent::Discarded => println!("\rNothing to save"),
            TimerEvent::Reset => println!("\rReset"),
            TimerEvent::Switched(category) => println!("\rBilling under {category}"),
            TimerEvent::Status {
                category,
                running,
                elapsed,
                recorded,
            } => println!(
                "\r{category} {} {}, {recorded} sessions recorded",
                if running { "running" } else { "stopped" },
                clock_display(elapsed)
            ),
            TimerEvent::Failed(e) => {
                eprintln!("\r{}", Colour::Red.paint(format!("Failed to save: {e}")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::parse_command;
    use crate::tracker::{entities::Category, runner::TimerCommand};

    #[test]
    fn commands_are_parsed() {
        assert_eq!(parse_command(" start ").unwrap(), Some(TimerCommand::Start));
        assert_eq!(parse_command("STOP").unwrap(), Some(TimerCommand::Stop));
        assert_eq!(parse_command("q").unwrap(), Some(TimerCommand::Quit));
        assert_eq!(
            parse_command("switch jb").unwrap(),
            Some(TimerCommand::Switch(Category::Jb))
        );
        assert_eq!(parse_command("").unwrap(), None);
    }

    #[test]
    fn bad_commands_are_rejected() {
        assert!(parse_command("pause").is_err());
        assert!(parse_command("switch").is_err());
        assert!(parse_command("switch acme").is_err());
    }
}
