use std::time::Duration as StdDuration;

use anyhow::Result;
use chrono::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::utils::clock::Clock;

use super::{
    entities::{Category, Session},
    store::{KeyValueStore, SessionStore},
    timer::Timer,
};

const TICK_INTERVAL: StdDuration = StdDuration::from_secs(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerCommand {
    Start,
    Stop,
    Reset,
    /// Changes the category used when the running span is stopped.
    Switch(Category),
    Status,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    Started { category: Category },
    Tick { category: Category, elapsed: Duration },
    Saved(Session),
    /// Stop was requested but produced nothing worth saving.
    Discarded,
    Reset,
    Switched(Category),
    Status {
        category: Category,
        running: bool,
        elapsed: Duration,
        recorded: usize,
    },
    /// Saving failed, the session is lost.
    Failed(String),
}

/// Drives a [Timer] in real time. Commands come from a channel, progress goes out through
/// another one. Cancellation or [TimerCommand::Quit] stops a running timer and saves it before
/// returning.
pub struct TimerModule<S: KeyValueStore> {
    commands: mpsc::Receiver<TimerCommand>,
    events: mpsc::Sender<TimerEvent>,
    store: SessionStore<S>,
    timer: Timer,
    category: Category,
    shutdown: CancellationToken,
    time_provider: Box<dyn Clock>,
}

impl<S: KeyValueStore> TimerModule<S> {
    pub fn new(
        commands: mpsc::Receiver<TimerCommand>,
        events: mpsc::Sender<TimerEvent>,
        store: SessionStore<S>,
        category: Category,
        shutdown: CancellationToken,
        time_provider: Box<dyn Clock>,
    ) -> Self {
        Self {
            commands,
            events,
            store,
            timer: Timer::new(),
            category,
            shutdown,
            time_provider,
        }
    }

    /// Executes the timer event loop and hands the store back once it's done.
    pub async fn run(mut self) -> Result<SessionStore<S>> {
        let mut next_tick = self.time_provider.instant() + TICK_INTERVAL;
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Timer cancelled");
                    break;
                }
                command = self.commands.recv() => match command {
                    Some(TimerCommand::Quit) | None => break,
                    Some(TimerCommand::Start) if !self.timer.is_running() => {
                        next_tick = self.time_provider.instant() + TICK_INTERVAL;
                        self.handle(TimerCommand::Start).await;
                    }
                    Some(command) => self.handle(command).await,
                },
                _ = self.time_provider.sleep_until(next_tick), if self.timer.is_running() => {
                    next_tick += TICK_INTERVAL;
                    self.timer.tick();
                    self.emit(TimerEvent::Tick {
                        category: self.category.clone(),
                        elapsed: self.timer.elapsed(),
                    })
                    .await;
                }
            }
        }

        if self.timer.is_running() {
            self.handle(TimerCommand::Stop).await;
        }
        self.commands.close();
        Ok(self.store)
    }

    async fn handle(&mut self, command: TimerCommand) {
        debug!("Handling {command:?}");
        match command {
            TimerCommand::Start => {
                if self.timer.start(self.time_provider.time()) {
                    self.emit(TimerEvent::Started {
                        category: self.category.clone(),
                    })
                    .await;
                }
            }
            TimerCommand::Stop => {
                let now = self.time_provider.time();
                let event = match self.timer.stop(now, self.category.clone()) {
                    Some(session) => match self.store.append(session.clone()) {
                        Ok(()) => {
                            info!("Saved session {}", session.id);
                            TimerEvent::Saved(session)
                        }
                        Err(e) => {
                            error!("Failed to save session {session:?}: {e:?}");
                            TimerEvent::Failed(e.to_string())
                        }
                    },
                    None => TimerEvent::Discarded,
                };
                self.emit(event).await;
            }
            TimerCommand::Reset => {
                self.timer.reset();
                self.emit(TimerEvent::Reset).await;
            }
            TimerCommand::Switch(category) => {
                self.category = category.clone();
                self.emit(TimerEvent::Switched(category)).await;
            }
            TimerCommand::Status => {
                self.emit(TimerEvent::Status {
                    category: self.category.clone(),
                    running: self.timer.is_running(),
                    elapsed: self.timer.elapsed(),
                    recorded: self.store.len(),
                })
                .await;
            }
            TimerCommand::Quit => {}
        }
    }

    async fn emit(&self, event: TimerEvent) {
        // Nobody listening is fine, the timer keeps working headless.
        if self.events.send(event).await.is_err() {
            debug!("Event receiver is gone");
        }
    }
}
