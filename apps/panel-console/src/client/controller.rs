//! Menu-driven control loop multiplexing log watching, console commands and
//! status lookups over one authenticated panel.

use super::input::{Interrupts, LineSource};
use super::log_stream::LogStreamPoller;
use crate::panel::PanelApi;
use crate::protocol::StatusSnapshot;
use std::io::{self, Write};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Command-mode keyword that returns to the main menu instead of being sent.
pub const EXIT_KEYWORD: &str = "exit";

/// Exit status when the operator interrupts from the idle main menu.
pub const INTERRUPTED_IDLE_EXIT_CODE: i32 = 130;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    MainMenu,
    WatchingLog,
    CommandMode,
    StatusView,
    Exiting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    Requested,
    EndOfInput,
    InterruptedIdle,
}

impl ExitReason {
    pub fn exit_code(self) -> i32 {
        match self {
            ExitReason::Requested | ExitReason::EndOfInput => 0,
            ExitReason::InterruptedIdle => INTERRUPTED_IDLE_EXIT_CODE,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("Invalid option: '{0}'")]
    NotNumeric(String),
    #[error("Invalid option: '{0}'")]
    OutOfRange(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    WatchLog,
    CommandMode,
    Status,
    Exit,
}

impl MenuChoice {
    pub fn parse(raw: &str) -> Result<Self, InputError> {
        match parse_index(raw)? {
            1 => Ok(MenuChoice::WatchLog),
            2 => Ok(MenuChoice::CommandMode),
            3 => Ok(MenuChoice::Status),
            4 => Ok(MenuChoice::Exit),
            _ => Err(InputError::OutOfRange(raw.trim().to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusSelection {
    /// Zero-based index into the snapshot's players.
    Player(usize),
    Back,
}

impl StatusSelection {
    /// Players are listed from 1; `player_count + 1` is the back entry.
    pub fn parse(raw: &str, player_count: usize) -> Result<Self, InputError> {
        let index = parse_index(raw)?;
        match index {
            n if (1..=player_count).contains(&n) => Ok(StatusSelection::Player(n - 1)),
            n if n == player_count + 1 => Ok(StatusSelection::Back),
            _ => Err(InputError::OutOfRange(raw.trim().to_string())),
        }
    }
}

fn parse_index(raw: &str) -> Result<usize, InputError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(InputError::NotNumeric(trimmed.to_string()));
    }
    trimmed
        .parse()
        .map_err(|_| InputError::OutOfRange(trimmed.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandLine<'a> {
    Exit,
    Blank,
    Send(&'a str),
}

impl<'a> CommandLine<'a> {
    pub fn classify(line: &'a str) -> Self {
        let trimmed = line.trim();
        if trimmed == EXIT_KEYWORD {
            CommandLine::Exit
        } else if trimmed.is_empty() {
            CommandLine::Blank
        } else {
            CommandLine::Send(line)
        }
    }
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub server_name: String,
    pub poll_interval: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            server_name: "Multicraft".to_string(),
            poll_interval: super::log_stream::DEFAULT_POLL_INTERVAL,
        }
    }
}

enum Prompted {
    Line(String),
    Interrupted,
    Closed,
}

pub struct Controller<'a, P: ?Sized, L, W> {
    panel: &'a P,
    input: L,
    interrupts: Interrupts,
    out: W,
    poller: LogStreamPoller,
    server_name: String,
    state: ControllerState,
    exit: ExitReason,
}

impl<'a, P, L, W> Controller<'a, P, L, W>
where
    P: PanelApi + ?Sized,
    L: LineSource,
    W: Write,
{
    pub fn new(
        panel: &'a P,
        input: L,
        interrupts: Interrupts,
        out: W,
        config: ControllerConfig,
    ) -> Self {
        Self {
            panel,
            input,
            interrupts,
            out,
            poller: LogStreamPoller::new(config.poll_interval),
            server_name: config.server_name,
            state: ControllerState::MainMenu,
            exit: ExitReason::Requested,
        }
    }

    pub async fn run(mut self) -> io::Result<ExitReason> {
        while self.state != ControllerState::Exiting {
            let next = match self.state {
                ControllerState::MainMenu => self.main_menu().await?,
                ControllerState::WatchingLog => self.watch_log().await?,
                ControllerState::CommandMode => self.command_mode().await?,
                ControllerState::StatusView => self.status_view().await?,
                ControllerState::Exiting => ControllerState::Exiting,
            };
            if next != self.state {
                debug!(target: "panel::controller", from = ?self.state, to = ?next, "state change");
            }
            self.state = next;
        }
        info!(target: "panel::controller", reason = ?self.exit, "leaving console");
        Ok(self.exit)
    }

    async fn prompt(&mut self, label: &str) -> io::Result<Prompted> {
        write!(self.out, "{label}")?;
        self.out.flush()?;

        let outcome = tokio::select! {
            biased;
            line = self.input.next_line() => match line? {
                Some(line) => Prompted::Line(line),
                None => Prompted::Closed,
            },
            () = self.interrupts.recv() => Prompted::Interrupted,
        };
        if !matches!(outcome, Prompted::Line(_)) {
            writeln!(self.out)?;
        }
        Ok(outcome)
    }

    fn leave(&mut self, reason: ExitReason) -> ControllerState {
        self.exit = reason;
        ControllerState::Exiting
    }

    async fn main_menu(&mut self) -> io::Result<ControllerState> {
        writeln!(self.out, "-------Main Menu-------")?;
        writeln!(self.out, "1. View Console")?;
        writeln!(self.out, "2. Send Console Command")?;
        writeln!(self.out, "3. Server Status")?;
        writeln!(self.out, "4. Exit")?;

        let raw = match self.prompt("Option: ").await? {
            Prompted::Line(raw) => raw,
            Prompted::Closed => return Ok(self.leave(ExitReason::EndOfInput)),
            Prompted::Interrupted => return Ok(self.leave(ExitReason::InterruptedIdle)),
        };
        match MenuChoice::parse(&raw) {
            Ok(MenuChoice::WatchLog) => Ok(ControllerState::WatchingLog),
            Ok(MenuChoice::CommandMode) => Ok(ControllerState::CommandMode),
            Ok(MenuChoice::Status) => Ok(ControllerState::StatusView),
            Ok(MenuChoice::Exit) => Ok(self.leave(ExitReason::Requested)),
            Err(err) => {
                writeln!(self.out, "{err}")?;
                Ok(ControllerState::MainMenu)
            }
        }
    }

    async fn watch_log(&mut self) -> io::Result<ControllerState> {
        writeln!(self.out, "Streaming console output, press Ctrl-C to stop.")?;
        self.out.flush()?;

        let cancel = CancellationToken::new();
        let cursor = {
            let Self {
                panel,
                poller,
                out,
                interrupts,
                ..
            } = self;
            let stream = poller.run(*panel, out, 0, &cancel);
            tokio::pin!(stream);
            loop {
                tokio::select! {
                    biased;
                    finished = &mut stream => break finished?,
                    () = interrupts.recv(), if !cancel.is_cancelled() => cancel.cancel(),
                }
            }
        };

        // Repeated Ctrl-C while the last poll finishes belongs to this watch.
        let extra = self.interrupts.drain();
        debug!(target: "panel::controller", cursor, extra_interrupts = extra, "log watch interrupted");
        writeln!(self.out)?;
        Ok(ControllerState::MainMenu)
    }

    async fn command_mode(&mut self) -> io::Result<ControllerState> {
        writeln!(
            self.out,
            "Console commands are sent as typed; '{EXIT_KEYWORD}' returns to the menu."
        )?;
        let label = format!("{} > ", self.server_name);
        loop {
            let line = match self.prompt(&label).await? {
                Prompted::Line(line) => line,
                Prompted::Interrupted => return Ok(ControllerState::MainMenu),
                Prompted::Closed => return Ok(self.leave(ExitReason::EndOfInput)),
            };
            match CommandLine::classify(&line) {
                CommandLine::Exit => return Ok(ControllerState::MainMenu),
                CommandLine::Blank => {}
                CommandLine::Send(command) => {
                    if let Err(err) = self.panel.send_command(command).await {
                        warn!(target: "panel::controller", error = %err, "console command not delivered");
                        writeln!(self.out, "⚠️  command not delivered: {err}")?;
                    }
                }
            }
        }
    }

    async fn status_view(&mut self) -> io::Result<ControllerState> {
        let snapshot = match self.panel.fetch_status().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                writeln!(self.out, "⚠️  server status unavailable: {err}")?;
                return Ok(ControllerState::MainMenu);
            }
        };

        loop {
            self.render_status(&snapshot)?;
            let raw = match self.prompt("Player: ").await? {
                Prompted::Line(raw) => raw,
                Prompted::Interrupted => return Ok(ControllerState::MainMenu),
                Prompted::Closed => return Ok(self.leave(ExitReason::EndOfInput)),
            };
            match StatusSelection::parse(&raw, snapshot.players.len()) {
                Ok(StatusSelection::Back) => return Ok(ControllerState::MainMenu),
                Ok(StatusSelection::Player(index)) => {
                    let player = &snapshot.players[index];
                    let link = self.panel.player_link(player);
                    writeln!(self.out, "{} (id {}): {link}", player.name, player.id)?;
                }
                Err(err) => writeln!(self.out, "{err}")?,
            }
        }
    }

    fn render_status(&mut self, snapshot: &StatusSnapshot) -> io::Result<()> {
        writeln!(self.out, "-------Server Status-------")?;
        writeln!(self.out, "Status: {}", snapshot.status_text)?;
        writeln!(self.out, "Players online: {}", snapshot.players.len())?;
        for (index, player) in snapshot.players.iter().enumerate() {
            writeln!(self.out, "{}. {}", index + 1, player.name)?;
        }
        writeln!(self.out, "{}. Back", snapshot.players.len() + 1)?;
        Ok(())
    }
}
