use super::input::LineSource;
use crate::panel::{PanelApi, PanelError};
use crate::protocol::{LogChunk, LogCursor, PlayerRecord, ProtocolError, StatusSnapshot};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::io;
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

pub(crate) const TEST_PANEL: &str = "http://panel.test/index.php";

pub(crate) fn malformed_error() -> PanelError {
    let source = serde_json::from_str::<serde_json::Value>("{")
        .map(|_| ())
        .unwrap_err();
    PanelError::Protocol {
        url: Url::parse(TEST_PANEL).unwrap(),
        source: ProtocolError::Malformed(source),
    }
}

/// Panel double that replays scripted answers and records what it was asked.
#[derive(Default)]
pub(crate) struct ScriptedPanel {
    log_script: Mutex<VecDeque<Result<LogChunk, PanelError>>>,
    last_chunk: Mutex<Option<LogChunk>>,
    drained: Option<CancellationToken>,
    log_delay: Option<Duration>,
    requested: Mutex<Vec<LogCursor>>,
    commands: Mutex<Vec<String>>,
    reject_commands: bool,
    status: Option<StatusSnapshot>,
    status_requests: Mutex<usize>,
}

impl ScriptedPanel {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_log(self, answer: Result<LogChunk, PanelError>) -> Self {
        self.log_script.lock().unwrap().push_back(answer);
        self
    }

    /// Holds every log answer back for `delay`, like a slow panel.
    pub(crate) fn with_log_delay(mut self, delay: Duration) -> Self {
        self.log_delay = Some(delay);
        self
    }

    /// Cancels `token` on the first poll after the script runs out.
    pub(crate) fn cancel_when_drained(mut self, token: CancellationToken) -> Self {
        self.drained = Some(token);
        self
    }

    pub(crate) fn with_status(mut self, status: StatusSnapshot) -> Self {
        self.status = Some(status);
        self
    }

    pub(crate) fn rejecting_commands(mut self) -> Self {
        self.reject_commands = true;
        self
    }

    pub(crate) fn requested_cursors(&self) -> Vec<LogCursor> {
        self.requested.lock().unwrap().clone()
    }

    pub(crate) fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub(crate) fn status_requests(&self) -> usize {
        *self.status_requests.lock().unwrap()
    }
}

#[async_trait]
impl PanelApi for ScriptedPanel {
    async fn fetch_log(&self, cursor: LogCursor) -> Result<LogChunk, PanelError> {
        self.requested.lock().unwrap().push(cursor);
        if let Some(delay) = self.log_delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.log_script.lock().unwrap().pop_front();
        match next {
            Some(Ok(chunk)) => {
                *self.last_chunk.lock().unwrap() = Some(chunk.clone());
                Ok(chunk)
            }
            Some(Err(err)) => Err(err),
            None => {
                if let Some(token) = &self.drained {
                    token.cancel();
                }
                let idle = self
                    .last_chunk
                    .lock()
                    .unwrap()
                    .clone()
                    .map(|chunk| LogChunk {
                        cursor: chunk.cursor,
                        text: String::new(),
                    })
                    .unwrap_or(LogChunk {
                        cursor,
                        text: String::new(),
                    });
                Ok(idle)
            }
        }
    }

    async fn send_command(&self, command: &str) -> Result<(), PanelError> {
        if self.reject_commands {
            return Err(malformed_error());
        }
        self.commands.lock().unwrap().push(command.to_string());
        Ok(())
    }

    async fn fetch_status(&self) -> Result<StatusSnapshot, PanelError> {
        *self.status_requests.lock().unwrap() += 1;
        self.status.clone().ok_or_else(malformed_error)
    }

    fn player_link(&self, player: &PlayerRecord) -> Url {
        Url::parse(&format!("{TEST_PANEL}?r=player/view&id={}", player.id)).unwrap()
    }
}

/// Operator input replayed from a list. With `hold_open` the source blocks
/// forever once exhausted instead of reporting end of input.
pub(crate) struct ScriptedLines {
    lines: VecDeque<String>,
    hold_open: bool,
}

impl ScriptedLines {
    pub(crate) fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            hold_open: false,
        }
    }

    pub(crate) fn held_open(mut self) -> Self {
        self.hold_open = true;
        self
    }
}

#[async_trait]
impl LineSource for ScriptedLines {
    async fn next_line(&mut self) -> io::Result<Option<String>> {
        match self.lines.pop_front() {
            Some(line) => Ok(Some(line)),
            None if self.hold_open => std::future::pending().await,
            None => Ok(None),
        }
    }
}
