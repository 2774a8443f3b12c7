//! Turns repeated log polls into one ordered, duplicate-free stream.

use crate::panel::PanelApi;
use crate::protocol::{LogChunk, LogCursor};
use std::io::{self, Write};
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Stopped,
    Streaming,
}

/// Result of a single poll tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Cursor moved; carries the bytes written.
    Advanced(usize),
    Unchanged,
    /// The poll failed and was skipped.
    Skipped,
}

#[derive(Debug)]
pub struct LogStreamPoller {
    cursor: LogCursor,
    interval: Duration,
    state: StreamState,
}

impl LogStreamPoller {
    pub fn new(interval: Duration) -> Self {
        Self {
            cursor: 0,
            interval,
            state: StreamState::Stopped,
        }
    }

    pub fn cursor(&self) -> LogCursor {
        self.cursor
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Applies a fetched chunk, returning the text to emit when the cursor
    /// moved. An unchanged cursor never yields output.
    pub fn accept(&mut self, chunk: LogChunk) -> Option<String> {
        if chunk.cursor == self.cursor {
            return None;
        }
        if chunk.cursor < self.cursor {
            debug!(
                target: "panel::stream",
                previous = self.cursor,
                returned = chunk.cursor,
                "log cursor moved backwards; panel log was reset"
            );
        }
        self.cursor = chunk.cursor;
        Some(chunk.text)
    }

    pub async fn tick<P, W>(&mut self, panel: &P, out: &mut W) -> io::Result<TickOutcome>
    where
        P: PanelApi + ?Sized,
        W: Write + ?Sized,
    {
        let chunk = match panel.fetch_log(self.cursor).await {
            Ok(chunk) => chunk,
            Err(err) => {
                warn!(
                    target: "panel::stream",
                    cursor = self.cursor,
                    error = %err,
                    "log poll failed; retrying next tick"
                );
                return Ok(TickOutcome::Skipped);
            }
        };
        match self.accept(chunk) {
            Some(text) => {
                out.write_all(text.as_bytes())?;
                out.flush()?;
                Ok(TickOutcome::Advanced(text.len()))
            }
            None => Ok(TickOutcome::Unchanged),
        }
    }

    /// Streams from `start` until `cancel` fires, returning the last cursor.
    ///
    /// Cancellation is observed while waiting between ticks, so the loop stops
    /// within one interval; an in-flight poll is allowed to finish first.
    pub async fn run<P, W>(
        &mut self,
        panel: &P,
        out: &mut W,
        start: LogCursor,
        cancel: &CancellationToken,
    ) -> io::Result<LogCursor>
    where
        P: PanelApi + ?Sized,
        W: Write + ?Sized,
    {
        self.cursor = start;
        self.state = StreamState::Streaming;
        debug!(target: "panel::stream", start, interval_ms = self.interval.as_millis() as u64, "log stream started");

        let result = self.stream(panel, out, cancel).await;

        self.state = StreamState::Stopped;
        debug!(target: "panel::stream", cursor = self.cursor, "log stream stopped");
        result.map(|()| self.cursor)
    }

    async fn stream<P, W>(
        &mut self,
        panel: &P,
        out: &mut W,
        cancel: &CancellationToken,
    ) -> io::Result<()>
    where
        P: PanelApi + ?Sized,
        W: Write + ?Sized,
    {
        while !cancel.is_cancelled() {
            if let TickOutcome::Advanced(bytes) = self.tick(panel, out).await? {
                trace!(target: "panel::stream", cursor = self.cursor, bytes, "log advanced");
            }
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = sleep(self.interval) => {}
            }
        }
        Ok(())
    }
}

impl Default for LogStreamPoller {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}
