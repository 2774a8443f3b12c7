pub mod controller;
pub mod input;
pub mod log_stream;

#[cfg(test)]
pub(crate) mod testing;

pub use controller::{Controller, ControllerConfig, ExitReason};
pub use input::{Interrupts, LineSource, StdinLines};
pub use log_stream::{LogStreamPoller, StreamState};
