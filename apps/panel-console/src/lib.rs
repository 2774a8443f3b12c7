pub mod client;
pub mod panel;
pub mod protocol;
pub mod session;
pub mod telemetry;
pub mod terminal;
