use clap::{Args, Parser};
use std::path::PathBuf;
use std::time::Duration;

use crate::session::DEFAULT_PANEL_URL;
use crate::telemetry::logging::{LogConfig, LogLevel};

#[derive(Parser, Debug)]
#[command(
    name = "panel-console",
    about = "Watch a game server's console and send commands through its control panel",
    author,
    version = concat!(env!("CARGO_PKG_VERSION"), "-", env!("BUILD_TIMESTAMP"))
)]
pub struct Cli {
    #[arg(
        long,
        value_name = "URL",
        default_value = DEFAULT_PANEL_URL,
        help = "Base URL of the control panel"
    )]
    pub panel_url: String,

    #[arg(
        long,
        value_name = "NAME",
        default_value = "Multicraft",
        help = "Label shown in the console command prompt"
    )]
    pub server_name: String,

    #[arg(
        long = "poll-interval-ms",
        value_name = "MS",
        default_value_t = 1000,
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Delay between console log polls"
    )]
    pub poll_interval_ms: u64,

    #[arg(
        long = "request-timeout-secs",
        value_name = "SECONDS",
        default_value_t = 8,
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Give up on a panel request after this many seconds"
    )]
    pub request_timeout_secs: u64,

    #[command(flatten)]
    pub logging: LoggingArgs,
}

impl Cli {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Args, Debug, Clone)]
pub struct LoggingArgs {
    #[arg(
        long = "log-level",
        value_enum,
        default_value_t = LogLevel::Warn,
        help = "Minimum log level (error, warn, info, debug, trace)"
    )]
    pub level: LogLevel,

    #[arg(
        long = "log-file",
        value_name = "PATH",
        help = "Write structured logs to the specified file instead of stderr"
    )]
    pub file: Option<PathBuf>,

    #[arg(
        long = "log-filter",
        value_name = "DIRECTIVES",
        help = "Raw tracing filter directives; overrides --log-level"
    )]
    pub filter: Option<String>,
}

impl LoggingArgs {
    pub fn to_config(&self) -> LogConfig {
        LogConfig {
            level: self.level,
            file: self.file.clone(),
            filter: self.filter.clone(),
        }
    }
}

pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_match_reference_panel() {
        let cli = Cli::try_parse_from(["panel-console"]).unwrap();
        assert_eq!(cli.panel_url, DEFAULT_PANEL_URL);
        assert_eq!(cli.server_name, "Multicraft");
        assert_eq!(cli.poll_interval(), Duration::from_secs(1));
        assert_eq!(cli.request_timeout(), Duration::from_secs(8));
        assert_eq!(cli.logging.level, LogLevel::Warn);
        assert!(cli.logging.file.is_none());
    }

    #[test]
    fn overrides_are_applied() {
        let cli = Cli::try_parse_from([
            "panel-console",
            "--panel-url",
            "localhost:8080",
            "--server-name",
            "Creative",
            "--poll-interval-ms",
            "250",
            "--log-level",
            "debug",
            "--log-filter",
            "panel=trace",
        ])
        .unwrap();
        assert_eq!(cli.panel_url, "localhost:8080");
        assert_eq!(cli.server_name, "Creative");
        assert_eq!(cli.poll_interval(), Duration::from_millis(250));
        let config = cli.logging.to_config();
        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(config.filter.as_deref(), Some("panel=trace"));
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        assert!(Cli::try_parse_from(["panel-console", "--poll-interval-ms", "0"]).is_err());
        assert!(Cli::try_parse_from(["panel-console", "--request-timeout-secs", "0"]).is_err());
    }
}
