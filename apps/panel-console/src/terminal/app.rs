use crate::client::{Controller, ControllerConfig, ExitReason, Interrupts, StdinLines};
use crate::panel::HttpPanelClient;
use crate::session::{PanelConfig, PanelSession};
use crate::telemetry::logging;
use crate::terminal::cli::Cli;
use crate::terminal::error::CliError;
use crate::terminal::prompt;
use std::io;
use tracing::{debug, warn};

pub async fn run(cli: Cli) -> Result<ExitReason, CliError> {
    let log_config = cli.logging.to_config();
    logging::init(&log_config).map_err(|err| CliError::Logging(err.to_string()))?;
    debug!(log_level = log_config.level.as_str(), log_file = ?log_config.file, "logging configured");

    let config = PanelConfig::new(&cli.panel_url)?.with_request_timeout(cli.request_timeout());
    let credentials = prompt::credentials()?;

    println!("Logging in...");
    let (session, server) = match PanelSession::login(config, &credentials).await {
        Ok(logged_in) => logged_in,
        Err(err) if err.is_auth_failure() => {
            warn!(username = %credentials.username, error = %err, "panel refused login");
            return Err(err.into());
        }
        Err(err) => {
            warn!(error = %err, "login request failed");
            return Err(err.into());
        }
    };
    println!("Successfully logged in!");
    drop(credentials);

    let controller_config = ControllerConfig {
        poll_interval: cli.poll_interval(),
        server_name: cli.server_name,
    };
    let panel = HttpPanelClient::new(session, server);
    let controller = Controller::new(
        &panel,
        StdinLines::new(),
        Interrupts::ctrl_c(),
        io::stdout(),
        controller_config,
    );
    Ok(controller.run().await?)
}
