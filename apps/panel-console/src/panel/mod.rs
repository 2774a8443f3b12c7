use crate::protocol::{self, LogChunk, LogCursor, PlayerRecord, ProtocolError, StatusSnapshot};
use crate::session::{CSRF_COOKIE, PanelSession, ServerHandle};
use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// Operations the panel exposes over its AJAX endpoints for one server.
///
/// Every error is "try again later": none of them proves the server state
/// changed, and callers keep looping on their own cadence.
#[async_trait]
pub trait PanelApi: Send + Sync {
    async fn fetch_log(&self, cursor: LogCursor) -> Result<LogChunk, PanelError>;

    /// Fire-and-forget; the panel's reply body is never inspected.
    async fn send_command(&self, command: &str) -> Result<(), PanelError>;

    async fn fetch_status(&self) -> Result<StatusSnapshot, PanelError>;

    fn player_link(&self, player: &PlayerRecord) -> Url;
}

#[derive(Debug, Error)]
pub enum PanelError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: Url,
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected http status {status} from {url}")]
    HttpStatus { url: Url, status: StatusCode },
    #[error("session holds no anti-forgery token for {url}")]
    MissingToken { url: Url },
    #[error("unexpected response from {url}: {source}")]
    Protocol {
        url: Url,
        #[source]
        source: ProtocolError,
    },
}

impl PanelError {
    pub fn url(&self) -> &Url {
        match self {
            PanelError::Transport { url, .. }
            | PanelError::HttpStatus { url, .. }
            | PanelError::MissingToken { url }
            | PanelError::Protocol { url, .. } => url,
        }
    }
}

pub struct HttpPanelClient {
    session: PanelSession,
    server: ServerHandle,
}

impl HttpPanelClient {
    pub fn new(session: PanelSession, server: ServerHandle) -> Self {
        Self { session, server }
    }

    async fn post_ajax(
        &self,
        url: &Url,
        fields: &[(&str, &str)],
    ) -> Result<reqwest::Response, PanelError> {
        let token = self
            .session
            .csrf_token(url)
            .ok_or_else(|| PanelError::MissingToken { url: url.clone() })?;

        let mut form: Vec<(&str, &str)> = Vec::with_capacity(fields.len() + 1);
        form.extend_from_slice(fields);
        form.push((CSRF_COOKIE, token.as_str()));

        let response = self
            .session
            .http()
            .post(url.clone())
            .form(&form)
            .send()
            .await
            .map_err(|source| transport_failure(url, source))?;

        let status = response.status();
        if !status.is_success() {
            warn!(target: "panel::client", url = %url, status = %status, "panel answered with an error status");
            return Err(PanelError::HttpStatus {
                url: url.clone(),
                status,
            });
        }
        Ok(response)
    }

    async fn read_body(&self, url: &Url, response: reqwest::Response) -> Result<String, PanelError> {
        response
            .text()
            .await
            .map_err(|source| transport_failure(url, source))
    }
}

#[async_trait]
impl PanelApi for HttpPanelClient {
    async fn fetch_log(&self, cursor: LogCursor) -> Result<LogChunk, PanelError> {
        let url = self.session.config().log_url(&self.server);
        let log_seq = cursor.to_string();
        let response = self
            .post_ajax(
                &url,
                &[("ajax", "refresh"), ("type", "all"), ("log_seq", log_seq.as_str())],
            )
            .await?;
        let body = self.read_body(&url, response).await?;
        let chunk = protocol::decode_log(&body).map_err(|source| malformed(&url, source))?;
        debug!(
            target: "panel::client",
            requested = cursor,
            returned = chunk.cursor,
            bytes = chunk.text.len(),
            "log poll answered"
        );
        Ok(chunk)
    }

    async fn send_command(&self, command: &str) -> Result<(), PanelError> {
        let url = self.session.config().log_url(&self.server);
        self.post_ajax(&url, &[("ajax", "command"), ("command", command)])
            .await?;
        debug!(target: "panel::client", server = %self.server, command = %command, "console command sent");
        Ok(())
    }

    async fn fetch_status(&self) -> Result<StatusSnapshot, PanelError> {
        let url = self.session.config().status_url(&self.server);
        let response = self
            .post_ajax(
                &url,
                &[("ajax", "refresh"), ("type", "all"), ("log_seq", "0")],
            )
            .await?;
        let body = self.read_body(&url, response).await?;
        protocol::decode_status(&body).map_err(|source| malformed(&url, source))
    }

    fn player_link(&self, player: &PlayerRecord) -> Url {
        self.session.config().player_url(player.id)
    }
}

fn transport_failure(url: &Url, source: reqwest::Error) -> PanelError {
    warn!(target: "panel::client", url = %url, error = %source, "panel request failed");
    PanelError::Transport {
        url: url.clone(),
        source,
    }
}

fn malformed(url: &Url, source: ProtocolError) -> PanelError {
    warn!(target: "panel::client", url = %url, error = %source, "panel sent an unexpected payload");
    PanelError::Protocol {
        url: url.clone(),
        source,
    }
}
