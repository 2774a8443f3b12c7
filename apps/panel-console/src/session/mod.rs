use crate::protocol::markup;
use reqwest::StatusCode;
use reqwest::cookie::{CookieStore, Jar};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

pub const DEFAULT_PANEL_URL: &str = "https://mc.shockbyte.com";

/// Cookie holding the anti-forgery token; the same name is used for the form
/// field that echoes it back.
pub const CSRF_COOKIE: &str = "YII_CSRF_TOKEN";

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(8);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Clone, Debug)]
pub struct PanelConfig {
    base_url: Url,
    request_timeout: Duration,
}

impl PanelConfig {
    pub fn new(panel_base_url: impl AsRef<str>) -> Result<Self, SessionError> {
        let mut base = panel_base_url.as_ref().trim().to_string();
        if base.is_empty() {
            return Err(SessionError::InvalidConfig(
                "panel base url cannot be empty".into(),
            ));
        }
        if !base.contains("://") {
            let inferred_scheme = infer_scheme(&base);
            base = format!("{inferred_scheme}{base}");
        }
        let mut parsed = Url::parse(&base)
            .map_err(|err| SessionError::InvalidConfig(format!("invalid panel url: {err}")))?;
        if parsed.cannot_be_a_base() {
            return Err(SessionError::InvalidConfig(format!(
                "panel url '{base}' cannot carry a path"
            )));
        }
        if !parsed.path().ends_with('/') {
            let path = format!("{}/", parsed.path());
            parsed.set_path(&path);
        }
        parsed.set_query(None);
        parsed.set_fragment(None);
        Ok(Self {
            base_url: parsed,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    pub fn login_url(&self) -> Url {
        self.route("site/login", None)
    }

    pub fn log_url(&self, server: &ServerHandle) -> Url {
        self.route("server/log", Some(server.id()))
    }

    pub fn status_url(&self, server: &ServerHandle) -> Url {
        self.route("server/view", Some(server.id()))
    }

    pub fn player_url(&self, player_id: u64) -> Url {
        self.route("player/view", Some(player_id))
    }

    fn route(&self, route: &str, id: Option<u64>) -> Url {
        let mut url = self.base_url.clone();
        let path = format!("{}index.php", self.base_url.path());
        url.set_path(&path);
        let query = match id {
            Some(id) => format!("r={route}&id={id}"),
            None => format!("r={route}"),
        };
        url.set_query(Some(&query));
        url
    }
}

fn infer_scheme(base: &str) -> &'static str {
    let host_part = base
        .split('/')
        .next()
        .unwrap_or(base)
        .trim_start_matches('[')
        .split(']')
        .next()
        .unwrap_or(base);
    let host_lower = host_part.to_ascii_lowercase();
    if host_lower.starts_with("localhost")
        || host_lower.starts_with("0.0.0.0")
        || host_lower.starts_with("127.")
        || host_lower == "::1"
        || host_lower.starts_with("10.")
        || host_lower.starts_with("192.168.")
        || host_lower
            .strip_prefix("172.")
            .and_then(|rest| rest.split('.').next())
            .and_then(|octet| octet.parse::<u8>().ok())
            .map(|octet| (16..32).contains(&octet))
            .unwrap_or(false)
    {
        "http://"
    } else {
        "https://"
    }
}

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Numeric id of the managed server, taken from the post-login redirect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServerHandle(u64);

impl ServerHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ServerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("invalid panel configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {url} failed: {source}")]
    Network {
        url: Url,
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected http status {status} from {url}")]
    HttpStatus { url: Url, status: StatusCode },
    /// Error text rendered by the panel's login form, kept verbatim.
    #[error("{0}")]
    Rejected(String),
    #[error("login finished at {url} which names no server id")]
    MissingServerId { url: Url },
}

impl SessionError {
    /// Bad credentials or an account without a server: retrying cannot help.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            SessionError::Rejected(_) | SessionError::MissingServerId { .. }
        )
    }
}

/// Cookie-backed authenticated transport to one panel.
#[derive(Clone)]
pub struct PanelSession {
    config: Arc<PanelConfig>,
    client: reqwest::Client,
    jar: Arc<Jar>,
}

impl PanelSession {
    /// Logs in and returns the session together with the server it scopes.
    pub async fn login(
        config: PanelConfig,
        credentials: &Credentials,
    ) -> Result<(Self, ServerHandle), SessionError> {
        let session = Self::new(config)?;
        let server = session.authenticate(credentials).await?;
        Ok((session, server))
    }

    fn new(config: PanelConfig) -> Result<Self, SessionError> {
        let jar = Arc::new(Jar::default());
        let client = reqwest::Client::builder()
            .cookie_provider(jar.clone())
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(config.request_timeout())
            .build()
            .map_err(SessionError::Client)?;
        Ok(Self {
            config: Arc::new(config),
            client,
            jar,
        })
    }

    async fn authenticate(&self, credentials: &Credentials) -> Result<ServerHandle, SessionError> {
        let login_url = self.config.login_url();

        debug!(target: "panel::session", url = %login_url, "requesting pre-session cookies");
        let landing = self
            .client
            .get(login_url.clone())
            .send()
            .await
            .map_err(|source| network(&login_url, source))?;
        ensure_success(&login_url, landing.status())?;

        let form = [
            ("LoginForm[name]", credentials.username.as_str()),
            ("LoginForm[password]", credentials.password.as_str()),
            ("LoginForm[rememberMe]", "0"),
            ("LoginForm[ignoreIp]", "0"),
            ("yt", "Login"),
        ];
        let response = self
            .client
            .post(login_url.clone())
            .form(&form)
            .send()
            .await
            .map_err(|source| network(&login_url, source))?;
        ensure_success(&login_url, response.status())?;

        let final_url = response.url().clone();
        let body = response
            .text()
            .await
            .map_err(|source| network(&final_url, source))?;

        if let Some(message) = markup::login_error(&body) {
            debug!(target: "panel::session", username = %credentials.username, "panel rejected login");
            return Err(SessionError::Rejected(message));
        }

        let server =
            server_id_from_url(&final_url).ok_or(SessionError::MissingServerId { url: final_url })?;
        info!(
            target: "panel::session",
            username = %credentials.username,
            server = %server,
            "logged in to panel"
        );
        Ok(server)
    }

    pub fn config(&self) -> &PanelConfig {
        &self.config
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.client
    }

    /// Current anti-forgery token for requests to `url`.
    ///
    /// Read from the cookie jar on every call; the panel may rotate it.
    pub fn csrf_token(&self, url: &Url) -> Option<String> {
        let header = self.jar.cookies(url)?;
        let raw = header.to_str().ok()?;
        cookie_value(raw, CSRF_COOKIE)
    }
}

fn network(url: &Url, source: reqwest::Error) -> SessionError {
    SessionError::Network {
        url: url.clone(),
        source,
    }
}

fn ensure_success(url: &Url, status: StatusCode) -> Result<(), SessionError> {
    if status.is_success() {
        Ok(())
    } else {
        Err(SessionError::HttpStatus {
            url: url.clone(),
            status,
        })
    }
}

fn cookie_value(header: &str, name: &str) -> Option<String> {
    header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

pub(crate) fn server_id_from_url(url: &Url) -> Option<ServerHandle> {
    url.query_pairs()
        .find(|(key, value)| {
            key == "id" && !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())
        })
        .and_then(|(_, value)| value.parse().ok())
        .map(ServerHandle)
}
