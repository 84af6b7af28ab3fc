use url::Url;

use crate::errors::PhoneError;
use crate::preferences::Preferences;
use crate::signaling::LoginData;

const DEFAULT_LOGIN: &str = "1008";
const DEFAULT_PASSWORD: &str = "1234";
const DEFAULT_TEXT_TO: &str = "1000";
const DEFAULT_SOCKET_PORT: u16 = 8082;

/// Account and server coordinates used to log into the Verto server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Extension, without the domain.
    pub login: String,
    pub password: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub cid: Option<String>,
    /// Default peer for user-to-user chat.
    pub text_to: String,
    pub hostname: String,
    pub socket_url: String,
}

impl Credentials {
    pub fn new(hostname: &str) -> Self {
        let hostname = AuthService::normalize_hostname(hostname);
        Self {
            login: DEFAULT_LOGIN.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            name: None,
            email: None,
            cid: None,
            text_to: DEFAULT_TEXT_TO.to_string(),
            socket_url: format!("wss://{hostname}:{DEFAULT_SOCKET_PORT}"),
            hostname,
        }
    }

    /// Defaults overlaid with whatever was saved at the last login.
    pub fn from_preferences(hostname: &str, prefs: &Preferences) -> Self {
        let mut creds = Self::new(hostname);
        if let Some(login) = &prefs.login {
            creds.login = login.clone();
        }
        if let Some(password) = &prefs.password {
            creds.password = password.clone();
        }
        creds.name = prefs.name.clone();
        creds.email = prefs.email.clone();
        creds
    }

    /// Fully qualified login, `extension@hostname`.
    pub fn login_id(&self) -> String {
        format!("{}@{}", self.login, self.hostname)
    }

    pub fn login_data(&self) -> LoginData {
        LoginData {
            login: self.login_id(),
            password: self.password.clone(),
        }
    }

    pub fn display_name(&self) -> String {
        self.name.clone().unwrap_or_default()
    }
}

/// Validation helpers for user-entered account data.
pub struct AuthService;

impl AuthService {
    /// Validate an extension as typed on the login form.
    pub fn validate_extension(input: &str) -> Result<String, PhoneError> {
        let input = input.trim();
        let re = regex::Regex::new(r"^[A-Za-z0-9_.+-]+$")
            .map_err(|e| PhoneError::InvalidCredentials(e.to_string()))?;
        if re.is_match(input) {
            Ok(input.to_string())
        } else {
            Err(PhoneError::InvalidCredentials(format!(
                "invalid extension: '{input}'"
            )))
        }
    }

    /// Normalize a websocket URL. Bare `host[:port]` input defaults to `wss`.
    pub fn parse_socket_url(input: &str) -> Result<String, PhoneError> {
        let input = input.trim();
        let candidate = if input.contains("://") {
            input.to_string()
        } else {
            format!("wss://{input}")
        };
        let url = Url::parse(&candidate)
            .map_err(|e| PhoneError::InvalidCredentials(format!("invalid socket url: {e}")))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(PhoneError::InvalidCredentials(format!(
                "socket url must use ws or wss, got '{}'",
                url.scheme()
            )));
        }
        if url.host_str().is_none_or(str::is_empty) {
            return Err(PhoneError::InvalidCredentials(format!(
                "socket url has no host: '{input}'"
            )));
        }
        Ok(url.as_str().trim_end_matches('/').to_string())
    }

    /// Strip scheme, port and path from a hostname.
    pub fn normalize_hostname(input: &str) -> String {
        let input = input.trim();
        let without_scheme = input.split_once("://").map_or(input, |(_, rest)| rest);
        let host = without_scheme.split('/').next().unwrap_or("");
        host.split(':').next().unwrap_or("").to_string()
    }
}
