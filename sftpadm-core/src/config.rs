use std::fmt;
use std::time::Duration;

use url::Url;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Connection settings for an [`AdminClient`](crate::AdminClient). Built once
/// and moved into the client, which never changes it.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    base_url: Url,
    credentials: Option<Credentials>,
    timeout: Duration,
}

#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base url is valid"),
            credentials: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Result<Self, url::ParseError> {
        Ok(Self {
            base_url: Url::parse(base_url)?,
            ..Self::default()
        })
    }

    /// Basic-auth credentials are only sent when at least one of the two
    /// values is non-empty.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let username = username.into();
        let password = password.into();
        self.credentials = if username.is_empty() && password.is_empty() {
            None
        } else {
            Some(Credentials { username, password })
        };
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_local_server() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url().as_str(), "http://127.0.0.1:8080/");
        assert_eq!(config.timeout(), Duration::from_secs(15));
        assert!(config.credentials().is_none());
    }

    #[test]
    fn empty_credentials_are_dropped() {
        let config = ClientConfig::default().with_credentials("", "");
        assert!(config.credentials().is_none());

        let config = ClientConfig::default().with_credentials("", "secret");
        assert_eq!(config.credentials().unwrap().password, "secret");
    }

    #[test]
    fn debug_output_hides_password() {
        let config = ClientConfig::default().with_credentials("admin", "hunter2");
        let rendered = format!("{config:?}");
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(ClientConfig::new("not a url").is_err());
    }
}
