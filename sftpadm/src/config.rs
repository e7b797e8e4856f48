use std::time::Duration;

use anyhow::Context;
use sftpadm_core::{ClientConfig, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};

const URL_ENV: &str = "SFTPADM_URL";
const USERNAME_ENV: &str = "SFTPADM_USERNAME";
const PASSWORD_ENV: &str = "SFTPADM_PASSWORD";
const TIMEOUT_ENV: &str = "SFTPADM_TIMEOUT_SECS";

#[derive(Clone)]
pub struct CliConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub timeout: Duration,
}

impl CliConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup(URL_ENV)
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let timeout = lookup(TIMEOUT_ENV)
            .and_then(|value| value.trim().parse::<u64>().ok())
            .filter(|value| *value > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);
        Self {
            base_url,
            username: lookup(USERNAME_ENV).unwrap_or_default(),
            password: lookup(PASSWORD_ENV).unwrap_or_default(),
            timeout,
        }
    }

    pub fn client_config(&self) -> anyhow::Result<ClientConfig> {
        let config = ClientConfig::new(&self.base_url)
            .with_context(|| format!("invalid {URL_ENV}: {}", self.base_url))?;
        Ok(config
            .with_credentials(self.username.clone(), self.password.clone())
            .with_timeout(self.timeout))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> CliConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CliConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = config_from(&[]);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert!(config.client_config().unwrap().credentials().is_none());
    }

    #[test]
    fn reads_url_credentials_and_timeout() {
        let config = config_from(&[
            (URL_ENV, "https://sftp.example:8443/api"),
            (USERNAME_ENV, "admin"),
            (PASSWORD_ENV, "secret"),
            (TIMEOUT_ENV, "30"),
        ]);
        let client = config.client_config().unwrap();
        assert_eq!(client.base_url().as_str(), "https://sftp.example:8443/api");
        assert_eq!(client.credentials().unwrap().username, "admin");
        assert_eq!(client.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn invalid_timeout_falls_back_to_default() {
        assert_eq!(config_from(&[(TIMEOUT_ENV, "0")]).timeout, DEFAULT_TIMEOUT);
        assert_eq!(
            config_from(&[(TIMEOUT_ENV, "soon")]).timeout,
            DEFAULT_TIMEOUT
        );
    }

    #[test]
    fn invalid_url_is_reported() {
        let err = config_from(&[(URL_ENV, "::nope")])
            .client_config()
            .unwrap_err();
        assert!(err.to_string().contains(URL_ENV));
    }
}
