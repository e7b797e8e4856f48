use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use crate::check::{Mismatch, check_user};
use crate::config::ClientConfig;
use crate::models::{ApiMessage, ConnectionStatus, QuotaScan, ServerErrorKind, User, VersionInfo};
use crate::paths;

const USER_PATH: &str = "/user";
const QUOTA_SCAN_PATH: &str = "/quota_scan";
const CONNECTION_PATH: &str = "/connection";
const VERSION_PATH: &str = "/version";
const PROVIDER_STATUS_PATH: &str = "/status";
const DUMP_DATA_PATH: &str = "/dumpdata";
const LOAD_DATA_PATH: &str = "/loaddata";

/// Bodies are only decoded when the caller expects this status.
const DECODE_STATUS: StatusCode = StatusCode::OK;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("wrong status code: got {actual} want {expected}")]
    UnexpectedStatus {
        expected: StatusCode,
        actual: StatusCode,
        body: Vec<u8>,
    },
    #[error("failed to decode response body: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("server returned an inconsistent user: {0}")]
    Mismatch(#[from] Mismatch),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Transport,
    Status,
    Decode,
    Mismatch,
}

impl AdminError {
    pub fn classification(&self) -> ErrorClass {
        match self {
            AdminError::Request(_) | AdminError::Url(_) | AdminError::Encode(_) => {
                ErrorClass::Transport
            }
            AdminError::UnexpectedStatus { .. } => ErrorClass::Status,
            AdminError::Decode(_) => ErrorClass::Decode,
            AdminError::Mismatch(_) => ErrorClass::Mismatch,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, AdminError::Request(err) if err.is_timeout())
    }

    /// Raw body captured alongside a status mismatch.
    pub fn body(&self) -> Option<&[u8]> {
        match self {
            AdminError::UnexpectedStatus { body, .. } => Some(body),
            _ => None,
        }
    }

    /// The server's error envelope, when the mismatching body carries one.
    pub fn api_message(&self) -> Option<ApiMessage> {
        self.body()
            .and_then(|body| serde_json::from_slice(body).ok())
    }

    pub fn server_error_kind(&self) -> Option<ServerErrorKind> {
        match self {
            AdminError::UnexpectedStatus { actual, .. } => ServerErrorKind::from_status(*actual),
            _ => None,
        }
    }
}

/// Outcome of a request whose status matched the caller's expectation.
#[derive(Debug, Clone)]
pub struct Reply<T> {
    pub status: StatusCode,
    pub body: Vec<u8>,
    /// Set only when the body was decoded.
    pub value: Option<T>,
}

impl<T> Reply<T> {
    pub fn into_value(self) -> Option<T> {
        self.value
    }
}

/// Joins `segments` below `base`, using `/` regardless of the host platform.
pub fn build_url<S: AsRef<str>>(base: &Url, segments: &[S]) -> Result<Url, url::ParseError> {
    let joined = paths::join(segments);
    Url::parse(&format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        joined.trim_start_matches('/')
    ))
}

#[derive(Clone, Debug)]
pub struct AdminClient {
    http: Client,
    config: ClientConfig,
}

impl AdminClient {
    pub fn new(config: ClientConfig) -> Result<Self, AdminError> {
        let http = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Creates `user` and, when `expected` is 200, checks the created user
    /// against the one sent.
    pub async fn add_user(
        &self,
        user: &User,
        expected: StatusCode,
    ) -> Result<Reply<User>, AdminError> {
        let url = self.endpoint(&[USER_PATH])?;
        let response = self.send(Method::POST, url, Some(encode(user)?)).await?;
        let reply: Reply<User> =
            Self::classify(response, expected, expected == DECODE_STATUS).await?;
        if let Some(created) = &reply.value {
            verify_user(user, created)?;
        }
        Ok(reply)
    }

    /// Updates `user` and, when `expected` is 200, fetches it again by ID and
    /// checks the stored version. The PUT body itself is not trusted.
    pub async fn update_user(
        &self,
        user: &User,
        expected: StatusCode,
    ) -> Result<Reply<User>, AdminError> {
        let id = user.id.to_string();
        let url = self.endpoint(&[USER_PATH, &id])?;
        let response = self.send(Method::PUT, url, Some(encode(user)?)).await?;
        let reply: Reply<User> = Self::classify(response, expected, false).await?;
        if expected != DECODE_STATUS {
            return Ok(reply);
        }
        let fetched = self.get_user(user.id, DECODE_STATUS).await?;
        if let Some(stored) = &fetched.value {
            verify_user(user, stored)?;
        }
        Ok(fetched)
    }

    pub async fn remove_user(
        &self,
        user_id: i64,
        expected: StatusCode,
    ) -> Result<Reply<()>, AdminError> {
        let id = user_id.to_string();
        let url = self.endpoint(&[USER_PATH, &id])?;
        let response = self.send(Method::DELETE, url, None).await?;
        Self::classify(response, expected, false).await
    }

    pub async fn get_user(
        &self,
        user_id: i64,
        expected: StatusCode,
    ) -> Result<Reply<User>, AdminError> {
        let id = user_id.to_string();
        let url = self.endpoint(&[USER_PATH, &id])?;
        let response = self.send(Method::GET, url, None).await?;
        Self::classify(response, expected, expected == DECODE_STATUS).await
    }

    /// Lists users. `limit` and `offset` are sent only when positive and
    /// `username`, an exact-match filter, only when non-empty.
    pub async fn list_users(
        &self,
        limit: u32,
        offset: u32,
        username: &str,
        expected: StatusCode,
    ) -> Result<Reply<Vec<User>>, AdminError> {
        let mut query = Vec::new();
        if limit > 0 {
            query.push(("limit", limit.to_string()));
        }
        if offset > 0 {
            query.push(("offset", offset.to_string()));
        }
        if !username.is_empty() {
            query.push(("username", username.to_string()));
        }
        let url = with_query(self.endpoint(&[USER_PATH])?, &query);
        let response = self.send(Method::GET, url, None).await?;
        Self::classify(response, expected, expected == DECODE_STATUS).await
    }

    pub async fn list_quota_scans(
        &self,
        expected: StatusCode,
    ) -> Result<Reply<Vec<QuotaScan>>, AdminError> {
        let url = self.endpoint(&[QUOTA_SCAN_PATH])?;
        let response = self.send(Method::GET, url, None).await?;
        Self::classify(response, expected, expected == DECODE_STATUS).await
    }

    pub async fn start_quota_scan(
        &self,
        user: &User,
        expected: StatusCode,
    ) -> Result<Reply<()>, AdminError> {
        let url = self.endpoint(&[QUOTA_SCAN_PATH])?;
        let response = self.send(Method::POST, url, Some(encode(user)?)).await?;
        Self::classify(response, expected, false).await
    }

    pub async fn list_connections(
        &self,
        expected: StatusCode,
    ) -> Result<Reply<Vec<ConnectionStatus>>, AdminError> {
        let url = self.endpoint(&[CONNECTION_PATH])?;
        let response = self.send(Method::GET, url, None).await?;
        Self::classify(response, expected, expected == DECODE_STATUS).await
    }

    pub async fn close_connection(
        &self,
        connection_id: &str,
        expected: StatusCode,
    ) -> Result<Reply<()>, AdminError> {
        let url = self.endpoint(&[CONNECTION_PATH, connection_id])?;
        let response = self.send(Method::DELETE, url, None).await?;
        Self::classify(response, expected, false).await
    }

    pub async fn version(&self, expected: StatusCode) -> Result<Reply<VersionInfo>, AdminError> {
        let url = self.endpoint(&[VERSION_PATH])?;
        let response = self.send(Method::GET, url, None).await?;
        Self::classify(response, expected, expected == DECODE_STATUS).await
    }

    /// A failing provider is reported as a 500 carrying the same envelope, so
    /// that status is decoded as well.
    pub async fn provider_status(
        &self,
        expected: StatusCode,
    ) -> Result<Reply<ApiMessage>, AdminError> {
        let url = self.endpoint(&[PROVIDER_STATUS_PATH])?;
        let response = self.send(Method::GET, url, None).await?;
        let decode = expected == DECODE_STATUS || expected == StatusCode::INTERNAL_SERVER_ERROR;
        Self::classify(response, expected, decode).await
    }

    /// Asks the server to back up its data to `output_file`, relative to the
    /// server's configured backups directory.
    pub async fn dump_data(
        &self,
        output_file: &str,
        indent: Option<u32>,
        expected: StatusCode,
    ) -> Result<Reply<ApiMessage>, AdminError> {
        let mut query = vec![("output_file", output_file.to_string())];
        if let Some(indent) = indent {
            query.push(("indent", indent.to_string()));
        }
        let url = with_query(self.endpoint(&[DUMP_DATA_PATH])?, &query);
        let response = self.send(Method::GET, url, None).await?;
        Self::classify(response, expected, expected == DECODE_STATUS).await
    }

    /// Restores a backup. The server restores users one at a time and stops at
    /// the first failure, so a failed load may be partial.
    pub async fn load_data(
        &self,
        input_file: &str,
        scan_quota: Option<u32>,
        mode: Option<u32>,
        expected: StatusCode,
    ) -> Result<Reply<ApiMessage>, AdminError> {
        let mut query = vec![("input_file", input_file.to_string())];
        if let Some(scan_quota) = scan_quota {
            query.push(("scan_quota", scan_quota.to_string()));
        }
        if let Some(mode) = mode {
            query.push(("mode", mode.to_string()));
        }
        let url = with_query(self.endpoint(&[LOAD_DATA_PATH])?, &query);
        let response = self.send(Method::GET, url, None).await?;
        Self::classify(response, expected, expected == DECODE_STATUS).await
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, AdminError> {
        Ok(build_url(self.config.base_url(), segments)?)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<Vec<u8>>,
    ) -> Result<reqwest::Response, AdminError> {
        tracing::debug!(%method, %url, "sending admin request");
        let mut request = self.http.request(method, url);
        if let Some(credentials) = self.config.credentials() {
            request = request.basic_auth(&credentials.username, Some(&credentials.password));
        }
        if let Some(body) = body {
            request = request.header(CONTENT_TYPE, "application/json").body(body);
        }
        Ok(request.send().await?)
    }

    async fn classify<T: DeserializeOwned>(
        response: reqwest::Response,
        expected: StatusCode,
        decode: bool,
    ) -> Result<Reply<T>, AdminError> {
        let status = response.status();
        if status != expected {
            tracing::warn!(%status, %expected, "unexpected status code");
            // The mismatch is reported even when the body cannot be read.
            let body = match response.bytes().await {
                Ok(bytes) => bytes.to_vec(),
                Err(err) => {
                    tracing::warn!(%status, error = %err, "failed to read response body");
                    Vec::new()
                }
            };
            return Err(AdminError::UnexpectedStatus {
                expected,
                actual: status,
                body,
            });
        }
        let body = response.bytes().await?.to_vec();
        tracing::debug!(%status, bytes = body.len(), "admin response received");
        let value = if decode {
            Some(serde_json::from_slice(&body).map_err(AdminError::Decode)?)
        } else {
            None
        };
        Ok(Reply {
            status,
            body,
            value,
        })
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, AdminError> {
    serde_json::to_vec(value).map_err(AdminError::Encode)
}

fn with_query(mut url: Url, query: &[(&str, String)]) -> Url {
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    url
}

fn verify_user(expected: &User, actual: &User) -> Result<(), Mismatch> {
    check_user(expected, actual).inspect_err(|mismatch| {
        tracing::warn!(username = %expected.username, %mismatch, "user check failed");
    })
}
