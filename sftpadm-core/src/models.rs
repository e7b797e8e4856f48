use std::collections::BTreeMap;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A user account as exchanged with the `/user` endpoints.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct User {
    pub id: i64,
    /// 1 enabled, 0 disabled.
    pub status: i32,
    pub username: String,
    /// Unix timestamp in milliseconds, 0 means no expiration.
    pub expiration_date: i64,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub password: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub public_keys: Vec<String>,
    pub home_dir: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub virtual_folders: Vec<VirtualFolder>,
    pub uid: i32,
    pub gid: i32,
    pub max_sessions: i32,
    pub quota_size: i64,
    pub quota_files: i32,
    pub permissions: BTreeMap<String, Vec<String>>,
    pub used_quota_size: i64,
    pub used_quota_files: i32,
    pub last_quota_update: i64,
    pub upload_bandwidth: i64,
    pub download_bandwidth: i64,
    pub last_login: i64,
    pub filters: UserFilters,
    pub filesystem: Filesystem,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub additional_info: String,
}

impl User {
    pub fn new(username: impl Into<String>, home_dir: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            home_dir: home_dir.into(),
            status: 1,
            ..Self::default()
        }
    }

    pub fn with_permissions<I, S>(mut self, dir: impl Into<String>, perms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions
            .insert(dir.into(), perms.into_iter().map(Into::into).collect());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct VirtualFolder {
    pub virtual_path: String,
    pub mapped_path: String,
}

impl VirtualFolder {
    pub fn new(virtual_path: impl Into<String>, mapped_path: impl Into<String>) -> Self {
        Self {
            virtual_path: virtual_path.into(),
            mapped_path: mapped_path.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct UserFilters {
    pub allowed_ip: Vec<String>,
    pub denied_ip: Vec<String>,
    pub denied_login_methods: Vec<String>,
    pub file_extensions: Vec<ExtensionsFilter>,
}

/// Allowed and denied file extensions below `path`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExtensionsFilter {
    pub path: String,
    pub allowed_extensions: Vec<String>,
    pub denied_extensions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Filesystem {
    pub provider: FsProvider,
    pub s3config: S3Config,
    pub gcsconfig: GcsConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum FsProvider {
    #[default]
    Local,
    S3,
    Gcs,
}

#[derive(Debug, Error)]
#[error("unknown filesystem provider {0}")]
pub struct UnknownProvider(pub i32);

impl TryFrom<i32> for FsProvider {
    type Error = UnknownProvider;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(FsProvider::Local),
            1 => Ok(FsProvider::S3),
            2 => Ok(FsProvider::Gcs),
            other => Err(UnknownProvider(other)),
        }
    }
}

impl From<FsProvider> for i32 {
    fn from(provider: FsProvider) -> Self {
        match provider {
            FsProvider::Local => 0,
            FsProvider::S3 => 1,
            FsProvider::Gcs => 2,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub access_key: String,
    pub access_secret: String,
    pub endpoint: String,
    pub storage_class: String,
    pub upload_part_size: i64,
    pub upload_concurrency: i32,
    pub key_prefix: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct GcsConfig {
    pub bucket: String,
    /// Base64 service account JSON; write-only, the server never returns it.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub credentials: String,
    pub automatic_credentials: i32,
    pub storage_class: String,
    pub key_prefix: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct QuotaScan {
    pub username: String,
    pub start_time: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectionStatus {
    pub username: String,
    pub connection_id: String,
    pub client_version: String,
    pub remote_address: String,
    pub connection_time: i64,
    pub last_activity: i64,
    pub protocol: String,
    pub ssh_command: String,
    pub active_transfers: Vec<Transfer>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Transfer {
    pub operation_type: String,
    pub path: String,
    pub start_time: i64,
    pub size: i64,
    pub last_activity: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct VersionInfo {
    pub version: String,
    pub build_date: String,
    pub commit_hash: String,
}

/// Envelope the server uses for status, dump, load and error replies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiMessage {
    pub error: String,
    pub message: String,
    pub status: u16,
}

/// Failure families the server reports, each answered with a fixed status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerErrorKind {
    Validation,
    MethodDisabled,
    MissingFile,
    Internal,
}

impl ServerErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            ServerErrorKind::Validation | ServerErrorKind::MissingFile => StatusCode::BAD_REQUEST,
            ServerErrorKind::MethodDisabled => StatusCode::FORBIDDEN,
            ServerErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Inverse of [`ServerErrorKind::status`]. A 400 is reported as
    /// `Validation` since a missing file is indistinguishable on the wire.
    pub fn from_status(status: StatusCode) -> Option<Self> {
        if status == StatusCode::BAD_REQUEST {
            Some(ServerErrorKind::Validation)
        } else if status == StatusCode::FORBIDDEN {
            Some(ServerErrorKind::MethodDisabled)
        } else if status.is_server_error() {
            Some(ServerErrorKind::Internal)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_decodes_server_payload() {
        let json = r#"{
            "id": 7,
            "status": 1,
            "username": "alice",
            "home_dir": "/srv/alice",
            "permissions": {"/": ["list", "download"]},
            "filesystem": {
                "provider": 1,
                "s3config": {"bucket": "b", "access_secret": "$aes$a$b$c"}
            },
            "virtual_folders": [{"virtual_path": "/data", "mapped_path": "/mnt/data"}]
        }"#;
        let user: User = serde_json::from_str(json).unwrap();
        assert_eq!(user.id, 7);
        assert_eq!(user.filesystem.provider, FsProvider::S3);
        assert_eq!(user.filesystem.s3config.access_secret, "$aes$a$b$c");
        assert_eq!(user.permissions["/"], vec!["list", "download"]);
        assert_eq!(user.virtual_folders[0].mapped_path, "/mnt/data");
        assert!(user.filters.allowed_ip.is_empty());
    }

    #[test]
    fn user_encoding_omits_empty_password_and_uses_numeric_provider() {
        let mut user = User::new("bob", "/srv/bob");
        user.filesystem.provider = FsProvider::Gcs;
        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("password").is_none());
        assert_eq!(value["filesystem"]["provider"], 2);
        assert!(value["filesystem"]["gcsconfig"].get("credentials").is_none());
    }

    #[test]
    fn rejects_unknown_provider() {
        let err = serde_json::from_str::<Filesystem>(r#"{"provider": 9}"#).unwrap_err();
        assert!(err.to_string().contains("unknown filesystem provider 9"));
    }

    #[test]
    fn server_error_kind_maps_to_status() {
        assert_eq!(
            ServerErrorKind::Validation.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServerErrorKind::MissingFile.status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServerErrorKind::MethodDisabled.status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServerErrorKind::from_status(StatusCode::BAD_GATEWAY),
            Some(ServerErrorKind::Internal)
        );
        assert_eq!(ServerErrorKind::from_status(StatusCode::NOT_FOUND), None);
    }
}
