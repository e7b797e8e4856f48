mod check;
mod client;
mod config;
mod models;
pub mod paths;
pub mod secret;

pub use check::{Mismatch, check_user};
pub use client::{AdminClient, AdminError, ErrorClass, Reply, build_url};
pub use config::{ClientConfig, Credentials, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
pub use models::{
    ApiMessage, ConnectionStatus, ExtensionsFilter, Filesystem, FsProvider, GcsConfig, QuotaScan,
    S3Config, ServerErrorKind, Transfer, UnknownProvider, User, UserFilters, VersionInfo,
    VirtualFolder,
};
pub use reqwest::StatusCode;
pub use secret::SecretMismatch;
