//! Verifies that a user returned by the server is a faithful representation of
//! the user that was sent.
//!
//! Checks run in a fixed order and stop at the first failure: password
//! exposure, identity, permissions, filters, filesystem config, virtual
//! folders, then plain fields. Collections are compared without regard to
//! order and paths are compared after [`paths::clean`].

use std::collections::BTreeMap;

use thiserror::Error;

use crate::models::{Filesystem, GcsConfig, S3Config, User, UserFilters, VirtualFolder};
use crate::paths;
use crate::secret::{self, SecretMismatch};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Mismatch {
    #[error("user password must not be visible")]
    PasswordVisible,
    #[error("actual user ID must be > 0, got {0}")]
    IdNotAssigned(i64),
    #[error("user ID mismatch: expected {expected}, got {actual}")]
    IdChanged { expected: i64, actual: i64 },
    #[error("permissions mismatch: {0}")]
    Permissions(&'static str),
    #[error("filters mismatch: {0}")]
    Filters(&'static str),
    #[error("filesystem config mismatch: {0}")]
    FsConfig(&'static str),
    #[error("{field} mismatch: {reason}")]
    Secret {
        field: &'static str,
        reason: SecretMismatch,
    },
    #[error("virtual folders mismatch: {0}")]
    VirtualFolders(&'static str),
    #[error("{0} mismatch")]
    Field(&'static str),
}

pub fn check_user(expected: &User, actual: &User) -> Result<(), Mismatch> {
    if !actual.password.is_empty() {
        return Err(Mismatch::PasswordVisible);
    }
    check_identity(expected.id, actual.id)?;
    check_permissions(&expected.permissions, &actual.permissions)?;
    check_filters(&expected.filters, &actual.filters)?;
    check_filesystem(&expected.filesystem, &actual.filesystem)?;
    check_virtual_folders(&expected.virtual_folders, &actual.virtual_folders)?;
    check_fields(expected, actual)
}

fn check_identity(expected: i64, actual: i64) -> Result<(), Mismatch> {
    if expected <= 0 {
        if actual <= 0 {
            return Err(Mismatch::IdNotAssigned(actual));
        }
    } else if actual != expected {
        return Err(Mismatch::IdChanged { expected, actual });
    }
    Ok(())
}

fn check_permissions(
    expected: &BTreeMap<String, Vec<String>>,
    actual: &BTreeMap<String, Vec<String>>,
) -> Result<(), Mismatch> {
    if expected.len() != actual.len() {
        return Err(Mismatch::Permissions("directory count"));
    }
    for (dir, perms) in expected {
        let Some(actual_perms) = actual.get(dir) else {
            return Err(Mismatch::Permissions("directories"));
        };
        if !same_members(perms, actual_perms) {
            return Err(Mismatch::Permissions("contents"));
        }
    }
    Ok(())
}

fn check_filters(expected: &UserFilters, actual: &UserFilters) -> Result<(), Mismatch> {
    if !same_members(&actual.allowed_ip, &expected.allowed_ip) {
        return Err(Mismatch::Filters("allowed IP"));
    }
    if !same_members(&actual.denied_ip, &expected.denied_ip) {
        return Err(Mismatch::Filters("denied IP"));
    }
    if !same_members(&actual.denied_login_methods, &expected.denied_login_methods) {
        return Err(Mismatch::Filters("denied login methods"));
    }
    if expected.file_extensions.len() != actual.file_extensions.len() {
        return Err(Mismatch::Filters("file extensions"));
    }
    for filter in &expected.file_extensions {
        let path = paths::clean(&filter.path);
        let mut found = false;
        for other in actual
            .file_extensions
            .iter()
            .filter(|other| paths::clean(&other.path) == path)
        {
            if !same_members(&other.allowed_extensions, &filter.allowed_extensions)
                || !same_members(&other.denied_extensions, &filter.denied_extensions)
            {
                return Err(Mismatch::Filters("file extensions contents"));
            }
            found = true;
        }
        if !found {
            return Err(Mismatch::Filters("file extensions paths"));
        }
    }
    Ok(())
}

fn check_filesystem(expected: &Filesystem, actual: &Filesystem) -> Result<(), Mismatch> {
    if expected.provider != actual.provider {
        return Err(Mismatch::FsConfig("provider"));
    }
    check_s3(&expected.s3config, &actual.s3config)?;
    check_gcs(&expected.gcsconfig, &actual.gcsconfig)
}

fn check_s3(expected: &S3Config, actual: &S3Config) -> Result<(), Mismatch> {
    ensure(expected.bucket == actual.bucket, "S3 bucket")?;
    ensure(expected.region == actual.region, "S3 region")?;
    ensure(expected.access_key == actual.access_key, "S3 access key")?;
    secret::verify(&expected.access_secret, &actual.access_secret).map_err(|reason| {
        Mismatch::Secret {
            field: "S3 access secret",
            reason,
        }
    })?;
    ensure(expected.endpoint == actual.endpoint, "S3 endpoint")?;
    ensure(
        expected.storage_class == actual.storage_class,
        "S3 storage class",
    )?;
    ensure(
        expected.upload_part_size == actual.upload_part_size,
        "S3 upload part size",
    )?;
    ensure(
        expected.upload_concurrency == actual.upload_concurrency,
        "S3 upload concurrency",
    )?;
    ensure(
        same_key_prefix(&expected.key_prefix, &actual.key_prefix),
        "S3 key prefix",
    )
}

fn check_gcs(expected: &GcsConfig, actual: &GcsConfig) -> Result<(), Mismatch> {
    ensure(expected.bucket == actual.bucket, "GCS bucket")?;
    ensure(
        expected.storage_class == actual.storage_class,
        "GCS storage class",
    )?;
    ensure(
        same_key_prefix(&expected.key_prefix, &actual.key_prefix),
        "GCS key prefix",
    )?;
    ensure(
        expected.automatic_credentials == actual.automatic_credentials,
        "GCS automatic credentials",
    )
}

fn check_virtual_folders(
    expected: &[VirtualFolder],
    actual: &[VirtualFolder],
) -> Result<(), Mismatch> {
    if expected.len() != actual.len() {
        return Err(Mismatch::VirtualFolders("count"));
    }
    let normalized: Vec<(String, String)> = expected.iter().map(normalize_folder).collect();
    for folder in actual {
        if !normalized.contains(&normalize_folder(folder)) {
            return Err(Mismatch::VirtualFolders("mappings"));
        }
    }
    Ok(())
}

fn check_fields(expected: &User, actual: &User) -> Result<(), Mismatch> {
    field("username", &expected.username, &actual.username)?;
    field("home dir", &expected.home_dir, &actual.home_dir)?;
    field("uid", &expected.uid, &actual.uid)?;
    field("gid", &expected.gid, &actual.gid)?;
    field("max sessions", &expected.max_sessions, &actual.max_sessions)?;
    field("quota size", &expected.quota_size, &actual.quota_size)?;
    field("quota files", &expected.quota_files, &actual.quota_files)?;
    field(
        "permissions",
        &expected.permissions.len(),
        &actual.permissions.len(),
    )?;
    field(
        "upload bandwidth",
        &expected.upload_bandwidth,
        &actual.upload_bandwidth,
    )?;
    field(
        "download bandwidth",
        &expected.download_bandwidth,
        &actual.download_bandwidth,
    )?;
    field("status", &expected.status, &actual.status)?;
    field(
        "expiration date",
        &expected.expiration_date,
        &actual.expiration_date,
    )
}

/// Equal length and every element of `inner` present in `outer`.
fn same_members(outer: &[String], inner: &[String]) -> bool {
    outer.len() == inner.len() && inner.iter().all(|value| outer.contains(value))
}

/// The server may append a trailing `/` to a key prefix.
fn same_key_prefix(expected: &str, actual: &str) -> bool {
    expected == actual || actual.strip_suffix('/') == Some(expected)
}

fn normalize_folder(folder: &VirtualFolder) -> (String, String) {
    (
        paths::clean(&folder.virtual_path),
        paths::clean(&folder.mapped_path),
    )
}

fn ensure(condition: bool, what: &'static str) -> Result<(), Mismatch> {
    if condition {
        Ok(())
    } else {
        Err(Mismatch::FsConfig(what))
    }
}

fn field<T: PartialEq + ?Sized>(
    name: &'static str,
    expected: &T,
    actual: &T,
) -> Result<(), Mismatch> {
    if expected == actual {
        Ok(())
    } else {
        Err(Mismatch::Field(name))
    }
}
