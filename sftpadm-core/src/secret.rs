//! Rules for `$aes$`-tagged secrets.
//!
//! The server never echoes a secret in plaintext. An encrypted value is the
//! prefix followed by `$`-delimited segments: three segments for a value as
//! stored by the server, four when a removable decryption-key marker is still
//! appended as the last segment.

use thiserror::Error;

pub const ENCRYPTED_PREFIX: &str = "$aes$";

/// Segments of an encrypted value without the key marker.
pub const SEALED_SEGMENTS: usize = 3;
/// Segments of an encrypted value that still carries the key marker.
pub const KEYED_SEGMENTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SecretMismatch {
    #[error("invalid secret, an encrypted value is required")]
    Invalid,
    #[error("encrypted secret differs from the expected value")]
    EncryptedDiffers,
    #[error("secret differs from the key-stripped expected value")]
    KeyStrippedDiffers,
    #[error("secret must stay empty")]
    NotEmpty,
}

/// Number of segments after the prefix, or `None` when `value` is not an
/// encrypted value.
///
/// This is stricter than counting the raw `$`-separated parts: a value with
/// an empty segment, such as `$aes$a$$c` or `$aes$a$b$`, is rejected rather
/// than counted, and is treated as plaintext.
pub fn segment_count(value: &str) -> Option<usize> {
    let rest = value.strip_prefix(ENCRYPTED_PREFIX)?;
    let mut count = 0;
    for segment in rest.split('$') {
        if segment.is_empty() {
            return None;
        }
        count += 1;
    }
    Some(count)
}

pub fn is_sealed(value: &str) -> bool {
    segment_count(value) == Some(SEALED_SEGMENTS)
}

/// Drops the decryption-key marker from a keyed value. Anything else is not
/// keyed and yields `None`.
pub fn remove_key_marker(value: &str) -> Option<&str> {
    if segment_count(value) != Some(KEYED_SEGMENTS) {
        return None;
    }
    value.rfind('$').map(|idx| &value[..idx])
}

/// Checks that `actual`, as returned by the server, is a valid representation
/// of the `expected` secret sent by the caller. Plaintext is never compared
/// against ciphertext.
pub fn verify(expected: &str, actual: &str) -> Result<(), SecretMismatch> {
    if expected.is_empty() {
        return if actual.is_empty() {
            Ok(())
        } else {
            Err(SecretMismatch::NotEmpty)
        };
    }
    if let Some(stripped) = remove_key_marker(expected) {
        return if stripped == actual {
            Ok(())
        } else {
            Err(SecretMismatch::KeyStrippedDiffers)
        };
    }
    if !is_sealed(actual) {
        return Err(SecretMismatch::Invalid);
    }
    // Re-encryption uses fresh nonce material, so only an already sealed
    // value can be required to come back byte for byte.
    if is_sealed(expected) && expected != actual {
        return Err(SecretMismatch::EncryptedDiffers);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_segments_after_prefix() {
        assert_eq!(segment_count("$aes$a$b$c"), Some(3));
        assert_eq!(segment_count("$aes$a$b$c$d"), Some(4));
        assert_eq!(segment_count("$aes$"), None);
        assert_eq!(segment_count("$aes$a$$c"), None);
        assert_eq!(segment_count("$aes$a$b$"), None);
        assert_eq!(segment_count("s3cr3t"), None);
        assert_eq!(segment_count("$rsa$a$b$c"), None);
    }

    #[test]
    fn removes_trailing_key_marker() {
        assert_eq!(remove_key_marker("$aes$a$b$c$d"), Some("$aes$a$b$c"));
        assert_eq!(remove_key_marker("$aes$a$b$c"), None);
        assert_eq!(remove_key_marker("plain"), None);
    }

    #[test]
    fn plaintext_requires_sealed_value() {
        assert_eq!(verify("s3cr3t", "$aes$k$n$c"), Ok(()));
        assert_eq!(verify("s3cr3t", "s3cr3t"), Err(SecretMismatch::Invalid));
        assert_eq!(verify("s3cr3t", "$aes$k$n"), Err(SecretMismatch::Invalid));
        assert_eq!(
            verify("s3cr3t", "$aes$k$n$c$m"),
            Err(SecretMismatch::Invalid)
        );
        assert_eq!(verify("s3cr3t", ""), Err(SecretMismatch::Invalid));
    }

    #[test]
    fn keyed_value_must_match_after_marker_removal() {
        assert_eq!(verify("$aes$a$b$c$d", "$aes$a$b$c"), Ok(()));
        assert_eq!(
            verify("$aes$a$b$c$d", "$aes$a$b$x"),
            Err(SecretMismatch::KeyStrippedDiffers)
        );
        assert_eq!(
            verify("$aes$a$b$c$d", "$aes$a$b$c$d"),
            Err(SecretMismatch::KeyStrippedDiffers)
        );
    }

    #[test]
    fn sealed_value_must_come_back_verbatim() {
        assert_eq!(verify("$aes$a$b$c", "$aes$a$b$c"), Ok(()));
        assert_eq!(
            verify("$aes$a$b$c", "$aes$x$y$z"),
            Err(SecretMismatch::EncryptedDiffers)
        );
    }

    #[test]
    fn empty_secret_stays_empty() {
        assert_eq!(verify("", ""), Ok(()));
        assert_eq!(verify("", "$aes$a$b$c"), Err(SecretMismatch::NotEmpty));
    }
}
