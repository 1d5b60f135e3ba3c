//! Object key validation and generation.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::error::StorageError;

/// Longest key accepted by S3 and OSS, in bytes.
pub const MAX_KEY_LEN: usize = 1024;

/// Validate a provider-relative object key.
///
/// Keys must be non-empty, relative, free of `.`/`..` and empty segments, and
/// contain no backslashes or control characters.
///
/// # Errors
///
/// Returns [`StorageError::InvalidKey`] naming the first violated rule.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let reject = |reason: &str| Err(StorageError::invalid_key(key, reason));

    if key.trim().is_empty() {
        return reject("key is empty");
    }
    if key.len() > MAX_KEY_LEN {
        return reject("key exceeds 1024 bytes");
    }
    if key.starts_with('/') {
        return reject("key must be relative");
    }
    if key.contains('\\') {
        return reject("backslashes are not allowed");
    }
    if key.chars().any(char::is_control) {
        return reject("control characters are not allowed");
    }
    // A trailing slash names a directory marker, so the last segment may be empty.
    let body = key.strip_suffix('/').unwrap_or(key);
    for segment in body.split('/') {
        match segment {
            "" => return reject("empty path segment"),
            "." | ".." => return reject("path traversal"),
            _ => {}
        }
    }
    Ok(())
}

/// Build a key in the temporary upload namespace.
///
/// Format: `{prefix}/{yyyy}/{mm}/{dd}/{uuid}-{sanitized_filename}`
#[must_use]
pub fn temp_key(prefix: &str, filename: &str, now: DateTime<Utc>) -> String {
    format!(
        "{}/{}/{}-{}",
        prefix.trim_matches('/'),
        now.format("%Y/%m/%d"),
        Uuid::new_v4(),
        sanitize_filename(filename)
    )
}

/// Normalize a namespace prefix to `name/` form.
#[must_use]
pub fn namespace(prefix: &str) -> String {
    format!("{}/", prefix.trim_matches('/'))
}

/// Sanitize filename for storage key.
///
/// Only allows ASCII alphanumeric characters, dots, hyphens, and underscores.
#[must_use]
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rstest::rstest;

    #[rstest]
    #[case("manuals/x5/engine.pdf")]
    #[case("a")]
    #[case("temp/2026/01/01/abc-file.png")]
    #[case("folder/")]
    #[case("names with spaces/ok.txt")]
    fn test_valid_keys(#[case] key: &str) {
        assert!(validate_key(key).is_ok(), "{key} should be valid");
    }

    #[rstest]
    #[case("")]
    #[case("   ")]
    #[case("/absolute/key")]
    #[case("../secret")]
    #[case("a/../b")]
    #[case("a/./b")]
    #[case("a//b")]
    #[case("a\\b")]
    #[case("line\nbreak")]
    fn test_invalid_keys(#[case] key: &str) {
        assert!(matches!(
            validate_key(key),
            Err(StorageError::InvalidKey { .. })
        ));
    }

    #[test]
    fn test_key_too_long() {
        let key = "k".repeat(MAX_KEY_LEN + 1);
        assert!(validate_key(&key).is_err());
        assert!(validate_key(&key[..MAX_KEY_LEN]).is_ok());
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("manual.pdf"), "manual.pdf");
        assert_eq!(sanitize_filename("my file (1).pdf"), "my_file__1_.pdf");
        assert_eq!(sanitize_filename("日本語.pdf"), "___.pdf");
    }

    #[test]
    fn test_temp_key_format() {
        let now = Utc.with_ymd_and_hms(2026, 3, 7, 12, 0, 0).unwrap();
        let key = temp_key("/temp/", "wiring diagram.png", now);

        let parts: Vec<&str> = key.split('/').collect();
        assert_eq!(parts.len(), 5);
        assert_eq!(&parts[..4], &["temp", "2026", "03", "07"]);
        assert!(parts[4].ends_with("-wiring_diagram.png"));
        assert!(validate_key(&key).is_ok());
    }

    #[test]
    fn test_namespace() {
        assert_eq!(namespace("temp"), "temp/");
        assert_eq!(namespace("/temp/"), "temp/");
    }
}
