/// Checks whether the given bytes form a runtime object reference.
///
/// Accepts the alphabet shared by Docker container ids and container names:
/// the first byte must be an ASCII letter or digit, every following byte an
/// ASCII letter, digit, `_`, `.` or `-`. Empty input is rejected.
///
/// The result is also safe to use as a single path component, which the
/// namespace resolver relies on when it names mount entries after container ids.
pub(super) fn is_object_reference(src: &[u8]) -> bool {
    let Some((first, rest)) = src.split_first() else {
        return false;
    };

    first.is_ascii_alphanumeric()
        && rest
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-'))
}

/// Strips the digest algorithm prefix off an image id, if present.
pub(super) fn strip_digest_prefix(src: &str) -> &str {
    src.strip_prefix("sha256:").unwrap_or(src)
}
