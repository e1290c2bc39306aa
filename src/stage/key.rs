use url::Url;

/// Derive the local cache file name for a media URL.
///
/// Uses the last non-empty path segment, sanitized for the local filesystem.
/// Query strings and fragments are ignored, so the same file served with
/// different tokens maps to the same key.
pub fn cache_key(url: &Url) -> Option<String> {
    let segment = url
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .next_back()?;

    let sanitized = sanitize_filename::sanitize(segment);
    let trimmed = sanitized.trim_matches(|c: char| c == '.' || c.is_whitespace());

    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
