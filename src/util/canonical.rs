use url::Url;

/// Canonical form of an article or feed URL, used as the deduplication key.
///
/// Whitespace is trimmed and parseable URLs are re-serialized by the `url`
/// crate (lowercase scheme and host, default port dropped, empty path becomes
/// `/`) with any fragment removed. Values that do not parse as absolute URLs
/// are kept trimmed as-is so they still compare stably across passes.
///
/// Returns `None` for empty input: such an entry has no natural key.
pub fn canonical_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    match Url::parse(trimmed) {
        Ok(mut url) => {
            url.set_fragment(None);
            Some(url.into())
        }
        Err(_) => Some(trimmed.to_string()),
    }
}
