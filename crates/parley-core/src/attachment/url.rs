//! Attachment URL normalization.
//!
//! Attachments arrive as absolute URLs, backend-relative upload paths, or
//! base64 data URIs. Everything that renders or classifies an attachment goes
//! through these helpers so the rules live in one place.

use tracing::debug;
use url::{ParseError, Url};

/// Label used when a URL has no usable trailing segment.
const FALLBACK_LABEL: &str = "attachment";

/// Whether `url` is an inline `data:` URI.
pub fn is_data_uri(url: &str) -> bool {
    url.trim_start()
        .get(..5)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("data:"))
}

/// MIME type declared by a data URI (`data:image/png;base64,...` -> `image/png`).
pub fn data_uri_mime(url: &str) -> Option<String> {
    if !is_data_uri(url) {
        return None;
    }
    let rest = &url.trim_start()[5..];
    let header = rest.split(',').next().unwrap_or_default();
    let mime = header.split(';').next().unwrap_or_default().trim();
    if mime.is_empty() {
        None
    } else {
        Some(mime.to_lowercase())
    }
}

/// Base for resolving references that are not absolute URLs on their own.
const RELATIVE_ROOT: &str = "http://relative.invalid/";

/// Parse `raw` as an absolute URL, or as a reference relative to a dummy root.
fn parse_reference(raw: &str) -> Option<Url> {
    match Url::parse(raw) {
        Ok(url) => Some(url),
        Err(ParseError::RelativeUrlWithoutBase) => Url::parse(RELATIVE_ROOT).ok()?.join(raw).ok(),
        Err(_) => None,
    }
}

/// `raw` as an absolute `http(s)` URL, if it is one.
pub fn absolute_http_url(raw: &str) -> Option<Url> {
    Url::parse(raw.trim())
        .ok()
        .filter(|url| matches!(url.scheme(), "http" | "https"))
}

/// Turn a raw attachment reference into something a client can fetch.
///
/// - data URIs and references that carry their own scheme are returned unchanged
/// - protocol-relative `//host/path` gains `https:`
/// - `/uploads/x`, `uploads/x` and `../uploads/x` resolve against the backend origin
///
/// Returns `None` for blank input.
pub fn normalize_attachment_url(base_url: &str, raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if is_data_uri(raw) {
        return Some(raw.to_string());
    }
    if raw.starts_with("//") {
        return Url::parse(&format!("https:{raw}")).ok().map(String::from);
    }
    match Url::parse(raw) {
        Ok(_) => return Some(raw.to_string()),
        Err(ParseError::RelativeUrlWithoutBase) => {}
        Err(err) => {
            debug!(reference = raw, error = %err, "Unparseable attachment reference");
            return None;
        }
    }

    let path = format!("/{}", raw.trim_start_matches("./").trim_start_matches('/'));
    match Url::parse(base_url.trim()).and_then(|base| base.join(&path)) {
        Ok(url) => Some(url.into()),
        Err(err) => {
            debug!(base_url, error = %err, "Backend origin unusable, keeping relative path");
            Some(path)
        }
    }
}

/// Last non-empty path segment of `url`, still percent-encoded.
fn last_segment(url: &str) -> Option<String> {
    let parsed = parse_reference(url)?;
    let segment = parsed.path_segments()?.rev().find(|s| !s.is_empty())?;
    Some(segment.to_string())
}

/// Lowercased extension of the URL's last path segment, if any.
///
/// Data URIs have no extension.
pub fn extension_of(url: &str) -> Option<String> {
    if is_data_uri(url) {
        return None;
    }
    let segment = last_segment(url.trim())?;
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Display label for a downloadable attachment: its decoded trailing path segment.
pub fn file_label(url: &str) -> String {
    if is_data_uri(url) {
        return FALLBACK_LABEL.to_string();
    }
    last_segment(url.trim())
        .map(|segment| match urlencoding::decode(&segment) {
            Ok(decoded) => decoded.into_owned(),
            Err(_) => segment,
        })
        .unwrap_or_else(|| FALLBACK_LABEL.to_string())
}
