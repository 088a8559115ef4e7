// Copyright 2026 coursedl contributors
// SPDX-License-Identifier: MIT

//! Small URL and naming helpers shared by the parser and resolver.

use percent_encoding::percent_decode_str;
use url::Url;

/// Strip whitespace from both ends of a URL and add a default scheme if
/// the markup carried a bare host ("example.com/x" happens in practice).
pub fn clean_url(url: &str) -> Option<String> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }
    if Url::parse(url).is_ok() {
        return Some(url.to_string());
    }
    // Schemeless or relative — only promote things that look like a host.
    if !url.starts_with('/') {
        let candidate = format!("http://{url}");
        if Url::parse(&candidate).is_ok() {
            return Some(candidate);
        }
    }
    None
}

/// Derive a usable (filename, extension) pair from a resource URL.
///
/// The platform's URLs are rarely clean paths: subtitle endpoints carry the
/// real format in a `format=` query parameter, and some assets hide the
/// filename behind percent-encoded path separators. Rules, in order:
///
/// 1. take the last non-empty path segment, percent-decoded; if the decoded
///    segment itself contains `/`, take what follows the last one;
/// 2. an extension after the final dot of that segment wins (lowercased);
/// 3. otherwise a `format=` query parameter supplies the extension and is
///    appended to the segment;
/// 4. otherwise the extension is empty.
pub fn derive_filename(url: &Url) -> (String, String) {
    let base = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(|s| percent_decode_str(s).decode_utf8_lossy().into_owned())
        .unwrap_or_default();
    let base = match base.rsplit_once('/') {
        Some((_, tail)) => tail.to_string(),
        None => base,
    };

    if let Some((stem, ext)) = base.rsplit_once('.') {
        if !stem.is_empty() && !ext.is_empty() {
            let ext = ext.to_lowercase();
            return (format!("{stem}.{ext}"), ext);
        }
    }

    if let Some(fmt) = url
        .query_pairs()
        .find(|(k, _)| k == "format")
        .map(|(_, v)| v.to_lowercase())
        .filter(|v| !v.is_empty())
    {
        let filename = if base.is_empty() {
            format!("file.{fmt}")
        } else {
            format!("{base}.{fmt}")
        };
        return (filename, fmt);
    }

    (base, String::new())
}

/// Indentation prefix for nested outline printing.
///
/// Depth is threaded explicitly through the printer instead of living in
/// process-wide formatter state.
pub fn indent(depth: usize) -> String {
    "  ".repeat(depth)
}
