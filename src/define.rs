// Copyright 2026 coursedl contributors
// SPDX-License-Identifier: MIT

//! Platform constants — hosts, endpoint URLs, cookie names, and the
//! markup/URL markers the parser keys on.

/// Platform-wide cookie domain (leading dot: shared across subdomains).
pub const PLATFORM_DOMAIN: &str = ".coursera.org";

/// Host serving per-course class pages.
pub const CLASS_HOST: &str = "class.coursera.org";

/// Login endpoint on the accounts host.
pub const LOGIN_URL: &str = "https://accounts.coursera.org/api/v1/login";

/// Referer the login endpoint expects.
pub const SIGNIN_REFERER: &str = "https://accounts.coursera.org/signin";

/// Platform-wide authenticated-session cookie set by a successful login.
pub const AUTH_COOKIE: &str = "CAUTH";

/// CSRF token cookie, both platform-wide (login handshake) and
/// course-scoped (class session).
pub const CSRF_COOKIE: &str = "csrf_token";

/// CDN host suffix; resources served from here are kept even without a
/// file extension (many of them lack one).
pub const CDN_SUFFIX: &str = ".cloudfront.net";

/// URLs containing this substring point at raw, uncompressed source
/// videos — huge duplicates of the compressed mp4, always skipped.
pub const RAW_VIDEO_MARKER: &str = "source_video";

/// MIME type advertised by the platform's in-page video player.
pub const VIDEO_MIME: &str = "video/mp4";

/// Landing page for a course.
pub fn course_url(course: &str) -> String {
    format!("https://{CLASS_HOST}/{course}")
}

/// Class page used to probe whether a session is still valid.
pub fn class_url(course: &str) -> String {
    format!("https://{CLASS_HOST}/{course}/class")
}

/// Syllabus (lecture listing) page.
pub fn lecture_index_url(course: &str) -> String {
    format!("https://{CLASS_HOST}/{course}/lecture/index")
}

/// Authentication redirector that mints the course-scoped cookies.
pub fn auth_redirect_url(course: &str) -> String {
    format!("https://{CLASS_HOST}/{course}/auth/auth_redirector?type=login&subtype=normal")
}

/// Cookie path scoping a course-level session cookie.
pub fn course_path(course: &str) -> String {
    format!("/{course}")
}
