// Copyright 2026 coursedl contributors
// SPDX-License-Identifier: MIT

//! Error taxonomy for authentication, cookie handling, and parsing.

use std::path::PathBuf;

/// All errors produced by the session and parsing layers.
///
/// `StaleSession` is recoverable: the authenticator catches it, clears the
/// platform-wide cookies, and re-runs the login handshake. Everything else
/// is fatal for the course it occurred on; the CLI moves on to the next
/// course rather than aborting the whole run.
#[derive(thiserror::Error, Debug)]
pub enum CourseError {
    #[error("malformed cookie file {path}: {reason}")]
    MalformedCookieFile { path: PathBuf, reason: String },

    #[error("could not find course: {0}")]
    CourseNotFound(String),

    #[error("failed to find csrf token cookie")]
    CsrfTokenMissing,

    #[error("cannot login on accounts host: {0}")]
    Authentication(String),

    #[error("cannot login on class host: {0}")]
    CourseAuthentication(String),

    #[error("did not find the course session cookie for {0}")]
    MissingCourseCookie(String),

    #[error("stale session for {0}")]
    StaleSession(String),

    #[error("syllabus parse error: {0}")]
    Parse(String),

    #[error("network error after {attempts} attempts: {source}")]
    Network {
        attempts: u32,
        #[source]
        source: reqwest::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CourseError {
    /// Whether the authenticator may recover by re-running the login flow.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, CourseError::StaleSession(_))
    }
}
