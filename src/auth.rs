// Copyright 2026 coursedl contributors
// SPDX-License-Identifier: MIT

//! Session authenticator — drives the multi-step login handshake and
//! keeps a validated, course-scoped session.
//!
//! ## State machine
//!
//! Anonymous → AccountAuthenticated (csrf handshake + credential POST on
//! the accounts host) → CourseAuthenticated (auth redirector mints the
//! course-scoped cookies). Validation is an idempotent HEAD probe: any
//! non-200 means the session went stale, the platform-wide cookies are
//! dropped, and the caller re-runs the handshake.
//!
//! A cookie file explicitly supplied by the user bypasses the whole flow
//! and is trusted without validation — captured jars may come from an auth
//! flow this code does not speak.

use std::path::{Path, PathBuf};

use crate::client::Transport;
use crate::cookies::CookieJar;
use crate::define;
use crate::error::CourseError;

/// Authentication progress of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Anonymous,
    /// Holds the platform-wide auth cookie, valid across all courses.
    AccountAuthenticated,
    /// Additionally holds the course-scoped token for one course path.
    CourseAuthenticated,
}

/// A cookie jar plus the csrf token and where the login flow got to.
///
/// Only the authenticator mutates this; the parser and resolver read the
/// jar through `jar()`.
#[derive(Debug)]
pub struct AuthSession {
    jar: CookieJar,
    csrf_token: Option<String>,
    state: SessionState,
}

impl AuthSession {
    pub fn anonymous() -> Self {
        Self {
            jar: CookieJar::new(),
            csrf_token: None,
            state: SessionState::Anonymous,
        }
    }

    /// Rebuild a session from a cached jar; it only counts as
    /// course-authenticated when the course-scoped token is present.
    pub fn from_cached(jar: CookieJar, course: &str) -> Self {
        let state = if has_course_cookies(&jar, course) {
            SessionState::CourseAuthenticated
        } else {
            SessionState::Anonymous
        };
        Self {
            jar,
            csrf_token: None,
            state,
        }
    }

    /// Load a user-supplied cookie file and trust it as-is.
    ///
    /// Deliberately unvalidated: this is the debugging escape hatch for
    /// jars captured out-of-band. Parse errors here are fatal — the user
    /// pointed us at this exact file.
    pub fn from_cookie_file(path: &Path, course: &str) -> Result<Self, CourseError> {
        let jar = CookieJar::load(path)?.filter_for_course(course);
        tracing::debug!(count = jar.len(), path = %path.display(), "loaded cookie file");
        Ok(Self {
            jar,
            csrf_token: None,
            state: SessionState::CourseAuthenticated,
        })
    }

    pub fn jar(&self) -> &CookieJar {
        &self.jar
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn csrf_token(&self) -> Option<&str> {
        self.csrf_token.as_deref()
    }
}

/// Whether the jar carries the course-scoped session token.
pub fn has_course_cookies(jar: &CookieJar, course: &str) -> bool {
    jar.get(
        define::CSRF_COOKIE,
        define::CLASS_HOST,
        Some(&define::course_path(course)),
    )
    .is_some()
}

/// Cookie-cache file for one user.
pub fn cached_cookie_path(cache_dir: &Path, username: &str) -> PathBuf {
    let safe: String = username
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect();
    cache_dir.join(format!("cookies-{safe}.txt"))
}

/// Runs the login flow against one course and hands out sessions.
pub struct SessionAuthenticator<'a> {
    client: &'a dyn Transport,
    username: String,
    password: String,
}

impl<'a> SessionAuthenticator<'a> {
    pub fn new(client: &'a dyn Transport, username: &str, password: &str) -> Self {
        Self {
            client,
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    /// Produce a course-authenticated session, reusing the cached jar at
    /// `cache_file` when it still validates, and merging the fresh cookies
    /// back into that file after a successful login. The file is shared by
    /// every course the user touches; records for other courses stay put.
    pub async fn establish(
        &self,
        course: &str,
        cache_file: Option<&Path>,
    ) -> Result<AuthSession, CourseError> {
        let mut session = match cache_file {
            Some(path) => match CookieJar::load(path) {
                Ok(jar) => AuthSession::from_cached(jar.filter_for_course(course), course),
                Err(e) => {
                    tracing::warn!(error = %e, "ignoring unreadable cookie cache");
                    AuthSession::anonymous()
                }
            },
            None => AuthSession::anonymous(),
        };

        if session.state == SessionState::CourseAuthenticated {
            match self.validate(&mut session, course).await {
                Ok(()) => {
                    tracing::info!(course, "reusing cached session");
                    return Ok(session);
                }
                Err(e) if e.is_recoverable() => {
                    tracing::debug!(course, "cached session is stale");
                }
                Err(e) => return Err(e),
            }
        }

        self.login_course(&mut session, course).await?;

        if let Some(path) = cache_file {
            if let Err(e) = session.jar.save_into(path) {
                tracing::warn!(error = %e, "failed to persist cookie cache");
            }
        }
        Ok(session)
    }

    /// Step 1: Anonymous → AccountAuthenticated.
    ///
    /// Fetch the course landing page (no redirects) for the csrf token
    /// cookie, then POST credentials to the login endpoint with the token
    /// as both a cookie-style header and `X-CSRFToken`.
    pub async fn login_account(
        &self,
        session: &mut AuthSession,
        course: &str,
    ) -> Result<(), CourseError> {
        session.jar.clear_domain(define::PLATFORM_DOMAIN);

        let landing = self
            .client
            .get_no_redirect(&define::course_url(course), &session.jar)
            .await?;
        if !landing.is_success() {
            return Err(CourseError::CourseNotFound(course.to_string()));
        }
        let token = landing
            .cookie_value(define::CSRF_COOKIE)
            .ok_or(CourseError::CsrfTokenMissing)?
            .to_string();

        let headers = [
            ("Cookie", format!("csrftoken={token}")),
            ("Referer", define::SIGNIN_REFERER.to_string()),
            ("X-CSRFToken", token.clone()),
        ];
        let form = [
            ("email", self.username.as_str()),
            ("password", self.password.as_str()),
        ];
        let response = self
            .client
            .post_form(define::LOGIN_URL, &session.jar, &form, &headers)
            .await?;
        if !response.is_success() {
            return Err(CourseError::Authentication(format!(
                "login endpoint returned {}",
                response.status
            )));
        }

        session.jar.merge(response.cookies);
        if session
            .jar
            .get(define::AUTH_COOKIE, define::PLATFORM_DOMAIN, None)
            .is_none()
        {
            return Err(CourseError::Authentication(format!(
                "no {} cookie after login as {}",
                define::AUTH_COOKIE,
                self.username
            )));
        }

        session.csrf_token = Some(token);
        session.state = SessionState::AccountAuthenticated;
        tracing::info!("logged in on the accounts host");
        Ok(())
    }

    /// Step 2: AccountAuthenticated → CourseAuthenticated.
    ///
    /// Runs step 1 first when the platform-wide auth cookie is absent,
    /// then hits the course auth redirector (following redirects, since
    /// the course cookies are set mid-chain) and requires the
    /// course-scoped token afterwards.
    pub async fn login_course(
        &self,
        session: &mut AuthSession,
        course: &str,
    ) -> Result<(), CourseError> {
        if session
            .jar
            .get(define::AUTH_COOKIE, define::PLATFORM_DOMAIN, None)
            .is_some()
        {
            tracing::debug!("already logged in on the accounts host");
        } else {
            self.login_account(session, course).await?;
        }

        session
            .jar
            .clear_domain_path(define::CLASS_HOST, &define::course_path(course));

        let response = self
            .client
            .get(&define::auth_redirect_url(course), &session.jar)
            .await?;
        if !response.is_success() {
            return Err(CourseError::CourseAuthentication(format!(
                "auth redirector returned {}",
                response.status
            )));
        }
        session.jar.merge(response.cookies);

        if !has_course_cookies(&session.jar, course) {
            return Err(CourseError::MissingCourseCookie(course.to_string()));
        }

        session.state = SessionState::CourseAuthenticated;
        tracing::info!(course, "found course authentication cookies");
        Ok(())
    }

    /// Idempotent validity probe: HEAD the class page without following
    /// redirects. Anything but 200 means stale — the platform-wide
    /// cookies are dropped and the session reverts to Anonymous.
    pub async fn validate(
        &self,
        session: &mut AuthSession,
        course: &str,
    ) -> Result<(), CourseError> {
        if !has_course_cookies(&session.jar, course) {
            return self.mark_stale(session, course);
        }
        let response = self
            .client
            .head_no_redirect(&define::class_url(course), &session.jar)
            .await?;
        if response.status == 200 {
            Ok(())
        } else {
            tracing::debug!(status = response.status, course, "stale session");
            self.mark_stale(session, course)
        }
    }

    fn mark_stale(&self, session: &mut AuthSession, course: &str) -> Result<(), CourseError> {
        session.jar.clear_domain(define::PLATFORM_DOMAIN);
        session.csrf_token = None;
        session.state = SessionState::Anonymous;
        Err(CourseError::StaleSession(course.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cookies::CookieRecord;

    fn course_cookie(course: &str) -> CookieRecord {
        CookieRecord {
            domain: define::CLASS_HOST.to_string(),
            include_subdomains: false,
            path: define::course_path(course),
            secure: false,
            expires: None,
            name: define::CSRF_COOKIE.to_string(),
            value: "tok".to_string(),
        }
    }

    #[test]
    fn test_from_cached_state_depends_on_course_cookie() {
        let mut jar = CookieJar::new();
        jar.set(course_cookie("nlp-001"));

        let session = AuthSession::from_cached(jar.clone(), "nlp-001");
        assert_eq!(session.state(), SessionState::CourseAuthenticated);

        let session = AuthSession::from_cached(jar, "other-002");
        assert_eq!(session.state(), SessionState::Anonymous);

        let session = AuthSession::anonymous();
        assert_eq!(session.state(), SessionState::Anonymous);
        assert!(session.csrf_token().is_none());
    }

    #[test]
    fn test_has_course_cookies_requires_exact_path() {
        let mut jar = CookieJar::new();
        jar.set(course_cookie("nlp-001"));
        assert!(has_course_cookies(&jar, "nlp-001"));
        assert!(!has_course_cookies(&jar, "nlp-002"));
    }

    #[test]
    fn test_cached_cookie_path_sanitizes_username() {
        let path = cached_cookie_path(Path::new("/tmp/cache"), "user@example.com");
        assert_eq!(
            path,
            PathBuf::from("/tmp/cache/cookies-user_example.com.txt")
        );
    }
}
