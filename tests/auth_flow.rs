// Copyright 2026 coursedl contributors
// SPDX-License-Identifier: MIT

//! Login handshake driven through a scripted transport.
//!
//! Each test queues the responses the platform would return and asserts
//! both the resulting session state and the exact request sequence.

use std::collections::VecDeque;
use std::sync::Mutex;

use coursedl::auth::{SessionAuthenticator, SessionState};
use coursedl::client::{PageResponse, Transport};
use coursedl::cookies::{CookieJar, CookieRecord};
use coursedl::error::CourseError;
use tempfile::TempDir;

fn cookie(domain: &str, path: &str, name: &str, value: &str) -> CookieRecord {
    CookieRecord {
        domain: domain.to_string(),
        include_subdomains: domain.starts_with('.'),
        path: path.to_string(),
        secure: false,
        expires: None,
        name: name.to_string(),
        value: value.to_string(),
    }
}

fn response(status: u16, cookies: Vec<CookieRecord>) -> PageResponse {
    PageResponse {
        url: String::new(),
        final_url: String::new(),
        status,
        body: String::new(),
        cookies,
    }
}

/// Replays a queue of canned responses and logs every request made.
#[derive(Default)]
struct ScriptedTransport {
    responses: Mutex<VecDeque<PageResponse>>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedTransport {
    fn new(responses: Vec<PageResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn next(&self, op: &str, url: &str) -> Result<PageResponse, CourseError> {
        self.requests.lock().unwrap().push(format!("{op} {url}"));
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| CourseError::Parse(format!("unscripted request: {op} {url}")))
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn get(&self, url: &str, _jar: &CookieJar) -> Result<PageResponse, CourseError> {
        self.next("GET", url)
    }

    async fn get_no_redirect(
        &self,
        url: &str,
        _jar: &CookieJar,
    ) -> Result<PageResponse, CourseError> {
        self.next("GET", url)
    }

    async fn head_no_redirect(
        &self,
        url: &str,
        _jar: &CookieJar,
    ) -> Result<PageResponse, CourseError> {
        self.next("HEAD", url)
    }

    async fn post_form(
        &self,
        url: &str,
        _jar: &CookieJar,
        _form: &[(&str, &str)],
        _extra_headers: &[(&str, String)],
    ) -> Result<PageResponse, CourseError> {
        self.next("POST", url)
    }
}

fn cached_jar(course: &str) -> CookieJar {
    let mut jar = CookieJar::new();
    jar.set(cookie(".coursera.org", "/", "CAUTH", "cached"));
    jar.set(cookie(
        "class.coursera.org",
        &format!("/{course}"),
        "csrf_token",
        "cached",
    ));
    jar
}

/// The four responses of a full, successful login for `course`.
fn login_script(course: &str) -> Vec<PageResponse> {
    vec![
        // Landing page mints the handshake token.
        response(
            200,
            vec![cookie("class.coursera.org", "/", "csrf_token", "handshake")],
        ),
        // Credential POST mints the platform-wide auth cookie.
        response(200, vec![cookie(".coursera.org", "/", "CAUTH", "fresh")]),
        // Auth redirector mints the course-scoped session.
        response(
            200,
            vec![cookie(
                "class.coursera.org",
                &format!("/{course}"),
                "csrf_token",
                "fresh",
            )],
        ),
    ]
}

#[tokio::test]
async fn cached_session_that_validates_is_reused() {
    let dir = TempDir::new().unwrap();
    let cache = dir.path().join("cookies-u.txt");
    cached_jar("nlp-001").save(&cache).unwrap();

    let transport = ScriptedTransport::new(vec![response(200, vec![])]);
    let auth = SessionAuthenticator::new(&transport, "u@example.com", "pw");
    let session = auth.establish("nlp-001", Some(cache.as_path())).await.unwrap();

    assert_eq!(session.state(), SessionState::CourseAuthenticated);
    assert_eq!(
        session.jar().get("CAUTH", ".coursera.org", None).unwrap().value,
        "cached"
    );
    assert_eq!(
        transport.requests(),
        vec!["HEAD https://class.coursera.org/nlp-001/class"]
    );
}

#[tokio::test]
async fn stale_cached_session_relogs_in() {
    let dir = TempDir::new().unwrap();
    let cache = dir.path().join("cookies-u.txt");
    cached_jar("nlp-001").save(&cache).unwrap();

    // Validation probe bounces, then the full handshake runs.
    let mut script = vec![response(302, vec![])];
    script.extend(login_script("nlp-001"));
    let transport = ScriptedTransport::new(script);

    let auth = SessionAuthenticator::new(&transport, "u@example.com", "pw");
    let session = auth.establish("nlp-001", Some(cache.as_path())).await.unwrap();

    assert_eq!(session.state(), SessionState::CourseAuthenticated);
    assert_eq!(
        session.jar().get("CAUTH", ".coursera.org", None).unwrap().value,
        "fresh"
    );
    assert_eq!(
        transport.requests(),
        vec![
            "HEAD https://class.coursera.org/nlp-001/class",
            "GET https://class.coursera.org/nlp-001",
            "POST https://accounts.coursera.org/api/v1/login",
            "GET https://class.coursera.org/nlp-001/auth/auth_redirector?type=login&subtype=normal",
        ]
    );

    // The refreshed cookies landed back in the cache file.
    let persisted = CookieJar::load(&cache).unwrap();
    assert_eq!(
        persisted.get("CAUTH", ".coursera.org", None).unwrap().value,
        "fresh"
    );
}

#[tokio::test]
async fn missing_course_fails_before_credentials_are_sent() {
    let transport = ScriptedTransport::new(vec![response(404, vec![])]);
    let auth = SessionAuthenticator::new(&transport, "u@example.com", "pw");
    let err = auth.establish("gone-404", None).await.unwrap_err();

    assert!(matches!(err, CourseError::CourseNotFound(_)));
    assert_eq!(transport.requests().len(), 1);
}

#[tokio::test]
async fn landing_page_without_token_cookie_is_fatal() {
    let transport = ScriptedTransport::new(vec![response(200, vec![])]);
    let auth = SessionAuthenticator::new(&transport, "u@example.com", "pw");
    let err = auth.establish("nlp-001", None).await.unwrap_err();

    assert!(matches!(err, CourseError::CsrfTokenMissing));
}

#[tokio::test]
async fn auth_redirector_must_mint_the_course_cookie() {
    let mut script = login_script("nlp-001");
    // Redirector answers 200 but sets nothing.
    script[2] = response(200, vec![]);
    let transport = ScriptedTransport::new(script);

    let auth = SessionAuthenticator::new(&transport, "u@example.com", "pw");
    let err = auth.establish("nlp-001", None).await.unwrap_err();

    assert!(matches!(err, CourseError::MissingCourseCookie(_)));
}

#[tokio::test]
async fn rejected_credentials_surface_as_authentication_error() {
    let mut script = login_script("nlp-001");
    script[1] = response(401, vec![]);
    let transport = ScriptedTransport::new(script);

    let auth = SessionAuthenticator::new(&transport, "u@example.com", "pw");
    let err = auth.establish("nlp-001", None).await.unwrap_err();

    assert!(matches!(err, CourseError::Authentication(_)));
}
