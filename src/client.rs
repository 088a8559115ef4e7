// Copyright 2026 coursedl contributors
// SPDX-License-Identifier: MIT

//! HTTP client for the authenticator and parser.
//!
//! Redirects are never delegated to reqwest: cookie-bearing hops in the
//! login flow set session cookies mid-chain, so `get` follows `Location`
//! by hand and records the `Set-Cookie` headers of every hop. The caller's
//! jar is read-only here — response cookies are handed back as parsed
//! records and only the authenticator decides what to merge.

use std::time::Duration;

use cookie::Cookie as RawCookie;
use reqwest::header::{self, HeaderMap};
use reqwest::Method;
use time::OffsetDateTime;
use url::Url;

use crate::cookies::{CookieJar, CookieRecord};
use crate::error::CourseError;

/// Attempts per request: the first try plus two immediate retries.
const MAX_ATTEMPTS: u32 = 3;

/// Redirect-chain cap for manually followed GETs.
const MAX_REDIRECTS: usize = 5;

/// Full-request timeout applied to each attempt.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                          AppleWebKit/537.36 (KHTML, like Gecko) \
                          Chrome/131.0.0.0 Safari/537.36";

/// Response from one logical operation (redirects already followed where
/// the operation asked for that).
#[derive(Debug, Clone)]
pub struct PageResponse {
    /// Originally requested URL.
    pub url: String,
    /// Final URL after any manually followed redirects.
    pub final_url: String,
    /// HTTP status of the final hop.
    pub status: u16,
    /// Body text of the final hop (empty for HEAD).
    pub body: String,
    /// Cookies set by any hop, in arrival order.
    pub cookies: Vec<CookieRecord>,
}

impl PageResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Value of a response cookie by name, if any hop set it.
    pub fn cookie_value(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.value.as_str())
    }
}

/// Result of a single hop, before redirect handling.
struct Hop {
    status: u16,
    location: Option<String>,
    cookies: Vec<CookieRecord>,
    body: String,
}

/// Sequential HTTP client: one request outstanding at a time, three
/// attempts per request, no backoff beyond immediate retry.
pub struct CourseClient {
    client: reqwest::Client,
}

impl CourseClient {
    pub fn new() -> Result<Self, CourseError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| CourseError::Network {
                attempts: 0,
                source: e,
            })?;
        Ok(Self { client })
    }
}

/// HTTP operations the authenticator and parser run. `CourseClient` is
/// the live implementation; tests script responses instead, the same way
/// the parser side is driven through `PageFetcher`.
#[async_trait::async_trait]
pub trait Transport: Sync {
    /// GET following redirects, collecting cookies from every hop.
    async fn get(&self, url: &str, jar: &CookieJar) -> Result<PageResponse, CourseError>;

    /// GET a single hop, never following redirects.
    async fn get_no_redirect(
        &self,
        url: &str,
        jar: &CookieJar,
    ) -> Result<PageResponse, CourseError>;

    /// HEAD a single hop, never following redirects.
    async fn head_no_redirect(
        &self,
        url: &str,
        jar: &CookieJar,
    ) -> Result<PageResponse, CourseError>;

    /// POST a url-encoded form with extra headers, never following redirects.
    async fn post_form(
        &self,
        url: &str,
        jar: &CookieJar,
        form: &[(&str, &str)],
        extra_headers: &[(&str, String)],
    ) -> Result<PageResponse, CourseError>;
}

#[async_trait::async_trait]
impl Transport for CourseClient {
    /// GET following redirects manually, collecting cookies from every hop.
    async fn get(&self, url: &str, jar: &CookieJar) -> Result<PageResponse, CourseError> {
        let mut current = parse_url(url)?;
        // Cookies set earlier in the chain must be replayed on later hops.
        let mut chain_jar = jar.clone();
        let mut collected = Vec::new();

        for _ in 0..=MAX_REDIRECTS {
            let hop = self
                .attempt(Method::GET, &current, &chain_jar, &[], None, true)
                .await?;
            chain_jar.merge(hop.cookies.iter().cloned());
            collected.extend(hop.cookies);

            if matches!(hop.status, 301 | 302 | 303 | 307 | 308) {
                if let Some(location) = hop.location {
                    current = current.join(&location).map_err(|_| {
                        CourseError::Parse(format!("unresolvable redirect target: {location}"))
                    })?;
                    continue;
                }
            }

            return Ok(PageResponse {
                url: url.to_string(),
                final_url: current.to_string(),
                status: hop.status,
                body: hop.body,
                cookies: collected,
            });
        }
        Err(CourseError::Parse(format!(
            "redirect chain exceeded {MAX_REDIRECTS} hops at {url}"
        )))
    }

    async fn get_no_redirect(
        &self,
        url: &str,
        jar: &CookieJar,
    ) -> Result<PageResponse, CourseError> {
        let target = parse_url(url)?;
        let hop = self
            .attempt(Method::GET, &target, jar, &[], None, true)
            .await?;
        Ok(hop_response(url, &target, hop))
    }

    async fn head_no_redirect(
        &self,
        url: &str,
        jar: &CookieJar,
    ) -> Result<PageResponse, CourseError> {
        let target = parse_url(url)?;
        let hop = self
            .attempt(Method::HEAD, &target, jar, &[], None, false)
            .await?;
        Ok(hop_response(url, &target, hop))
    }

    async fn post_form(
        &self,
        url: &str,
        jar: &CookieJar,
        form: &[(&str, &str)],
        extra_headers: &[(&str, String)],
    ) -> Result<PageResponse, CourseError> {
        let target = parse_url(url)?;
        let hop = self
            .attempt(Method::POST, &target, jar, extra_headers, Some(form), true)
            .await?;
        Ok(hop_response(url, &target, hop))
    }
}

impl CourseClient {
    /// One hop with the retry wrapper: transport errors and 5xx statuses
    /// retry immediately up to `MAX_ATTEMPTS`; the last transport error
    /// propagates, the last 5xx response is returned for the caller to
    /// judge.
    async fn attempt(
        &self,
        method: Method,
        url: &Url,
        jar: &CookieJar,
        extra_headers: &[(&str, String)],
        form: Option<&[(&str, &str)]>,
        read_body: bool,
    ) -> Result<Hop, CourseError> {
        let mut attempts = 0u32;
        loop {
            attempts += 1;

            let mut builder = self.client.request(method.clone(), url.clone());
            if let Some(header_value) = jar.cookie_header_for(url) {
                builder = builder.header(header::COOKIE, header_value);
            }
            for (name, value) in extra_headers {
                builder = builder.header(*name, value.as_str());
            }
            if let Some(fields) = form {
                builder = builder.form(fields);
            }

            match builder.send().await {
                Ok(r) => {
                    let status = r.status().as_u16();
                    if status >= 500 && attempts < MAX_ATTEMPTS {
                        tracing::debug!(status, %url, attempts, "server error, retrying");
                        continue;
                    }
                    let location = r
                        .headers()
                        .get(header::LOCATION)
                        .and_then(|v| v.to_str().ok())
                        .map(|s| s.to_string());
                    let cookies = parse_set_cookies(url, r.headers());
                    let body = if read_body {
                        r.text().await.unwrap_or_default()
                    } else {
                        String::new()
                    };
                    return Ok(Hop {
                        status,
                        location,
                        cookies,
                        body,
                    });
                }
                Err(e) => {
                    if attempts < MAX_ATTEMPTS {
                        tracing::debug!(error = %e, %url, attempts, "request failed, retrying");
                        continue;
                    }
                    return Err(CourseError::Network { attempts, source: e });
                }
            }
        }
    }
}

fn parse_url(url: &str) -> Result<Url, CourseError> {
    Url::parse(url).map_err(|_| CourseError::Parse(format!("invalid url: {url}")))
}

fn hop_response(requested: &str, target: &Url, hop: Hop) -> PageResponse {
    PageResponse {
        url: requested.to_string(),
        final_url: target.to_string(),
        status: hop.status,
        body: hop.body,
        cookies: hop.cookies,
    }
}

/// Parse every `Set-Cookie` header into a jar record, applying the
/// request-host defaults for cookies that omit Domain/Path.
fn parse_set_cookies(url: &Url, headers: &HeaderMap) -> Vec<CookieRecord> {
    let host = url.host_str().unwrap_or_default();
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|s| RawCookie::parse(s).ok())
        .map(|c| {
            let (domain, include_subdomains) = match c.domain() {
                // A Domain attribute extends the cookie to subdomains;
                // normalize to the leading-dot form the cookie file uses.
                Some(d) if d.starts_with('.') => (d.to_string(), true),
                Some(d) => (format!(".{d}"), true),
                None => (host.to_string(), false),
            };
            let expires = c
                .max_age()
                .map(|age| OffsetDateTime::now_utc().unix_timestamp() + age.whole_seconds())
                .or_else(|| c.expires_datetime().map(|dt| dt.unix_timestamp()));
            CookieRecord {
                domain,
                include_subdomains,
                path: c.path().unwrap_or("/").to_string(),
                secure: c.secure().unwrap_or(false),
                expires,
                name: c.name().to_string(),
                value: c.value().to_string(),
            }
        })
        .collect()
}
