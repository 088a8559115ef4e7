// Copyright 2026 coursedl contributors
// SPDX-License-Identifier: MIT

//! Netscape flat-file cookie jar.
//!
//! The jar is the single piece of session state that survives across runs:
//! it is loaded from a cookies.txt-style file (tab-separated, as exported
//! by browsers), mutated by the login handshake, and persisted back so
//! repeat invocations skip authentication entirely.
//!
//! Expiration values are parsed as decimal numbers, not strict integers —
//! browser exports occasionally carry fractional epoch seconds and the
//! parser must not choke on them.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use url::Url;

use crate::define;
use crate::error::CourseError;

/// Header line browsers and curl expect at the top of a cookie file.
pub const NETSCAPE_HEADER: &str = "# Netscape HTTP Cookie File";

/// Prefix some browser exports put in front of the domain field.
const HTTP_ONLY_PREFIX: &str = "#HttpOnly_";

/// One line of a Netscape cookie file.
///
/// (domain, path, name) is the effective identity: re-setting a cookie with
/// the same triple replaces the old record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieRecord {
    pub domain: String,
    pub include_subdomains: bool,
    pub path: String,
    pub secure: bool,
    /// Epoch seconds, truncated; `None` for session cookies.
    pub expires: Option<i64>,
    pub name: String,
    pub value: String,
}

impl CookieRecord {
    fn identity(&self) -> (&str, &str, &str) {
        (&self.domain, &self.path, &self.name)
    }

    /// Netscape domain matching: a leading dot (or the subdomain flag)
    /// extends the cookie to all subdomains.
    pub fn domain_matches(&self, host: &str) -> bool {
        let bare = self.domain.trim_start_matches('.');
        if self.include_subdomains || self.domain.starts_with('.') {
            host == bare || host.ends_with(&format!(".{bare}"))
        } else {
            host == self.domain
        }
    }

    /// Cookie-path prefix matching with a path-segment boundary.
    pub fn path_matches(&self, request_path: &str) -> bool {
        if self.path == "/" || self.path == request_path {
            return true;
        }
        request_path
            .strip_prefix(&self.path)
            .is_some_and(|rest| rest.starts_with('/') || self.path.ends_with('/'))
    }

    /// Whether this cookie should be sent on a request for `url`.
    pub fn matches_url(&self, url: &Url) -> bool {
        let host = match url.host_str() {
            Some(h) => h,
            None => return false,
        };
        if self.secure && url.scheme() != "https" {
            return false;
        }
        self.domain_matches(host) && self.path_matches(url.path())
    }
}

/// Ordered set of cookie records for one logical client.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    records: Vec<CookieRecord>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a jar from a Netscape cookie file.
    ///
    /// A missing file yields an empty jar (first run, nothing cached yet);
    /// any other I/O failure is fatal. The header comment line is optional
    /// on input — some exports drop it — and is always written on save.
    pub fn load(path: &Path) -> Result<Self, CourseError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(e.into()),
        };
        Self::parse(&text, path)
    }

    /// Parse cookie-file text. `path` is only used for error reporting.
    pub fn parse(text: &str, path: &Path) -> Result<Self, CourseError> {
        let malformed = |line_no: usize, reason: &str| CourseError::MalformedCookieFile {
            path: path.to_path_buf(),
            reason: format!("line {line_no}: {reason}"),
        };

        let mut jar = Self::new();
        for (idx, raw_line) in text.lines().enumerate() {
            let line_no = idx + 1;
            // Browser exports mark HttpOnly cookies with a comment prefix
            // on the domain field; strip it rather than skipping the line.
            let line = raw_line
                .strip_prefix(HTTP_ONLY_PREFIX)
                .unwrap_or(raw_line)
                .trim_end_matches(['\r', '\n']);
            if line.trim().is_empty() || line.starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() != 7 {
                return Err(malformed(
                    line_no,
                    &format!("expected 7 tab-separated fields, found {}", fields.len()),
                ));
            }

            let flag = |s: &str| match s.to_ascii_uppercase().as_str() {
                "TRUE" => Some(true),
                "FALSE" => Some(false),
                _ => None,
            };
            let include_subdomains = flag(fields[1])
                .ok_or_else(|| malformed(line_no, "subdomain flag is not TRUE/FALSE"))?;
            let secure = flag(fields[3])
                .ok_or_else(|| malformed(line_no, "secure flag is not TRUE/FALSE"))?;

            // Decimal-tolerant: "1445619022.48" is a valid expiration.
            let expires = match fields[4].trim() {
                "" => None,
                s => Some(
                    s.parse::<f64>()
                        .map_err(|_| malformed(line_no, "expiration is not a decimal number"))?
                        .trunc() as i64,
                ),
            };

            jar.set(CookieRecord {
                domain: fields[0].to_string(),
                include_subdomains,
                path: fields[2].to_string(),
                secure,
                expires,
                name: fields[5].to_string(),
                value: fields[6].to_string(),
            });
        }
        Ok(jar)
    }

    /// Serialize the jar back to the flat-file format, overwriting `path`.
    pub fn save(&self, path: &Path) -> Result<(), CourseError> {
        let mut out = String::new();
        out.push_str(NETSCAPE_HEADER);
        out.push('\n');
        for c in &self.records {
            let flag = |b: bool| if b { "TRUE" } else { "FALSE" };
            let expires = c.expires.map(|e| e.to_string()).unwrap_or_default();
            out.push_str(&format!(
                "{}\t{}\t{}\t{}\t{}\t{}\t{}\n",
                c.domain,
                flag(c.include_subdomains),
                c.path,
                flag(c.secure),
                expires,
                c.name,
                c.value
            ));
        }
        fs::write(path, out)?;
        Ok(())
    }

    /// Merge this jar into whatever is already stored at `path` and write
    /// the combined set back. A cache file shared across courses must keep
    /// the other courses' records when only one course was refreshed.
    pub fn save_into(&self, path: &Path) -> Result<(), CourseError> {
        let mut on_disk = match Self::load(path) {
            Ok(jar) => jar,
            // An unreadable cache is replaced wholesale.
            Err(_) => Self::new(),
        };
        on_disk.merge(self.iter().cloned());
        on_disk.save(path)
    }

    /// Set a cookie, replacing any record with the same (domain, path, name).
    pub fn set(&mut self, record: CookieRecord) {
        match self
            .records
            .iter_mut()
            .find(|c| c.identity() == record.identity())
        {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
    }

    /// Merge a batch of response cookies into the jar.
    pub fn merge(&mut self, records: impl IntoIterator<Item = CookieRecord>) {
        for record in records {
            self.set(record);
        }
    }

    /// Look up a cookie by name and domain, optionally pinned to a path.
    pub fn get(&self, name: &str, domain: &str, path: Option<&str>) -> Option<&CookieRecord> {
        self.records.iter().find(|c| {
            c.name == name && c.domain == domain && path.map_or(true, |p| c.path == p)
        })
    }

    /// Drop every cookie scoped to `domain`.
    pub fn clear_domain(&mut self, domain: &str) {
        self.records.retain(|c| c.domain != domain);
    }

    /// Drop every cookie scoped to `domain` at exactly `path`.
    pub fn clear_domain_path(&mut self, domain: &str, path: &str) {
        self.records.retain(|c| c.domain != domain || c.path != path);
    }

    /// Keep only the cookies relevant to one course: the platform-wide
    /// domain, plus class-host cookies whose path is exactly `/<course>`.
    ///
    /// This scoping is what keeps one course's session from leaking into
    /// another course's requests.
    pub fn filter_for_course(&self, course: &str) -> CookieJar {
        let path = define::course_path(course);
        let records = self
            .records
            .iter()
            .filter(|c| {
                c.domain == define::PLATFORM_DOMAIN
                    || (c.domain == define::CLASS_HOST && c.path == path)
            })
            .cloned()
            .collect();
        CookieJar { records }
    }

    /// Build a `Cookie` request header for `url`, or `None` when no cookie
    /// in the jar applies. No expiry filtering happens here: the records
    /// are replayed as stored, matching the file-is-truth contract.
    pub fn cookie_header_for(&self, url: &Url) -> Option<String> {
        let pairs: Vec<String> = self
            .records
            .iter()
            .filter(|c| c.matches_url(url))
            .map(|c| format!("{}={}", c.name, c.value))
            .collect();
        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &CookieRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn record(domain: &str, path: &str, name: &str) -> CookieRecord {
        CookieRecord {
            domain: domain.to_string(),
            include_subdomains: domain.starts_with('.'),
            path: path.to_string(),
            secure: false,
            expires: Some(2_000_000_000),
            name: name.to_string(),
            value: "v".to_string(),
        }
    }

    #[test]
    fn test_parse_accepts_decimal_expiration() {
        let text = "class.coursera.org\tFALSE\t/nlp-001\tTRUE\t1445619022.48\tsession\tabc";
        let jar = CookieJar::parse(text, &PathBuf::from("test")).unwrap();
        assert_eq!(jar.len(), 1);
        let c = jar.get("session", "class.coursera.org", None).unwrap();
        assert_eq!(c.expires, Some(1_445_619_022));
        assert!(c.secure);
    }

    #[test]
    fn test_parse_strips_httponly_prefix_and_comments() {
        let text = "# Netscape HTTP Cookie File\n\
                    #HttpOnly_.coursera.org\tTRUE\t/\tFALSE\t0\tCAUTH\txyz\n\
                    \n\
                    # trailing comment\n";
        let jar = CookieJar::parse(text, &PathBuf::from("test")).unwrap();
        assert_eq!(jar.len(), 1);
        assert!(jar.get("CAUTH", ".coursera.org", None).is_some());
    }

    #[test]
    fn test_parse_rejects_wrong_field_count() {
        let err = CookieJar::parse("a\tb\tc", &PathBuf::from("bad")).unwrap_err();
        assert!(matches!(err, CourseError::MalformedCookieFile { .. }));
    }

    #[test]
    fn test_parse_rejects_bad_expiration() {
        let text = "class.coursera.org\tFALSE\t/\tFALSE\tsoon\tsession\tabc";
        let err = CookieJar::parse(text, &PathBuf::from("bad")).unwrap_err();
        assert!(err.to_string().contains("decimal"));
    }

    #[test]
    fn test_set_replaces_on_identity() {
        let mut jar = CookieJar::new();
        jar.set(record(".coursera.org", "/", "CAUTH"));
        let mut updated = record(".coursera.org", "/", "CAUTH");
        updated.value = "new".to_string();
        jar.set(updated);
        assert_eq!(jar.len(), 1);
        assert_eq!(jar.get("CAUTH", ".coursera.org", None).unwrap().value, "new");
    }

    #[test]
    fn test_filter_for_course_scoping() {
        let mut jar = CookieJar::new();
        jar.set(record(".coursera.org", "/", "CAUTH"));
        jar.set(record(".coursera.org", "/", "maestro_login"));
        jar.set(record(".coursera.org", "/", "maestro_login_flag"));
        jar.set(record("class.coursera.org", "/course-001", "csrf_token"));
        jar.set(record("class.coursera.org", "/course-001", "session"));
        jar.set(record("class.coursera.org", "/course-001", "expires"));
        jar.set(record("class.coursera.org", "/other-999", "csrf_token"));
        jar.set(record("class.coursera.org", "/other-999", "session"));

        let filtered = jar.filter_for_course("course-001");
        assert_eq!(filtered.len(), 6);

        let mut domains: Vec<&str> = filtered.iter().map(|c| c.domain.as_str()).collect();
        domains.sort_unstable();
        domains.dedup();
        assert_eq!(domains, vec![".coursera.org", "class.coursera.org"]);

        let mut paths: Vec<&str> = filtered.iter().map(|c| c.path.as_str()).collect();
        paths.sort_unstable();
        paths.dedup();
        assert_eq!(paths, vec!["/", "/course-001"]);
    }

    #[test]
    fn test_expired_cookies_survive_load_and_filter() {
        let text = ".coursera.org\tTRUE\t/\tFALSE\t1\tCAUTH\told\n\
                    class.coursera.org\tFALSE\t/course-001\tFALSE\t1\tcsrf_token\told";
        let jar = CookieJar::parse(text, &PathBuf::from("expired")).unwrap();
        assert_eq!(jar.len(), 2);
        assert_eq!(jar.filter_for_course("course-001").len(), 2);
    }

    #[test]
    fn test_cookie_header_matching() {
        let mut jar = CookieJar::new();
        jar.set(record(".coursera.org", "/", "CAUTH"));
        jar.set(record("class.coursera.org", "/nlp-001", "session"));
        let mut secure_only = record(".coursera.org", "/", "locked");
        secure_only.secure = true;
        jar.set(secure_only);

        let url = Url::parse("https://class.coursera.org/nlp-001/lecture/index").unwrap();
        let header = jar.cookie_header_for(&url).unwrap();
        assert!(header.contains("CAUTH=v"));
        assert!(header.contains("session=v"));

        // Secure cookies stay home on plain http.
        let url = Url::parse("http://class.coursera.org/nlp-001/class").unwrap();
        let header = jar.cookie_header_for(&url).unwrap();
        assert!(!header.contains("locked"));

        // Unrelated course path gets only the platform-wide cookie.
        let url = Url::parse("https://class.coursera.org/other-999/class").unwrap();
        let header = jar.cookie_header_for(&url).unwrap();
        assert!(!header.contains("session"));
    }

    #[test]
    fn test_clear_domain_and_path() {
        let mut jar = CookieJar::new();
        jar.set(record(".coursera.org", "/", "CAUTH"));
        jar.set(record("class.coursera.org", "/nlp-001", "session"));
        jar.set(record("class.coursera.org", "/nlp-001", "csrf_token"));

        jar.clear_domain_path("class.coursera.org", "/nlp-001");
        assert_eq!(jar.len(), 1);

        jar.clear_domain(".coursera.org");
        assert!(jar.is_empty());
    }
}
