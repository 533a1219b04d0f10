//! Cookie storage consulted by the client on every hop.
//!
//! `MemoryCookieJar` implements the subset of RFC 6265 a test or script
//! client needs: host-only and domain cookies, path scoping, `Secure`,
//! `Max-Age` and `Expires`. Public-suffix checks are not performed.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, SystemTime};

use url::Url;

pub trait CookieStore: Send + Sync {
    /// Record the `set-cookie` header values received from `url`.
    fn set_cookies(&self, url: &Url, set_cookie_headers: &[String]);

    /// Cookies to send to `url` as `(name, value)` pairs.
    fn cookies(&self, url: &Url) -> Vec<(String, String)>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct StoredCookie {
    name: String,
    value: String,
    domain: String,
    host_only: bool,
    path: String,
    secure: bool,
    expires: Option<SystemTime>,
}

impl StoredCookie {
    fn is_expired(&self, now: SystemTime) -> bool {
        self.expires.is_some_and(|at| at <= now)
    }

    fn same_slot(&self, other: &StoredCookie) -> bool {
        self.name == other.name && self.domain == other.domain && self.path == other.path
    }

    fn matches(&self, url: &Url, host: &str) -> bool {
        let domain_ok = if self.host_only {
            host == self.domain
        } else {
            domain_match(host, &self.domain)
        };
        domain_ok && path_match(url.path(), &self.path) && (!self.secure || url.scheme() == "https")
    }
}

/// In-memory cookie jar, safe to share between threads.
#[derive(Debug, Default)]
pub struct MemoryCookieJar {
    cookies: Mutex<Vec<StoredCookie>>,
}

impl MemoryCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live cookies in the jar.
    pub fn len(&self) -> usize {
        let now = SystemTime::now();
        self.lock().iter().filter(|c| !c.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<StoredCookie>> {
        self.cookies.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CookieStore for MemoryCookieJar {
    fn set_cookies(&self, url: &Url, set_cookie_headers: &[String]) {
        let Some(host) = url.host_str() else {
            return;
        };
        let now = SystemTime::now();
        let mut jar = self.lock();
        for header in set_cookie_headers {
            let Some(cookie) = parse_set_cookie(header, url, host, now) else {
                tracing::trace!(header, "ignoring set-cookie");
                continue;
            };
            jar.retain(|c| !c.same_slot(&cookie));
            if !cookie.is_expired(now) {
                jar.push(cookie);
            }
        }
    }

    fn cookies(&self, url: &Url) -> Vec<(String, String)> {
        let Some(host) = url.host_str() else {
            return Vec::new();
        };
        let now = SystemTime::now();
        let mut jar = self.lock();
        jar.retain(|c| !c.is_expired(now));

        let mut matching: Vec<&StoredCookie> = jar.iter().filter(|c| c.matches(url, host)).collect();
        // Longer paths first; stable sort keeps creation order otherwise.
        matching.sort_by(|a, b| b.path.len().cmp(&a.path.len()));
        matching
            .into_iter()
            .map(|c| (c.name.clone(), c.value.clone()))
            .collect()
    }
}

fn parse_set_cookie(header: &str, url: &Url, host: &str, now: SystemTime) -> Option<StoredCookie> {
    let mut parts = header.split(';');
    let (name, value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let mut cookie = StoredCookie {
        name: name.to_string(),
        value: value.trim().trim_matches('"').to_string(),
        domain: host.to_ascii_lowercase(),
        host_only: true,
        path: default_path(url.path()),
        secure: false,
        expires: None,
    };
    let mut max_age: Option<i64> = None;
    let mut expires: Option<SystemTime> = None;

    for attr in parts {
        let (key, val) = match attr.split_once('=') {
            Some((k, v)) => (k.trim(), v.trim()),
            None => (attr.trim(), ""),
        };
        if key.eq_ignore_ascii_case("domain") {
            let domain = val.trim_start_matches('.').to_ascii_lowercase();
            if domain.is_empty() {
                continue;
            }
            if !domain_match(host, &domain) {
                return None;
            }
            cookie.domain = domain;
            cookie.host_only = false;
        } else if key.eq_ignore_ascii_case("path") {
            if val.starts_with('/') {
                cookie.path = val.to_string();
            }
        } else if key.eq_ignore_ascii_case("secure") {
            cookie.secure = true;
        } else if key.eq_ignore_ascii_case("max-age") {
            if let Ok(secs) = val.parse::<i64>() {
                max_age = Some(secs);
            }
        } else if key.eq_ignore_ascii_case("expires") {
            if let Ok(at) = httpdate::parse_http_date(val) {
                expires = Some(at);
            }
        }
    }

    cookie.expires = match max_age {
        Some(secs) if secs <= 0 => Some(SystemTime::UNIX_EPOCH),
        // Past the representable range the cookie simply never expires.
        Some(secs) => now.checked_add(Duration::from_secs(secs.unsigned_abs())),
        None => expires,
    };
    Some(cookie)
}

fn domain_match(host: &str, domain: &str) -> bool {
    if host == domain {
        return true;
    }
    if host.parse::<std::net::IpAddr>().is_ok() {
        return false;
    }
    host.len() > domain.len()
        && host.ends_with(domain)
        && host.as_bytes()[host.len() - domain.len() - 1] == b'.'
}

fn path_match(request_path: &str, cookie_path: &str) -> bool {
    if request_path == cookie_path {
        return true;
    }
    request_path.starts_with(cookie_path)
        && (cookie_path.ends_with('/') || request_path.as_bytes().get(cookie_path.len()) == Some(&b'/'))
}

fn default_path(request_path: &str) -> String {
    match request_path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => request_path[..idx].to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn set(jar: &MemoryCookieJar, at: &str, headers: &[&str]) {
        let headers: Vec<String> = headers.iter().map(|h| h.to_string()).collect();
        jar.set_cookies(&url(at), &headers);
    }

    fn names(pairs: Vec<(String, String)>) -> Vec<String> {
        pairs.into_iter().map(|(n, v)| format!("{n}={v}")).collect()
    }

    #[test]
    fn host_only_cookie_is_not_sent_to_subdomains() {
        let jar = MemoryCookieJar::new();
        set(&jar, "http://example.com/", &["sid=abc"]);

        assert_eq!(names(jar.cookies(&url("http://example.com/any"))), vec!["sid=abc"]);
        assert!(jar.cookies(&url("http://api.example.com/")).is_empty());
        assert!(jar.cookies(&url("http://other.com/")).is_empty());
    }

    #[test]
    fn domain_cookie_covers_subdomains() {
        let jar = MemoryCookieJar::new();
        set(&jar, "http://www.example.com/", &["t=1; Domain=.example.com"]);

        assert_eq!(names(jar.cookies(&url("http://api.example.com/"))), vec!["t=1"]);
        assert_eq!(names(jar.cookies(&url("http://example.com/"))), vec!["t=1"]);
        assert!(jar.cookies(&url("http://badexample.com/")).is_empty());
    }

    #[test]
    fn foreign_domain_attribute_is_ignored() {
        let jar = MemoryCookieJar::new();
        set(&jar, "http://example.com/", &["x=1; Domain=evil.test"]);
        assert!(jar.is_empty());
    }

    #[test]
    fn path_scoping_and_default_path() {
        let jar = MemoryCookieJar::new();
        set(&jar, "http://h.test/app/login", &["a=1", "b=2; Path=/"]);

        assert_eq!(names(jar.cookies(&url("http://h.test/app/x"))), vec!["a=1", "b=2"]);
        assert_eq!(names(jar.cookies(&url("http://h.test/app"))), vec!["a=1", "b=2"]);
        assert_eq!(names(jar.cookies(&url("http://h.test/apple"))), vec!["b=2"]);
        assert_eq!(names(jar.cookies(&url("http://h.test/"))), vec!["b=2"]);
    }

    #[test]
    fn secure_cookies_need_https() {
        let jar = MemoryCookieJar::new();
        set(&jar, "https://h.test/", &["s=1; Secure; HttpOnly"]);
        assert!(jar.cookies(&url("http://h.test/")).is_empty());
        assert_eq!(names(jar.cookies(&url("https://h.test/"))), vec!["s=1"]);
    }

    #[test]
    fn same_slot_replaces_and_max_age_zero_deletes() {
        let jar = MemoryCookieJar::new();
        set(&jar, "http://h.test/", &["k=old"]);
        set(&jar, "http://h.test/", &["k=new"]);
        assert_eq!(names(jar.cookies(&url("http://h.test/"))), vec!["k=new"]);

        set(&jar, "http://h.test/", &["k=gone; Max-Age=0"]);
        assert!(jar.cookies(&url("http://h.test/")).is_empty());
    }

    #[test]
    fn max_age_beyond_clock_range_never_expires() {
        let jar = MemoryCookieJar::new();
        set(&jar, "http://h.test/", &["a=1; Max-Age=9223372036854775807"]);
        assert_eq!(names(jar.cookies(&url("http://h.test/"))), vec!["a=1"]);
    }

    #[test]
    fn past_expires_deletes_and_future_keeps() {
        let jar = MemoryCookieJar::new();
        set(&jar, "http://h.test/", &["old=1", "keep=2; Expires=Fri, 01 Jan 2100 00:00:00 GMT"]);
        set(&jar, "http://h.test/", &["old=1; Expires=Thu, 01 Jan 1970 00:00:00 GMT"]);
        assert_eq!(names(jar.cookies(&url("http://h.test/"))), vec!["keep=2"]);
    }

    #[test]
    fn malformed_headers_are_skipped() {
        let jar = MemoryCookieJar::new();
        set(&jar, "http://h.test/", &["novalue", "=anon", "ok=1"]);
        assert_eq!(jar.len(), 1);
        jar.clear();
        assert!(jar.is_empty());
    }

    #[test]
    fn ip_hosts_only_match_exactly() {
        assert!(domain_match("127.0.0.1", "127.0.0.1"));
        assert!(!domain_match("10.0.0.1", "0.0.1"));
    }
}
