//! HTTP request and response types described as plain data.
//!
//! # Design
//! The dispatcher hands these values to a `Transport` and returns them to the
//! caller for inspection. Bodies are owned byte vectors and headers are
//! ordered `(name, value)` pairs, so a request can be dumped or compared in
//! tests without touching any client internals.

use std::collections::BTreeMap;

use crate::error::ShcError;

pub const CONTENT_TYPE: &str = "content-type";
pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_XML: &str = "application/xml";
pub const CONTENT_TYPE_FORM_URL_ENCODED: &str = "application/x-www-form-urlencoded";
pub const CONTENT_TYPE_OCTET_STREAM: &str = "application/octet-stream";

/// Multi-valued query or form parameters. Keys encode in sorted order.
pub type Params = BTreeMap<String, Vec<String>>;

/// Extra request headers. Every value is appended, never replacing another.
pub type Headers = BTreeMap<String, Vec<String>>;

/// Single-pass body stream produced by the form builders.
pub type BodyReader = std::io::Cursor<Vec<u8>>;

pub use ::http::Method;

/// Parse a request method token.
///
/// Any token is accepted, extension methods such as `PROPFIND` or `PURGE`
/// included. Tokens are case-sensitive; an empty token means `GET`.
pub fn parse_method(token: &str) -> Result<Method, ShcError> {
    if token.is_empty() {
        return Ok(Method::GET);
    }
    Method::from_bytes(token.as_bytes())
        .map_err(|e| ShcError::RequestConstruction(format!("invalid method '{token}': {e}")))
}

/// An HTTP request described as plain data.
///
/// Returned by `ShcClient::dispatch` exactly as it went out on the first hop,
/// with the content type, caller headers and any stored cookies attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// First value of `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        first_header(&self.headers, name)
    }

    /// All values of `name` in the order they were added.
    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        find_header(&self.headers, name)
    }
}

/// An HTTP response described as plain data.
///
/// `url` is where the response actually came from, which differs from the
/// request URL when redirects were followed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        first_header(&self.headers, name)
    }

    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        find_header(&self.headers, name)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self.status, 301 | 302 | 303 | 307 | 308)
    }

    /// Body decoded as UTF-8, with invalid sequences replaced.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

fn first_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

fn find_header<'a>(
    headers: &'a [(String, String)],
    name: &'a str,
) -> impl Iterator<Item = &'a str> + 'a {
    headers
        .iter()
        .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}
