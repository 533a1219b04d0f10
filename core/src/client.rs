//! Client handle and request dispatch.
//!
//! # Design
//! `ShcClient` is configured once and never mutated afterwards: a transport,
//! a redirect policy, an optional cookie store and a timeout. It is cheap to
//! clone and safe to share across threads, so independently configured
//! clients can coexist. `dispatch` validates its inputs, builds an
//! `HttpRequest`, then walks the redirect chain one `Transport::round_trip`
//! at a time under a single deadline.

use std::fmt;
use std::io::Read;
use std::sync::Arc;
use std::time::{Duration, Instant};

use url::Url;

use crate::cookie::CookieStore;
use crate::error::ShcError;
use crate::http::{parse_method, Headers, HttpRequest, HttpResponse, Method, CONTENT_TYPE};
use crate::redirect::{LimitRedirects, RedirectAction, RedirectPolicy};
use crate::transport::{Transport, UreqTransport};

/// Headers never forwarded when a redirect leaves the original host.
const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "cookie",
    "proxy-authorization",
    "www-authenticate",
];

/// Immutable handle over a configured HTTP client.
#[derive(Clone)]
pub struct ShcClient {
    transport: Arc<dyn Transport>,
    redirect_policy: Arc<dyn RedirectPolicy>,
    cookie_store: Option<Arc<dyn CookieStore>>,
    timeout: Option<Duration>,
}

impl ShcClient {
    /// Build a client from its four collaborators.
    ///
    /// `None` falls back to `UreqTransport`, `LimitRedirects::default()` and
    /// no cookie handling respectively. A zero `timeout` disables the deadline.
    pub fn new(
        transport: Option<Arc<dyn Transport>>,
        redirect_policy: Option<Arc<dyn RedirectPolicy>>,
        cookie_store: Option<Arc<dyn CookieStore>>,
        timeout: Duration,
    ) -> Self {
        Self {
            transport: transport
                .unwrap_or_else(|| Arc::new(UreqTransport::new()) as Arc<dyn Transport>),
            redirect_policy: redirect_policy
                .unwrap_or_else(|| Arc::new(LimitRedirects::default()) as Arc<dyn RedirectPolicy>),
            cookie_store,
            timeout: (!timeout.is_zero()).then_some(timeout),
        }
    }

    pub fn builder() -> ShcClientBuilder {
        ShcClientBuilder::new()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Send a request and wait for the final response.
    ///
    /// `content_type` is added as the `content-type` header unless empty.
    /// Every value in `headers` is appended. `body` is read to the end before
    /// anything is sent. Redirects are followed as the policy allows.
    ///
    /// Returns the request as sent on the first hop together with the final
    /// response.
    ///
    /// # Errors
    /// - `RequestConstruction` for a malformed method token, an unparseable or
    ///   non-http(s) URL, an invalid header, or an unreadable body.
    /// - `Transport` when the exchange fails, the timeout elapses, or the
    ///   redirect policy rejects a hop. No response is returned in that case.
    pub fn dispatch(
        &self,
        method: &str,
        url: &str,
        content_type: &str,
        headers: &Headers,
        body: Option<&mut dyn Read>,
    ) -> Result<(HttpRequest, HttpResponse), ShcError> {
        let method = parse_method(method)?;
        let target = parse_target(url)?;

        let mut header_list = Vec::new();
        if !content_type.is_empty() {
            validate_header(CONTENT_TYPE, content_type)?;
            header_list.push((CONTENT_TYPE.to_string(), content_type.to_string()));
        }
        for (name, values) in headers {
            for value in values {
                validate_header(name, value)?;
                header_list.push((name.clone(), value.clone()));
            }
        }

        let body = match body {
            Some(reader) => {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf).map_err(|e| {
                    ShcError::RequestConstruction(format!("failed to read request body: {e}"))
                })?;
                Some(buf)
            }
            None => None,
        };

        let request = HttpRequest {
            method,
            url: url.to_string(),
            headers: header_list,
            body,
        };
        self.execute(request, target)
    }

    fn execute(
        &self,
        request: HttpRequest,
        target: Url,
    ) -> Result<(HttpRequest, HttpResponse), ShcError> {
        let deadline = self.timeout.map(|t| Instant::now() + t);
        let mut hop = request;
        let mut hop_url = target;
        let mut via: Vec<HttpRequest> = Vec::new();

        loop {
            let sent = self.attach_cookies(&hop, &hop_url);
            let timeout = remaining(deadline)?;
            tracing::trace!(method = %sent.method, url = %sent.url, hop = via.len(), "sending request");

            let response = self.transport.round_trip(&sent, timeout)?;
            self.record_cookies(&hop_url, &response);
            via.push(sent);

            let Some(next_url) = redirect_target(&hop_url, &response)? else {
                tracing::debug!(
                    method = %via[0].method,
                    url = %via[0].url,
                    status = response.status,
                    redirects = via.len() - 1,
                    "request completed"
                );
                return Ok((via.swap_remove(0), response));
            };

            let next = redirect_request(&hop, &hop_url, &next_url, response.status);
            match self.redirect_policy.check(&next, &via) {
                RedirectAction::Follow => {
                    tracing::trace!(status = response.status, location = %next.url, "following redirect");
                }
                RedirectAction::Stop => {
                    tracing::debug!(status = response.status, location = %next.url, "redirect not followed");
                    return Ok((via.swap_remove(0), response));
                }
                RedirectAction::Reject(reason) => {
                    tracing::warn!(location = %next.url, %reason, "redirect rejected");
                    return Err(ShcError::transport(format!(
                        "redirect to {} rejected: {reason}",
                        next.url
                    )));
                }
            }

            hop = next;
            hop_url = next_url;
        }
    }

    fn attach_cookies(&self, request: &HttpRequest, url: &Url) -> HttpRequest {
        let mut sent = request.clone();
        if let Some(store) = &self.cookie_store {
            let cookies = store.cookies(url);
            if !cookies.is_empty() {
                let value = cookies
                    .iter()
                    .map(|(name, value)| format!("{name}={value}"))
                    .collect::<Vec<_>>()
                    .join("; ");
                sent.headers.push(("cookie".to_string(), value));
            }
        }
        sent
    }

    fn record_cookies(&self, url: &Url, response: &HttpResponse) {
        if let Some(store) = &self.cookie_store {
            let set_cookies: Vec<String> = response
                .header_values("set-cookie")
                .map(str::to_string)
                .collect();
            if !set_cookies.is_empty() {
                store.set_cookies(url, &set_cookies);
            }
        }
    }
}

impl Default for ShcClient {
    fn default() -> Self {
        Self::new(None, None, None, Duration::ZERO)
    }
}

impl fmt::Debug for ShcClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShcClient")
            .field("timeout", &self.timeout)
            .field("cookie_store", &self.cookie_store.is_some())
            .finish_non_exhaustive()
    }
}

/// Fluent construction of a `ShcClient`.
#[derive(Default)]
#[must_use]
pub struct ShcClientBuilder {
    transport: Option<Arc<dyn Transport>>,
    redirect_policy: Option<Arc<dyn RedirectPolicy>>,
    cookie_store: Option<Arc<dyn CookieStore>>,
    timeout: Duration,
}

impl ShcClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn redirect_policy(mut self, policy: Arc<dyn RedirectPolicy>) -> Self {
        self.redirect_policy = Some(policy);
        self
    }

    pub fn cookie_store(mut self, store: Arc<dyn CookieStore>) -> Self {
        self.cookie_store = Some(store);
        self
    }

    /// Bound on the whole exchange, redirects included. Zero means none.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> ShcClient {
        ShcClient::new(
            self.transport,
            self.redirect_policy,
            self.cookie_store,
            self.timeout,
        )
    }
}

fn parse_target(url: &str) -> Result<Url, ShcError> {
    let parsed = Url::parse(url)
        .map_err(|e| ShcError::RequestConstruction(format!("invalid URL '{url}': {e}")))?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Ok(parsed),
        "http" | "https" => Err(ShcError::RequestConstruction(format!(
            "URL '{url}' has no host"
        ))),
        scheme => Err(ShcError::RequestConstruction(format!(
            "unsupported protocol scheme '{scheme}'"
        ))),
    }
}

fn validate_header(name: &str, value: &str) -> Result<(), ShcError> {
    http::HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| ShcError::RequestConstruction(format!("invalid header name '{name}': {e}")))?;
    http::HeaderValue::from_str(value).map_err(|e| {
        ShcError::RequestConstruction(format!("invalid value for header '{name}': {e}"))
    })?;
    Ok(())
}

fn remaining(deadline: Option<Instant>) -> Result<Option<Duration>, ShcError> {
    let Some(deadline) = deadline else {
        return Ok(None);
    };
    let now = Instant::now();
    if now >= deadline {
        return Err(ShcError::transport("timeout exceeded"));
    }
    Ok(Some(deadline - now))
}

/// Where a redirect response points, if it is one that should be followed.
fn redirect_target(current: &Url, response: &HttpResponse) -> Result<Option<Url>, ShcError> {
    if !response.is_redirect() {
        return Ok(None);
    }
    let Some(location) = response.header("location") else {
        return Ok(None);
    };
    let next = current
        .join(location)
        .map_err(|e| ShcError::transport(format!("invalid Location header '{location}': {e}")))?;
    match next.scheme() {
        "http" | "https" => Ok(Some(next)),
        scheme => Err(ShcError::transport(format!(
            "redirect to unsupported protocol scheme '{scheme}'"
        ))),
    }
}

/// The request to send after a redirect with `status` from `prev`.
///
/// 301/302/303 switch to GET (HEAD stays HEAD) and drop the body;
/// 307/308 repeat the method and body.
fn redirect_request(prev: &HttpRequest, prev_url: &Url, next_url: &Url, status: u16) -> HttpRequest {
    let keep_body = matches!(status, 307 | 308);
    let method = if keep_body || prev.method == Method::GET || prev.method == Method::HEAD {
        prev.method.clone()
    } else {
        Method::GET
    };
    let cross_host = prev_url.host_str() != next_url.host_str();

    let mut headers: Vec<(String, String)> = prev
        .headers
        .iter()
        .filter(|(name, _)| {
            let name = name.to_ascii_lowercase();
            if name == "referer" {
                return false;
            }
            if !keep_body && (name == "content-type" || name == "content-length") {
                return false;
            }
            !(cross_host && SENSITIVE_HEADERS.contains(&name.as_str()))
        })
        .cloned()
        .collect();
    if let Some(referer) = referer_for(prev_url, next_url) {
        headers.push(("referer".to_string(), referer));
    }

    HttpRequest {
        method,
        url: next_url.to_string(),
        headers,
        body: if keep_body { prev.body.clone() } else { None },
    }
}

/// `Referer` value for a hop from `prev` to `next`; none on an https to http
/// downgrade. Credentials and fragment are stripped.
fn referer_for(prev: &Url, next: &Url) -> Option<String> {
    if prev.scheme() == "https" && next.scheme() == "http" {
        return None;
    }
    let mut referer = prev.clone();
    referer.set_fragment(None);
    // Only fails for cannot-be-a-base URLs, which http(s) never are.
    let _ = referer.set_username("");
    let _ = referer.set_password(None);
    Some(referer.into())
}
