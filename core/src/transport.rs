//! The network boundary of the dispatcher.
//!
//! # Design
//! `ShcClient` never opens sockets itself. It hands a fully built
//! `HttpRequest` to a `Transport` and gets an `HttpResponse` back, one hop at
//! a time. Redirects, cookies and the overall deadline stay in the client, so
//! a transport only has to perform a single exchange. Tests substitute a
//! closure or a recording fake; production uses `UreqTransport`.

use std::time::Duration;

use crate::error::ShcError;
use crate::http::{HttpRequest, HttpResponse};

/// Performs exactly one HTTP exchange.
///
/// Implementations must not follow redirects and must return non-2xx
/// responses as data. `timeout` bounds the exchange; `None` means unbounded.
pub trait Transport: Send + Sync {
    fn round_trip(
        &self,
        request: &HttpRequest,
        timeout: Option<Duration>,
    ) -> Result<HttpResponse, ShcError>;
}

impl<F> Transport for F
where
    F: Fn(&HttpRequest, Option<Duration>) -> Result<HttpResponse, ShcError> + Send + Sync,
{
    fn round_trip(
        &self,
        request: &HttpRequest,
        timeout: Option<Duration>,
    ) -> Result<HttpResponse, ShcError> {
        self(request, timeout)
    }
}

/// Blocking transport backed by a `ureq::Agent`.
///
/// The agent keeps its own connection pool; clones share it.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
    max_body_size: u64,
}

impl UreqTransport {
    pub fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .max_redirects(0)
            .max_redirects_will_error(false)
            .allow_non_standard_methods(true)
            .build()
            .new_agent();
        Self::with_agent(agent)
    }

    /// Route every request through `proxy`, e.g. `http://127.0.0.1:3128` or
    /// `socks5://localhost:1080`.
    pub fn with_proxy(proxy: &str) -> Result<Self, ShcError> {
        let proxy = ureq::Proxy::new(proxy)
            .map_err(|e| ShcError::RequestConstruction(format!("invalid proxy: {e}")))?;
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .max_redirects(0)
            .max_redirects_will_error(false)
            .allow_non_standard_methods(true)
            .proxy(Some(proxy))
            .build()
            .new_agent();
        Ok(Self::with_agent(agent))
    }

    /// Wrap a caller-configured agent. The agent should have
    /// `http_status_as_error(false)` and redirects disabled.
    pub fn with_agent(agent: ureq::Agent) -> Self {
        Self {
            agent,
            max_body_size: u64::MAX,
        }
    }

    /// Cap response bodies at `limit` bytes. A larger body fails the
    /// exchange with `ShcError::Transport`. Unlimited by default.
    pub fn max_body_size(mut self, limit: u64) -> Self {
        self.max_body_size = limit;
        self
    }

    fn read_response(
        &self,
        url: &str,
        mut response: ureq::http::Response<ureq::Body>,
    ) -> Result<HttpResponse, ShcError> {
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response
            .body_mut()
            .with_config()
            .limit(self.max_body_size)
            .read_to_vec()?;

        Ok(HttpResponse {
            status,
            url: url.to_string(),
            headers,
            body,
        })
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn round_trip(
        &self,
        request: &HttpRequest,
        timeout: Option<Duration>,
    ) -> Result<HttpResponse, ShcError> {
        let mut builder = ureq::http::Request::builder()
            .method(request.method.as_str())
            .uri(request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = match &request.body {
            Some(body) => {
                let req = builder
                    .body(body.as_slice())
                    .map_err(|e| ShcError::RequestConstruction(e.to_string()))?;
                let req = self.agent.configure_request(req).timeout_global(timeout).build();
                self.agent.run(req)?
            }
            None => {
                let req = builder
                    .body(())
                    .map_err(|e| ShcError::RequestConstruction(e.to_string()))?;
                let req = self.agent.configure_request(req).timeout_global(timeout).build();
                self.agent.run(req)?
            }
        };

        self.read_response(&request.url, response)
    }
}
