//! Redirect decisions.
//!
//! The client asks its `RedirectPolicy` before every hop, passing the
//! request it is about to send and every request already sent in the chain.

use crate::http::HttpRequest;

/// Default number of hops `LimitRedirects` allows.
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// Outcome of a redirect check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectAction {
    /// Send the next request.
    Follow,
    /// Return the redirect response itself as the result of the dispatch.
    Stop,
    /// Abort the dispatch with a transport error carrying the reason.
    Reject(String),
}

pub trait RedirectPolicy: Send + Sync {
    /// `via` holds the requests already sent, oldest first; it is never empty.
    fn check(&self, next: &HttpRequest, via: &[HttpRequest]) -> RedirectAction;
}

impl<F> RedirectPolicy for F
where
    F: Fn(&HttpRequest, &[HttpRequest]) -> RedirectAction + Send + Sync,
{
    fn check(&self, next: &HttpRequest, via: &[HttpRequest]) -> RedirectAction {
        self(next, via)
    }
}

/// Follows redirects until `max` requests have been sent, then rejects the
/// next hop.
#[derive(Debug, Clone, Copy)]
pub struct LimitRedirects {
    max: usize,
}

impl LimitRedirects {
    pub fn new(max: usize) -> Self {
        Self { max }
    }
}

impl Default for LimitRedirects {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REDIRECTS)
    }
}

impl RedirectPolicy for LimitRedirects {
    fn check(&self, _next: &HttpRequest, via: &[HttpRequest]) -> RedirectAction {
        if via.len() >= self.max {
            RedirectAction::Reject(format!("stopped after {} redirects", self.max))
        } else {
            RedirectAction::Follow
        }
    }
}

/// Never follows; the first redirect response is returned to the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRedirects;

impl RedirectPolicy for NoRedirects {
    fn check(&self, _next: &HttpRequest, _via: &[HttpRequest]) -> RedirectAction {
        RedirectAction::Stop
    }
}
