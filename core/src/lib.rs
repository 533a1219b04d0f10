//! Small helper layer over a blocking HTTP client.
//!
//! # Overview
//! Builds query-string URLs, `application/x-www-form-urlencoded` bodies and
//! `multipart/form-data` bodies, then dispatches a request with extra headers
//! and hands back both the request as sent and the response received.
//!
//! # Design
//! - The builders are free functions with no state; only multipart touches
//!   the filesystem.
//! - `ShcClient` is an immutable handle over a `Transport`, a
//!   `RedirectPolicy`, an optional `CookieStore` and a timeout. Each is
//!   injected at construction, so clients never share global configuration.
//! - Requests and responses are plain data (`HttpRequest`, `HttpResponse`)
//!   that the caller owns once `dispatch` returns.

pub mod client;
pub mod cookie;
pub mod error;
pub mod http;
pub mod multipart;
pub mod query;
pub mod redirect;
pub mod transport;

pub use client::{ShcClient, ShcClientBuilder};
pub use cookie::{CookieStore, MemoryCookieJar};
pub use error::ShcError;
pub use crate::http::{
    parse_method, BodyReader, Headers, HttpRequest, HttpResponse, Method, Params, CONTENT_TYPE,
    CONTENT_TYPE_FORM_URL_ENCODED, CONTENT_TYPE_JSON, CONTENT_TYPE_OCTET_STREAM, CONTENT_TYPE_XML,
};
pub use multipart::{build_multipart_form_body, MultipartWriter};
pub use query::{build_form_urlencoded_body, build_query_url, encode_params};
pub use redirect::{LimitRedirects, NoRedirects, RedirectAction, RedirectPolicy};
pub use transport::{Transport, UreqTransport};
