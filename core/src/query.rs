//! Query strings and `application/x-www-form-urlencoded` bodies.
//!
//! Both share one encoding: keys in sorted order, a repeated key for every
//! value, pairs joined by `&`, spaces as `+` and everything outside the
//! unreserved set percent-encoded.

use std::io::Cursor;

use url::form_urlencoded;
use url::{Position, Url};

use crate::error::ShcError;
use crate::http::{BodyReader, Params};

/// Encode `params` as a query string without the leading `?`.
pub fn encode_params(params: &Params) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, values) in params {
        for value in values {
            serializer.append_pair(key, value);
        }
    }
    serializer.finish()
}

/// Stand-in origin for resolving relative references; never leaves this module.
const RELATIVE_BASE: &str = "http://relative.invalid/";

/// Replace the query of `base_url` with the encoded `params`.
///
/// Any query already present on `base_url` is dropped, not merged. The
/// fragment, if any, is kept. Empty `params` leave the URL without a `?`.
/// Relative references such as `/v1/items` stay relative.
pub fn build_query_url(base_url: &str, params: &Params) -> Result<String, ShcError> {
    let query = encode_params(params);
    match Url::parse(base_url) {
        Ok(mut url) => {
            set_query(&mut url, &query);
            Ok(url.into())
        }
        Err(url::ParseError::RelativeUrlWithoutBase) => relative_query_url(base_url, &query),
        Err(e) => Err(malformed(base_url, e)),
    }
}

fn relative_query_url(reference: &str, query: &str) -> Result<String, ShcError> {
    let base = Url::parse(RELATIVE_BASE).map_err(|e| malformed(reference, e))?;
    let mut url = base.join(reference).map_err(|e| malformed(reference, e))?;
    set_query(&mut url, query);

    if reference.starts_with("//") {
        return Ok(format!("//{}", &url[Position::BeforeUsername..]));
    }
    let path_and_rest = &url[Position::BeforePath..];
    if reference.starts_with('/') {
        Ok(path_and_rest.to_string())
    } else {
        Ok(path_and_rest.trim_start_matches('/').to_string())
    }
}

fn set_query(url: &mut Url, query: &str) {
    if query.is_empty() {
        url.set_query(None);
    } else {
        url.set_query(Some(query));
    }
}

fn malformed(url: &str, e: url::ParseError) -> ShcError {
    ShcError::MalformedUrl {
        url: url.to_string(),
        reason: e.to_string(),
    }
}

/// Body stream for a URL-encoded form submission.
pub fn build_form_urlencoded_body(params: &Params) -> BodyReader {
    Cursor::new(encode_params(params).into_bytes())
}
