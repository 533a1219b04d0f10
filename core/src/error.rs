//! Error types for the request builder and dispatcher.
//!
//! # Design
//! Every variant maps to exactly one stage of the pipeline: URL building,
//! reading attachments, encoding a body, constructing the request, or the
//! network exchange itself. Nothing is recovered or retried locally, so the
//! caller always sees the failure of the call it made.

use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by the builders and by `ShcClient::dispatch`.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ShcError {
    /// The base URL handed to `build_query_url` could not be parsed.
    #[error("malformed URL '{url}': {reason}")]
    MalformedUrl { url: String, reason: String },

    /// A multipart attachment could not be opened or fully read.
    #[error("failed to read '{}': {source}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A body part could not be encoded.
    #[error("encoding failed: {0}")]
    Encoding(String),

    /// The method, URL, headers or body do not form a valid request.
    #[error("invalid request: {0}")]
    RequestConstruction(String),

    /// The exchange could not be completed: DNS, connect, TLS, timeout or a
    /// rejected redirect. No response is available.
    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ShcError {
    pub(crate) fn transport(msg: impl Into<String>) -> Self {
        let msg: String = msg.into();
        ShcError::Transport(msg.into())
    }
}

impl From<ureq::Error> for ShcError {
    fn from(err: ureq::Error) -> Self {
        ShcError::Transport(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn transport_error_preserves_source() {
        let inner = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = ShcError::Transport(Box::new(inner));

        let source = err.source().expect("transport error should have a source");
        let io = source.downcast_ref::<std::io::Error>().unwrap();
        assert_eq!(io.kind(), std::io::ErrorKind::ConnectionRefused);
    }

    #[test]
    fn file_read_error_names_the_path() {
        let err = ShcError::FileRead {
            path: PathBuf::from("/nope/missing.txt"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        let msg = err.to_string();
        assert!(msg.contains("/nope/missing.txt"), "{msg}");
        assert!(err.source().is_some());
    }

    #[test]
    fn transport_helper_wraps_message() {
        let err = ShcError::transport("timeout exceeded");
        assert_eq!(err.to_string(), "transport error: timeout exceeded");
    }
}
