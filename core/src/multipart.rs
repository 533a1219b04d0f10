//! `multipart/form-data` body encoding.
//!
//! # Design
//! The writer accumulates the whole body in memory so a build either yields
//! a complete, closed body or nothing at all. The boundary is chosen once per
//! writer and is the same string reported by `content_type`, which keeps the
//! body and its header consistent.

use std::io::Cursor;
use std::path::Path;

use uuid::Uuid;

use crate::error::ShcError;
use crate::http::{BodyReader, CONTENT_TYPE_OCTET_STREAM};

/// RFC 2046 limit on boundary length.
const MAX_BOUNDARY_LEN: usize = 70;

/// Incremental writer for a `multipart/form-data` body.
#[derive(Debug)]
pub struct MultipartWriter {
    boundary: String,
    buf: Vec<u8>,
    parts: usize,
}

impl MultipartWriter {
    /// Writer with a fresh random boundary.
    pub fn new() -> Self {
        Self {
            boundary: Uuid::new_v4().simple().to_string(),
            buf: Vec::new(),
            parts: 0,
        }
    }

    /// Writer with a caller-chosen boundary, for reproducible output.
    pub fn with_boundary(boundary: &str) -> Result<Self, ShcError> {
        validate_boundary(boundary)?;
        Ok(Self {
            boundary: boundary.to_string(),
            buf: Vec::new(),
            parts: 0,
        })
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value for the request's `content-type` header.
    pub fn content_type(&self) -> String {
        if self.boundary.bytes().any(|b| b" ()<>@,;:\\\"/[]?=".contains(&b)) {
            format!("multipart/form-data; boundary=\"{}\"", self.boundary)
        } else {
            format!("multipart/form-data; boundary={}", self.boundary)
        }
    }

    /// Append a plain form field.
    pub fn write_field(&mut self, name: &str, value: &str) -> Result<(), ShcError> {
        let disposition = format!("form-data; name=\"{}\"", escape_quotes(name)?);
        self.write_part(&[("Content-Disposition", disposition.as_str())], value.as_bytes());
        tracing::trace!(name, len = value.len(), "multipart field");
        Ok(())
    }

    /// Append a file part with `content` as its body.
    pub fn write_file(&mut self, name: &str, filename: &str, content: &[u8]) -> Result<(), ShcError> {
        let disposition = format!(
            "form-data; name=\"{}\"; filename=\"{}\"",
            escape_quotes(name)?,
            escape_quotes(filename)?
        );
        self.write_part(
            &[
                ("Content-Disposition", disposition.as_str()),
                ("Content-Type", CONTENT_TYPE_OCTET_STREAM),
            ],
            content,
        );
        tracing::trace!(name, filename, len = content.len(), "multipart file");
        Ok(())
    }

    /// Write the closing delimiter and hand back the encoded body.
    pub fn finish(mut self) -> Vec<u8> {
        if self.parts > 0 {
            self.buf.extend_from_slice(b"\r\n");
        }
        self.buf.extend_from_slice(b"--");
        self.buf.extend_from_slice(self.boundary.as_bytes());
        self.buf.extend_from_slice(b"--\r\n");
        self.buf
    }

    fn write_part(&mut self, headers: &[(&str, &str)], body: &[u8]) {
        if self.parts > 0 {
            self.buf.extend_from_slice(b"\r\n");
        }
        self.buf.extend_from_slice(b"--");
        self.buf.extend_from_slice(self.boundary.as_bytes());
        self.buf.extend_from_slice(b"\r\n");
        for (name, value) in headers {
            self.buf.extend_from_slice(name.as_bytes());
            self.buf.extend_from_slice(b": ");
            self.buf.extend_from_slice(value.as_bytes());
            self.buf.extend_from_slice(b"\r\n");
        }
        self.buf.extend_from_slice(b"\r\n");
        self.buf.extend_from_slice(body);
        self.parts += 1;
    }
}

impl Default for MultipartWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode `fields` and the contents of `files` as a multipart form.
///
/// Parts are written in iteration order, all fields before all files. Each
/// file part is named after its key and reports the path as its filename.
/// Returns the body and the matching `content-type` value.
///
/// Fails with `ShcError::FileRead` if any file cannot be read; no body is
/// produced in that case.
pub fn build_multipart_form_body<F, K, V, G, N, P>(
    fields: F,
    files: G,
) -> Result<(BodyReader, String), ShcError>
where
    F: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
    G: IntoIterator<Item = (N, P)>,
    N: AsRef<str>,
    P: AsRef<Path>,
{
    let mut writer = MultipartWriter::new();

    for (name, value) in fields {
        writer.write_field(name.as_ref(), value.as_ref())?;
    }

    for (name, path) in files {
        let path = path.as_ref();
        let content = std::fs::read(path).map_err(|source| ShcError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        writer.write_file(name.as_ref(), &path.to_string_lossy(), &content)?;
    }

    let content_type = writer.content_type();
    Ok((Cursor::new(writer.finish()), content_type))
}

fn escape_quotes(s: &str) -> Result<String, ShcError> {
    if s.contains(|c: char| c == '\r' || c == '\n') {
        return Err(ShcError::Encoding(format!(
            "line break in multipart header value {s:?}"
        )));
    }
    Ok(s.replace('\\', "\\\\").replace('"', "\\\""))
}

fn validate_boundary(boundary: &str) -> Result<(), ShcError> {
    if boundary.is_empty() || boundary.len() > MAX_BOUNDARY_LEN {
        return Err(ShcError::Encoding(format!(
            "boundary must be 1-{MAX_BOUNDARY_LEN} characters"
        )));
    }
    let valid = boundary.bytes().enumerate().all(|(i, b)| match b {
        b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' => true,
        b'\'' | b'(' | b')' | b'+' | b'_' | b',' | b'-' | b'.' | b'/' | b':' | b'=' | b'?' => true,
        b' ' => i + 1 < boundary.len(),
        _ => false,
    });
    if !valid {
        return Err(ShcError::Encoding(format!("invalid boundary {boundary:?}")));
    }
    Ok(())
}
