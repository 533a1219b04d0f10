use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Multipart, Path, Query},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

/// What `/echo` observed about a request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Echo {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub content: Vec<u8>,
}

/// What `/upload` parsed out of a multipart body.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Upload {
    pub fields: Vec<(String, String)>,
    pub files: Vec<UploadedFile>,
}

impl Upload {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn file(&self, name: &str) -> Option<&UploadedFile> {
        self.files.iter().find(|f| f.name == name)
    }
}

#[derive(Deserialize)]
struct RedirectTo {
    to: String,
}

pub fn app() -> Router {
    Router::new()
        .route("/echo", any(echo))
        .route("/upload", post(upload))
        .route("/redirect/{status}", any(redirect))
        .route("/cookies/set", get(set_cookies))
        .route("/slow/{millis}", get(slow))
        .route("/bytes/{len}", get(bytes))
        .route("/status/{code}", any(status))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn echo(
    method: Method,
    uri: Uri,
    Query(query): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<Echo> {
    let headers = headers
        .iter()
        .map(|(k, v)| {
            (
                k.as_str().to_string(),
                String::from_utf8_lossy(v.as_bytes()).into_owned(),
            )
        })
        .collect();
    Json(Echo {
        method: method.to_string(),
        path: uri.path().to_string(),
        query,
        headers,
        body: String::from_utf8_lossy(&body).into_owned(),
    })
}

async fn upload(mut multipart: Multipart) -> Result<Json<Upload>, (StatusCode, String)> {
    let mut upload = Upload::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let content = field
            .bytes()
            .await
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

        if file_name.is_some() {
            upload.files.push(UploadedFile {
                name,
                file_name,
                content_type,
                content: content.to_vec(),
            });
        } else {
            upload
                .fields
                .push((name, String::from_utf8_lossy(&content).into_owned()));
        }
    }
    tracing::debug!(fields = upload.fields.len(), files = upload.files.len(), "upload parsed");
    Ok(Json(upload))
}

async fn redirect(
    Path(status): Path<u16>,
    Query(target): Query<RedirectTo>,
) -> Result<Response, StatusCode> {
    let status = StatusCode::from_u16(status).map_err(|_| StatusCode::BAD_REQUEST)?;
    if !status.is_redirection() {
        return Err(StatusCode::BAD_REQUEST);
    }
    Ok((status, [(header::LOCATION, target.to)]).into_response())
}

async fn set_cookies(
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<(HeaderMap, &'static str), StatusCode> {
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        let cookie = HeaderValue::from_str(&format!("{name}={value}; Path=/"))
            .map_err(|_| StatusCode::BAD_REQUEST)?;
        headers.append(header::SET_COOKIE, cookie);
    }
    Ok((headers, "ok"))
}

async fn slow(Path(millis): Path<u64>) -> &'static str {
    tokio::time::sleep(Duration::from_millis(millis)).await;
    "done"
}

async fn bytes(Path(len): Path<usize>) -> Vec<u8> {
    vec![b'x'; len]
}

/// Informational codes cannot be sent as a final response.
async fn status(Path(code): Path<u16>) -> StatusCode {
    match code {
        200..=599 => StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_REQUEST),
        _ => StatusCode::BAD_REQUEST,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_serializes_pairs_as_arrays() {
        let echo = Echo {
            method: "GET".to_string(),
            path: "/echo".to_string(),
            query: vec![("a".to_string(), "b".to_string())],
            headers: Vec::new(),
            body: String::new(),
        };
        let json = serde_json::to_value(&echo).unwrap();
        assert_eq!(json["query"][0][0], "a");
        assert_eq!(json["query"][0][1], "b");
    }

    #[test]
    fn echo_roundtrips_through_json() {
        let echo = Echo {
            method: "POST".to_string(),
            path: "/echo".to_string(),
            query: Vec::new(),
            headers: vec![("x".to_string(), "1".to_string())],
            body: "c=d".to_string(),
        };
        let json = serde_json::to_string(&echo).unwrap();
        let back: Echo = serde_json::from_str(&json).unwrap();
        assert_eq!(back, echo);
    }

    #[test]
    fn echo_header_lookup_ignores_case() {
        let echo = Echo {
            headers: vec![
                ("X-Tag".to_string(), "1".to_string()),
                ("x-tag".to_string(), "2".to_string()),
            ],
            ..Echo::default()
        };
        assert_eq!(echo.header("x-tag"), Some("1"));
        assert_eq!(echo.header_values("X-TAG"), vec!["1", "2"]);
    }

    #[test]
    fn upload_lookup_helpers() {
        let upload = Upload {
            fields: vec![("a".to_string(), "b".to_string())],
            files: vec![UploadedFile {
                name: "upload".to_string(),
                file_name: Some("f.bin".to_string()),
                content_type: None,
                content: vec![1, 2, 3],
            }],
        };
        assert_eq!(upload.field("a"), Some("b"));
        assert_eq!(upload.file("upload").unwrap().content, vec![1, 2, 3]);
        assert!(upload.file("missing").is_none());
    }
}
