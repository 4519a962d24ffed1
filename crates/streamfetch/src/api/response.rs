//! Buffered responses, decoded error bodies, and the caller-facing result of
//! a unary call.

use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::{CONTENT_TYPE_DOWNLOAD, CONTENT_TYPE_DOWNLOAD_ZIP, CONTENT_TYPE_JSON};

/// A response whose body has been read in full.
///
/// Post-response hooks receive and return this value. Decoding helpers only
/// borrow the body, so every later stage still sees the original bytes.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RawResponse {
    /// Build a 200 response carrying a JSON body.
    pub fn json(value: &serde_json::Value) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_JSON));
        Self {
            status: 200,
            headers,
            body: Bytes::from(value.to_string()),
        }
    }

    /// True for 2xx and 3xx.
    pub fn is_success(&self) -> bool {
        (200..400).contains(&self.status)
    }

    /// The media type of the `Content-Type` header, without parameters.
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim())
    }

    /// Whether the body should be handed back as opaque bytes.
    pub fn is_binary(&self) -> bool {
        self.content_type().is_some_and(|ct| {
            ct.eq_ignore_ascii_case(CONTENT_TYPE_DOWNLOAD)
                || ct.eq_ignore_ascii_case(CONTENT_TYPE_DOWNLOAD_ZIP)
        })
    }

    /// Parse the body as JSON without consuming it.
    pub fn json_body<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Decode the body as a [`ResponseError`].
    ///
    /// Bodies that are not JSON objects still produce an error value: the
    /// message falls back to the canonical reason phrase for the status.
    pub fn error_body(&self) -> ResponseError {
        #[derive(Deserialize)]
        struct Wire {
            #[serde(default)]
            code: Option<serde_json::Value>,
            #[serde(default)]
            message: Option<String>,
        }

        let fallback = || {
            reqwest::StatusCode::from_u16(self.status)
                .ok()
                .and_then(|s| s.canonical_reason())
                .unwrap_or("Server Error")
                .to_string()
        };

        match self.json_body::<Wire>() {
            Ok(wire) => ResponseError {
                code: match wire.code {
                    Some(serde_json::Value::String(s)) => s,
                    Some(serde_json::Value::Null) | None => String::new(),
                    Some(other) => other.to_string(),
                },
                message: wire
                    .message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(fallback),
                status: self.status,
            },
            Err(_) => ResponseError {
                code: String::new(),
                message: fallback(),
                status: self.status,
            },
        }
    }
}

/// Error body returned by the server for non-2xx/3xx responses.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ResponseError {
    pub code: String,
    pub message: String,
    pub status: u16,
}

impl std::fmt::Display for ResponseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Decoded result of a unary call.
#[derive(Debug, Clone)]
pub enum ResponseBody {
    /// A JSON body (the common case).
    Json(serde_json::Value),
    /// `application/octet-stream` or `application/zip`.
    Binary(Bytes),
    /// The whole envelope, returned when `need_all_response_content` is set.
    Raw(RawResponse),
}

impl ResponseBody {
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            ResponseBody::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_json(self) -> Option<serde_json::Value> {
        match self {
            ResponseBody::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            ResponseBody::Binary(b) => Some(b),
            _ => None,
        }
    }
}
