//! Request assembly.
//!
//! [`build_request`] turns a path, a caller-supplied [`RequestSpec`], and the
//! per-call [`ClientOptions`] into a [`PreparedRequest`]: a fully-qualified
//! URL, a finalized header map, and the encoded body. Building does no I/O
//! and injects nothing time- or random-dependent, so identical inputs always
//! produce identical requests.

use std::sync::Arc;

use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Url};
use tokio_util::sync::CancellationToken;

use super::hooks::Hooks;
use crate::{CONTENT_TYPE_FORM, CONTENT_TYPE_JSON};
use crate::error::ClientError;

// ── Body ───────────────────────────────────────────────────────────

/// Request body. Exactly one kind is active per request.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Body {
    #[default]
    Empty,
    /// A structured value serialized to JSON at build time.
    Json(serde_json::Value),
    /// Bytes sent as-is.
    Raw(Bytes),
}

// ── RequestSpec ────────────────────────────────────────────────────

/// Caller-supplied, partial description of a request.
///
/// ```ignore
/// let spec = RequestSpec::new()
///     .header("X-Trace", "abc")
///     .query("page", 2)
///     .json(serde_json::json!({"name": "demo"}));
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestSpec {
    /// HTTP method. `None` lets the orchestrator pick its default
    /// (GET for unary calls, POST for streaming calls).
    pub method: Option<Method>,
    /// Extra headers, applied over the defaults in order.
    pub headers: Vec<(String, String)>,
    /// Query parameters, appended in insertion order.
    pub query: Vec<(String, String)>,
    pub body: Body,
}

impl RequestSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn json(mut self, value: serde_json::Value) -> Self {
        self.body = Body::Json(value);
        self
    }

    pub fn raw(mut self, bytes: impl Into<Bytes>) -> Self {
        self.body = Body::Raw(bytes.into());
        self
    }

    /// URL-encoded form body with the matching content type.
    pub fn form<K: AsRef<str>, V: AsRef<str>>(self, fields: &[(K, V)]) -> Self {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, value) in fields {
            serializer.append_pair(key.as_ref(), value.as_ref());
        }
        self.header(CONTENT_TYPE.as_str(), CONTENT_TYPE_FORM)
            .raw(serializer.finish())
    }
}

// ── AbortHandle ────────────────────────────────────────────────────

/// Cooperative cancellation handle for one request.
///
/// Cloning shares the underlying token. Aborting is idempotent and makes the
/// in-flight send or body read finish with
/// [`ClientError::Cancelled`](crate::ClientError::Cancelled).
#[derive(Debug, Clone, Default)]
pub struct AbortHandle(CancellationToken);

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.cancel();
    }

    pub fn is_aborted(&self) -> bool {
        self.0.is_cancelled()
    }

    /// Resolves once [`abort`](Self::abort) has been called.
    pub async fn aborted(&self) {
        self.0.cancelled().await
    }
}

/// Callback that receives a request's [`AbortHandle`] before it is sent.
pub type AbortSink = Arc<dyn Fn(AbortHandle) + Send + Sync>;

// ── ClientOptions ──────────────────────────────────────────────────

/// Per-call configuration. Every field is optional in spirit: the
/// [`Default`] value is the documented behavior.
#[derive(Clone)]
pub struct ClientOptions {
    /// Serialize [`Body::Json`] as JSON. Default: `true`.
    pub body_stringify: bool,
    /// Return the whole response envelope instead of a decoded body.
    pub need_all_response_content: bool,
    /// Drop the default `Content-Type` header.
    pub delete_content_type: bool,
    /// Never notify the user about failures of this call.
    pub silent: bool,
    /// Receives the call's abort handle before the request is sent.
    pub abort_handle_sink: Option<AbortSink>,
    /// Hooks appended after the base pipeline for this call only.
    pub hooks: Hooks,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            body_stringify: true,
            need_all_response_content: false,
            delete_content_type: false,
            silent: false,
            abort_handle_sink: None,
            hooks: Hooks::default(),
        }
    }
}

impl std::fmt::Debug for ClientOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientOptions")
            .field("body_stringify", &self.body_stringify)
            .field("need_all_response_content", &self.need_all_response_content)
            .field("delete_content_type", &self.delete_content_type)
            .field("silent", &self.silent)
            .field("abort_handle_sink", &self.abort_handle_sink.is_some())
            .field("hooks", &self.hooks)
            .finish()
    }
}

impl ClientOptions {
    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    pub fn with_body_stringify(mut self, stringify: bool) -> Self {
        self.body_stringify = stringify;
        self
    }

    pub fn with_all_response_content(mut self) -> Self {
        self.need_all_response_content = true;
        self
    }

    pub fn without_content_type(mut self) -> Self {
        self.delete_content_type = true;
        self
    }

    pub fn with_abort_sink(mut self, sink: impl Fn(AbortHandle) + Send + Sync + 'static) -> Self {
        self.abort_handle_sink = Some(Arc::new(sink));
        self
    }

    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Create the call's abort handle and hand it to the sink, if any.
    pub(crate) fn new_abort_handle(&self) -> AbortHandle {
        let handle = AbortHandle::new();
        if let Some(sink) = &self.abort_handle_sink {
            sink(handle.clone());
        }
        handle
    }
}

// ── PreparedRequest ────────────────────────────────────────────────

/// A fully assembled request, ready for the pre-request hooks and the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl PreparedRequest {
    /// Set (or overwrite) a header.
    pub fn set_header(&mut self, name: &str, value: &str) -> Result<(), ClientError> {
        let (name, value) = parse_header(name, value)?;
        self.headers.insert(name, value);
        Ok(())
    }

    pub(crate) fn into_reqwest(self, client: &reqwest::Client) -> reqwest::RequestBuilder {
        let builder = client
            .request(self.method, self.url)
            .headers(self.headers);
        match self.body {
            Some(body) => builder.body(body),
            None => builder,
        }
    }
}

/// Join a request path onto the base URL.
///
/// Absolute `http://` and `https://` paths bypass the base. Relative paths
/// are appended, with a `/` inserted when the path does not start with one.
pub fn join_url(base_url: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        path.to_string()
    } else if path.starts_with('/') {
        format!("{base_url}{path}")
    } else {
        format!("{base_url}/{path}")
    }
}

/// Assemble a [`PreparedRequest`]. `default_method` applies unless
/// `spec.method` is set.
pub fn build_request(
    base_url: &str,
    path: &str,
    spec: &RequestSpec,
    options: &ClientOptions,
    default_method: Method,
) -> Result<PreparedRequest, ClientError> {
    let raw_url = join_url(base_url, path);
    let mut url = Url::parse(&raw_url)
        .map_err(|e| ClientError::InvalidRequest(format!("invalid URL {raw_url:?}: {e}")))?;
    if !spec.query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in &spec.query {
            pairs.append_pair(key, value);
        }
    }

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_JSON));
    for (name, value) in &spec.headers {
        let (name, value) = parse_header(name, value)?;
        headers.insert(name, value);
    }
    if options.delete_content_type {
        headers.remove(CONTENT_TYPE);
    }

    let body = match &spec.body {
        Body::Empty => None,
        Body::Json(value) if options.body_stringify => Some(Bytes::from(
            serde_json::to_vec(value)
                .map_err(|e| ClientError::InvalidRequest(format!("failed to serialize body: {e}")))?,
        )),
        Body::Json(_) => {
            return Err(ClientError::InvalidRequest(
                "structured body requires body_stringify".into(),
            ));
        }
        Body::Raw(bytes) => Some(bytes.clone()),
    };

    Ok(PreparedRequest {
        method: spec.method.clone().unwrap_or(default_method),
        url,
        headers,
        body,
    })
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue), ClientError> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| ClientError::InvalidRequest(format!("invalid header name {name:?}: {e}")))?;
    let value = HeaderValue::from_str(value)
        .map_err(|e| ClientError::InvalidRequest(format!("invalid header value for {name}: {e}")))?;
    Ok((name, value))
}
